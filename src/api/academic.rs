use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::api::CreatedResponse;
use crate::auth::{Permission, User};
use crate::db::{
    create_academic_item, delete_academic_item, get_academic_data, list_academic_items,
    update_academic_item,
};
use crate::models::{AcademicData, AcademicItem, AcademicLevel};
use crate::validation::{
    require_non_blank, ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt,
};

#[derive(Debug, Deserialize, Validate)]
pub struct AcademicItemRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub parent_id: Option<i64>,
}

#[get("/academic")]
pub async fn hierarchy(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<AcademicData>> {
    user.require_permission(Permission::ViewAcademicData)
        .validate_custom()?;

    Ok(Json(get_academic_data(db).await.validate_custom()?))
}

#[get("/academic/<level>?<parent_id>")]
pub async fn list(
    level: AcademicLevel,
    parent_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<AcademicItem>>> {
    user.require_permission(Permission::ViewAcademicData)
        .validate_custom()?;

    let items = list_academic_items(db, level, parent_id)
        .await
        .validate_custom()?;
    Ok(Json(items))
}

#[post("/academic/<level>", data = "<request>")]
pub async fn create(
    level: AcademicLevel,
    request: Json<AcademicItemRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<(Status, Json<CreatedResponse>)> {
    user.require_permission(Permission::ManageAcademicData)
        .validate_custom()?;
    let request = request.validate_custom()?;
    require_non_blank("description", &request.description, "Description is required")?;

    let id = create_academic_item(db, level, request.description.trim(), request.parent_id)
        .await
        .validate_custom()?;
    Ok((Status::Created, Json(CreatedResponse { id })))
}

#[put("/academic/<level>/<id>", data = "<request>")]
pub async fn update(
    level: AcademicLevel,
    id: i64,
    request: Json<AcademicItemRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(Permission::ManageAcademicData)
        .validate_custom()?;
    let request = request.validate_custom()?;
    require_non_blank("description", &request.description, "Description is required")?;

    update_academic_item(db, level, id, request.description.trim(), request.parent_id)
        .await
        .validate_custom()?;
    Ok(Status::NoContent)
}

/// Deleting an item removes everything below it.
#[delete("/academic/<level>/<id>")]
pub async fn delete(
    level: AcademicLevel,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(Permission::ManageAcademicData)
        .validate_custom()?;

    delete_academic_item(db, level, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<Route> {
    routes![hierarchy, list, create, update, delete]
}
