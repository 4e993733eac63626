use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::api::CreatedResponse;
use crate::auth::{Permission, User};
use crate::db::{create_material, delete_material, list_materials, update_material, MaterialInput};
use crate::models::{MaterialKind, StudyMaterial};
use crate::validation::{ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt};

#[derive(Debug, Deserialize, Validate)]
pub struct MaterialRequest {
    pub kind: MaterialKind,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(url(message = "Enter a valid URL"))]
    pub url: String,
    pub discipline_id: i64,
    pub subject_id: i64,
}

impl MaterialRequest {
    fn input(&self) -> MaterialInput<'_> {
        MaterialInput {
            kind: self.kind,
            title: self.title.trim(),
            url: self.url.trim(),
            discipline_id: self.discipline_id,
            subject_id: self.subject_id,
        }
    }
}

#[get("/materials?<discipline_id>&<subject_id>")]
pub async fn list(
    discipline_id: Option<i64>,
    subject_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<StudyMaterial>>> {
    user.require_permission(Permission::ViewAcademicData)
        .validate_custom()?;

    let materials = list_materials(db, discipline_id, subject_id)
        .await
        .validate_custom()?;
    Ok(Json(materials))
}

#[post("/materials", data = "<request>")]
pub async fn create(
    request: Json<MaterialRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<(Status, Json<CreatedResponse>)> {
    user.require_permission(Permission::ManageMaterials)
        .validate_custom()?;
    let request = request.validate_custom()?;

    let id = create_material(db, request.input()).await.validate_custom()?;
    Ok((Status::Created, Json(CreatedResponse { id })))
}

#[put("/materials/<id>", data = "<request>")]
pub async fn update(
    id: i64,
    request: Json<MaterialRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(Permission::ManageMaterials)
        .validate_custom()?;
    let request = request.validate_custom()?;

    update_material(db, id, request.input())
        .await
        .validate_custom()?;
    Ok(Status::NoContent)
}

#[delete("/materials/<id>")]
pub async fn delete(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Status> {
    user.require_permission(Permission::ManageMaterials)
        .validate_custom()?;

    delete_material(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<Route> {
    routes![list, create, update, delete]
}
