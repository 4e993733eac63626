use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::api::CreatedResponse;
use crate::auth::{AccountStatus, Permission, Role, User};
use crate::db::{
    create_user, delete_student, get_enrollments, list_students, set_enrollments,
    update_student, EnrollmentChange, NewUser,
};
use crate::models::StudentSummary;
use crate::validation::{
    field_error, ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt,
};

#[derive(Debug, Deserialize, Validate)]
pub struct StudentRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub status: AccountStatus,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentRequest {
    pub course_ids: Vec<i64>,
}

#[get("/students?<search>&<status>")]
pub async fn list(
    search: Option<&str>,
    status: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<StudentSummary>>> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;

    let status = match status.filter(|s| !s.is_empty()) {
        Some(raw) => Some(AccountStatus::parse(raw).ok_or_else(|| {
            field_error(
                Status::UnprocessableEntity,
                "status",
                "Status must be active or inactive",
            )
        })?),
        None => None,
    };

    let students = list_students(db, search, status).await.validate_custom()?;
    Ok(Json(students))
}

#[post("/students", data = "<request>")]
pub async fn create(
    request: Json<StudentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<(Status, Json<CreatedResponse>)> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;
    let request = request.validate_custom()?;

    let id = create_user(
        db,
        NewUser {
            name: request.name.trim(),
            email: request.email.trim(),
            role: Role::Student,
            status: request.status,
            password: request.password.as_deref(),
        },
    )
    .await
    .validate_custom()?;

    Ok((Status::Created, Json(CreatedResponse { id })))
}

#[put("/students/<id>", data = "<request>")]
pub async fn update(
    id: i64,
    request: Json<StudentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;
    let request = request.validate_custom()?;

    update_student(db, id, request.name.trim(), request.email.trim(), request.status)
        .await
        .validate_custom()?;

    Ok(Status::NoContent)
}

#[delete("/students/<id>")]
pub async fn delete(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Status> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;

    delete_student(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

#[get("/students/<id>/enrollments")]
pub async fn enrollments(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<i64>>> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;

    Ok(Json(get_enrollments(db, id).await.validate_custom()?))
}

#[put("/students/<id>/enrollments", data = "<request>")]
pub async fn update_enrollments(
    id: i64,
    request: Json<EnrollmentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<EnrollmentChange>> {
    user.require_permission(Permission::ManageStudents)
        .validate_custom()?;

    let change = set_enrollments(db, id, &request.course_ids)
        .await
        .validate_custom()?;
    Ok(Json(change))
}

pub fn routes() -> Vec<Route> {
    routes![list, create, update, delete, enrollments, update_enrollments]
}
