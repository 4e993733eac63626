use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::{Permission, User};
use crate::classbuild::{
    send_questions, ConnectionStatus, ExportSettings, RemoteEntity, SendReport, SharedSchoolApi,
};
use crate::db::get_questions_by_ids;
use crate::env::AppConfig;
use crate::validation::{
    field_error, require_non_blank, validate_value, ApiResult, AppErrorExt, PermissionCheckExt,
};

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub settings: ExportSettings,
}

#[derive(Debug, Deserialize)]
pub struct RemoteDisciplineRequest {
    pub settings: ExportSettings,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteSubjectRequest {
    pub settings: ExportSettings,
    pub discipline_id: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub settings: ExportSettings,
    pub question_ids: Vec<i64>,
    pub discipline: RemoteEntity,
    pub subject: RemoteEntity,
}

#[post("/export/check", data = "<request>")]
pub async fn check(
    request: Json<CheckRequest>,
    user: User,
    school: &State<SharedSchoolApi>,
) -> ApiResult<Json<ConnectionStatus>> {
    user.require_permission(Permission::ExportQuestions)
        .validate_custom()?;
    validate_value(&request.settings)?;

    Ok(Json(school.check_connection(&request.settings).await))
}

#[post("/export/disciplines", data = "<request>")]
pub async fn create_discipline(
    request: Json<RemoteDisciplineRequest>,
    user: User,
    school: &State<SharedSchoolApi>,
) -> ApiResult<(Status, Json<RemoteEntity>)> {
    user.require_permission(Permission::ExportQuestions)
        .validate_custom()?;
    validate_value(&request.settings)?;
    require_non_blank("description", &request.description, "Description is required")?;

    let discipline = school
        .create_discipline(&request.settings, request.description.trim())
        .await
        .validate_custom()?;
    Ok((Status::Created, Json(discipline)))
}

#[post("/export/subjects", data = "<request>")]
pub async fn create_subject(
    request: Json<RemoteSubjectRequest>,
    user: User,
    school: &State<SharedSchoolApi>,
) -> ApiResult<(Status, Json<RemoteEntity>)> {
    user.require_permission(Permission::ExportQuestions)
        .validate_custom()?;
    validate_value(&request.settings)?;
    require_non_blank("discipline_id", &request.discipline_id, "Choose a remote discipline")?;
    require_non_blank("description", &request.description, "Description is required")?;

    let subject = school
        .create_subject(
            &request.settings,
            request.discipline_id.trim(),
            request.description.trim(),
        )
        .await
        .validate_custom()?;
    Ok((Status::Created, Json(subject)))
}

/// Posts the selected questions to the school API, one at a time.
#[post("/export/send", data = "<request>")]
pub async fn send(
    request: Json<SendRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    school: &State<SharedSchoolApi>,
    config: &State<AppConfig>,
) -> ApiResult<Json<SendReport>> {
    user.require_permission(Permission::ExportQuestions)
        .validate_custom()?;
    validate_value(&request.settings)?;
    if request.question_ids.is_empty() {
        return Err(field_error(
            Status::UnprocessableEntity,
            "question_ids",
            "Select at least one question to send",
        ));
    }

    let questions = get_questions_by_ids(db, &request.question_ids)
        .await
        .validate_custom()?;
    let report = send_questions(
        school.inner().as_ref(),
        &request.settings,
        &questions,
        &request.discipline,
        &request.subject,
        config.school_api_throttle,
    )
    .await;

    info!(
        total = report.total,
        success = report.success_count,
        errors = report.error_count,
        "Question export finished"
    );
    Ok(Json(report))
}

pub fn routes() -> Vec<Route> {
    routes![check, create_discipline, create_subject, send]
}
