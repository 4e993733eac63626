use rocket::data::{Data, ToByteUnit};
use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::Validate;

use crate::ai::{DocumentPayload, RetryPolicy, SharedAi};
use crate::api::CountResponse;
use crate::auth::{Permission, User};
use crate::db::{
    delete_question, get_question, link_questions_to_decks, link_questions_to_subject,
    link_questions_to_tests, list_batches, list_questions, save_questions_in_batches,
    update_question, QuestionFilter, QuestionUpdate, SaveTarget,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::extraction::{ExtractionPattern, ExtractionPipeline, ExtractionProgress, ExtractionReport};
use crate::models::{answer_distribution, AnswerDistribution, Choice, Question, QuestionDraft};
use crate::validation::{
    field_error, require_non_blank, ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt,
    ToValidationResponse,
};

#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, message = "Statement is required"))]
    pub statement: String,
    #[validate(length(min = 2, message = "A question needs at least two choices"))]
    pub choices: Vec<Choice>,
    #[validate(length(min = 1, message = "Correct answer is required"))]
    pub correct: String,
    pub resolution: Option<String>,
    pub hint: Option<String>,
    pub discipline_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub batch: Option<String>,
}

impl From<QuestionRequest> for QuestionUpdate {
    fn from(request: QuestionRequest) -> Self {
        Self {
            statement: request.statement.trim().to_string(),
            choices: request.choices,
            correct: request.correct,
            resolution: request.resolution.filter(|r| !r.trim().is_empty()),
            hint: request.hint.filter(|h| !h.trim().is_empty()),
            discipline_id: request.discipline_id,
            subject_id: request.subject_id,
            batch: request.batch.filter(|b| !b.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LinkSubjectRequest {
    pub question_ids: Vec<i64>,
    pub discipline_id: i64,
    pub subject_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LinkTargetsRequest {
    pub question_ids: Vec<i64>,
    pub target_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub report: ExtractionReport,
    pub progress: Vec<ExtractionProgress>,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub questions: Vec<QuestionDraft>,
    pub discipline_id: i64,
    pub subject_id: i64,
    pub batch: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: usize,
}

fn require_selection(ids: &[i64], targets: &[i64]) -> ApiResult<()> {
    if ids.is_empty() {
        return Err(field_error(
            Status::UnprocessableEntity,
            "question_ids",
            "Select at least one question",
        ));
    }
    if targets.is_empty() {
        return Err(field_error(
            Status::UnprocessableEntity,
            "target_ids",
            "Select at least one destination",
        ));
    }
    Ok(())
}

#[get("/questions?<search>&<batch>&<discipline_id>&<subject_id>")]
pub async fn list(
    search: Option<String>,
    batch: Option<String>,
    discipline_id: Option<i64>,
    subject_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Question>>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;

    let filter = QuestionFilter {
        search,
        batch,
        discipline_id,
        subject_id,
    };
    Ok(Json(list_questions(db, &filter).await.validate_custom()?))
}

#[get("/questions/batches")]
pub async fn batches(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<String>>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;

    Ok(Json(list_batches(db).await.validate_custom()?))
}

/// Correct-letter distribution over the questions matching the same filters
/// as the listing.
#[get("/questions/metrics?<search>&<batch>&<discipline_id>&<subject_id>")]
pub async fn metrics(
    search: Option<String>,
    batch: Option<String>,
    discipline_id: Option<i64>,
    subject_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<AnswerDistribution>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;

    let filter = QuestionFilter {
        search,
        batch,
        discipline_id,
        subject_id,
    };
    let questions = list_questions(db, &filter).await.validate_custom()?;
    Ok(Json(answer_distribution(
        questions.iter().map(|q| q.correct.as_str()),
    )))
}

#[get("/questions/<id>")]
pub async fn get(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Question>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;

    Ok(Json(get_question(db, id).await.validate_custom()?))
}

#[put("/questions/<id>", data = "<request>")]
pub async fn update(
    id: i64,
    request: Json<QuestionRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Status> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;
    let request = request.validate_custom()?;
    require_non_blank("statement", &request.statement, "Statement is required")?;

    update_question(db, id, &QuestionUpdate::from(request))
        .await
        .validate_custom()?;
    Ok(Status::NoContent)
}

#[delete("/questions/<id>")]
pub async fn delete(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Status> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;

    delete_question(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

#[post("/questions/link/subject", data = "<request>")]
pub async fn link_subject(
    request: Json<LinkSubjectRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<CountResponse>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;
    require_selection(&request.question_ids, &[request.subject_id])?;

    let count = link_questions_to_subject(
        db,
        &request.question_ids,
        request.discipline_id,
        request.subject_id,
    )
    .await
    .validate_custom()?;
    Ok(Json(CountResponse { count }))
}

#[post("/questions/link/tests", data = "<request>")]
pub async fn link_tests(
    request: Json<LinkTargetsRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<CountResponse>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;
    require_selection(&request.question_ids, &request.target_ids)?;

    let count = link_questions_to_tests(db, &request.question_ids, &request.target_ids)
        .await
        .validate_custom()?;
    Ok(Json(CountResponse { count }))
}

#[post("/questions/link/decks", data = "<request>")]
pub async fn link_decks(
    request: Json<LinkTargetsRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<CountResponse>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;
    require_selection(&request.question_ids, &request.target_ids)?;

    let count = link_questions_to_decks(db, &request.question_ids, &request.target_ids)
        .await
        .validate_custom()?;
    Ok(Json(CountResponse { count }))
}

/// Runs the extraction pipeline over an uploaded document. The body is the
/// raw file; its MIME type comes from `Content-Type`.
#[post("/questions/extract?<pattern>", data = "<document>")]
pub async fn extract(
    pattern: Option<ExtractionPattern>,
    content_type: &ContentType,
    document: Data<'_>,
    user: User,
    ai: &State<SharedAi>,
    config: &State<AppConfig>,
) -> ApiResult<Json<ExtractionResponse>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;

    let upload = document
        .open(config.max_upload_mb.mebibytes())
        .into_bytes()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read upload: {}", e)))
        .validate_custom()?;

    if !upload.is_complete() {
        warn!(limit_mb = config.max_upload_mb, "Uploaded document exceeds the size limit");
        return Err(field_error(
            Status::PayloadTooLarge,
            "document",
            &format!("The file must be at most {} MB", config.max_upload_mb),
        ));
    }

    let bytes = upload.into_inner();
    if bytes.is_empty() {
        return Err(field_error(
            Status::UnprocessableEntity,
            "document",
            "Upload a document to extract questions from",
        ));
    }

    let payload = DocumentPayload {
        mime_type: content_type.to_string(),
        bytes,
    };
    let pattern = pattern.unwrap_or_default();
    info!(?pattern, mime = %payload.mime_type, "Starting question extraction");

    let mut progress = Vec::new();
    let mut record = |step: ExtractionProgress| progress.push(step);
    let pipeline = ExtractionPipeline::new(
        ai.inner().as_ref(),
        RetryPolicy::from_config(config),
        config.extraction_chunk_size,
    );
    let report = pipeline
        .run(&payload, pattern, &mut record)
        .await
        .validate_custom()?;

    Ok(Json(ExtractionResponse { report, progress }))
}

#[post("/questions/save", data = "<request>")]
pub async fn save(
    request: Json<SaveRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<Json<SaveResponse>> {
    user.require_permission(Permission::ManageQuestions)
        .validate_custom()?;

    let target = SaveTarget {
        discipline_id: request.discipline_id,
        subject_id: request.subject_id,
        batch: &request.batch,
    };

    match save_questions_in_batches(db, &request.questions, &target, config.save_batch_size).await
    {
        Ok(saved) => Ok(Json(SaveResponse { saved })),
        Err(err) if err.saved == 0 && matches!(err.source, AppError::Validation(_)) => {
            Err(AppError::from(err).to_validation_response())
        }
        Err(err) => {
            let saved = err.saved;
            AppError::from(err).log_and_record("Batch save");
            Err(field_error(
                Status::InternalServerError,
                "save",
                &format!(
                    "Saving stopped after {} questions. The remaining questions were not saved.",
                    saved
                ),
            ))
        }
    }
}

pub fn routes() -> Vec<Route> {
    routes![
        list,
        batches,
        metrics,
        get,
        update,
        delete,
        link_subject,
        link_tests,
        link_decks,
        extract,
        save
    ]
}
