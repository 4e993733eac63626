use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::ai::SharedAi;
use crate::auth::{Permission, User};
use crate::db::{create_learning_path, delete_learning_path, list_learning_paths};
use crate::models::LearningPath;
use crate::validation::{require_non_blank, ApiResult, AppErrorExt, PermissionCheckExt};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[get("/learning-paths")]
pub async fn list(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<LearningPath>>> {
    user.require_permission(Permission::ViewAcademicData)
        .validate_custom()?;

    Ok(Json(list_learning_paths(db).await.validate_custom()?))
}

/// Asks the AI for a path on the given topic and stores it.
#[post("/learning-paths/generate", data = "<request>")]
pub async fn generate(
    request: Json<GenerateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    ai: &State<SharedAi>,
) -> ApiResult<(Status, Json<LearningPath>)> {
    user.require_permission(Permission::ManageLearningPaths)
        .validate_custom()?;
    require_non_blank("prompt", &request.prompt, "Describe the learning path to generate")?;

    let content = ai
        .generate_learning_path(request.prompt.trim())
        .await
        .validate_custom()?
        .normalized();

    let id = create_learning_path(db, &content).await.validate_custom()?;
    info!(path_id = id, steps = content.steps.len(), "Learning path generated");

    Ok((
        Status::Created,
        Json(LearningPath {
            id,
            title: content.title,
            description: content.description,
            duration: content.duration,
            target_audience: content.target_audience,
            steps: content.steps,
            created_at: None,
        }),
    ))
}

#[delete("/learning-paths/<id>")]
pub async fn delete(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Status> {
    user.require_permission(Permission::ManageLearningPaths)
        .validate_custom()?;

    delete_learning_path(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<Route> {
    routes![list, generate, delete]
}
