use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{DbLearningPath, LearningPath, LearningPathContent},
};

#[instrument]
pub async fn list_learning_paths(pool: &Pool<Sqlite>) -> Result<Vec<LearningPath>, AppError> {
    info!("Listing learning paths");
    let rows = sqlx::query_as::<_, DbLearningPath>(
        "SELECT id, title, description, duration, target_audience, steps, created_at
         FROM learning_paths
         ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(LearningPath::from).collect())
}

#[instrument(skip(content), fields(title = %content.title))]
pub async fn create_learning_path(
    pool: &Pool<Sqlite>,
    content: &LearningPathContent,
) -> Result<i64, AppError> {
    info!("Storing learning path");
    let steps = serde_json::to_string(&content.steps)
        .map_err(|err| AppError::Internal(format!("Could not encode steps: {}", err)))?;

    let res = sqlx::query(
        "INSERT INTO learning_paths (title, description, duration, target_audience, steps)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&content.title)
    .bind(&content.description)
    .bind(&content.duration)
    .bind(&content.target_audience)
    .bind(steps)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn delete_learning_path(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting learning path");
    let res = sqlx::query("DELETE FROM learning_paths WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Learning path with id {} not found",
            id
        )));
    }
    Ok(())
}
