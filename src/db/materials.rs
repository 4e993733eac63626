use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{DbStudyMaterial, MaterialKind, StudyMaterial},
};

use super::require_subject_in_discipline;

#[derive(Debug, Clone)]
pub struct MaterialInput<'a> {
    pub kind: MaterialKind,
    pub title: &'a str,
    pub url: &'a str,
    pub discipline_id: i64,
    pub subject_id: i64,
}

#[instrument]
pub async fn list_materials(
    pool: &Pool<Sqlite>,
    discipline_id: Option<i64>,
    subject_id: Option<i64>,
) -> Result<Vec<StudyMaterial>, AppError> {
    info!("Listing study materials");
    let rows = sqlx::query_as::<_, DbStudyMaterial>(
        "SELECT id, kind, title, url, discipline_id, subject_id
         FROM study_materials
         WHERE (?1 IS NULL OR discipline_id = ?1)
           AND (?2 IS NULL OR subject_id = ?2)
         ORDER BY title",
    )
    .bind(discipline_id)
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StudyMaterial::from).collect())
}

#[instrument]
pub async fn create_material(
    pool: &Pool<Sqlite>,
    input: MaterialInput<'_>,
) -> Result<i64, AppError> {
    info!("Creating study material");
    require_subject_in_discipline(pool, input.subject_id, input.discipline_id).await?;

    let res = sqlx::query(
        "INSERT INTO study_materials (kind, title, url, discipline_id, subject_id)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.kind.as_str())
    .bind(input.title)
    .bind(input.url)
    .bind(input.discipline_id)
    .bind(input.subject_id)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_material(
    pool: &Pool<Sqlite>,
    material_id: i64,
    input: MaterialInput<'_>,
) -> Result<(), AppError> {
    info!("Updating study material");
    require_subject_in_discipline(pool, input.subject_id, input.discipline_id).await?;

    let res = sqlx::query(
        "UPDATE study_materials
         SET kind = ?, title = ?, url = ?, discipline_id = ?, subject_id = ?
         WHERE id = ?",
    )
    .bind(input.kind.as_str())
    .bind(input.title)
    .bind(input.url)
    .bind(input.discipline_id)
    .bind(input.subject_id)
    .bind(material_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Material with id {} not found",
            material_id
        )));
    }
    Ok(())
}

#[instrument]
pub async fn delete_material(pool: &Pool<Sqlite>, material_id: i64) -> Result<(), AppError> {
    info!("Deleting study material");
    let res = sqlx::query("DELETE FROM study_materials WHERE id = ?")
        .bind(material_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Material with id {} not found",
            material_id
        )));
    }
    Ok(())
}
