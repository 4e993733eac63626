use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{AcademicData, AcademicItem, AcademicLevel, DbAcademicItem},
};

fn select_clause(level: AcademicLevel) -> String {
    let parent = level.parent_column().unwrap_or("NULL");
    format!(
        "SELECT id, {} AS parent_id, description FROM {}",
        parent,
        level.table()
    )
}

/// Items of one level ordered by description, optionally limited to a parent.
#[instrument]
pub async fn list_academic_items(
    pool: &Pool<Sqlite>,
    level: AcademicLevel,
    parent_id: Option<i64>,
) -> Result<Vec<AcademicItem>, AppError> {
    info!("Listing academic items");

    let rows = match (level.parent_column(), parent_id) {
        (Some(column), Some(parent_id)) => {
            sqlx::query_as::<_, DbAcademicItem>(&format!(
                "{} WHERE {} = ? ORDER BY description",
                select_clause(level),
                column
            ))
            .bind(parent_id)
            .fetch_all(pool)
            .await?
        }
        _ => {
            sqlx::query_as::<_, DbAcademicItem>(&format!(
                "{} ORDER BY description",
                select_clause(level)
            ))
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.into_iter().map(AcademicItem::from).collect())
}

#[instrument]
pub async fn get_academic_item(
    pool: &Pool<Sqlite>,
    level: AcademicLevel,
    id: i64,
) -> Result<AcademicItem, AppError> {
    info!("Fetching academic item");
    let row = sqlx::query_as::<_, DbAcademicItem>(&format!(
        "{} WHERE id = ?",
        select_clause(level)
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(AcademicItem::from).ok_or_else(|| {
        AppError::NotFound(format!("{} with id {} not found", level.singular(), id))
    })
}

#[instrument]
pub async fn get_academic_data(pool: &Pool<Sqlite>) -> Result<AcademicData, AppError> {
    info!("Loading the full academic hierarchy");
    Ok(AcademicData {
        courses: list_academic_items(pool, AcademicLevel::Courses, None).await?,
        modules: list_academic_items(pool, AcademicLevel::Modules, None).await?,
        disciplines: list_academic_items(pool, AcademicLevel::Disciplines, None).await?,
        subjects: list_academic_items(pool, AcademicLevel::Subjects, None).await?,
    })
}

async fn require_parent(
    pool: &Pool<Sqlite>,
    level: AcademicLevel,
    parent_id: Option<i64>,
) -> Result<(), AppError> {
    if let Some(parent_level) = level.parent() {
        let parent_id = parent_id.ok_or_else(|| {
            AppError::Validation(format!(
                "A {} must belong to a {}",
                level.singular(),
                parent_level.singular()
            ))
        })?;
        get_academic_item(pool, parent_level, parent_id).await?;
    }
    Ok(())
}

#[instrument]
pub async fn create_academic_item(
    pool: &Pool<Sqlite>,
    level: AcademicLevel,
    description: &str,
    parent_id: Option<i64>,
) -> Result<i64, AppError> {
    info!("Creating academic item");
    require_parent(pool, level, parent_id).await?;

    let res = match level.parent_column() {
        Some(column) => {
            sqlx::query(&format!(
                "INSERT INTO {} ({}, description) VALUES (?, ?)",
                level.table(),
                column
            ))
            .bind(parent_id)
            .bind(description)
            .execute(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "INSERT INTO {} (description) VALUES (?)",
                level.table()
            ))
            .bind(description)
            .execute(pool)
            .await?
        }
    };

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_academic_item(
    pool: &Pool<Sqlite>,
    level: AcademicLevel,
    id: i64,
    description: &str,
    parent_id: Option<i64>,
) -> Result<(), AppError> {
    info!("Updating academic item");
    get_academic_item(pool, level, id).await?;

    match (level.parent_column(), parent_id) {
        (Some(column), Some(_)) => {
            require_parent(pool, level, parent_id).await?;
            sqlx::query(&format!(
                "UPDATE {} SET description = ?, {} = ? WHERE id = ?",
                level.table(),
                column
            ))
            .bind(description)
            .bind(parent_id)
            .bind(id)
            .execute(pool)
            .await?;
        }
        _ => {
            sqlx::query(&format!(
                "UPDATE {} SET description = ? WHERE id = ?",
                level.table()
            ))
            .bind(description)
            .bind(id)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

/// Deletes an item; children go with it through the schema's cascades.
#[instrument]
pub async fn delete_academic_item(
    pool: &Pool<Sqlite>,
    level: AcademicLevel,
    id: i64,
) -> Result<(), AppError> {
    info!("Deleting academic item");
    let res = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", level.table()))
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "{} with id {} not found",
            level.singular(),
            id
        )));
    }

    Ok(())
}

/// Courses the student is enrolled in, ordered by description.
#[instrument]
pub async fn list_enrolled_courses(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<AcademicItem>, AppError> {
    info!("Listing enrolled courses");
    let rows = sqlx::query_as::<_, DbAcademicItem>(
        "SELECT c.id, NULL AS parent_id, c.description
         FROM courses c
         JOIN enrollments e ON e.course_id = c.id
         WHERE e.student_id = ?
         ORDER BY c.description",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AcademicItem::from).collect())
}

/// True when the subject sits under the given discipline.
#[instrument]
pub async fn subject_belongs_to_discipline(
    pool: &Pool<Sqlite>,
    subject_id: i64,
    discipline_id: i64,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM subjects WHERE id = ? AND discipline_id = ?",
    )
    .bind(subject_id)
    .bind(discipline_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Validation error unless the subject sits under the given discipline.
pub async fn require_subject_in_discipline(
    pool: &Pool<Sqlite>,
    subject_id: i64,
    discipline_id: i64,
) -> Result<(), AppError> {
    if !subject_belongs_to_discipline(pool, subject_id, discipline_id).await? {
        return Err(AppError::Validation(format!(
            "Subject {} does not belong to discipline {}",
            subject_id, discipline_id
        )));
    }
    Ok(())
}

/// True when one of the student's enrolled courses contains the subject.
#[instrument]
pub async fn is_enrolled_in_subject(
    pool: &Pool<Sqlite>,
    student_id: i64,
    subject_id: i64,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT s.id
         FROM subjects s
         JOIN disciplines d ON d.id = s.discipline_id
         JOIN modules m ON m.id = d.module_id
         JOIN enrollments e ON e.course_id = m.course_id
         WHERE s.id = ? AND e.student_id = ?",
    )
    .bind(subject_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}
