use std::collections::HashSet;

use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{DbGamificationStats, DbPracticeAnswer, GamificationStats, PracticeProgress},
};

#[derive(Debug, Clone)]
pub struct PracticeAnswerInput<'a> {
    pub student_id: i64,
    pub question_id: i64,
    pub selected: &'a str,
    pub correct: bool,
    pub xp_gained: i64,
}

/// Answers and hints follow the question's current subject, so moving a
/// question carries the student's progress with it.
#[instrument]
pub async fn answered_question_ids(
    pool: &Pool<Sqlite>,
    student_id: i64,
    subject_id: i64,
) -> Result<HashSet<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT pa.question_id FROM practice_answers pa
         JOIN questions q ON q.id = pa.question_id
         WHERE pa.student_id = ? AND q.subject_id = ?",
    )
    .bind(student_id)
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().collect())
}

#[instrument]
pub async fn has_answered(
    pool: &Pool<Sqlite>,
    student_id: i64,
    question_id: i64,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT question_id FROM practice_answers WHERE student_id = ? AND question_id = ?",
    )
    .bind(student_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

#[instrument]
pub async fn hints_used(
    pool: &Pool<Sqlite>,
    student_id: i64,
    question_id: i64,
) -> Result<i64, AppError> {
    let used = sqlx::query_scalar::<_, i64>(
        "SELECT hints_used FROM practice_hints WHERE student_id = ? AND question_id = ?",
    )
    .bind(student_id)
    .bind(question_id)
    .fetch_optional(pool)
    .await?;

    Ok(used.unwrap_or_default())
}

/// Bumps the hint counter and returns the new count.
#[instrument]
pub async fn record_hint(
    pool: &Pool<Sqlite>,
    student_id: i64,
    question_id: i64,
) -> Result<i64, AppError> {
    info!("Recording hint usage");
    sqlx::query(
        "INSERT INTO practice_hints (student_id, question_id, hints_used)
         VALUES (?, ?, 1)
         ON CONFLICT(student_id, question_id) DO UPDATE SET hints_used = hints_used + 1",
    )
    .bind(student_id)
    .bind(question_id)
    .execute(pool)
    .await?;

    hints_used(pool, student_id, question_id).await
}

/// Adds XP and bumps the answered/correct counters.
pub async fn increment_xp<'e, E>(
    executor: E,
    student_id: i64,
    amount: i64,
    correct: bool,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO gamification_stats (student_id, xp, answered, correct)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(student_id) DO UPDATE SET
             xp = xp + ?2,
             answered = answered + 1,
             correct = correct + ?3",
    )
    .bind(student_id)
    .bind(amount)
    .bind(i64::from(correct))
    .execute(executor)
    .await?;

    Ok(())
}

/// Stores a first answer and its XP in one transaction. Answering the same
/// question again is a conflict.
#[instrument]
pub async fn record_practice_answer(
    pool: &Pool<Sqlite>,
    input: PracticeAnswerInput<'_>,
) -> Result<(), AppError> {
    info!("Recording practice answer");
    let used_hint = hints_used(pool, input.student_id, input.question_id).await? > 0;

    let mut tx = pool.begin().await?;
    let res = sqlx::query(
        "INSERT INTO practice_answers (student_id, question_id, selected, correct, used_hint)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.student_id)
    .bind(input.question_id)
    .bind(input.selected)
    .bind(input.correct)
    .bind(used_hint)
    .execute(&mut *tx)
    .await;

    match res {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::Conflict(
                "This question has already been answered".to_string(),
            ));
        }
        Err(err) => return Err(err.into()),
    }

    increment_xp(&mut *tx, input.student_id, input.xp_gained, input.correct).await?;
    tx.commit().await?;
    Ok(())
}

#[instrument]
pub async fn subject_progress(
    pool: &Pool<Sqlite>,
    student_id: i64,
    subject_id: i64,
) -> Result<PracticeProgress, AppError> {
    let answers = sqlx::query_as::<_, DbPracticeAnswer>(
        "SELECT pa.question_id, pa.correct, pa.used_hint FROM practice_answers pa
         JOIN questions q ON q.id = pa.question_id
         WHERE pa.student_id = ? AND q.subject_id = ?",
    )
    .bind(student_id)
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(PracticeProgress {
        subject_id,
        answered: answers.len() as i64,
        correct: answers.iter().filter(|a| a.correct.unwrap_or(false)).count() as i64,
        hinted: answers.iter().filter(|a| a.used_hint.unwrap_or(false)).count() as i64,
    })
}

/// Forgets the student's answers and hint counters for one subject. XP
/// already earned is kept.
#[instrument]
pub async fn restart_subject_practice(
    pool: &Pool<Sqlite>,
    student_id: i64,
    subject_id: i64,
) -> Result<u64, AppError> {
    info!("Restarting subject practice");
    let mut tx = pool.begin().await?;
    let res = sqlx::query(
        "DELETE FROM practice_answers
         WHERE student_id = ?
           AND question_id IN (SELECT id FROM questions WHERE subject_id = ?)",
    )
    .bind(student_id)
    .bind(subject_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        "DELETE FROM practice_hints
         WHERE student_id = ?
           AND question_id IN (SELECT id FROM questions WHERE subject_id = ?)",
    )
    .bind(student_id)
    .bind(subject_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(res.rows_affected())
}

#[instrument]
pub async fn get_gamification_stats(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<GamificationStats, AppError> {
    let row = sqlx::query_as::<_, DbGamificationStats>(
        "SELECT student_id, xp, answered, correct FROM gamification_stats WHERE student_id = ?",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(GamificationStats::from(row.unwrap_or(DbGamificationStats {
        student_id: Some(student_id),
        ..Default::default()
    })))
}
