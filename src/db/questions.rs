use sqlx::{Pool, Sqlite};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::{
    error::AppError,
    models::{Choice, DbQuestion, Question, QuestionDraft},
};

use super::{require_subject_in_discipline, SearchTerm};

pub const UNBATCHED: &str = "Unbatched";

const QUESTION_COLUMNS: &str = "id, statement, choices, correct, resolution, hint, discipline_id, subject_id, batch, created_at";

#[derive(Debug, Default, Clone)]
pub struct QuestionFilter {
    pub search: Option<String>,
    pub batch: Option<String>,
    pub discipline_id: Option<i64>,
    pub subject_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct QuestionUpdate {
    pub statement: String,
    pub choices: Vec<Choice>,
    pub correct: String,
    pub resolution: Option<String>,
    pub hint: Option<String>,
    pub discipline_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub batch: Option<String>,
}

fn choices_json(choices: &[Choice]) -> Result<String, AppError> {
    serde_json::to_string(choices)
        .map_err(|err| AppError::Internal(format!("Could not encode choices: {}", err)))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Questions newest id first, narrowed by every filter that is set.
#[instrument]
pub async fn list_questions(
    pool: &Pool<Sqlite>,
    filter: &QuestionFilter,
) -> Result<Vec<Question>, AppError> {
    info!("Listing questions");

    let search = SearchTerm::parse(filter.search.as_deref());
    let batch = non_blank(filter.batch.as_deref());

    let rows = sqlx::query_as::<_, DbQuestion>(&format!(
        "SELECT {} FROM questions
         WHERE (?1 IS NULL OR COALESCE(NULLIF(TRIM(batch), ''), '{}') = ?1)
           AND (?2 IS NULL OR discipline_id = ?2)
           AND (?3 IS NULL OR subject_id = ?3)
         ORDER BY id DESC",
        QUESTION_COLUMNS, UNBATCHED
    ))
    .bind(batch)
    .bind(filter.discipline_id)
    .bind(filter.subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(Question::from)
        .filter(|q| search.as_ref().map_or(true, |term| term.matches(&q.statement)))
        .collect())
}

/// Distinct batch names, with questions lacking one reported as `Unbatched`.
#[instrument]
pub async fn list_batches(pool: &Pool<Sqlite>) -> Result<Vec<String>, AppError> {
    info!("Listing question batches");
    let rows = sqlx::query_scalar::<_, String>(&format!(
        "SELECT DISTINCT COALESCE(NULLIF(TRIM(batch), ''), '{}') AS name
         FROM questions
         ORDER BY name",
        UNBATCHED
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument]
pub async fn get_question(pool: &Pool<Sqlite>, id: i64) -> Result<Question, AppError> {
    info!("Fetching question");
    let row = sqlx::query_as::<_, DbQuestion>(&format!(
        "SELECT {} FROM questions WHERE id = ?",
        QUESTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Question::from)
        .ok_or_else(|| AppError::NotFound(format!("Question with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn get_questions_by_ids(
    pool: &Pool<Sqlite>,
    ids: &[i64],
) -> Result<Vec<Question>, AppError> {
    info!(count = ids.len(), "Fetching questions by id");
    let mut questions = Vec::with_capacity(ids.len());
    for id in ids {
        let row = sqlx::query_as::<_, DbQuestion>(&format!(
            "SELECT {} FROM questions WHERE id = ?",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        if let Some(row) = row {
            questions.push(Question::from(row));
        }
    }
    Ok(questions)
}

#[instrument]
pub async fn list_questions_for_subject(
    pool: &Pool<Sqlite>,
    subject_id: i64,
) -> Result<Vec<Question>, AppError> {
    info!("Listing questions for subject");
    let rows = sqlx::query_as::<_, DbQuestion>(&format!(
        "SELECT {} FROM questions WHERE subject_id = ? ORDER BY id",
        QUESTION_COLUMNS
    ))
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Question::from).collect())
}

#[instrument]
pub async fn count_questions_for_subject(
    pool: &Pool<Sqlite>,
    subject_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE subject_id = ?")
        .bind(subject_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[instrument(skip(update))]
pub async fn update_question(
    pool: &Pool<Sqlite>,
    id: i64,
    update: &QuestionUpdate,
) -> Result<(), AppError> {
    info!("Updating question");
    let res = sqlx::query(
        "UPDATE questions
         SET statement = ?, choices = ?, correct = ?, resolution = ?, hint = ?,
             discipline_id = ?, subject_id = ?, batch = ?
         WHERE id = ?",
    )
    .bind(&update.statement)
    .bind(choices_json(&update.choices)?)
    .bind(update.correct.trim().to_uppercase())
    .bind(&update.resolution)
    .bind(&update.hint)
    .bind(update.discipline_id)
    .bind(update.subject_id)
    .bind(&update.batch)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Question with id {} not found", id)));
    }
    Ok(())
}

#[instrument]
pub async fn delete_question(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting question");
    let res = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Question with id {} not found", id)));
    }
    Ok(())
}

/// Moves the selected questions under one discipline and subject.
#[instrument(skip(pool, question_ids), fields(count = question_ids.len()))]
pub async fn link_questions_to_subject(
    pool: &Pool<Sqlite>,
    question_ids: &[i64],
    discipline_id: i64,
    subject_id: i64,
) -> Result<u64, AppError> {
    info!("Linking questions to subject");
    require_subject_in_discipline(pool, subject_id, discipline_id).await?;

    let mut tx = pool.begin().await?;
    let mut updated = 0;
    for id in question_ids {
        let res = sqlx::query("UPDATE questions SET discipline_id = ?, subject_id = ? WHERE id = ?")
            .bind(discipline_id)
            .bind(subject_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        updated += res.rows_affected();
    }
    tx.commit().await?;
    Ok(updated)
}

/// Adds every (test, question) pair; pairs that already exist are left alone.
#[instrument(skip(pool, question_ids, test_ids))]
pub async fn link_questions_to_tests(
    pool: &Pool<Sqlite>,
    question_ids: &[i64],
    test_ids: &[i64],
) -> Result<u64, AppError> {
    info!(
        questions = question_ids.len(),
        tests = test_ids.len(),
        "Linking questions to tests"
    );
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for test_id in test_ids {
        for question_id in question_ids {
            let res = sqlx::query(
                "INSERT OR IGNORE INTO test_questions (test_id, question_id) VALUES (?, ?)",
            )
            .bind(test_id)
            .bind(question_id)
            .execute(&mut *tx)
            .await?;
            inserted += res.rows_affected();
        }
    }
    tx.commit().await?;
    Ok(inserted)
}

pub fn flashcard_back_for(question: &Question) -> String {
    let resolution = question
        .resolution
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("Not provided.");
    format!("Answer: {}\n\nResolution: {}", question.correct, resolution)
}

/// Creates one card per question in every selected deck.
#[instrument(skip(pool, question_ids, deck_ids))]
pub async fn link_questions_to_decks(
    pool: &Pool<Sqlite>,
    question_ids: &[i64],
    deck_ids: &[i64],
) -> Result<u64, AppError> {
    info!(
        questions = question_ids.len(),
        decks = deck_ids.len(),
        "Copying questions into flashcard decks"
    );
    let questions = get_questions_by_ids(pool, question_ids).await?;

    let mut tx = pool.begin().await?;
    let mut created = 0;
    for deck_id in deck_ids {
        for question in &questions {
            sqlx::query("INSERT INTO flashcards (deck_id, front, back) VALUES (?, ?, ?)")
                .bind(deck_id)
                .bind(&question.statement)
                .bind(flashcard_back_for(question))
                .execute(&mut *tx)
                .await?;
            created += 1;
        }
    }
    tx.commit().await?;
    Ok(created)
}

/// Where a batch of extracted questions lands.
#[derive(Debug, Clone)]
pub struct SaveTarget<'a> {
    pub discipline_id: i64,
    pub subject_id: i64,
    pub batch: &'a str,
}

#[derive(Error, Debug)]
#[error("Saved {saved} questions before a batch failed: {source}")]
pub struct BatchSaveError {
    pub saved: usize,
    #[source]
    pub source: AppError,
}

impl From<BatchSaveError> for AppError {
    fn from(err: BatchSaveError) -> Self {
        match err.source {
            AppError::Validation(msg) => AppError::Validation(msg),
            other => AppError::Internal(format!(
                "Saved {} questions before a batch failed: {}",
                err.saved, other
            )),
        }
    }
}

async fn upsert_batch(
    pool: &Pool<Sqlite>,
    batch: &[QuestionDraft],
    target: &SaveTarget<'_>,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for draft in batch {
        sqlx::query(
            "INSERT INTO questions
                 (id, statement, choices, correct, resolution, hint, discipline_id, subject_id, batch)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 statement = excluded.statement,
                 choices = excluded.choices,
                 correct = excluded.correct,
                 resolution = excluded.resolution,
                 hint = excluded.hint,
                 discipline_id = excluded.discipline_id,
                 subject_id = excluded.subject_id,
                 batch = excluded.batch",
        )
        .bind(draft.id)
        .bind(&draft.statement)
        .bind(choices_json(&draft.choices)?)
        .bind(draft.correct.trim().to_uppercase())
        .bind(&draft.resolution)
        .bind(&draft.hint)
        .bind(target.discipline_id)
        .bind(target.subject_id)
        .bind(target.batch.trim())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Upserts questions by id, `batch_size` per transaction, in order. Stops at
/// the first failing batch; earlier batches stay committed.
#[instrument(skip(pool, drafts), fields(count = drafts.len()))]
pub async fn save_questions_in_batches(
    pool: &Pool<Sqlite>,
    drafts: &[QuestionDraft],
    target: &SaveTarget<'_>,
    batch_size: usize,
) -> Result<usize, BatchSaveError> {
    if drafts.is_empty() {
        return Err(BatchSaveError {
            saved: 0,
            source: AppError::Validation("Select at least one question to save".to_string()),
        });
    }
    if target.batch.trim().is_empty() {
        return Err(BatchSaveError {
            saved: 0,
            source: AppError::Validation("A batch name is required".to_string()),
        });
    }
    if let Err(source) =
        require_subject_in_discipline(pool, target.subject_id, target.discipline_id).await
    {
        return Err(BatchSaveError { saved: 0, source });
    }

    let mut saved = 0;
    for (index, batch) in drafts.chunks(batch_size.max(1)).enumerate() {
        if let Err(source) = upsert_batch(pool, batch, target).await {
            error!(batch = index + 1, saved, error = %source, "Question batch failed");
            return Err(BatchSaveError { saved, source });
        }
        saved += batch.len();
        info!(batch = index + 1, saved, "Question batch saved");
    }

    Ok(saved)
}
