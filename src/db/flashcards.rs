use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    models::{DbFlashcardDeck, Flashcard, FlashcardContent, FlashcardDeck},
};

const DECK_SELECT: &str = "SELECT d.id, d.title, d.subject_id, s.description AS subject_description,
                                  d.student_id, d.created_at,
                                  (SELECT COUNT(*) FROM flashcards f WHERE f.deck_id = d.id) AS card_count
                           FROM flashcard_decks d
                           JOIN subjects s ON s.id = d.subject_id";

/// Shared decks plus, when `student_id` is given, that student's own decks.
/// Without a student every deck is returned.
#[instrument]
pub async fn list_decks(
    pool: &Pool<Sqlite>,
    student_id: Option<i64>,
    subject_id: Option<i64>,
) -> Result<Vec<FlashcardDeck>, AppError> {
    info!("Listing flashcard decks");
    let rows = sqlx::query_as::<_, DbFlashcardDeck>(&format!(
        "{}
         WHERE (?1 IS NULL OR d.student_id IS NULL OR d.student_id = ?1)
           AND (?2 IS NULL OR d.subject_id = ?2)
         ORDER BY d.created_at DESC, d.id DESC",
        DECK_SELECT
    ))
    .bind(student_id)
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(FlashcardDeck::from).collect())
}

#[instrument]
pub async fn get_deck(pool: &Pool<Sqlite>, deck_id: i64) -> Result<FlashcardDeck, AppError> {
    info!("Fetching flashcard deck");
    let row = sqlx::query_as::<_, DbFlashcardDeck>(&format!("{} WHERE d.id = ?", DECK_SELECT))
        .bind(deck_id)
        .fetch_optional(pool)
        .await?;

    row.map(FlashcardDeck::from)
        .ok_or_else(|| AppError::NotFound(format!("Deck with id {} not found", deck_id)))
}

/// Creates a deck and its cards in one transaction.
#[instrument(skip(pool, cards), fields(cards = cards.len()))]
pub async fn create_deck(
    pool: &Pool<Sqlite>,
    title: &str,
    subject_id: i64,
    student_id: Option<i64>,
    cards: &[FlashcardContent],
) -> Result<i64, AppError> {
    info!("Creating flashcard deck");
    let mut tx = pool.begin().await?;

    let res = sqlx::query("INSERT INTO flashcard_decks (title, subject_id, student_id) VALUES (?, ?, ?)")
        .bind(title)
        .bind(subject_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;
    let deck_id = res.last_insert_rowid();

    for card in cards {
        sqlx::query("INSERT INTO flashcards (deck_id, front, back) VALUES (?, ?, ?)")
            .bind(deck_id)
            .bind(&card.front)
            .bind(&card.back)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(deck_id)
}

#[instrument]
pub async fn list_cards(pool: &Pool<Sqlite>, deck_id: i64) -> Result<Vec<Flashcard>, AppError> {
    info!("Listing flashcards");
    let cards = sqlx::query_as::<_, Flashcard>(
        "SELECT id, deck_id, front, back FROM flashcards WHERE deck_id = ? ORDER BY id",
    )
    .bind(deck_id)
    .fetch_all(pool)
    .await?;

    Ok(cards)
}

#[instrument]
pub async fn delete_deck(pool: &Pool<Sqlite>, deck_id: i64) -> Result<(), AppError> {
    info!("Deleting flashcard deck");
    let res = sqlx::query("DELETE FROM flashcard_decks WHERE id = ?")
        .bind(deck_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Deck with id {} not found", deck_id)));
    }
    Ok(())
}
