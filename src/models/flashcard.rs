use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub id: i64,
    pub title: String,
    pub subject_id: i64,
    pub subject_description: String,
    pub student_id: Option<i64>,
    pub card_count: i64,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbFlashcardDeck {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub subject_id: Option<i64>,
    pub subject_description: Option<String>,
    pub student_id: Option<i64>,
    pub card_count: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbFlashcardDeck> for FlashcardDeck {
    fn from(db: DbFlashcardDeck) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            subject_id: db.subject_id.unwrap_or_default(),
            subject_description: db.subject_description.unwrap_or_default(),
            student_id: db.student_id,
            card_count: db.card_count.unwrap_or_default(),
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlashcardContent {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Flashcard {
    pub id: i64,
    pub deck_id: i64,
    pub front: String,
    pub back: String,
}

pub fn deck_title_for(subject_description: &str) -> String {
    format!("Review of {}", subject_description)
}
