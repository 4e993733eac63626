use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::json_column;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Choice {
    pub letter: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub statement: String,
    pub choices: Vec<Choice>,
    pub correct: String,
    pub resolution: Option<String>,
    pub hint: Option<String>,
    pub discipline_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub batch: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbQuestion {
    pub id: Option<i64>,
    pub statement: Option<String>,
    pub choices: Option<String>,
    pub correct: Option<String>,
    pub resolution: Option<String>,
    pub hint: Option<String>,
    pub discipline_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub batch: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbQuestion> for Question {
    fn from(db: DbQuestion) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            statement: db.statement.unwrap_or_default(),
            choices: json_column(db.choices),
            correct: db.correct.unwrap_or_default(),
            resolution: db.resolution.filter(|r| !r.is_empty()),
            hint: db.hint.filter(|h| !h.is_empty()),
            discipline_id: db.discipline_id,
            subject_id: db.subject_id,
            batch: db.batch,
            created_at: db.created_at,
        }
    }
}

/// A question as produced by extraction or edited by an admin, before it is
/// attached to the academic hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionDraft {
    pub id: i64,
    pub statement: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub correct: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Question shown to a student while the answer is still hidden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeQuestion {
    pub id: i64,
    pub statement: String,
    pub choices: Vec<Choice>,
}

impl From<Question> for PracticeQuestion {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            statement: question.statement,
            choices: question.choices,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LetterCount {
    pub letter: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerDistribution {
    pub total: usize,
    pub by_letter: Vec<LetterCount>,
}

pub const UNKNOWN_ANSWER: &str = "?";

/// Counts questions per correct letter, sorted by letter.
pub fn answer_distribution<'a, I>(correct_letters: I) -> AnswerDistribution
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0;

    for letter in correct_letters {
        let key = match letter.trim() {
            "" => UNKNOWN_ANSWER.to_string(),
            other => other.to_uppercase(),
        };
        *counts.entry(key).or_default() += 1;
        total += 1;
    }

    AnswerDistribution {
        total,
        by_letter: counts
            .into_iter()
            .map(|(letter, count)| LetterCount { letter, count })
            .collect(),
    }
}
