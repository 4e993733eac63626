use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::json_column;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningPathStep {
    pub step: i64,
    pub title: String,
    pub description: String,
}

/// Path content without storage identity, as generated by the AI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathContent {
    pub title: String,
    pub description: String,
    pub duration: String,
    pub target_audience: String,
    pub steps: Vec<LearningPathStep>,
}

impl LearningPathContent {
    /// Orders steps by their number and renumbers them from 1.
    pub fn normalized(mut self) -> Self {
        self.steps.sort_by_key(|step| step.step);
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.step = index as i64 + 1;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: String,
    pub target_audience: String,
    pub steps: Vec<LearningPathStep>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbLearningPath {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<String>,
    pub target_audience: Option<String>,
    pub steps: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbLearningPath> for LearningPath {
    fn from(db: DbLearningPath) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            duration: db.duration.unwrap_or_default(),
            target_audience: db.target_audience.unwrap_or_default(),
            steps: json_column(db.steps),
            created_at: db.created_at,
        }
    }
}
