use serde::{Deserialize, Serialize};

pub const XP_PER_CORRECT_ANSWER: i64 = 10;
pub const XP_PER_LEVEL: i64 = 100;
pub const MAX_HINTS_PER_QUESTION: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PracticeProgress {
    pub subject_id: i64,
    pub answered: i64,
    pub correct: i64,
    pub hinted: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPracticeAnswer {
    pub question_id: Option<i64>,
    pub correct: Option<bool>,
    pub used_hint: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GamificationStats {
    pub student_id: i64,
    pub xp: i64,
    pub level: i64,
    pub answered: i64,
    pub correct: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbGamificationStats {
    pub student_id: Option<i64>,
    pub xp: Option<i64>,
    pub answered: Option<i64>,
    pub correct: Option<i64>,
}

impl From<DbGamificationStats> for GamificationStats {
    fn from(db: DbGamificationStats) -> Self {
        let xp = db.xp.unwrap_or_default();
        Self {
            student_id: db.student_id.unwrap_or_default(),
            xp,
            level: level_for_xp(xp),
            answered: db.answered.unwrap_or_default(),
            correct: db.correct.unwrap_or_default(),
        }
    }
}

pub fn level_for_xp(xp: i64) -> i64 {
    xp.max(0) / XP_PER_LEVEL + 1
}
