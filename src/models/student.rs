use serde::{Deserialize, Serialize};

use crate::auth::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub status: String,
    pub avatar_url: String,
    pub registration_date: String,
    pub enrolled_courses_count: i64,
}

impl StudentSummary {
    pub fn new(user: User, enrolled_courses_count: i64) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            status: user.status.as_str().to_string(),
            avatar_url: user.avatar_url,
            registration_date: user.registration_date.format("%Y-%m-%d").to_string(),
            enrolled_courses_count,
        }
    }
}
