use chrono::NaiveDateTime;
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use super::{Permission, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "inactive" => Some(AccountStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: AccountStatus,
    pub avatar_url: String,
    pub registration_date: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub avatar_url: Option<String>,
    pub registration_date: Option<NaiveDateTime>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        let id = user.id.unwrap_or_default();
        Self {
            id,
            email: user.email.unwrap_or_default(),
            name: user.name.unwrap_or_default(),
            // Unknown roles get the least privileged one
            role: Role::parse(&user.role.unwrap_or_default()).unwrap_or(Role::Student),
            status: user
                .status
                .as_deref()
                .and_then(AccountStatus::parse)
                .unwrap_or(AccountStatus::Inactive),
            avatar_url: user
                .avatar_url
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| format!("https://i.pravatar.cc/150?u={}", id)),
            registration_date: user.registration_date.unwrap_or_default(),
        }
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }

    pub fn require_any_permission(&self, permissions: &[Permission]) -> Result<(), Status> {
        if permissions.iter().any(|p| self.role.has_permission(*p)) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role.as_str(),
                permissions = ?permissions,
                "Permission denied (require any)"
            );
            Err(Status::Forbidden)
        }
    }
}
