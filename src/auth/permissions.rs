use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    ViewAcademicData,
    Practice,
    TakeTests,
    GenerateFlashcards,
    UseAssistant,

    ManageStudents,
    ManageAcademicData,
    ManageQuestions,
    ManageTests,
    ManageMaterials,
    ManageLearningPaths,
    ManageFlashcards,
    ExportQuestions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

static STUDENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::ViewAcademicData);
    permissions.insert(Permission::Practice);
    permissions.insert(Permission::TakeTests);
    permissions.insert(Permission::GenerateFlashcards);
    permissions.insert(Permission::UseAssistant);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(STUDENT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageStudents);
    permissions.insert(Permission::ManageAcademicData);
    permissions.insert(Permission::ManageQuestions);
    permissions.insert(Permission::ManageTests);
    permissions.insert(Permission::ManageMaterials);
    permissions.insert(Permission::ManageLearningPaths);
    permissions.insert(Permission::ManageFlashcards);
    permissions.insert(Permission::ExportQuestions);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Student => &STUDENT_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    /// Where the portal sends this role after sign-in.
    pub fn home_route(&self) -> &'static str {
        match self {
            Role::Student => "/student",
            Role::Admin => "/admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
