use rocket::request::FromParam;
use serde::{Deserialize, Serialize};

/// One level of the Course → Module → Discipline → Subject hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcademicLevel {
    Courses,
    Modules,
    Disciplines,
    Subjects,
}

impl AcademicLevel {
    pub const ALL: [AcademicLevel; 4] = [
        AcademicLevel::Courses,
        AcademicLevel::Modules,
        AcademicLevel::Disciplines,
        AcademicLevel::Subjects,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            AcademicLevel::Courses => "courses",
            AcademicLevel::Modules => "modules",
            AcademicLevel::Disciplines => "disciplines",
            AcademicLevel::Subjects => "subjects",
        }
    }

    pub fn parent_column(&self) -> Option<&'static str> {
        match self {
            AcademicLevel::Courses => None,
            AcademicLevel::Modules => Some("course_id"),
            AcademicLevel::Disciplines => Some("module_id"),
            AcademicLevel::Subjects => Some("discipline_id"),
        }
    }

    pub fn parent(&self) -> Option<AcademicLevel> {
        match self {
            AcademicLevel::Courses => None,
            AcademicLevel::Modules => Some(AcademicLevel::Courses),
            AcademicLevel::Disciplines => Some(AcademicLevel::Modules),
            AcademicLevel::Subjects => Some(AcademicLevel::Disciplines),
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            AcademicLevel::Courses => "course",
            AcademicLevel::Modules => "module",
            AcademicLevel::Disciplines => "discipline",
            AcademicLevel::Subjects => "subject",
        }
    }
}

impl<'a> FromParam<'a> for AcademicLevel {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        match param {
            "courses" => Ok(AcademicLevel::Courses),
            "modules" => Ok(AcademicLevel::Modules),
            "disciplines" => Ok(AcademicLevel::Disciplines),
            "subjects" => Ok(AcademicLevel::Subjects),
            _ => Err(param),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcademicItem {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub description: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAcademicItem {
    pub id: Option<i64>,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

impl From<DbAcademicItem> for AcademicItem {
    fn from(item: DbAcademicItem) -> Self {
        Self {
            id: item.id.unwrap_or_default(),
            parent_id: item.parent_id,
            description: item.description.unwrap_or_default(),
        }
    }
}

/// Every level at once, each ordered by description.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AcademicData {
    pub courses: Vec<AcademicItem>,
    pub modules: Vec<AcademicItem>,
    pub disciplines: Vec<AcademicItem>,
    pub subjects: Vec<AcademicItem>,
}
