use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Pdf,
    Ppt,
    Video,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Pdf => "pdf",
            MaterialKind::Ppt => "ppt",
            MaterialKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(MaterialKind::Pdf),
            "ppt" => Some(MaterialKind::Ppt),
            "video" => Some(MaterialKind::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyMaterial {
    pub id: i64,
    pub kind: MaterialKind,
    pub title: String,
    pub url: String,
    pub discipline_id: i64,
    pub subject_id: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbStudyMaterial {
    pub id: Option<i64>,
    pub kind: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub discipline_id: Option<i64>,
    pub subject_id: Option<i64>,
}

impl From<DbStudyMaterial> for StudyMaterial {
    fn from(db: DbStudyMaterial) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            kind: db
                .kind
                .as_deref()
                .and_then(MaterialKind::parse)
                .unwrap_or(MaterialKind::Pdf),
            title: db.title.unwrap_or_default(),
            url: db.url.unwrap_or_default(),
            discipline_id: db.discipline_id.unwrap_or_default(),
            subject_id: db.subject_id.unwrap_or_default(),
        }
    }
}
