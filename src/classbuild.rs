use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::AppError;
use crate::models::{Choice, Question};

/// Credentials for one export session, supplied with every request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExportSettings {
    #[validate(length(min = 1, message = "API key is required"))]
    pub api_key: String,
    #[validate(length(min = 1, message = "School id is required"))]
    pub school_id: String,
    #[validate(length(min = 1, message = "Question bank id is required"))]
    pub question_bank_id: String,
}

/// A discipline or subject as the school API returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteEntity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "descricao")]
    pub description: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected an id, found {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendFailure {
    pub question_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SendReport {
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<SendFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RemoteId {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChoicePayload {
    #[serde(rename = "alternativaLetra")]
    pub letter: String,
    #[serde(rename = "texto")]
    pub text: String,
}

/// Question body in the school API's wire format.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionPayload {
    #[serde(rename = "enunciado")]
    pub statement: String,
    #[serde(rename = "resolucao")]
    pub resolution: Option<String>,
    #[serde(rename = "dica")]
    pub hint: Option<String>,
    #[serde(rename = "alternativaLetraCorreta")]
    pub correct: String,
    #[serde(rename = "disciplina")]
    pub discipline: RemoteId,
    #[serde(rename = "assuntos")]
    pub subjects: Vec<RemoteId>,
    #[serde(rename = "alternativas")]
    pub choices: Vec<ChoicePayload>,
    #[serde(rename = "ano")]
    pub year: String,
    #[serde(rename = "classeDescricao")]
    pub class_description: &'static str,
    #[serde(rename = "banca")]
    pub board: &'static str,
    #[serde(rename = "orgao")]
    pub agency: &'static str,
    #[serde(rename = "prova")]
    pub exam: Option<String>,
    #[serde(rename = "nivelQuestao")]
    pub level: &'static str,
    #[serde(rename = "tipoQuestao")]
    pub kind: &'static str,
    #[serde(rename = "dificuldadeQuestao")]
    pub difficulty: &'static str,
}

pub fn format_question_payload(
    question: &Question,
    discipline: &RemoteEntity,
    subject: &RemoteEntity,
) -> QuestionPayload {
    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

    QuestionPayload {
        statement: question.statement.clone(),
        resolution: non_empty(&question.resolution),
        hint: non_empty(&question.hint),
        correct: question.correct.clone(),
        discipline: RemoteId {
            id: discipline.id.clone(),
        },
        subjects: vec![RemoteId {
            id: subject.id.clone(),
        }],
        choices: question
            .choices
            .iter()
            .map(|Choice { letter, text }| ChoicePayload {
                letter: letter.clone(),
                text: text.clone(),
            })
            .collect(),
        year: Utc::now().year().to_string(),
        class_description: "Concurso",
        board: "Gerado por IA",
        agency: "N/A",
        exam: None,
        level: "MEDIO",
        kind: "OBJETIVA_MULTIPLA_ESCOLHA",
        difficulty: "MEDIO",
    }
}

/// `detail` or `message` from a JSON error body, else the raw body.
fn error_details(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["detail", "message"].iter().find_map(|key| {
                json.get(*key).and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
            })
        })
        .unwrap_or_else(|| body.to_string())
}

pub fn format_api_error(status: StatusCode, body: &str) -> String {
    format!(
        "API Error ({}): {}. Details: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown"),
        error_details(body)
    )
}

#[rocket::async_trait]
pub trait SchoolApi: Send + Sync {
    async fn check_connection(&self, settings: &ExportSettings) -> ConnectionStatus;

    async fn create_discipline(
        &self,
        settings: &ExportSettings,
        description: &str,
    ) -> Result<RemoteEntity, AppError>;

    async fn create_subject(
        &self,
        settings: &ExportSettings,
        discipline_id: &str,
        description: &str,
    ) -> Result<RemoteEntity, AppError>;

    async fn post_question(
        &self,
        settings: &ExportSettings,
        payload: &QuestionPayload,
    ) -> Result<(), AppError>;
}

pub type SharedSchoolApi = Arc<dyn SchoolApi>;

/// HTTP client for the Classbuild school-management API.
#[derive(Clone)]
pub struct ClassbuildClient {
    http: Client,
    base_url: Option<String>,
}

impl ClassbuildClient {
    pub fn new(http: Client, base_url: Option<String>) -> Self {
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> Result<String, AppError> {
        let base = self.base_url.as_deref().ok_or_else(|| {
            AppError::ExternalService(
                "The school API is not configured (SCHOOL_API_BASE_URL)".to_string(),
            )
        })?;
        Ok(format!("{}{}", base, path))
    }

    fn authorized(&self, request: RequestBuilder, settings: &ExportSettings) -> RequestBuilder {
        request
            .bearer_auth(&settings.api_key)
            .header("client-timezone-offset", "-3")
    }

    async fn send_json(
        &self,
        request: RequestBuilder,
        settings: &ExportSettings,
    ) -> Result<Value, AppError> {
        let response = self.authorized(request, settings).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(AppError::ExternalService(format_api_error(status, &body)));
        }
        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn remote_entity(value: Value, what: &str) -> Result<RemoteEntity, AppError> {
        serde_json::from_value::<RemoteEntity>(value)
            .ok()
            .filter(|entity| !entity.id.is_empty() && !entity.description.is_empty())
            .ok_or_else(|| {
                AppError::ExternalService(format!(
                    "The API returned a malformed response when creating the {}",
                    what
                ))
            })
    }
}

#[rocket::async_trait]
impl SchoolApi for ClassbuildClient {
    #[instrument(skip(self, settings), fields(school = %settings.school_id))]
    async fn check_connection(&self, settings: &ExportSettings) -> ConnectionStatus {
        let url = match self.url(&format!(
            "/api/v1/escolas/{}/disciplinas?format=json&limit=1",
            settings.school_id
        )) {
            Ok(url) => url,
            Err(err) => {
                return ConnectionStatus {
                    success: false,
                    message: err.to_string(),
                }
            }
        };

        match self.authorized(self.http.get(&url), settings).send().await {
            Ok(response) if response.status().is_success() => ConnectionStatus {
                success: true,
                message: "Connection successful!".to_string(),
            },
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let reason = serde_json::from_str::<Value>(&body)
                    .ok()
                    .map(|_| error_details(&body))
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
                warn!(status = status.as_u16(), "School API connection check failed");
                ConnectionStatus {
                    success: false,
                    message: format!("Connection failed ({}): {}", status.as_u16(), reason),
                }
            }
            Err(err) => ConnectionStatus {
                success: false,
                message: format!("Network error: {}", err),
            },
        }
    }

    #[instrument(skip(self, settings))]
    async fn create_discipline(
        &self,
        settings: &ExportSettings,
        description: &str,
    ) -> Result<RemoteEntity, AppError> {
        let url = self.url(&format!(
            "/api/v1/escolas/{}/disciplinas?format=json",
            settings.school_id
        ))?;
        let request = self.http.post(&url).json(&json!({ "descricao": description }));

        let value = self.send_json(request, settings).await.map_err(|err| {
            AppError::ExternalService(format!("Failed to create discipline: {}", err.message()))
        })?;
        Self::remote_entity(value, "discipline")
    }

    #[instrument(skip(self, settings))]
    async fn create_subject(
        &self,
        settings: &ExportSettings,
        discipline_id: &str,
        description: &str,
    ) -> Result<RemoteEntity, AppError> {
        let url = self.url(&format!(
            "/api/v1/disciplinas/{}/assuntos?format=json",
            discipline_id
        ))?;
        let request = self.http.post(&url).json(&json!({
            "descricao": description,
            "disciplina": { "id": discipline_id },
        }));

        let value = self.send_json(request, settings).await.map_err(|err| {
            AppError::ExternalService(format!("Failed to create subject: {}", err.message()))
        })?;
        Self::remote_entity(value, "subject")
    }

    async fn post_question(
        &self,
        settings: &ExportSettings,
        payload: &QuestionPayload,
    ) -> Result<(), AppError> {
        let url = self.url(&format!(
            "/api/v1/bancos-questao/interna/{}/questao?format=json",
            settings.question_bank_id
        ))?;
        self.send_json(self.http.post(&url).json(payload), settings)
            .await
            .map(|_| ())
    }
}

/// Posts questions one by one, waiting `throttle` before each call. Failures
/// are collected per question and never stop the run.
#[instrument(skip_all, fields(total = questions.len()))]
pub async fn send_questions(
    api: &dyn SchoolApi,
    settings: &ExportSettings,
    questions: &[Question],
    discipline: &RemoteEntity,
    subject: &RemoteEntity,
    throttle: Duration,
) -> SendReport {
    let mut report = SendReport {
        total: questions.len(),
        ..Default::default()
    };

    for question in questions {
        tokio::time::sleep(throttle).await;

        let payload = format_question_payload(question, discipline, subject);
        match api.post_question(settings, &payload).await {
            Ok(()) => report.success_count += 1,
            Err(err) => {
                warn!(question_id = question.id, error = %err, "Question export failed");
                report.error_count += 1;
                report.errors.push(SendFailure {
                    question_id: question.id,
                    message: err.message(),
                });
            }
        }
        info!(
            sent = report.success_count + report.error_count,
            total = report.total,
            "Export progress"
        );
    }

    report
}
