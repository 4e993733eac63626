use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use super::{
    prompts, AiClient, AnswerKey, ChatMessage, ChatRole, DocumentPayload, RawQuestion,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::models::{FlashcardContent, LearningPathContent, Question};

/// Gemini `generateContent` over plain REST.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    flash_model: String,
    pro_model: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Text of the first candidate, or an error explaining why there is none.
fn response_text(response: GenerateResponse) -> Result<String, AppError> {
    let candidate = response.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

    let text: String = candidate
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }

    let message = match finish_reason.as_deref() {
        Some("SAFETY") => {
            "The request was blocked for safety reasons. Check the content of the file.".to_string()
        }
        Some("MAX_TOKENS") => "The model ran out of output tokens (MAX_TOKENS). The file may have \
an unexpected layout or be too large; try a smaller file."
            .to_string(),
        Some(reason) => format!(
            "The AI did not return a valid text response. Finish reason: {}.",
            reason
        ),
        None => "The AI did not return a valid text response.".to_string(),
    };
    Err(AppError::ExternalService(message))
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, AppError> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(trimmed).map_err(|err| {
        AppError::ExternalService(format!("The AI returned malformed JSON: {}", err))
    })
}

fn inline_document(document: &DocumentPayload) -> Value {
    json!({
        "inlineData": {
            "mimeType": document.mime_type,
            "data": BASE64.encode(&document.bytes),
        }
    })
}

fn format_choices(question: &Question) -> String {
    question
        .choices
        .iter()
        .map(|choice| format!("{}) {}", choice.letter, choice.text))
        .collect::<Vec<_>>()
        .join("\n")
}

impl GeminiClient {
    pub fn new(config: &AppConfig, http: Client) -> Self {
        Self {
            http,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            flash_model: config.gemini_flash_model.clone(),
            pro_model: config.gemini_pro_model.clone(),
        }
    }

    #[instrument(skip(self, contents, generation_config))]
    async fn generate(
        &self,
        model: &str,
        contents: Value,
        generation_config: Option<Value>,
    ) -> Result<String, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::ExternalService("The AI service is not configured (GEMINI_API_KEY)".into())
        })?;

        let mut body = json!({ "contents": contents });
        if let Some(config) = generation_config {
            body["generationConfig"] = config;
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        info!(model, "Calling Gemini");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gemini request failed");
            return Err(AppError::ExternalService(format!(
                "Gemini API error ({}): {}",
                status.as_u16(),
                details
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        response_text(parsed)
    }

    async fn generate_json<T: DeserializeOwned>(
        &self,
        model: &str,
        parts: Vec<Value>,
        schema: Option<Value>,
    ) -> Result<T, AppError> {
        let mut config = json!({ "responseMimeType": "application/json" });
        if let Some(schema) = schema {
            config["responseSchema"] = schema;
        }
        let text = self
            .generate(model, json!([{ "parts": parts }]), Some(config))
            .await?;
        parse_json(&text)
    }
}

#[rocket::async_trait]
impl AiClient for GeminiClient {
    async fn extract_document_text(&self, document: &DocumentPayload) -> Result<String, AppError> {
        let contents = json!([{
            "parts": [{ "text": prompts::EXTRACT_TEXT }, inline_document(document)]
        }]);
        self.generate(&self.pro_model, contents, None).await
    }

    async fn extract_detailed_questions(
        &self,
        document: &DocumentPayload,
    ) -> Result<Vec<RawQuestion>, AppError> {
        self.generate_json(
            &self.flash_model,
            vec![json!({ "text": prompts::EXTRACT_DETAILED }), inline_document(document)],
            Some(prompts::detailed_questions_schema()),
        )
        .await
    }

    async fn extract_numbered_questions(&self, chunk: &str) -> Result<Vec<RawQuestion>, AppError> {
        self.generate_json(
            &self.flash_model,
            vec![
                json!({ "text": prompts::EXTRACT_NUMBERED }),
                json!({ "text": chunk }),
            ],
            Some(prompts::numbered_questions_schema()),
        )
        .await
    }

    async fn parse_answer_key(&self, answers: &str) -> Result<AnswerKey, AppError> {
        self.generate_json(
            &self.flash_model,
            vec![
                json!({ "text": prompts::PARSE_ANSWER_KEY }),
                json!({ "text": answers }),
            ],
            None,
        )
        .await
    }

    async fn generate_learning_path(&self, prompt: &str) -> Result<LearningPathContent, AppError> {
        self.generate_json(
            &self.pro_model,
            vec![json!({ "text": prompts::learning_path(prompt) })],
            Some(prompts::learning_path_schema()),
        )
        .await
    }

    async fn generate_flashcards(
        &self,
        subject: &str,
        source_material: &str,
    ) -> Result<Vec<FlashcardContent>, AppError> {
        self.generate_json(
            &self.flash_model,
            vec![json!({ "text": prompts::flashcards(subject, source_material) })],
            Some(prompts::flashcards_schema()),
        )
        .await
    }

    async fn generate_hint(
        &self,
        question: &Question,
        previous_hints: i64,
    ) -> Result<String, AppError> {
        let prompt = prompts::hint(&question.statement, &format_choices(question), previous_hints);
        let contents = json!([{ "parts": [{ "text": prompt }] }]);
        Ok(self
            .generate(&self.flash_model, contents, None)
            .await?
            .trim()
            .to_string())
    }

    async fn analyze_performance(
        &self,
        test_title: &str,
        score: i64,
        missed: &[Question],
    ) -> Result<String, AppError> {
        let missed_text = missed
            .iter()
            .map(|q| format!("{}\n{}\nCorrect: {}", q.statement, format_choices(q), q.correct))
            .collect::<Vec<_>>()
            .join("\n\n");
        let contents = json!([{
            "parts": [{ "text": prompts::performance(test_title, score, &missed_text) }]
        }]);
        self.generate(&self.flash_model, contents, None).await
    }

    async fn chat(&self, history: &[ChatMessage], message: &str) -> Result<String, AppError> {
        let mut contents: Vec<Value> = vec![
            json!({ "role": "user", "parts": [{ "text": prompts::ASSISTANT_INSTRUCTIONS }] }),
            json!({ "role": "model", "parts": [{ "text": "Understood." }] }),
        ];
        for turn in history {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            contents.push(json!({ "role": role, "parts": [{ "text": turn.text }] }));
        }
        contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));

        self.generate(&self.flash_model, Value::Array(contents), None)
            .await
    }
}
