pub mod gemini;
pub mod prompts;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::models::{Choice, FlashcardContent, LearningPathContent, Question};

pub use gemini::GeminiClient;
pub use retry::{with_retry, RetryPolicy};

/// An uploaded document handed to the model as inline data.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A question as the model returns it. Every field except the statement may
/// be missing depending on the document layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawQuestion {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub statement: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub correct: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Accepts ids sent as integers, floats or numeric strings.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// One answer-key entry: either a bare letter or a letter with commentary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerKeyEntry {
    Letter(String),
    Detailed {
        correct: String,
        #[serde(default)]
        comment: Option<String>,
    },
}

impl AnswerKeyEntry {
    pub fn correct(&self) -> String {
        match self {
            AnswerKeyEntry::Letter(letter) => letter.trim().to_uppercase(),
            AnswerKeyEntry::Detailed { correct, .. } => correct.trim().to_uppercase(),
        }
    }

    pub fn comment(&self) -> Option<String> {
        match self {
            AnswerKeyEntry::Letter(_) => None,
            AnswerKeyEntry::Detailed { comment, .. } => comment
                .as_ref()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }
    }
}

pub type AnswerKey = HashMap<String, AnswerKeyEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// Everything the portal asks of the generative model.
#[rocket::async_trait]
pub trait AiClient: Send + Sync {
    /// Literal text of a document, formatting and line breaks preserved.
    async fn extract_document_text(&self, document: &DocumentPayload) -> Result<String, AppError>;

    /// Complete questions (with answers) from a document in one call.
    async fn extract_detailed_questions(
        &self,
        document: &DocumentPayload,
    ) -> Result<Vec<RawQuestion>, AppError>;

    /// Id, statement and choices of every numbered question in a text chunk.
    async fn extract_numbered_questions(&self, chunk: &str) -> Result<Vec<RawQuestion>, AppError>;

    async fn parse_answer_key(&self, answers: &str) -> Result<AnswerKey, AppError>;

    async fn generate_learning_path(&self, prompt: &str) -> Result<LearningPathContent, AppError>;

    async fn generate_flashcards(
        &self,
        subject: &str,
        source_material: &str,
    ) -> Result<Vec<FlashcardContent>, AppError>;

    async fn generate_hint(&self, question: &Question, previous_hints: i64)
        -> Result<String, AppError>;

    async fn analyze_performance(
        &self,
        test_title: &str,
        score: i64,
        missed: &[Question],
    ) -> Result<String, AppError>;

    async fn chat(&self, history: &[ChatMessage], message: &str) -> Result<String, AppError>;
}

pub type SharedAi = Arc<dyn AiClient>;
