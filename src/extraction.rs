use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::ai::{with_retry, AiClient, AnswerKey, DocumentPayload, RawQuestion, RetryPolicy};
use crate::error::AppError;
use crate::models::QuestionDraft;

static ANSWER_KEY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n\s*(gabarito|answer key)\s*\n").expect("valid regex"));

static NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+[ \t]*[.)]").expect("valid regex"));

const MIN_BLOCK_CHARS: usize = 20;
const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// How the questions are laid out in the uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromFormField, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionPattern {
    /// Each question carries its own answer, resolution and hint.
    Detailed,
    /// Numbered questions followed by a separate answer key.
    #[default]
    Numbered,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionProgress {
    pub percent: u8,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractionReport {
    pub questions: Vec<QuestionDraft>,
    pub total_chunks: usize,
    pub failed_chunks: usize,
    pub answer_key_entries: usize,
}

/// Splits at the first answer-key header. The header stays with the answers.
pub fn split_answer_key(text: &str) -> (&str, &str) {
    match ANSWER_KEY_HEADER.find(text) {
        Some(found) => (&text[..found.start()], &text[found.start()..]),
        None => (text, ""),
    }
}

/// Cuts the questions section before every line starting with a number and
/// `.` or `)`, dropping fragments too short to hold a question.
pub fn split_question_blocks(text: &str) -> Vec<String> {
    let mut starts: Vec<usize> = NUMBERED_LINE.find_iter(text).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .filter(|block| block.trim().chars().count() > MIN_BLOCK_CHARS)
        .map(str::to_string)
        .collect()
}

pub fn chunk_blocks(blocks: &[String], chunk_size: usize) -> Vec<String> {
    blocks
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.join(CHUNK_SEPARATOR))
        .collect()
}

pub fn generated_id_base() -> i64 {
    Utc::now().timestamp_millis()
}

/// Attaches answer-key letters and comments to numbered questions by id.
pub fn merge_answer_key(raw: Vec<RawQuestion>, key: &AnswerKey, id_base: i64) -> Vec<QuestionDraft> {
    raw.into_iter()
        .enumerate()
        .map(|(index, question)| {
            let id = question.id.unwrap_or(id_base + index as i64);
            let entry = key.get(&id.to_string());
            QuestionDraft {
                id,
                statement: question.statement,
                choices: question.choices,
                correct: entry.map(|e| e.correct()).unwrap_or_default(),
                resolution: None,
                hint: entry.and_then(|e| e.comment()),
            }
        })
        .collect()
}

/// Detailed questions keep their own answers and always get generated ids.
pub fn detailed_drafts(raw: Vec<RawQuestion>, id_base: i64) -> Vec<QuestionDraft> {
    raw.into_iter()
        .enumerate()
        .map(|(index, question)| QuestionDraft {
            id: id_base + index as i64,
            statement: question.statement,
            choices: question.choices,
            correct: question
                .correct
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_default(),
            resolution: question.resolution.filter(|r| !r.trim().is_empty()),
            hint: question.hint.filter(|h| !h.trim().is_empty()),
        })
        .collect()
}

pub type ProgressSink<'a> = &'a mut (dyn FnMut(ExtractionProgress) + Send);

pub struct ExtractionPipeline<'a> {
    ai: &'a dyn AiClient,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(ai: &'a dyn AiClient, retry: RetryPolicy, chunk_size: usize) -> Self {
        Self {
            ai,
            retry,
            chunk_size: chunk_size.max(1),
        }
    }

    #[instrument(skip(self, document, progress), fields(mime = %document.mime_type, bytes = document.bytes.len()))]
    pub async fn run(
        &self,
        document: &DocumentPayload,
        pattern: ExtractionPattern,
        progress: ProgressSink<'_>,
    ) -> Result<ExtractionReport, AppError> {
        let report = match pattern {
            ExtractionPattern::Detailed => self.run_detailed(document, progress).await?,
            ExtractionPattern::Numbered => self.run_numbered(document, progress).await?,
        };
        info!(
            questions = report.questions.len(),
            failed_chunks = report.failed_chunks,
            "Extraction finished"
        );
        Ok(report)
    }

    async fn run_detailed(
        &self,
        document: &DocumentPayload,
        progress: ProgressSink<'_>,
    ) -> Result<ExtractionReport, AppError> {
        report(progress, 10, "Sending the document to the AI");
        let raw = with_retry(self.retry, "extract_detailed_questions", || {
            self.ai.extract_detailed_questions(document)
        })
        .await?;

        report(progress, 100, &format!("Extracted {} questions", raw.len()));
        Ok(ExtractionReport {
            questions: detailed_drafts(raw, generated_id_base()),
            total_chunks: 1,
            ..Default::default()
        })
    }

    async fn run_numbered(
        &self,
        document: &DocumentPayload,
        progress: ProgressSink<'_>,
    ) -> Result<ExtractionReport, AppError> {
        report(progress, 5, "Extracting the document text");
        let text = with_retry(self.retry, "extract_document_text", || {
            self.ai.extract_document_text(document)
        })
        .await?;

        if text.trim().is_empty() {
            return Err(AppError::ExternalService(
                "The AI could not extract any text from the document".to_string(),
            ));
        }

        report(progress, 20, "Splitting questions and answer key");
        let (questions_text, answers_text) = split_answer_key(&text);
        let blocks = split_question_blocks(questions_text);
        let chunks = chunk_blocks(&blocks, self.chunk_size);
        info!(
            blocks = blocks.len(),
            chunks = chunks.len(),
            has_answer_key = !answers_text.trim().is_empty(),
            "Document split"
        );

        let mut raw = Vec::new();
        let mut failed_chunks = 0;
        for (index, chunk) in chunks.iter().enumerate() {
            match with_retry(self.retry, "extract_numbered_questions", || {
                self.ai.extract_numbered_questions(chunk)
            })
            .await
            {
                Ok(mut questions) => raw.append(&mut questions),
                Err(err) => {
                    warn!(chunk = index + 1, error = %err, "Question chunk could not be processed");
                    failed_chunks += 1;
                }
            }
            let percent = 20 + (60 * (index + 1) / chunks.len()) as u8;
            report(
                progress,
                percent,
                &format!("Processed chunk {} of {}", index + 1, chunks.len()),
            );
        }

        let key = if answers_text.trim().is_empty() {
            AnswerKey::new()
        } else {
            report(progress, 85, "Reading the answer key");
            match with_retry(self.retry, "parse_answer_key", || {
                self.ai.parse_answer_key(answers_text)
            })
            .await
            {
                Ok(key) => key,
                Err(err) => {
                    warn!(error = %err, "Answer key could not be parsed");
                    AnswerKey::new()
                }
            }
        };

        let questions = merge_answer_key(raw, &key, generated_id_base());
        report(progress, 100, &format!("Extracted {} questions", questions.len()));

        Ok(ExtractionReport {
            questions,
            total_chunks: chunks.len(),
            failed_chunks,
            answer_key_entries: key.len(),
        })
    }
}

fn report(progress: &mut (dyn FnMut(ExtractionProgress) + Send), percent: u8, status: &str) {
    info!(percent, status, "Extraction progress");
    progress(ExtractionProgress {
        percent,
        status: status.to_string(),
    });
}
