use serde_json::{json, Value};

pub const EXTRACT_TEXT: &str = "Extract all of the text in this document literally, keeping the \
original formatting and line breaks. Do not add any commentary or summary, only the raw text.";

pub const EXTRACT_DETAILED: &str = "Extract every multiple-choice question from the attached file. \
For each question give the statement, its choices (letter and text), the letter of the correct \
choice and, when available, a resolution and a hint. Omit resolution and hint when the file has \
none. Answer with a JSON array.";

pub const EXTRACT_NUMBERED: &str = "Extract every multiple-choice question from the text below. \
Each question starts with its numeric id followed by '.' or ')', then the statement and the \
choices (A), B), C) ...). For each question return only the numeric id, the statement and the \
text of every choice with its letter. When a statement references an image or video, keep the \
text but drop that reference. Ignore anything that is not a question. Answer with a JSON array.";

pub const PARSE_ANSWER_KEY: &str = "Read the answer key below. For every question extract the \
numeric id, the letter of the correct answer and the commentary explaining it, if any. The letter \
is usually at the end of the commentary, as in 'Answer: letter X.'. Return a single JSON object \
whose keys are the question ids as strings and whose values are objects with 'correct' (A-E) and \
'comment'. Ignore text that does not follow this pattern.";

pub fn learning_path(prompt: &str) -> String {
    format!(
        "Based on the following request, create a structured learning path. The answer MUST be a \
single JSON object with 'title', 'description', 'duration' (e.g. '2 weeks'), 'targetAudience' \
(e.g. 'Advanced students') and 'steps' (an array of objects with 'step' (number), 'title' and \
'description').\n\nRequest: \"{}\"",
        prompt
    )
}

pub fn flashcards(subject: &str, source_material: &str) -> String {
    format!(
        "Create between 5 and 10 study flashcards about \"{}\". Each card has a short question or \
concept on the 'front' and a concise explanation on the 'back'. Answer with a JSON array.\n\n\
Reference material:\n{}",
        subject, source_material
    )
}

pub fn hint(statement: &str, choices: &str, previous_hints: i64) -> String {
    format!(
        "A student is solving the multiple-choice question below and asked for hint number {}. \
Give one short hint that moves them toward the answer without revealing the correct letter. \
Each hint should be more specific than the previous ones.\n\nQuestion: {}\n\nChoices:\n{}",
        previous_hints + 1,
        statement,
        choices
    )
}

pub fn performance(test_title: &str, score: i64, missed: &str) -> String {
    format!(
        "A student scored {}% on the test \"{}\". Below are the questions they got wrong. Write a \
short, encouraging analysis: the topics they should review and concrete next steps.\n\n{}",
        score, test_title, missed
    )
}

pub const ASSISTANT_INSTRUCTIONS: &str = "You are a friendly study assistant for students \
preparing for exams. Answer clearly and briefly, and suggest how to practice the topic.";

fn choice_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "letter": { "type": "STRING", "description": "Choice letter (A, B, C, D, E)." },
            "text": { "type": "STRING", "description": "Choice text." }
        },
        "required": ["letter", "text"]
    })
}

pub fn detailed_questions_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "statement": { "type": "STRING" },
                "choices": { "type": "ARRAY", "items": choice_schema() },
                "correct": { "type": "STRING" },
                "resolution": { "type": "STRING", "nullable": true },
                "hint": { "type": "STRING", "nullable": true }
            },
            "required": ["statement", "choices", "correct"]
        }
    })
}

pub fn numbered_questions_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "NUMBER", "description": "Numeric id printed before the question." },
                "statement": { "type": "STRING" },
                "choices": { "type": "ARRAY", "items": choice_schema() }
            },
            "required": ["id", "statement", "choices"]
        }
    })
}

pub fn learning_path_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "duration": { "type": "STRING" },
            "targetAudience": { "type": "STRING" },
            "steps": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "step": { "type": "INTEGER" },
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["step", "title", "description"]
                }
            }
        },
        "required": ["title", "description", "duration", "targetAudience", "steps"]
    })
}

pub fn flashcards_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "front": { "type": "STRING" },
                "back": { "type": "STRING" }
            },
            "required": ["front", "back"]
        }
    })
}
