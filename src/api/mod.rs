pub mod academic;
pub mod auth;
pub mod export;
pub mod flashcards;
pub mod learning_paths;
pub mod materials;
pub mod questions;
pub mod students;
pub mod study;

use rocket::serde::json::Json;
use rocket::Route;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Every route served under `/api`.
pub fn routes() -> Vec<Route> {
    let mut all = routes![health];
    all.extend(auth::routes());
    all.extend(students::routes());
    all.extend(academic::routes());
    all.extend(questions::routes());
    all.extend(tests::routes());
    all.extend(materials::routes());
    all.extend(learning_paths::routes());
    all.extend(study::routes());
    all.extend(flashcards::routes());
    all.extend(export::routes());
    all
}
