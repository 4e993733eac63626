use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::ai::SharedAi;
use crate::api::CreatedResponse;
use crate::auth::{Permission, Role, User};
use crate::db::{
    create_deck, delete_deck, flashcard_back_for, get_academic_item, get_deck, list_cards,
    list_decks, list_questions_for_subject,
};
use crate::models::{deck_title_for, AcademicLevel, Flashcard, FlashcardContent, FlashcardDeck};
use crate::validation::{
    field_error, ApiResult, AppErrorExt, JsonValidateExt, PermissionCheckExt,
};

/// Questions fed to the AI as source material for a generated deck.
const SOURCE_QUESTION_LIMIT: usize = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct DeckRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub subject_id: i64,
    #[validate(length(min = 1, message = "Add at least one card"))]
    pub cards: Vec<FlashcardContent>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateDeckRequest {
    pub subject_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeckWithCards {
    pub deck: FlashcardDeck,
    pub cards: Vec<Flashcard>,
}

/// Admins see every deck; students see shared decks and their own.
fn visible_to(user: &User) -> Option<i64> {
    match user.role {
        Role::Admin => None,
        Role::Student => Some(user.id),
    }
}

fn can_view(deck: &FlashcardDeck, user: &User) -> bool {
    match visible_to(user) {
        None => true,
        Some(student_id) => deck.student_id.is_none() || deck.student_id == Some(student_id),
    }
}

#[get("/flashcards/decks?<subject_id>")]
pub async fn list(
    subject_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<FlashcardDeck>>> {
    user.require_permission(Permission::ViewAcademicData)
        .validate_custom()?;

    let decks = list_decks(db, visible_to(&user), subject_id)
        .await
        .validate_custom()?;
    Ok(Json(decks))
}

/// Shared deck written by hand.
#[post("/flashcards/decks", data = "<request>")]
pub async fn create(
    request: Json<DeckRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<(Status, Json<CreatedResponse>)> {
    user.require_permission(Permission::ManageFlashcards)
        .validate_custom()?;
    let request = request.validate_custom()?;

    let id = create_deck(db, request.title.trim(), request.subject_id, None, &request.cards)
        .await
        .validate_custom()?;
    Ok((Status::Created, Json(CreatedResponse { id })))
}

/// Generates a review deck for a subject. Students get a private deck; decks
/// generated by admins are shared.
#[post("/flashcards/generate", data = "<request>")]
pub async fn generate(
    request: Json<GenerateDeckRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    ai: &State<SharedAi>,
) -> ApiResult<(Status, Json<DeckWithCards>)> {
    user.require_permission(Permission::GenerateFlashcards)
        .validate_custom()?;

    let subject = get_academic_item(db, AcademicLevel::Subjects, request.subject_id)
        .await
        .validate_custom()?;

    let source_material = list_questions_for_subject(db, subject.id)
        .await
        .validate_custom()?
        .iter()
        .take(SOURCE_QUESTION_LIMIT)
        .map(|q| format!("{}\n{}", q.statement, flashcard_back_for(q)))
        .collect::<Vec<_>>()
        .join("\n\n");

    let cards = ai
        .generate_flashcards(&subject.description, &source_material)
        .await
        .validate_custom()?;
    if cards.is_empty() {
        return Err(field_error(
            Status::BadGateway,
            "service",
            "The AI did not return any flashcards",
        ));
    }

    let deck_id = create_deck(
        db,
        &deck_title_for(&subject.description),
        subject.id,
        visible_to(&user),
        &cards,
    )
    .await
    .validate_custom()?;
    info!(deck_id, cards = cards.len(), "Flashcard deck generated");

    let deck = get_deck(db, deck_id).await.validate_custom()?;
    let cards = list_cards(db, deck_id).await.validate_custom()?;
    Ok((Status::Created, Json(DeckWithCards { deck, cards })))
}

#[get("/flashcards/decks/<id>/cards")]
pub async fn cards(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<DeckWithCards>> {
    user.require_permission(Permission::ViewAcademicData)
        .validate_custom()?;

    let deck = get_deck(db, id).await.validate_custom()?;
    if !can_view(&deck, &user) {
        return Err(field_error(Status::NotFound, "resource", "Deck not found"));
    }

    let cards = list_cards(db, id).await.validate_custom()?;
    Ok(Json(DeckWithCards { deck, cards }))
}

#[delete("/flashcards/decks/<id>")]
pub async fn delete(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Status> {
    let deck = get_deck(db, id).await.validate_custom()?;
    if !can_view(&deck, &user) {
        return Err(field_error(Status::NotFound, "resource", "Deck not found"));
    }

    let owns = deck.student_id.is_some() && deck.student_id == Some(user.id);
    if !owns {
        user.require_permission(Permission::ManageFlashcards)
            .validate_custom()?;
    }

    delete_deck(db, id).await.validate_custom()?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<Route> {
    routes![list, create, generate, cards, delete]
}
