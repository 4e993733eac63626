#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::http::{ContentType, Status};
    use serde_json::json;

    use crate::ai::SharedAi;
    use crate::api::flashcards::DeckWithCards;
    use crate::api::CreatedResponse;
    use crate::models::{FlashcardContent, FlashcardDeck};
    use crate::test::mock::{MockAi, MockSchoolApi};
    use crate::test::test_utils::{
        create_standard_test_db, login_test_user, setup_test_client, setup_test_client_with,
        ADMIN_EMAIL, OTHER_STUDENT_EMAIL, STANDARD_PASSWORD, STUDENT_EMAIL, SUBJECT,
    };
    use crate::validation::ValidationResponse;

    fn card(front: &str, back: &str) -> FlashcardContent {
        FlashcardContent {
            front: front.to_string(),
            back: back.to_string(),
        }
    }

    fn scripted_ai() -> SharedAi {
        Arc::new(MockAi::new().flashcards(vec![
            card("What does habeas corpus protect?", "Freedom of movement"),
            card("Who judges the president?", "The senate"),
        ]))
    }

    #[rocket::async_test]
    async fn test_student_generated_deck_is_private() {
        let (client, test_db) = setup_test_client_with(
            create_standard_test_db().await,
            scripted_ai(),
            Arc::new(MockSchoolApi::new()),
        )
        .await;
        let ana = login_test_user(&client, STUDENT_EMAIL, STANDARD_PASSWORD).await;

        let response = client
            .post("/api/flashcards/generate")
            .header(ContentType::JSON)
            .cookies(ana.clone())
            .body(json!({ "subject_id": test_db.item_id(SUBJECT) }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let generated: DeckWithCards = response.into_json().await.unwrap();
        assert_eq!(generated.deck.title, format!("Review of {}", SUBJECT));
        assert_eq!(generated.deck.student_id, Some(test_db.user_id(STUDENT_EMAIL)));
        assert_eq!(generated.deck.card_count, 2);
        assert_eq!(generated.cards[1].back, "The senate");

        let response = client
            .get("/api/flashcards/decks")
            .cookies(ana.clone())
            .dispatch()
            .await;
        let decks: Vec<FlashcardDeck> = response.into_json().await.unwrap();
        assert_eq!(decks.len(), 1);

        let bruno = login_test_user(&client, OTHER_STUDENT_EMAIL, STANDARD_PASSWORD).await;
        let response = client
            .get("/api/flashcards/decks")
            .cookies(bruno.clone())
            .dispatch()
            .await;
        let decks: Vec<FlashcardDeck> = response.into_json().await.unwrap();
        assert!(decks.is_empty());

        let cards_url = format!("/api/flashcards/decks/{}/cards", generated.deck.id);
        let response = client.get(cards_url.as_str()).cookies(bruno.clone()).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .delete(format!("/api/flashcards/decks/{}", generated.deck.id))
            .cookies(bruno)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get(cards_url.as_str()).cookies(ana.clone()).dispatch().await;
        let deck: DeckWithCards = response.into_json().await.unwrap();
        assert_eq!(deck.cards.len(), 2);

        // owners may delete their own decks
        let response = client
            .delete(format!("/api/flashcards/decks/{}", generated.deck.id))
            .cookies(ana)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NoContent);
    }

    #[rocket::async_test]
    async fn test_admin_decks_are_shared() {
        let (client, test_db) = setup_test_client_with(
            create_standard_test_db().await,
            scripted_ai(),
            Arc::new(MockSchoolApi::new()),
        )
        .await;
        let admin = login_test_user(&client, ADMIN_EMAIL, STANDARD_PASSWORD).await;
        let subject = test_db.item_id(SUBJECT);

        let response = client
            .post("/api/flashcards/generate")
            .header(ContentType::JSON)
            .cookies(admin.clone())
            .body(json!({ "subject_id": subject }).to_string())
            .dispatch()
            .await;
        let generated: DeckWithCards = response.into_json().await.unwrap();
        assert_eq!(generated.deck.student_id, None);

        let response = client
            .post("/api/flashcards/decks")
            .header(ContentType::JSON)
            .cookies(admin.clone())
            .body(
                json!({
                    "title": "Key articles",
                    "subject_id": subject,
                    "cards": [{ "front": "Article 5", "back": "Fundamental rights" }]
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let created: CreatedResponse = response.into_json().await.unwrap();

        let student = login_test_user(&client, STUDENT_EMAIL, STANDARD_PASSWORD).await;
        let response = client
            .get(format!("/api/flashcards/decks?subject_id={}", subject))
            .cookies(student.clone())
            .dispatch()
            .await;
        let decks: Vec<FlashcardDeck> = response.into_json().await.unwrap();
        assert_eq!(decks.len(), 2);
        assert!(decks.iter().all(|d| d.subject_description == SUBJECT));

        // shared decks are read-only for students
        let response = client
            .delete(format!("/api/flashcards/decks/{}", created.id))
            .cookies(student)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .delete(format!("/api/flashcards/decks/{}", created.id))
            .cookies(admin)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NoContent);
    }

    #[rocket::async_test]
    async fn test_manual_deck_needs_cards() {
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let admin = login_test_user(&client, ADMIN_EMAIL, STANDARD_PASSWORD).await;

        let response = client
            .post("/api/flashcards/decks")
            .header(ContentType::JSON)
            .cookies(admin)
            .body(
                json!({ "title": "Empty", "subject_id": test_db.item_id(SUBJECT), "cards": [] })
                    .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors.contains_key("cards"));
    }

    #[rocket::async_test]
    async fn test_generation_without_cards_fails() {
        // the mock returns no cards when nothing is scripted
        let (client, test_db) = setup_test_client(create_standard_test_db().await).await;
        let student = login_test_user(&client, STUDENT_EMAIL, STANDARD_PASSWORD).await;

        let response = client
            .post("/api/flashcards/generate")
            .header(ContentType::JSON)
            .cookies(student.clone())
            .body(json!({ "subject_id": test_db.item_id(SUBJECT) }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadGateway);

        let response = client
            .post("/api/flashcards/generate")
            .header(ContentType::JSON)
            .cookies(student.clone())
            .body(json!({ "subject_id": 9999 }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get("/api/flashcards/decks").cookies(student).dispatch().await;
        let decks: Vec<FlashcardDeck> = response.into_json().await.unwrap();
        assert!(decks.is_empty());
    }
}
