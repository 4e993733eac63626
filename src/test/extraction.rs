#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rocket::http::{ContentType, Status};

    use crate::ai::{AnswerKey, AnswerKeyEntry, DocumentPayload, RawQuestion, RetryPolicy};
    use crate::api::questions::ExtractionResponse;
    use crate::error::AppError;
    use crate::extraction::{
        chunk_blocks, merge_answer_key, split_answer_key, split_question_blocks,
        ExtractionPattern, ExtractionPipeline, ExtractionProgress,
    };
    use crate::models::Choice;
    use crate::test::mock::{MockAi, MockSchoolApi};
    use crate::test::test_utils::{
        create_standard_test_db, login_test_user, setup_test_client_with, ADMIN_EMAIL,
        STANDARD_PASSWORD, STUDENT_EMAIL,
    };
    use crate::validation::ValidationResponse;

    const DOCUMENT_TEXT: &str = "1. What does the first article of the charter establish?\n\
        A) Sovereignty\n\
        B) Federalism\n\
        2) Which branch is responsible for judging the president?\n\
        A) The senate\n\
        B) The courts\n\
        3. Short one\n\
        4. Who may propose a constitutional amendment to congress?\n\
        A) One third of the house\n\
        B) Any citizen\n\
        \nGabarito\n\
        1 - A\n\
        2 - B\n";

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            initial_delay: Duration::from_millis(1),
        }
    }

    fn raw(id: Option<i64>, statement: &str) -> RawQuestion {
        RawQuestion {
            id,
            statement: statement.to_string(),
            choices: vec![
                Choice {
                    letter: "A".to_string(),
                    text: "First".to_string(),
                },
                Choice {
                    letter: "B".to_string(),
                    text: "Second".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    fn pdf() -> DocumentPayload {
        DocumentPayload {
            mime_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[test]
    fn test_split_answer_key_keeps_header_with_answers() {
        let (questions, answers) = split_answer_key(DOCUMENT_TEXT);

        assert!(questions.contains("Who may propose"));
        assert!(!questions.contains("Gabarito"));
        assert!(answers.trim_start().starts_with("Gabarito"));
        assert!(answers.contains("2 - B"));

        let (questions, answers) = split_answer_key("1. Only questions here, no key at all");
        assert_eq!(questions, "1. Only questions here, no key at all");
        assert_eq!(answers, "");
    }

    #[test]
    fn test_split_answer_key_is_case_insensitive() {
        let (_, answers) = split_answer_key("1. Question text\n  ANSWER KEY  \n1 - C");
        assert!(answers.contains("1 - C"));
    }

    #[test]
    fn test_split_question_blocks_drops_short_fragments() {
        let (questions, _) = split_answer_key(DOCUMENT_TEXT);
        let blocks = split_question_blocks(questions);

        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("1. What does"));
        assert!(blocks[1].starts_with("2) Which branch"));
        assert!(blocks[2].starts_with("4. Who may"));
        assert!(blocks.iter().all(|b| !b.contains("Short one")));
    }

    #[test]
    fn test_split_question_blocks_keeps_leading_text() {
        let blocks = split_question_blocks(
            "Instructions: read every question carefully\n1. First question statement goes here",
        );
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("Instructions"));
    }

    #[test]
    fn test_chunk_blocks_groups_by_size() {
        let blocks: Vec<String> = (1..=5).map(|i| format!("block {}", i)).collect();

        let chunks = chunk_blocks(&blocks, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "block 1\n\n---\n\nblock 2");
        assert_eq!(chunks[2], "block 5");

        assert_eq!(chunk_blocks(&blocks, 0).len(), 5);
        assert!(chunk_blocks(&[], 3).is_empty());
    }

    #[test]
    fn test_merge_answer_key() {
        let mut key = AnswerKey::new();
        key.insert("1".to_string(), AnswerKeyEntry::Letter(" a ".to_string()));
        key.insert(
            "2".to_string(),
            AnswerKeyEntry::Detailed {
                correct: "b".to_string(),
                comment: Some("See article 5".to_string()),
            },
        );

        let drafts = merge_answer_key(
            vec![
                raw(Some(1), "First"),
                raw(Some(2), "Second"),
                raw(Some(7), "Unkeyed"),
                raw(None, "No id"),
            ],
            &key,
            1_000,
        );

        assert_eq!(drafts[0].correct, "A");
        assert_eq!(drafts[0].hint, None);
        assert_eq!(drafts[1].correct, "B");
        assert_eq!(drafts[1].hint.as_deref(), Some("See article 5"));
        assert_eq!(drafts[2].id, 7);
        assert_eq!(drafts[2].correct, "");
        assert_eq!(drafts[3].id, 1_003);
    }

    #[test]
    fn test_answer_key_entries_deserialize_in_both_shapes() {
        let key: AnswerKey = serde_json::from_str(
            r#"{"1": "C", "2": {"correct": "d", "comment": "  "}}"#,
        )
        .unwrap();

        assert_eq!(key["1"].correct(), "C");
        assert_eq!(key["2"].correct(), "D");
        assert_eq!(key["2"].comment(), None);
    }

    #[tokio::test]
    async fn test_numbered_pipeline_counts_failed_chunks() {
        let mut key = AnswerKey::new();
        key.insert("1".to_string(), AnswerKeyEntry::Letter("A".to_string()));
        key.insert("2".to_string(), AnswerKeyEntry::Letter("B".to_string()));

        let ai = MockAi::new()
            .document_text(Ok(DOCUMENT_TEXT))
            .chunk(Ok(vec![raw(Some(1), "First"), raw(Some(2), "Second")]))
            .chunk(Err("Gemini API error (500): internal"))
            .chunk(Err("Gemini API error (500): internal"))
            .chunk(Err("Gemini API error (500): internal"))
            .chunk(Err("Gemini API error (500): internal"))
            .answer_key(Ok(key));

        let mut progress: Vec<ExtractionProgress> = Vec::new();
        let mut sink = |step: ExtractionProgress| progress.push(step);
        let report = ExtractionPipeline::new(&ai, fast_retry(), 2)
            .run(&pdf(), ExtractionPattern::Numbered, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.total_chunks, 2);
        assert_eq!(report.failed_chunks, 1);
        assert_eq!(report.answer_key_entries, 2);
        assert_eq!(report.questions.len(), 2);
        assert_eq!(report.questions[1].correct, "B");

        // one success, then the initial call plus three retries
        assert_eq!(ai.call_count("extract_numbered_questions"), 5);

        assert_eq!(progress.first().map(|p| p.percent), Some(5));
        assert_eq!(progress.last().map(|p| p.percent), Some(100));
        assert!(progress.windows(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let ai = MockAi::new()
            .document_text(Ok(DOCUMENT_TEXT))
            .chunk(Err("Gemini API error (400): bad request"))
            .chunk(Ok(vec![raw(Some(4), "Fourth")]));

        let mut sink = |_: ExtractionProgress| {};
        let report = ExtractionPipeline::new(&ai, fast_retry(), 2)
            .run(&pdf(), ExtractionPattern::Numbered, &mut sink)
            .await
            .unwrap();

        assert_eq!(ai.call_count("extract_numbered_questions"), 2);
        assert_eq!(report.failed_chunks, 1);
        assert_eq!(report.questions.len(), 1);
        assert_eq!(report.questions[0].id, 4);
    }

    #[tokio::test]
    async fn test_unreadable_answer_key_leaves_answers_blank() {
        let ai = MockAi::new()
            .document_text(Ok(DOCUMENT_TEXT))
            .chunk(Ok(vec![raw(Some(1), "First")]))
            .chunk(Ok(vec![raw(Some(4), "Fourth")]))
            .answer_key(Err("Gemini API error (400): unparseable"));

        let mut sink = |_: ExtractionProgress| {};
        let report = ExtractionPipeline::new(&ai, RetryPolicy::none(), 2)
            .run(&pdf(), ExtractionPattern::Numbered, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.answer_key_entries, 0);
        assert!(report.questions.iter().all(|q| q.correct.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_document_text_is_an_error() {
        let ai = MockAi::new().document_text(Ok("   \n  "));

        let mut sink = |_: ExtractionProgress| {};
        let result = ExtractionPipeline::new(&ai, RetryPolicy::none(), 2)
            .run(&pdf(), ExtractionPattern::Numbered, &mut sink)
            .await;

        assert!(matches!(result, Err(AppError::ExternalService(_))));
        assert_eq!(ai.call_count("extract_numbered_questions"), 0);
    }

    #[tokio::test]
    async fn test_detailed_pipeline_generates_ids() {
        let mut question = raw(Some(42), "Detailed question");
        question.correct = Some(" c".to_string());
        question.resolution = Some("Because of article 3".to_string());
        question.hint = Some(" ".to_string());

        let ai = MockAi::new().detailed(Ok(vec![question, raw(None, "Second")]));

        let mut sink = |_: ExtractionProgress| {};
        let report = ExtractionPipeline::new(&ai, RetryPolicy::none(), 2)
            .run(&pdf(), ExtractionPattern::Detailed, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.questions.len(), 2);
        let first = &report.questions[0];
        assert_ne!(first.id, 42);
        assert_eq!(report.questions[1].id, first.id + 1);
        assert_eq!(first.correct, "C");
        assert_eq!(first.resolution.as_deref(), Some("Because of article 3"));
        assert_eq!(first.hint, None);
        assert_eq!(ai.call_count("extract_document_text"), 0);
    }

    #[rocket::async_test]
    async fn test_extract_endpoint_returns_report_and_progress() {
        let ai = MockAi::new().detailed(Ok(vec![raw(None, "Uploaded question")]));
        let (client, _) = setup_test_client_with(
            create_standard_test_db().await,
            Arc::new(ai),
            Arc::new(MockSchoolApi::new()),
        )
        .await;
        let cookies = login_test_user(&client, ADMIN_EMAIL, STANDARD_PASSWORD).await;

        let response = client
            .post("/api/questions/extract?pattern=detailed")
            .header(ContentType::PDF)
            .cookies(cookies)
            .body(b"%PDF-1.4 fake".to_vec())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: ExtractionResponse = response.into_json().await.unwrap();
        assert_eq!(body.report.questions.len(), 1);
        assert_eq!(body.report.questions[0].statement, "Uploaded question");
        assert_eq!(body.progress.last().map(|p| p.percent), Some(100));
    }

    #[rocket::async_test]
    async fn test_extract_endpoint_rejects_bad_uploads() {
        let (client, _) = setup_test_client_with(
            create_standard_test_db().await,
            Arc::new(MockAi::new()),
            Arc::new(MockSchoolApi::new()),
        )
        .await;
        let cookies = login_test_user(&client, ADMIN_EMAIL, STANDARD_PASSWORD).await;

        let response = client
            .post("/api/questions/extract")
            .header(ContentType::PDF)
            .cookies(cookies.clone())
            .body(vec![b'x'; 1024 * 1024 + 16])
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::PayloadTooLarge);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors.contains_key("document"));

        let response = client
            .post("/api/questions/extract")
            .header(ContentType::PDF)
            .cookies(cookies)
            .body(Vec::<u8>::new())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);

        let student = login_test_user(&client, STUDENT_EMAIL, STANDARD_PASSWORD).await;
        let response = client
            .post("/api/questions/extract")
            .header(ContentType::PDF)
            .cookies(student)
            .body(b"%PDF".to_vec())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_extract_endpoint_reports_service_failure() {
        let ai = MockAi::new().document_text(Err("Gemini API error (403): quota exceeded"));
        let (client, _) = setup_test_client_with(
            create_standard_test_db().await,
            Arc::new(ai),
            Arc::new(MockSchoolApi::new()),
        )
        .await;
        let cookies = login_test_user(&client, ADMIN_EMAIL, STANDARD_PASSWORD).await;

        let response = client
            .post("/api/questions/extract?pattern=numbered")
            .header(ContentType::PDF)
            .cookies(cookies)
            .body(b"%PDF-1.4".to_vec())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::ServiceUnavailable);
        let body: ValidationResponse = response.into_json().await.unwrap();
        assert!(body.errors["service"][0].contains("quota exceeded"));
    }
}
