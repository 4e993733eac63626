#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime, Utc};
    use rocket::tokio;

    use crate::auth::{AccountStatus, Role, UserSession};
    use crate::db::{
        authenticate_user, clean_expired_sessions, create_user, create_user_session,
        delete_student, get_enrollments, get_session_by_token, invalidate_session, set_enrollments,
        EnrollmentChange, NewUser,
    };
    use crate::error::AppError;
    use crate::validation::ToValidationResponse;
    use crate::test::test_utils::{
        TestDb, TestDbBuilder, ADMIN_EMAIL, COURSE, DISCIPLINE, MODULE, STANDARD_PASSWORD,
        STUDENT_EMAIL, SUBJECT,
    };

    const INACTIVE_EMAIL: &str = "carla@example.com";

    async fn accounts_db() -> TestDb {
        TestDbBuilder::new()
            .admin(ADMIN_EMAIL, "Admin User")
            .student(STUDENT_EMAIL, "Ana Student")
            .inactive_student(INACTIVE_EMAIL, "Carla Student")
            .hierarchy(COURSE, MODULE, DISCIPLINE, SUBJECT)
            .hierarchy("Civil Law", "Contracts", "Obligations", "Breach")
            .enroll(STUDENT_EMAIL, COURSE)
            .build()
            .await
            .expect("Failed to build test database")
    }

    fn hours_from_now(hours: i64) -> NaiveDateTime {
        (Utc::now() + Duration::hours(hours)).naive_utc()
    }

    #[tokio::test]
    async fn test_authenticate_matches_email_case_insensitively() {
        let test_db = accounts_db().await;

        let user = authenticate_user(&test_db.pool, "ANA@Example.com", STANDARD_PASSWORD)
            .await
            .unwrap()
            .expect("credentials should match");
        assert_eq!(user.id, test_db.user_id(STUDENT_EMAIL));
        assert_eq!(user.role, Role::Student);

        let wrong = authenticate_user(&test_db.pool, STUDENT_EMAIL, "not-the-password")
            .await
            .unwrap();
        assert!(wrong.is_none());

        let unknown = authenticate_user(&test_db.pool, "nobody@example.com", STANDARD_PASSWORD)
            .await
            .unwrap();
        assert!(unknown.is_none());

        // inactive accounts still authenticate; the sign-in route refuses them
        let inactive = authenticate_user(&test_db.pool, INACTIVE_EMAIL, STANDARD_PASSWORD)
            .await
            .unwrap()
            .expect("credentials should match");
        assert_eq!(inactive.status, AccountStatus::Inactive);
    }

    #[tokio::test]
    async fn test_accounts_without_password_cannot_sign_in() {
        let test_db = accounts_db().await;

        create_user(
            &test_db.pool,
            NewUser {
                name: "Diego Student",
                email: "diego@example.com",
                role: Role::Student,
                status: AccountStatus::Active,
                password: None,
            },
        )
        .await
        .unwrap();

        for attempt in ["", STANDARD_PASSWORD] {
            let result = authenticate_user(&test_db.pool, "diego@example.com", attempt)
                .await
                .unwrap();
            assert!(result.is_none());
        }

        let duplicate = create_user(
            &test_db.pool,
            NewUser {
                name: "Diego Again",
                email: "DIEGO@example.com",
                role: Role::Student,
                status: AccountStatus::Active,
                password: Some(STANDARD_PASSWORD),
            },
        )
        .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let test_db = accounts_db().await;
        let user_id = test_db.user_id(ADMIN_EMAIL);
        let token = UserSession::generate_token();
        assert_eq!(token.len(), 32);

        create_user_session(&test_db.pool, user_id, &token, hours_from_now(1))
            .await
            .unwrap();

        let session = get_session_by_token(&test_db.pool, &token).await.unwrap();
        assert_eq!(session.user_id, user_id);
        assert!(session.is_valid());

        invalidate_session(&test_db.pool, &token).await.unwrap();
        match get_session_by_token(&test_db.pool, &token).await {
            Err(AppError::Authentication(msg)) => assert_eq!(msg, "Invalid session token"),
            other => panic!("expected an authentication error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_sessions() {
        let test_db = accounts_db().await;
        let user_id = test_db.user_id(STUDENT_EMAIL);

        let expired = UserSession::generate_token();
        let current = UserSession::generate_token();
        create_user_session(&test_db.pool, user_id, &expired, hours_from_now(-2))
            .await
            .unwrap();
        create_user_session(&test_db.pool, user_id, &current, hours_from_now(8))
            .await
            .unwrap();

        let stale = get_session_by_token(&test_db.pool, &expired).await.unwrap();
        assert!(!stale.is_valid());

        assert_eq!(clean_expired_sessions(&test_db.pool).await.unwrap(), 1);
        assert!(get_session_by_token(&test_db.pool, &expired).await.is_err());
        assert!(get_session_by_token(&test_db.pool, &current).await.is_ok());
    }

    #[tokio::test]
    async fn test_deleting_student_drops_sessions_and_enrollments() {
        let test_db = accounts_db().await;
        let student_id = test_db.user_id(STUDENT_EMAIL);
        let token = UserSession::generate_token();
        create_user_session(&test_db.pool, student_id, &token, hours_from_now(1))
            .await
            .unwrap();

        delete_student(&test_db.pool, student_id).await.unwrap();

        assert!(matches!(
            get_session_by_token(&test_db.pool, &token).await,
            Err(AppError::Authentication(_))
        ));
        assert!(get_enrollments(&test_db.pool, student_id)
            .await
            .unwrap()
            .is_empty());

        // admins are not students
        let admin = delete_student(&test_db.pool, test_db.user_id(ADMIN_EMAIL)).await;
        assert!(matches!(admin, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_enrollments_touches_only_differences() {
        let test_db = accounts_db().await;
        let student_id = test_db.user_id(STUDENT_EMAIL);
        let public_law = test_db.item_id(COURSE);
        let civil_law = test_db.item_id("Civil Law");

        let change = set_enrollments(&test_db.pool, student_id, &[civil_law, public_law])
            .await
            .unwrap();
        assert_eq!(
            change,
            EnrollmentChange {
                added: vec![civil_law],
                removed: vec![],
            }
        );

        let change = set_enrollments(&test_db.pool, student_id, &[]).await.unwrap();
        let mut removed = vec![public_law, civil_law];
        removed.sort_unstable();
        assert_eq!(change.removed, removed);
        assert!(get_enrollments(&test_db.pool, student_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_foreign_key_failures_are_validation_errors() {
        let test_db = accounts_db().await;
        let student_id = test_db.user_id(STUDENT_EMAIL);

        let err: AppError =
            sqlx::query("INSERT INTO enrollments (student_id, course_id) VALUES (?, 9999)")
                .bind(student_id)
                .execute(&test_db.pool)
                .await
                .unwrap_err()
                .into();
        assert!(matches!(err, AppError::Validation(_)));

        let unknown_course = set_enrollments(&test_db.pool, student_id, &[9999]).await;
        match unknown_course {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "Course 9999 does not exist"),
            other => panic!("expected a validation error, got {:?}", other),
        }
        let unknown_student = set_enrollments(&test_db.pool, 9999, &[]).await;
        assert!(matches!(unknown_student, Err(AppError::NotFound(_))));

        // other database failures never expose driver text
        let rocket::response::status::Custom(status, body) =
            AppError::Database(sqlx::Error::PoolTimedOut).to_validation_response();
        assert_eq!(status.code, 500);
        assert_eq!(body.errors["database"][0], "A database error occurred");
    }
}
