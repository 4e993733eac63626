#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::{Arc, Once};
    use std::time::Duration;

    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use tracing::log::LevelFilter;

    use crate::ai::SharedAi;
    use crate::auth::{AccountStatus, Role};
    use crate::classbuild::SharedSchoolApi;
    use crate::db::{create_academic_item, create_user, set_enrollments, NewUser};
    use crate::env::AppConfig;
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{AcademicLevel, Choice};
    use crate::test::mock::{MockAi, MockSchoolApi};

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub const ADMIN_EMAIL: &str = "admin@example.com";
    pub const STUDENT_EMAIL: &str = "ana@example.com";
    pub const OTHER_STUDENT_EMAIL: &str = "bruno@example.com";
    pub const COURSE: &str = "Public Law";
    pub const MODULE: &str = "Foundations";
    pub const DISCIPLINE: &str = "Constitutional Law";
    pub const SUBJECT: &str = "Fundamental Rights";

    struct TestUser {
        email: String,
        name: String,
        role: Role,
        status: AccountStatus,
    }

    struct TestHierarchy {
        course: String,
        module: String,
        discipline: String,
        subject: String,
    }

    struct TestQuestion {
        id: i64,
        statement: String,
        correct: String,
        subject: Option<String>,
        batch: Option<String>,
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        hierarchies: Vec<TestHierarchy>,
        questions: Vec<TestQuestion>,
        enrollments: Vec<(String, String)>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn user(mut self, email: &str, name: &str, role: Role, status: AccountStatus) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                name: name.to_string(),
                role,
                status,
            });
            self
        }

        pub fn admin(self, email: &str, name: &str) -> Self {
            self.user(email, name, Role::Admin, AccountStatus::Active)
        }

        pub fn student(self, email: &str, name: &str) -> Self {
            self.user(email, name, Role::Student, AccountStatus::Active)
        }

        pub fn inactive_student(self, email: &str, name: &str) -> Self {
            self.user(email, name, Role::Student, AccountStatus::Inactive)
        }

        /// A course → module → discipline → subject chain.
        pub fn hierarchy(
            mut self,
            course: &str,
            module: &str,
            discipline: &str,
            subject: &str,
        ) -> Self {
            self.hierarchies.push(TestHierarchy {
                course: course.to_string(),
                module: module.to_string(),
                discipline: discipline.to_string(),
                subject: subject.to_string(),
            });
            self
        }

        /// A four-choice question (A to D) with the given correct letter.
        pub fn question(
            mut self,
            id: i64,
            statement: &str,
            correct: &str,
            subject: Option<&str>,
        ) -> Self {
            self.questions.push(TestQuestion {
                id,
                statement: statement.to_string(),
                correct: correct.to_string(),
                subject: subject.map(String::from),
                batch: None,
            });
            self
        }

        pub fn batched_question(mut self, id: i64, statement: &str, batch: &str) -> Self {
            self.questions.push(TestQuestion {
                id,
                statement: statement.to_string(),
                correct: "A".to_string(),
                subject: None,
                batch: Some(batch.to_string()),
            });
            self
        }

        pub fn enroll(mut self, email: &str, course: &str) -> Self {
            self.enrollments.push((email.to_string(), course.to_string()));
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;

            let mut user_id_map = HashMap::new();
            for user in &self.users {
                let id = create_user(
                    &pool,
                    NewUser {
                        name: &user.name,
                        email: &user.email,
                        role: user.role,
                        status: user.status,
                        password: Some(STANDARD_PASSWORD),
                    },
                )
                .await?;
                user_id_map.insert(user.email.clone(), id);
            }

            let mut item_id_map: HashMap<String, i64> = HashMap::new();
            for chain in &self.hierarchies {
                let mut parent = None;
                for (level, description) in [
                    (AcademicLevel::Courses, &chain.course),
                    (AcademicLevel::Modules, &chain.module),
                    (AcademicLevel::Disciplines, &chain.discipline),
                    (AcademicLevel::Subjects, &chain.subject),
                ] {
                    let id = match item_id_map.get(description) {
                        Some(id) => *id,
                        None => {
                            let id = create_academic_item(&pool, level, description, parent).await?;
                            item_id_map.insert(description.clone(), id);
                            id
                        }
                    };
                    parent = Some(id);
                }
            }

            let choices = serde_json::to_string(
                &["A", "B", "C", "D"]
                    .iter()
                    .map(|letter| Choice {
                        letter: letter.to_string(),
                        text: format!("Option {}", letter),
                    })
                    .collect::<Vec<_>>(),
            )
            .map_err(|e| AppError::Internal(e.to_string()))?;

            for question in &self.questions {
                let subject_id = question
                    .subject
                    .as_ref()
                    .and_then(|s| item_id_map.get(s).copied());
                let discipline_id = match subject_id {
                    Some(id) => {
                        sqlx::query_scalar::<_, i64>("SELECT discipline_id FROM subjects WHERE id = ?")
                            .bind(id)
                            .fetch_optional(&pool)
                            .await?
                    }
                    None => None,
                };

                sqlx::query(
                    "INSERT INTO questions (id, statement, choices, correct, resolution, discipline_id, subject_id, batch)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(question.id)
                .bind(&question.statement)
                .bind(&choices)
                .bind(&question.correct)
                .bind(format!("Because {} is correct", question.correct))
                .bind(discipline_id)
                .bind(subject_id)
                .bind(&question.batch)
                .execute(&pool)
                .await?;
            }

            let mut courses_by_student: HashMap<i64, Vec<i64>> = HashMap::new();
            for (email, course) in &self.enrollments {
                if let (Some(student), Some(course)) = (user_id_map.get(email), item_id_map.get(course)) {
                    courses_by_student.entry(*student).or_default().push(*course);
                }
            }
            for (student, courses) in courses_by_student {
                set_enrollments(&pool, student, &courses).await?;
            }

            Ok(TestDb {
                pool,
                user_id_map,
                item_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub item_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, email: &str) -> i64 {
            self.user_id_map[email]
        }

        /// Id of a course, module, discipline or subject by description.
        pub fn item_id(&self, description: &str) -> i64 {
            self.item_id_map[description]
        }
    }

    /// An admin, two students (one enrolled), one full hierarchy and three
    /// questions under its subject.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin(ADMIN_EMAIL, "Admin User")
            .student(STUDENT_EMAIL, "Ana Student")
            .student(OTHER_STUDENT_EMAIL, "Bruno Student")
            .hierarchy(COURSE, MODULE, DISCIPLINE, SUBJECT)
            .question(1, "Which article guarantees equality?", "A", Some(SUBJECT))
            .question(2, "Which remedy protects liberty?", "B", Some(SUBJECT))
            .question(3, "Who may propose amendments?", "C", Some(SUBJECT))
            .enroll(STUDENT_EMAIL, COURSE)
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            school_api_throttle: Duration::ZERO,
            ai_retry_delay: Duration::from_millis(1),
            extraction_chunk_size: 2,
            save_batch_size: 2,
            max_upload_mb: 1,
            ..AppConfig::default()
        }
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        setup_test_client_with(test_db, Arc::new(MockAi::new()), Arc::new(MockSchoolApi::new())).await
    }

    pub async fn setup_test_client_with(
        test_db: TestDb,
        ai: SharedAi,
        school: SharedSchoolApi,
    ) -> (Client, TestDb) {
        setup_test_client_with_config(test_db, test_config(), ai, school).await
    }

    pub async fn setup_test_client_with_config(
        test_db: TestDb,
        config: AppConfig,
        ai: SharedAi,
        school: SharedSchoolApi,
    ) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), config, ai, school);
        let client = Client::untracked(rocket)
            .await
            .expect("Failed to build Rocket client");
        (client, test_db)
    }

    pub async fn login_test_user(client: &Client, email: &str, password: &str) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/auth/sign-in")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "Sign-in failed for {}", email);

        response
            .cookies()
            .iter()
            .map(|cookie| cookie.clone().into_owned())
            .collect()
    }
}
