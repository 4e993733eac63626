use rand::seq::SliceRandom;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::ai::{ChatMessage, SharedAi};
use crate::auth::{Permission, User};
use crate::db::{
    answered_question_ids, count_questions_for_subject, get_academic_item, get_gamification_stats,
    get_question, has_answered, hints_used, is_enrolled_in_subject, list_academic_items,
    list_decks, list_enrolled_courses, list_materials, list_questions_for_subject, record_hint,
    record_practice_answer, restart_subject_practice, subject_progress, PracticeAnswerInput,
};
use crate::models::{
    AcademicItem, AcademicLevel, FlashcardDeck, GamificationStats, PracticeProgress,
    PracticeQuestion, Question, StudyMaterial, MAX_HINTS_PER_QUESTION, XP_PER_CORRECT_ANSWER,
};
use crate::validation::{
    field_error, require_non_blank, ApiResult, AppErrorExt, PermissionCheckExt,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectOverview {
    pub subject: AcademicItem,
    pub materials: Vec<StudyMaterial>,
    pub decks: Vec<FlashcardDeck>,
    pub question_count: i64,
    pub progress: PracticeProgress,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisciplineOverview {
    pub discipline: AcademicItem,
    pub subjects: Vec<SubjectOverview>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModuleOverview {
    pub module: AcademicItem,
    pub disciplines: Vec<DisciplineOverview>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CourseOverview {
    pub course: AcademicItem,
    pub modules: Vec<ModuleOverview>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PracticeSession {
    pub subject_id: i64,
    pub questions: Vec<PracticeQuestion>,
    pub total_questions: usize,
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub selected: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_letter: String,
    pub resolution: Option<String>,
    pub xp_gained: i64,
    pub stats: GamificationStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HintResponse {
    pub hint: String,
    pub hints_used: i64,
    pub hints_remaining: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RestartResponse {
    pub cleared: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

async fn subject_overview(
    db: &Pool<Sqlite>,
    student_id: i64,
    subject: AcademicItem,
) -> ApiResult<SubjectOverview> {
    let materials = list_materials(db, None, Some(subject.id))
        .await
        .validate_custom()?;
    let decks = list_decks(db, Some(student_id), Some(subject.id))
        .await
        .validate_custom()?;
    let question_count = count_questions_for_subject(db, subject.id)
        .await
        .validate_custom()?;
    let progress = subject_progress(db, student_id, subject.id)
        .await
        .validate_custom()?;

    Ok(SubjectOverview {
        subject,
        materials,
        decks,
        question_count,
        progress,
    })
}

/// Enrolled courses down to subjects, with the student's progress per subject.
#[get("/study/overview")]
pub async fn overview(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<CourseOverview>>> {
    user.require_permission(Permission::Practice)
        .validate_custom()?;

    let mut courses = Vec::new();
    for course in list_enrolled_courses(db, user.id).await.validate_custom()? {
        let mut modules = Vec::new();
        for module in list_academic_items(db, AcademicLevel::Modules, Some(course.id))
            .await
            .validate_custom()?
        {
            let mut disciplines = Vec::new();
            for discipline in list_academic_items(db, AcademicLevel::Disciplines, Some(module.id))
                .await
                .validate_custom()?
            {
                let mut subjects = Vec::new();
                for subject in list_academic_items(db, AcademicLevel::Subjects, Some(discipline.id))
                    .await
                    .validate_custom()?
                {
                    subjects.push(subject_overview(db, user.id, subject).await?);
                }
                disciplines.push(DisciplineOverview {
                    discipline,
                    subjects,
                });
            }
            modules.push(ModuleOverview {
                module,
                disciplines,
            });
        }
        courses.push(CourseOverview { course, modules });
    }

    Ok(Json(courses))
}

/// Unanswered questions of the subject in random order.
#[get("/study/subjects/<id>/practice")]
pub async fn practice(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<PracticeSession>> {
    user.require_permission(Permission::Practice)
        .validate_custom()?;

    get_academic_item(db, AcademicLevel::Subjects, id)
        .await
        .validate_custom()?;
    require_enrollment(db, &user, id).await?;

    let questions = list_questions_for_subject(db, id).await.validate_custom()?;
    let answered = answered_question_ids(db, user.id, id)
        .await
        .validate_custom()?;

    let total_questions = questions.len();
    let mut remaining: Vec<PracticeQuestion> = questions
        .into_iter()
        .filter(|q| !answered.contains(&q.id))
        .map(PracticeQuestion::from)
        .collect();
    remaining.shuffle(&mut rand::rng());

    Ok(Json(PracticeSession {
        subject_id: id,
        completed: total_questions > 0 && remaining.is_empty(),
        questions: remaining,
        total_questions,
    }))
}

/// Students practice only subjects of courses they are enrolled in. Staff who
/// manage the question bank may practice anything.
async fn require_enrollment(db: &Pool<Sqlite>, user: &User, subject_id: i64) -> ApiResult<()> {
    if user.has_permission(Permission::ManageQuestions) {
        return Ok(());
    }
    if !is_enrolled_in_subject(db, user.id, subject_id)
        .await
        .validate_custom()?
    {
        return Err(field_error(
            Status::Forbidden,
            "enrollment",
            "You are not enrolled in the course of this subject",
        ));
    }
    Ok(())
}

async fn practice_question(db: &Pool<Sqlite>, user: &User, id: i64) -> ApiResult<Question> {
    let question = get_question(db, id).await.validate_custom()?;
    let Some(subject_id) = question.subject_id else {
        return Err(field_error(
            Status::UnprocessableEntity,
            "question",
            "This question is not linked to a subject",
        ));
    };
    require_enrollment(db, user, subject_id).await?;
    Ok(question)
}

#[post("/study/questions/<id>/answer", data = "<request>")]
pub async fn answer(
    id: i64,
    request: Json<AnswerRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<AnswerResponse>> {
    user.require_permission(Permission::Practice)
        .validate_custom()?;
    require_non_blank("selected", &request.selected, "Choose an answer")?;

    let question = practice_question(db, &user, id).await?;
    let selected = request.selected.trim().to_uppercase();
    let correct = selected == question.correct.trim().to_uppercase();
    let xp_gained = if correct { XP_PER_CORRECT_ANSWER } else { 0 };

    record_practice_answer(
        db,
        PracticeAnswerInput {
            student_id: user.id,
            question_id: id,
            selected: &selected,
            correct,
            xp_gained,
        },
    )
    .await
    .validate_custom()?;

    let stats = get_gamification_stats(db, user.id)
        .await
        .validate_custom()?;
    info!(question_id = id, correct, xp_gained, "Practice answer recorded");

    Ok(Json(AnswerResponse {
        correct,
        correct_letter: question.correct,
        resolution: question.resolution,
        xp_gained,
        stats,
    }))
}

#[post("/study/questions/<id>/hint")]
pub async fn hint(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
    ai: &State<SharedAi>,
) -> ApiResult<Json<HintResponse>> {
    user.require_permission(Permission::Practice)
        .validate_custom()?;

    let question = practice_question(db, &user, id).await?;
    if has_answered(db, user.id, id).await.validate_custom()? {
        return Err(field_error(
            Status::Conflict,
            "hint",
            "This question has already been answered",
        ));
    }
    let used = hints_used(db, user.id, id).await.validate_custom()?;
    if used >= MAX_HINTS_PER_QUESTION {
        return Err(field_error(
            Status::UnprocessableEntity,
            "hint",
            &format!(
                "You have used all {} hints for this question",
                MAX_HINTS_PER_QUESTION
            ),
        ));
    }

    let hint = ai.generate_hint(&question, used).await.validate_custom()?;
    let hints_used = record_hint(db, user.id, id)
        .await
        .validate_custom()?;

    Ok(Json(HintResponse {
        hint,
        hints_used,
        hints_remaining: (MAX_HINTS_PER_QUESTION - hints_used).max(0),
    }))
}

#[post("/study/subjects/<id>/restart")]
pub async fn restart(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<RestartResponse>> {
    user.require_permission(Permission::Practice)
        .validate_custom()?;

    get_academic_item(db, AcademicLevel::Subjects, id)
        .await
        .validate_custom()?;
    require_enrollment(db, &user, id).await?;

    let cleared = restart_subject_practice(db, user.id, id)
        .await
        .validate_custom()?;
    Ok(Json(RestartResponse { cleared }))
}

#[get("/study/stats")]
pub async fn stats(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Json<GamificationStats>> {
    user.require_permission(Permission::Practice)
        .validate_custom()?;

    Ok(Json(get_gamification_stats(db, user.id).await.validate_custom()?))
}

#[post("/assistant/chat", data = "<request>")]
pub async fn chat(
    request: Json<ChatRequest>,
    user: User,
    ai: &State<SharedAi>,
) -> ApiResult<Json<ChatResponse>> {
    user.require_permission(Permission::UseAssistant)
        .validate_custom()?;
    require_non_blank("message", &request.message, "Type a message")?;

    let reply = ai
        .chat(&request.history, request.message.trim())
        .await
        .validate_custom()?;
    Ok(Json(ChatResponse { reply }))
}

pub fn routes() -> Vec<Route> {
    routes![overview, practice, answer, hint, restart, stats, chat]
}
