use std::collections::HashSet;

use chrono::NaiveDateTime;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::{
    auth::{AccountStatus, DbUser, Role, User},
    error::AppError,
    models::StudentSummary,
};

use super::SearchTerm;

const USER_COLUMNS: &str = "id, email, name, role, status, avatar_url, registration_date";

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub role: Role,
    pub status: AccountStatus,
    pub password: Option<&'a str>,
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<User>, AppError> {
    info!("Looking up user by email");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE LOWER(email) = LOWER(?)",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

/// Verifies credentials and returns the user when they match. Accounts without
/// a password can never sign in.
#[instrument(skip_all, fields(email))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct Credentials {
        id: i64,
        password: String,
    }

    let credentials = sqlx::query_as::<_, Credentials>(
        "SELECT id, password FROM users WHERE LOWER(email) = LOWER(?)",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(credentials) = credentials else {
        return Ok(None);
    };

    if credentials.password.is_empty() {
        return Ok(None);
    }

    match bcrypt::verify(password, &credentials.password) {
        Ok(true) => Ok(Some(get_user(pool, credentials.id).await?)),
        _ => Ok(None),
    }
}

#[instrument(skip_all, fields(email = %new_user.email, role = %new_user.role))]
pub async fn create_user(pool: &Pool<Sqlite>, new_user: NewUser<'_>) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_email(pool, new_user.email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Email '{}' is already registered",
            new_user.email
        )));
    }

    let hashed_password = match new_user.password {
        Some(password) if !password.is_empty() => bcrypt::hash(password, bcrypt::DEFAULT_COST)?,
        _ => String::new(),
    };

    let res = sqlx::query(
        "INSERT INTO users (email, name, role, status, password) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(new_user.email)
    .bind(new_user.name)
    .bind(new_user.role.as_str())
    .bind(new_user.status.as_str())
    .bind(hashed_password)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn update_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
    name: &str,
    email: &str,
    status: AccountStatus,
) -> Result<(), AppError> {
    info!("Updating student");

    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM users WHERE LOWER(email) = LOWER(?) AND id != ?",
    )
    .bind(email)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    if taken.is_some() {
        return Err(AppError::Conflict(format!(
            "Email '{}' is already registered",
            email
        )));
    }

    let res = sqlx::query(
        "UPDATE users SET name = ?, email = ?, status = ? WHERE id = ? AND role = 'student'",
    )
    .bind(name)
    .bind(email)
    .bind(status.as_str())
    .bind(student_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Student with id {} not found",
            student_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn delete_student(pool: &Pool<Sqlite>, student_id: i64) -> Result<(), AppError> {
    info!("Deleting student");
    let res = sqlx::query("DELETE FROM users WHERE id = ? AND role = 'student'")
        .bind(student_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Student with id {} not found",
            student_id
        )));
    }

    Ok(())
}

#[derive(sqlx::FromRow)]
struct DbStudentSummary {
    id: Option<i64>,
    email: Option<String>,
    name: Option<String>,
    role: Option<String>,
    status: Option<String>,
    avatar_url: Option<String>,
    registration_date: Option<NaiveDateTime>,
    enrolled_courses_count: Option<i64>,
}

/// Students ordered by name. `search` is a case-insensitive substring of the
/// name or email.
#[instrument]
pub async fn list_students(
    pool: &Pool<Sqlite>,
    search: Option<&str>,
    status: Option<AccountStatus>,
) -> Result<Vec<StudentSummary>, AppError> {
    info!("Listing students");

    let search = SearchTerm::parse(search);

    let rows = sqlx::query_as::<_, DbStudentSummary>(
        "SELECT u.id, u.email, u.name, u.role, u.status, u.avatar_url, u.registration_date,
                COUNT(e.course_id) AS enrolled_courses_count
         FROM users u
         LEFT JOIN enrollments e ON e.student_id = u.id
         WHERE u.role = 'student'
           AND (?1 IS NULL OR u.status = ?1)
         GROUP BY u.id
         ORDER BY u.name",
    )
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter(|row| {
            search
                .as_ref()
                .map_or(true, |term| {
                    term.matches(row.name.as_deref().unwrap_or_default())
                        || term.matches(row.email.as_deref().unwrap_or_default())
                })
        })
        .map(|row| {
            let count = row.enrolled_courses_count.unwrap_or_default();
            let user = User::from(DbUser {
                id: row.id,
                email: row.email,
                name: row.name,
                role: row.role,
                status: row.status,
                avatar_url: row.avatar_url,
                registration_date: row.registration_date,
            });
            StudentSummary::new(user, count)
        })
        .collect())
}

#[instrument]
pub async fn get_enrollments(pool: &Pool<Sqlite>, student_id: i64) -> Result<Vec<i64>, AppError> {
    info!("Getting student enrollments");
    let rows = sqlx::query_scalar::<_, i64>(
        "SELECT course_id FROM enrollments WHERE student_id = ? ORDER BY course_id",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[derive(Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EnrollmentChange {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
}

/// Brings a student's enrollments in line with `course_ids`, touching only the
/// rows that differ.
#[instrument]
pub async fn set_enrollments(
    pool: &Pool<Sqlite>,
    student_id: i64,
    course_ids: &[i64],
) -> Result<EnrollmentChange, AppError> {
    info!("Setting student enrollments");

    let student = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM users WHERE id = ? AND role = 'student'",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    if student.is_none() {
        return Err(AppError::NotFound(format!(
            "Student with id {} not found",
            student_id
        )));
    }

    let current: HashSet<i64> = get_enrollments(pool, student_id).await?.into_iter().collect();
    let desired: HashSet<i64> = course_ids.iter().copied().collect();

    let mut change = EnrollmentChange {
        added: desired.difference(&current).copied().collect(),
        removed: current.difference(&desired).copied().collect(),
    };
    change.added.sort_unstable();
    change.removed.sort_unstable();

    for course_id in &change.added {
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::Validation(format!(
                "Course {} does not exist",
                course_id
            )));
        }
    }

    let mut tx = pool.begin().await?;

    for course_id in &change.removed {
        sqlx::query("DELETE FROM enrollments WHERE student_id = ? AND course_id = ?")
            .bind(student_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
    }

    for course_id in &change.added {
        sqlx::query("INSERT INTO enrollments (student_id, course_id) VALUES (?, ?)")
            .bind(student_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(change)
}
