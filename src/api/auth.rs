use chrono::Utc;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::serde::json::Json;
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{AccountStatus, Role, User, UserSession, SESSION_COOKIE};
use crate::db::{authenticate_user, create_user, create_user_session, invalidate_session, NewUser};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::validation::{field_error, ApiResult, AppErrorExt, JsonValidateExt};

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user: User,
    pub home_route: String,
}

/// Runs an auth step under the configured wall-clock ceiling.
async fn with_auth_timeout<T, F>(config: &AppConfig, fut: F) -> Result<T, AppError>
where
    F: std::future::Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(config.auth_timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout("Authentication timed out".to_string())),
    }
}

fn start_session_cookie(cookies: &CookieJar<'_>, token: String, ttl_hours: i64) {
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::hours(ttl_hours));
    cookies.add_private(cookie);
}

#[post("/auth/sign-up", data = "<request>")]
pub async fn sign_up(
    request: Json<SignUpRequest>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<(Status, Json<crate::api::CreatedResponse>)> {
    let request = request.validate_custom()?;

    let id = with_auth_timeout(
        config,
        create_user(
            db,
            NewUser {
                name: request.name.trim(),
                email: request.email.trim(),
                role: Role::Student,
                status: AccountStatus::Active,
                password: Some(&request.password),
            },
        ),
    )
    .await
    .validate_custom()?;

    info!(user_id = id, "Student signed up");
    Ok((Status::Created, Json(crate::api::CreatedResponse { id })))
}

#[post("/auth/sign-in", data = "<request>")]
pub async fn sign_in(
    request: Json<SignInRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> ApiResult<Json<SignInResponse>> {
    let request = request.validate_custom()?;

    let user = with_auth_timeout(config, async {
        let user = authenticate_user(db, request.email.trim(), &request.password).await?;
        let Some(user) = user else {
            return Ok(None);
        };
        if !user.is_active() {
            return Ok(Some(user));
        }

        let token = UserSession::generate_token();
        let expires_at = Utc::now() + chrono::Duration::hours(config.session_ttl_hours);
        create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;
        start_session_cookie(cookies, token, config.session_ttl_hours);
        Ok::<_, AppError>(Some(user))
    })
    .await
    .validate_custom()?;

    match user {
        None => {
            warn!("Sign-in with invalid credentials");
            Err(field_error(
                Status::Unauthorized,
                "credentials",
                "Invalid email or password",
            ))
        }
        Some(user) if !user.is_active() => {
            warn!(user_id = user.id, "Sign-in attempt on an inactive account");
            Err(field_error(
                Status::Forbidden,
                "account",
                "This account is inactive",
            ))
        }
        Some(user) => {
            info!(user_id = user.id, role = %user.role, "User signed in");
            Ok(Json(SignInResponse {
                home_route: user.role.home_route().to_string(),
                user,
            }))
        }
    }
}

#[post("/auth/sign-out")]
pub async fn sign_out(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Sign-out");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    Status::NoContent
}

#[get("/me")]
pub async fn me(user: User) -> Json<User> {
    Json(user)
}

#[get("/me", rank = 2)]
pub async fn me_unauthorized() -> Status {
    Status::Unauthorized
}

pub fn routes() -> Vec<Route> {
    routes![sign_up, sign_in, sign_out, me, me_unauthorized]
}
