#[macro_use]
extern crate rocket;

mod ai;
mod api;
mod auth;
mod classbuild;
mod db;
mod env;
mod error;
mod extraction;
mod models;
mod telemetry;
mod validation;
#[cfg(test)]
mod test;

use std::sync::Arc;
use std::time::Duration;

use ai::{GeminiClient, SharedAi};
use auth::{default_api, forbidden_api, unauthorized_api};
use classbuild::{ClassbuildClient, SharedSchoolApi};
use db::clean_expired_sessions;
use env::{load_environment, log_env_files, AppConfig};
use error::AppError;
use rocket::{tokio, Build, Rocket};
use sqlx::SqlitePool;
use telemetry::{init_tracing, TelemetryFairing};
use thiserror::Error;
use tracing::{error, info};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const OUTBOUND_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum Error {
    #[error("Environment error: {0}")]
    Environment(String),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    // RUST_LOG and the OTLP settings may come from the env files
    let env_files = load_environment().map_err(|e| Error::Environment(e.to_string()))?;
    let _otel = init_tracing();
    log_env_files(&env_files);

    let config = AppConfig::from_env()?;

    let pool = SqlitePool::connect(&config.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        e
    })?;
    info!("Migrations completed successfully");

    spawn_session_sweep(pool.clone());

    let http = reqwest::Client::builder()
        .timeout(OUTBOUND_HTTP_TIMEOUT)
        .build()?;
    let ai: SharedAi = Arc::new(GeminiClient::new(&config, http.clone()));
    let school: SharedSchoolApi = Arc::new(ClassbuildClient::new(
        http,
        config.school_api_base_url.clone(),
    ));

    let _rocket = init_rocket(pool, config, ai, school).launch().await?;
    Ok(())
}

fn spawn_session_sweep(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(SESSION_SWEEP_INTERVAL).await;
        }
    });
}

pub fn init_rocket(
    pool: SqlitePool,
    config: AppConfig,
    ai: SharedAi,
    school: SharedSchoolApi,
) -> Rocket<Build> {
    info!("Starting study portal");

    rocket::build()
        .manage(pool)
        .manage(config)
        .manage(ai)
        .manage(school)
        .mount("/api", api::routes())
        .register(
            "/api",
            catchers![unauthorized_api, forbidden_api, default_api],
        )
        .attach(TelemetryFairing)
}
