use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;

/// Whether a layered environment file was found and applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFileStatus {
    pub path: &'static str,
    pub loaded: bool,
}

/// Applies the layered env files. Runs before the tracing subscriber exists,
/// so it reports what it did instead of logging.
pub fn load_environment() -> Result<Vec<EnvFileStatus>, Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        ["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        ["config/common.env", "config/dev.env", ".secrets.env"]
    };

    env_files.into_iter().map(load_env_file).collect()
}

fn load_env_file(path: &'static str) -> Result<EnvFileStatus, Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Ok(EnvFileStatus {
            path,
            loaded: false,
        });
    }

    dotenvy::from_filename_override(path)?;
    Ok(EnvFileStatus { path, loaded: true })
}

/// Logs the outcome of `load_environment` once tracing is up.
pub fn log_env_files(files: &[EnvFileStatus]) {
    for file in files {
        if file.loaded {
            info!("Loaded environment from: {}", file.path);
        } else {
            warn!("Environment file {} not found, skipping", file.path);
        }
    }
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://study_portal.db?mode=rwc";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Runtime settings, read once at startup and handed to Rocket as managed state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_flash_model: String,
    pub gemini_pro_model: String,
    pub school_api_base_url: Option<String>,
    pub school_api_throttle: Duration,
    pub auth_timeout: Duration,
    pub session_ttl_hours: i64,
    pub extraction_chunk_size: usize,
    pub save_batch_size: usize,
    pub max_upload_mb: u64,
    pub ai_retry_attempts: u32,
    pub ai_retry_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_flash_model: "gemini-2.5-flash".to_string(),
            gemini_pro_model: "gemini-2.5-pro".to_string(),
            school_api_base_url: None,
            school_api_throttle: Duration::from_millis(1500),
            auth_timeout: Duration::from_secs(10),
            session_ttl_hours: 1,
            extraction_chunk_size: 20,
            save_batch_size: 50,
            max_upload_mb: 20,
            ai_retry_attempts: 3,
            ai_retry_delay: Duration::from_millis(1000),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        Ok(Self {
            database_url: string_var("DATABASE_URL").unwrap_or(defaults.database_url),
            gemini_api_key: string_var("GEMINI_API_KEY"),
            gemini_base_url: string_var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            gemini_flash_model: string_var("GEMINI_FLASH_MODEL")
                .unwrap_or(defaults.gemini_flash_model),
            gemini_pro_model: string_var("GEMINI_PRO_MODEL").unwrap_or(defaults.gemini_pro_model),
            school_api_base_url: string_var("SCHOOL_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            school_api_throttle: Duration::from_millis(parsed_var(
                "SCHOOL_API_THROTTLE_MS",
                defaults.school_api_throttle.as_millis() as u64,
            )?),
            auth_timeout: Duration::from_secs(parsed_var(
                "AUTH_TIMEOUT_SECS",
                defaults.auth_timeout.as_secs(),
            )?),
            session_ttl_hours: parsed_var("SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            extraction_chunk_size: positive(
                "EXTRACTION_CHUNK_SIZE",
                parsed_var("EXTRACTION_CHUNK_SIZE", defaults.extraction_chunk_size)?,
            )?,
            save_batch_size: positive(
                "SAVE_BATCH_SIZE",
                parsed_var("SAVE_BATCH_SIZE", defaults.save_batch_size)?,
            )?,
            max_upload_mb: parsed_var("MAX_UPLOAD_MB", defaults.max_upload_mb)?,
            ai_retry_attempts: parsed_var("AI_RETRY_ATTEMPTS", defaults.ai_retry_attempts)?,
            ai_retry_delay: Duration::from_millis(parsed_var(
                "AI_RETRY_DELAY_MS",
                defaults.ai_retry_delay.as_millis() as u64,
            )?),
        })
    }
}

fn string_var(key: &str) -> Option<String> {
    dotenvy::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match string_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::Internal(format!("Invalid value for {}: {} ({})", key, raw, e))),
        None => Ok(default),
    }
}

fn positive(key: &str, value: usize) -> Result<usize, AppError> {
    if value == 0 {
        return Err(AppError::Internal(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}
