#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serial_test::serial;

    use crate::env::{load_environment, AppConfig, EnvFileStatus, DEFAULT_DATABASE_URL};
    use crate::error::AppError;

    const KEYS: [&str; 8] = [
        "DATABASE_URL",
        "GEMINI_API_KEY",
        "SCHOOL_API_BASE_URL",
        "SCHOOL_API_THROTTLE_MS",
        "EXTRACTION_CHUNK_SIZE",
        "SAVE_BATCH_SIZE",
        "MAX_UPLOAD_MB",
        "AI_RETRY_ATTEMPTS",
    ];

    /// Every known key, unset unless listed in `overrides`.
    fn env_with(
        overrides: &[(&'static str, &'static str)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        KEYS.iter()
            .map(|key| {
                let value = overrides.iter().find(|(k, _)| k == key).map(|(_, v)| *v);
                (*key, value)
            })
            .collect()
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        temp_env::with_vars(env_with(&[]), || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
            assert_eq!(config.gemini_api_key, None);
            assert_eq!(config.school_api_base_url, None);
            assert_eq!(config.school_api_throttle, Duration::from_millis(1500));
            assert_eq!(config.extraction_chunk_size, 20);
            assert_eq!(config.save_batch_size, 50);
            assert_eq!(config.max_upload_mb, 20);
            assert_eq!(config.ai_retry_attempts, 3);
        });
    }

    #[test]
    #[serial]
    fn test_overrides_are_trimmed_and_parsed() {
        let vars = env_with(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("GEMINI_API_KEY", "  secret  "),
            ("SCHOOL_API_BASE_URL", "https://school.example.com/api/"),
            ("SCHOOL_API_THROTTLE_MS", "250"),
            ("EXTRACTION_CHUNK_SIZE", "5"),
            ("AI_RETRY_ATTEMPTS", "0"),
        ]);

        temp_env::with_vars(vars, || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.database_url, "sqlite::memory:");
            assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
            assert_eq!(
                config.school_api_base_url.as_deref(),
                Some("https://school.example.com/api")
            );
            assert_eq!(config.school_api_throttle, Duration::from_millis(250));
            assert_eq!(config.extraction_chunk_size, 5);
            assert_eq!(config.ai_retry_attempts, 0);
        });
    }

    #[test]
    #[serial]
    fn test_blank_values_fall_back_to_defaults() {
        let vars = env_with(&[("GEMINI_API_KEY", "   "), ("MAX_UPLOAD_MB", "")]);

        temp_env::with_vars(vars, || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.gemini_api_key, None);
            assert_eq!(config.max_upload_mb, 20);
        });
    }

    #[test]
    #[serial]
    fn test_invalid_numbers_are_rejected() {
        let vars = env_with(&[("MAX_UPLOAD_MB", "twenty")]);

        temp_env::with_vars(vars, || match AppConfig::from_env() {
            Err(AppError::Internal(msg)) => {
                assert!(msg.starts_with("Invalid value for MAX_UPLOAD_MB: twenty"))
            }
            other => panic!("expected a config error, got {:?}", other),
        });
    }

    #[test]
    #[serial]
    fn test_batch_sizes_must_be_positive() {
        let vars = env_with(&[("SAVE_BATCH_SIZE", "0")]);

        temp_env::with_vars(vars, || match AppConfig::from_env() {
            Err(AppError::Internal(msg)) => {
                assert_eq!(msg, "SAVE_BATCH_SIZE must be greater than zero")
            }
            other => panic!("expected a config error, got {:?}", other),
        });
    }

    #[test]
    #[serial]
    fn test_env_files_feed_log_filter_and_report_status() {
        let vars: [(&str, Option<&str>); 8] = [
            ("ROCKET_PROFILE", None),
            ("RUST_LOG", None),
            ("EXTRACTION_CHUNK_SIZE", None),
            ("SAVE_BATCH_SIZE", None),
            ("SCHOOL_API_THROTTLE_MS", None),
            ("AUTH_TIMEOUT_SECS", None),
            ("DATABASE_URL", None),
            ("SESSION_TTL_HOURS", None),
        ];

        temp_env::with_vars(vars, || {
            let files = load_environment().unwrap();

            // the subscriber reads RUST_LOG after this, so it must already be set
            assert_eq!(std::env::var("RUST_LOG").as_deref(), Ok("info"));
            assert_eq!(
                &files[..2],
                &[
                    EnvFileStatus {
                        path: "config/common.env",
                        loaded: true,
                    },
                    EnvFileStatus {
                        path: "config/dev.env",
                        loaded: true,
                    },
                ]
            );
            assert_eq!(files[2].path, ".secrets.env");
        });
    }
}
