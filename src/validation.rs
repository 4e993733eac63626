use crate::error::AppError;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

pub type ApiError = Custom<Json<ValidationResponse>>;
pub type ApiResult<T> = Result<T, ApiError>;

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub fn field_error(status: Status, field: &str, message: &str) -> ApiError {
    Custom(status, Json(ValidationResponse::with_error(field, message)))
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> ApiError;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(sqlx::Error::RowNotFound) => {
                ("resource", "Not found: row not found".to_string())
            }
            AppError::Database(_) => ("database", "A database error occurred".to_string()),
            AppError::Authentication(msg) => ("authentication", msg.clone()),
            AppError::Authorization(msg) => {
                ("authorization", format!("Permission denied: {}", msg))
            }
            AppError::NotFound(msg) => ("resource", format!("Not found: {}", msg)),
            AppError::Validation(msg) => ("validation", msg.clone()),
            AppError::Conflict(msg) => ("resource", msg.clone()),
            AppError::ExternalService(msg) => ("service", msg.clone()),
            AppError::Timeout(msg) => ("timeout", msg.clone()),
            AppError::Internal(_) => ("server", "Internal server error".to_string()),
        };

        field_error(status, field, &message)
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        let (field, message) = match self {
            s if s == Status::Forbidden => (
                "permission",
                "You don't have permission to perform this action",
            ),
            s if s == Status::Unauthorized => ("authentication", "Authentication required"),
            s if s == Status::NotFound => ("resource", "Resource not found"),
            s if s == Status::Conflict => ("resource", "Resource already exists"),
            s if s == Status::BadRequest => ("request", "Bad request"),
            s if s == Status::UnprocessableEntity => ("validation", "Validation failed"),
            s if s == Status::InternalServerError => ("server", "Internal server error"),
            s if s == Status::ServiceUnavailable => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        field_error(self, field, message)
    }
}

impl From<validator::ValidationErrors> for ValidationResponse {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();

            error_map.insert(field.to_string(), messages);
        }

        ValidationResponse::new(error_map)
    }
}

/// Runs `validator` rules on a JSON body, answering 422 with per-field messages.
pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> ApiResult<T> {
        let inner = self.into_inner();
        validate_value(&inner)?;
        Ok(inner)
    }
}

/// Same rules as [`JsonValidateExt`] for values nested inside a request body.
pub fn validate_value<T: Validate>(value: &T) -> ApiResult<()> {
    value.validate().map_err(|errors| {
        tracing::warn!(errors = %errors, "Request body failed validation");
        Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::from(errors)),
        )
    })
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> ApiResult<T>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> ApiResult<T> {
        self.map_err(|err| err.to_validation_response())
    }
}

pub trait PermissionCheckExt {
    fn validate_custom(self) -> ApiResult<()>;
}

impl PermissionCheckExt for Result<(), Status> {
    fn validate_custom(self) -> ApiResult<()> {
        self.map_err(|status| status.to_validation_response())
    }
}

/// Rejects blank strings with a field-specific message.
pub fn require_non_blank(field: &str, value: &str, message: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(field_error(Status::UnprocessableEntity, field, message))
    } else {
        Ok(())
    }
}
