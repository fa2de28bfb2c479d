use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::models::user_context::UserType;

pub type AppResult<T> = Result<T, AppError>;
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Failure of the underlying profile/assignment storage.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("unique constraint violated: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    /// Maps sqlite unique-index violations to `Conflict`, everything else to `Database`.
    pub fn from_write(err: sqlx::Error, what: &str) -> Self {
        let is_unique = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);
        if is_unique {
            Self::Conflict(what.to_string())
        } else {
            Self::Database(err)
        }
    }
}

/// Domain errors raised by the authorization core's mutation entry points.
#[derive(thiserror::Error, Debug)]
pub enum AuthzError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("access denied: insufficient permissions for {action} on {resource}")]
    AccessDenied { resource: String, action: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(StoreError),
}

impl AuthzError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn access_denied(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self::AccessDenied {
            resource: resource.into(),
            action: action.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for AuthzError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(what) => Self::Conflict(what),
            other => Self::Store(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("access denied: insufficient permissions for {action} on {resource}")]
    AccessDenied { resource: String, action: String },
    #[error("{reason}")]
    PaymentDenied {
        reason: String,
        user_type: Option<UserType>,
        organization_id: Option<Uuid>,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<AuthzError> for AppError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::NotFound(msg) => Self::NotFound(msg),
            AuthzError::AccessDenied { resource, action } => Self::AccessDenied { resource, action },
            AuthzError::Validation(msg) => Self::BadRequest(msg),
            AuthzError::Conflict(msg) => Self::Conflict(msg),
            AuthzError::Store(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[derive(Serialize)]
struct RequiredPermission {
    resource: String,
    action: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<RequiredPermission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<Uuid>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            AppError::PaymentDenied { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = match &self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::AccessDenied { .. } => "forbidden",
            AppError::PaymentDenied { .. } => "payment_denied",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        };

        // 5xx bodies never carry internal detail
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut payload = ErrorResponse {
            error: error.to_string(),
            message,
            required: None,
            reason: None,
            user_type: None,
            organization_id: None,
        };

        match self {
            AppError::AccessDenied { resource, action } => {
                payload.required = Some(RequiredPermission { resource, action });
            }
            AppError::PaymentDenied {
                reason,
                user_type,
                organization_id,
            } => {
                payload.reason = Some(reason);
                payload.user_type = user_type;
                payload.organization_id = organization_id;
            }
            _ => {}
        }

        (status, Json(payload)).into_response()
    }
}
