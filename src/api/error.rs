use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::clients::ProviderError;
use crate::services::{AuthError, FederatedError, ThreatError};

#[derive(Debug)]
pub enum ApiError {
    ValidationError(String),

    Unauthorized(String),

    Forbidden(String),

    RateLimited(String),

    Conflict(String),

    UpstreamFailure { service: String, message: String },

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::RateLimited(msg) => write!(f, "Rate limited: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::UpstreamFailure { service, message } => write!(f, "{service} error: {message}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::Conflict(_) | Self::UpstreamFailure { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    fn account_locked(until: chrono::DateTime<chrono::Utc>) -> Self {
        Self::Forbidden(format!(
            "Account is locked until {}",
            until.format("%Y-%m-%d %H:%M:%S UTC")
        ))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "A database error occurred".to_string()
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            Self::UpstreamFailure { service, message } => {
                tracing::warn!("{} login failed: {}", service, message);
                format!("{service} authorization failed: {message}")
            }
            Self::ValidationError(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::RateLimited(msg)
            | Self::Conflict(msg) => msg,
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::ValidationError(rejection.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::Unauthorized(msg) => Self::Unauthorized(msg),
            AuthError::AccountLocked { until } => Self::account_locked(until),
            AuthError::AccountInactive => Self::Forbidden(err.to_string()),
            AuthError::Forbidden(msg) => Self::Forbidden(msg),
            AuthError::RateLimited => Self::RateLimited(err.to_string()),
            AuthError::Conflict(msg) => Self::Conflict(msg),
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(_) => Self::InternalError(err.to_string()),
            ProviderError::InvalidSignature(_) => Self::Unauthorized(err.to_string()),
            ProviderError::Rejected { provider, reason } => Self::UpstreamFailure {
                service: provider.to_string(),
                message: reason,
            },
            ProviderError::Transport { provider, source } => Self::UpstreamFailure {
                service: provider.to_string(),
                message: source.to_string(),
            },
        }
    }
}

impl From<FederatedError> for ApiError {
    fn from(err: FederatedError) -> Self {
        match err {
            FederatedError::Validation(msg) => Self::ValidationError(msg),
            FederatedError::Provider(e) => e.into(),
            FederatedError::Conflict(msg) => Self::Conflict(msg),
            FederatedError::AccountLocked { until } => Self::account_locked(until),
            FederatedError::AccountInactive => Self::Forbidden(err.to_string()),
            FederatedError::Database(msg) => Self::DatabaseError(msg),
            FederatedError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<ThreatError> for ApiError {
    fn from(err: ThreatError) -> Self {
        match err {
            ThreatError::Validation(msg) => Self::ValidationError(msg),
            ThreatError::Database(msg) => Self::DatabaseError(msg),
            ThreatError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuthProvider;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::RateLimited).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::from(AuthError::Conflict("dup".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::AccountInactive).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ProviderError::NotConfigured(AuthProvider::Vk)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(ProviderError::rejected(AuthProvider::Yandex, "bad code")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FederatedError::Provider(ProviderError::InvalidSignature(
                "mismatch".into()
            )))
            .status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn lock_message_cites_expiry() {
        let until = chrono::DateTime::parse_from_rfc3339("2030-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let err = ApiError::from(AuthError::AccountLocked { until });
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("2030-01-02 03:04:05 UTC"));
    }
}
