use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use chrono::{DateTime, Utc};

use serde::Serialize;

use thiserror::Error;

use crate::auth::AuthError;
use crate::repo::StoreError;
use crate::service::SubscriptionError;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Failed to authenticate")]
    FailedToAuthenticate(#[source] anyhow::Error),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Failed to send email")]
    FailedToSendEmail(#[source] anyhow::Error),

    #[error("Internal Server Error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for RestError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error.cause_chain = ?e, "Store operation failed");
        Self::InternalError("Database error".into())
    }
}

impl From<AuthError> for RestError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials(e) => Self::FailedToAuthenticate(e),
            AuthError::Unexpected(e) => Self::Other(e),
        }
    }
}

impl From<SubscriptionError> for RestError {
    fn from(e: SubscriptionError) -> Self {
        use SubscriptionError as E;
        match e {
            E::InvalidVerification => Self::Rejected("Human verification failed".into()),
            E::AlreadyVerified(email) => {
                Self::Conflict(format!("{} is already subscribed", email))
            }
            E::VerificationPending(email) => Self::Rejected(format!(
                "A verification email was already sent to {}, please check your inbox",
                email
            )),
            E::NotFound => Self::NotFound("Subscription not found".into()),
            E::TokenExpired => Self::Gone("Verification link has expired".into()),
            E::EmailDeliveryFailed(e) => Self::FailedToSendEmail(e),
            E::Store(e) => e.into(),
            E::Gate(e) => Self::Other(e.context("Human verification unavailable")),
        }
    }
}

/// JSON body of every error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl RestError {
    /// Message safe to show to API clients. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::ParseError(msg)
            | Self::Rejected(msg)
            | Self::Conflict(msg)
            | Self::NotFound(msg)
            | Self::Gone(msg) => msg.clone(),
            Self::FailedToAuthenticate(_) => "Invalid or missing credentials".into(),
            Self::FailedToSendEmail(_) => "Failed to send email".into(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".into(),
        }
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ParseError(_) | Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::FailedToAuthenticate(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::FailedToSendEmail(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error.cause_chain = ?self, "Request failed");
        }

        HttpResponse::build(status).json(ApiError {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: self.public_message(),
        })
    }
}
