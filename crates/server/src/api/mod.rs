use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;

use loadline_core::clock::SystemClock;
use loadline_core::errors::{ApplicationError, NegotiationError};
use loadline_core::negotiation::lifecycle::LifecycleManager;
use loadline_db::repositories::{
    CallRepository, CarrierRepository, LoadRepository, RepositoryError, SqlNegotiationStore,
};

use crate::bootstrap::TracingAuditSink;
use crate::fmcsa::{FmcsaError, FmcsaVerifier};

pub mod calls;
pub mod carriers;
pub mod loads;
pub mod negotiations;

pub type Lifecycle = LifecycleManager<SqlNegotiationStore, SystemClock, TracingAuditSink>;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<Lifecycle>,
    pub calls: Arc<dyn CallRepository>,
    pub loads: Arc<dyn LoadRepository>,
    pub carriers: Arc<dyn CarrierRepository>,
    pub verifier: Arc<dyn FmcsaVerifier>,
}

pub fn router(state: AppState) -> Router {
    Router::new().nest(
        "/api/v1",
        Router::new()
            .merge(negotiations::routes())
            .merge(calls::routes())
            .merge(loads::routes())
            .merge(carriers::routes())
            .with_state(state),
    )
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict { kind: &'static str, message: String },
    Unavailable(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "{message}"),
            Self::NotFound(message) => write!(f, "{message}"),
            Self::Conflict { message, .. } => write!(f, "{message}"),
            Self::Unavailable(message) => write!(f, "{message}"),
            Self::Internal(message) => write!(f, "{message}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            Self::Conflict { kind, message } => (StatusCode::CONFLICT, kind, message),
            Self::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
            }
            Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Negotiation(negotiation) => match &negotiation {
                NegotiationError::NotFound(_) => Self::NotFound(negotiation.to_string()),
                NegotiationError::DuplicateId(_) => {
                    Self::Conflict { kind: "duplicate_id", message: negotiation.to_string() }
                }
                NegotiationError::InvalidState { .. } => {
                    Self::Conflict { kind: "invalid_state", message: negotiation.to_string() }
                }
                NegotiationError::Expired(_) => {
                    Self::Conflict { kind: "expired", message: negotiation.to_string() }
                }
                NegotiationError::RoundLimitExceeded(_) => Self::Conflict {
                    kind: "round_limit_exceeded",
                    message: negotiation.to_string(),
                },
            },
            ApplicationError::Persistence(message) => Self::Unavailable(message),
            ApplicationError::Configuration(message) => Self::Internal(message),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict => {
                Self::Conflict { kind: "duplicate_id", message: "record already exists".to_string() }
            }
            RepositoryError::NotFound => Self::NotFound("record was not found".to_string()),
            RepositoryError::Database(inner) => Self::Unavailable(inner.to_string()),
            RepositoryError::Decode(message) => Self::Internal(message),
        }
    }
}

impl From<FmcsaError> for ApiError {
    fn from(error: FmcsaError) -> Self {
        Self::Unavailable(error.to_string())
    }
}
