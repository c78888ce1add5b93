use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::view_model::{ActionOutcome, LoadOutcome};

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
        }
    }
}

impl ApiError {
    /// Maps a failed load to an error response; other outcomes pass through.
    pub fn check_load(outcome: LoadOutcome) -> Result<LoadOutcome, ApiError> {
        match outcome {
            LoadOutcome::Failed(msg) => {
                warn!("upstream load failed: {msg}");
                Err(ApiError::BadGateway(msg))
            }
            LoadOutcome::InvalidDate(msg) => Err(ApiError::BadRequest(msg)),
            other => Ok(other),
        }
    }

    pub fn check_action(outcome: ActionOutcome) -> Result<bool, ApiError> {
        match outcome {
            ActionOutcome::Completed { registered } => Ok(registered),
            ActionOutcome::AlreadyPending => Err(ApiError::Conflict(
                "Another action for this session is in progress".into(),
            )),
            ActionOutcome::Discarded => {
                Err(ApiError::Conflict("Session state was reset".into()))
            }
            ActionOutcome::Failed(msg) => Err(ApiError::BadGateway(msg)),
        }
    }
}
