use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::{debug as log_debug, error as log_error};

use crate::models::ErrorEnvelope;

pub const RANGE_ERROR_MESSAGE: &str =
    "pages_limit parameter should be a value from a positive integer range";
pub const CONVERSION_ERROR_MESSAGE: &str =
    "error converting pages_limit parameter's value, should be a number";

/// Rejection reported by the upstream service or its transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct UpstreamError {
    pub reason: String,
    pub status_code: Option<u16>,
}

impl UpstreamError {
    pub fn new(reason: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            reason: reason.into(),
            status_code,
        }
    }
}

/// Failure of a single upstream page fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

/// Everything that can stop a search request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{field} format is not valid")]
    Format { field: &'static str },

    #[error("{}", RANGE_ERROR_MESSAGE)]
    Range,

    #[error("{}", CONVERSION_ERROR_MESSAGE)]
    Conversion,

    #[error(transparent)]
    Upstream(UpstreamError),

    #[error("Unhandled fault: {0}")]
    Fault(String),
}

impl From<FetchError> for RequestError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Upstream(upstream) => RequestError::Upstream(upstream),
            FetchError::Malformed(detail) => RequestError::Fault(detail),
        }
    }
}

impl ErrorEnvelope {
    /// Normalized envelope for the recoverable error kinds, `None` for faults.
    pub fn from_error(err: &RequestError) -> Option<Self> {
        match err {
            RequestError::Format { .. } | RequestError::Range | RequestError::Conversion => {
                Some(Self::new(err.to_string()))
            }
            RequestError::Upstream(upstream) => Some(Self::new(upstream.reason.clone())),
            RequestError::Fault(_) => None,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        if let RequestError::Upstream(upstream) = &self {
            log_debug!("Upstream rejected request with status {:?}", upstream.status_code);
        }

        // Mapped errors keep HTTP 200 so existing clients see the same contract
        match ErrorEnvelope::from_error(&self) {
            Some(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
            None => {
                log_error!("Request failed with unhandled fault: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}
