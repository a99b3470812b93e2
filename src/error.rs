use actix_web::{body::BoxBody, http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Top-level error type for the triage service.
///
/// Every HTTP boundary converts these to either a 400 (caller input
/// problem) or a 500 (processing problem) with a human-readable message.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Gmail watch is not enabled for {0}")]
    WatchNotEnabled(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Mailbox provider error: {0}")]
    MailboxError(String),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
}

impl ResponseError for TriageError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {:?}", self);
        } else {
            log::warn!("Request rejected: {:?}", self);
        }
        HttpResponse::build(status).json(ApiErrorResponse {
            error: self.to_string(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            TriageError::MalformedPayload(_)
            | TriageError::MissingField(_)
            | TriageError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            // The original surface exposes everything else, including
            // missing accounts, as a 500 with a readable message.
            TriageError::NotFound(_)
            | TriageError::UnknownLabel(_)
            | TriageError::ClassificationFailed(_)
            | TriageError::WatchNotEnabled(_)
            | TriageError::MailboxError(_)
            | TriageError::StoreError(_)
            | TriageError::HttpError(_)
            | TriageError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
