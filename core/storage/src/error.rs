//! Backend-internal errors.
//!
//! HTTP transport and status failures stay inside the adapters; every
//! operation maps them into the shared taxonomy before returning.

use reqwest::{Response, StatusCode};
use thiserror::Error;

use cloudgate_common::Error;

use crate::xml;

/// Failure talking to a cloud REST API.
#[derive(Debug, Error)]
pub(crate) enum BackendError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {code}: {message}")]
    Status {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("signing failure: {0}")]
    Signing(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    /// Build a status error from a non-success response, reading the
    /// service's `<Code>` / `<Message>` when the body carries them.
    pub(crate) async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let code = xml::first_tag(&body, "Code")
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
        let message = xml::first_tag(&body, "Message").unwrap_or_default();
        BackendError::Status {
            status,
            code,
            message,
        }
    }

    pub(crate) fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Transport(e) => e.status(),
            BackendError::Signing(_) | BackendError::Url(_) => None,
        }
    }

    pub(crate) fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Credentials rejected, or the service could not be reached at all.
    pub(crate) fn is_connection_failure(&self) -> bool {
        match self {
            BackendError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            BackendError::Status { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            BackendError::Signing(_) | BackendError::Url(_) => false,
        }
    }

    /// Map into the shared taxonomy using `kind` for ordinary failures.
    pub(crate) fn into_error(self, kind: fn(String) -> Error) -> Error {
        kind(self.to_string())
    }
}

pub(crate) type BackendResult<T> = std::result::Result<T, BackendError>;
