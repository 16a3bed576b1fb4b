//! JSON envelope and error-to-status mapping.
//!
//! Every JSON reply has the shape `{"status": <code>, "message": ..., "data": ...}`
//! where `status` repeats the HTTP status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use cloudgate_common::{Error, Result};

#[derive(Serialize)]
struct Envelope<'a> {
    status: u16,
    message: &'a str,
    data: &'a Value,
}

fn envelope(status: StatusCode, message: &str, data: &Value) -> Response {
    let body = Envelope {
        status: status.as_u16(),
        message,
        data,
    };
    (status, Json(body)).into_response()
}

/// A successful (or deliberately non-2xx) JSON reply.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    message: String,
    data: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, message)
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: &impl Serialize) -> Result<Self> {
        self.data = serde_json::to_value(data)?;
        Ok(self)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        envelope(self.status, &self.message, &self.data)
    }
}

/// Routes whose failures map to status codes differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Signup,
    Login,
    Add,
    Upload,
    UploadPublic,
    Download,
    ViewPublic,
    Link,
    All,
    Delete,
}

/// Status code for a failure on a route.
pub fn status_for(route: Route, err: &Error) -> StatusCode {
    match (route, err) {
        (_, Error::Authentication(_)) => StatusCode::UNAUTHORIZED,
        (_, Error::Database(_) | Error::Serialization(_) | Error::Io(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }

        (Route::Signup, Error::AlreadyExists(_)) => StatusCode::ACCEPTED,
        (Route::Signup, _) => StatusCode::BAD_REQUEST,

        (Route::Login, Error::NotPermitted(_)) => StatusCode::FORBIDDEN,
        (Route::Login, _) => StatusCode::UNAUTHORIZED,

        (Route::Add, _) => StatusCode::CONFLICT,

        (_, Error::NoProviderConfigured(_)) => StatusCode::NOT_FOUND,
        (_, Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,

        (Route::Upload, Error::Upload(_)) => StatusCode::BAD_REQUEST,
        (Route::UploadPublic, Error::Config(_) | Error::Upload(_)) => StatusCode::BAD_REQUEST,
        (Route::All, Error::Config(_)) => StatusCode::PRECONDITION_FAILED,
        (Route::Delete, Error::Delete(_)) => StatusCode::BAD_REQUEST,

        _ => StatusCode::CONFLICT,
    }
}

/// A failed request, rendered with `data: null`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Map a gateway error for a route.
    pub fn from_error(route: Route, err: Error) -> Self {
        let status = status_for(route, &err);
        if status.is_server_error() {
            error!(?route, error = %err, "Request failed");
        }
        Self::new(status, err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Error mapper for one route, for use with `map_err`.
pub fn at(route: Route) -> impl Fn(Error) -> ApiError {
    move |err| ApiError::from_error(route, err)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        envelope(self.status, &self.message, &Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(kind: fn(String) -> Error) -> Error {
        kind("x".to_string())
    }

    #[test]
    fn test_account_routes() {
        assert_eq!(status_for(Route::Signup, &e(Error::AlreadyExists)), StatusCode::ACCEPTED);
        assert_eq!(status_for(Route::Signup, &e(Error::InvalidInput)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(Route::Login, &e(Error::Authentication)), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(Route::Login, &e(Error::InvalidInput)), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(Route::Login, &e(Error::NotPermitted)), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_storage_routes() {
        assert_eq!(status_for(Route::Add, &e(Error::Config)), StatusCode::CONFLICT);

        assert_eq!(status_for(Route::Upload, &e(Error::NoProviderConfigured)), StatusCode::NOT_FOUND);
        assert_eq!(status_for(Route::Upload, &e(Error::Config)), StatusCode::CONFLICT);
        assert_eq!(status_for(Route::Upload, &e(Error::Connection)), StatusCode::CONFLICT);
        assert_eq!(status_for(Route::Upload, &e(Error::Upload)), StatusCode::BAD_REQUEST);

        assert_eq!(status_for(Route::UploadPublic, &e(Error::Config)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(Route::UploadPublic, &e(Error::Connection)), StatusCode::CONFLICT);

        assert_eq!(status_for(Route::Download, &e(Error::NotFound)), StatusCode::CONFLICT);
        assert_eq!(status_for(Route::Download, &e(Error::Download)), StatusCode::CONFLICT);
        assert_eq!(status_for(Route::ViewPublic, &e(Error::Config)), StatusCode::CONFLICT);
        assert_eq!(status_for(Route::Link, &e(Error::Storage)), StatusCode::CONFLICT);

        assert_eq!(status_for(Route::All, &e(Error::Config)), StatusCode::PRECONDITION_FAILED);
        assert_eq!(status_for(Route::All, &e(Error::Connection)), StatusCode::CONFLICT);
        assert_eq!(status_for(Route::All, &e(Error::Storage)), StatusCode::CONFLICT);

        assert_eq!(status_for(Route::Delete, &e(Error::Delete)), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(Route::Delete, &e(Error::Connection)), StatusCode::CONFLICT);
    }

    #[test]
    fn test_common_failures() {
        for route in [Route::Upload, Route::All, Route::Add, Route::Signup] {
            assert_eq!(status_for(route, &e(Error::Database)), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(status_for(route, &e(Error::Authentication)), StatusCode::UNAUTHORIZED);
        }
    }
}
