//! Request extractors: form fields and the authenticated caller.

use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Form;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

use cloudgate_common::{Error, Result, UserId};
use cloudgate_gateway::UserRecord;
use cloudgate_storage::ObjectUpload;

use crate::response::ApiError;
use crate::state::AppState;

/// Header carrying the bearer token.
pub const TOKEN_HEADER: &str = "x-access-token";

/// Name of the multipart part holding the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Uploaded file part.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub filename: String,
    pub data: Bytes,
}

/// Form fields from either an urlencoded or a multipart body.
#[derive(Debug, Default)]
pub struct FormPayload {
    fields: HashMap<String, String>,
    file: Option<FilePart>,
}

impl FormPayload {
    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// A non-blank field value, trimmed.
    ///
    /// # Errors
    /// - `InvalidInput` naming the missing field
    pub fn require(&self, key: &str) -> Result<String> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidInput(format!("Missing field '{}'", key)))
    }

    /// Whether a checkbox-style field is set.
    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.fields.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("1" | "true" | "on" | "yes")
        )
    }

    /// Take the uploaded file.
    ///
    /// # Errors
    /// - `InvalidInput` if the request had no file part
    pub fn take_upload(&mut self) -> Result<ObjectUpload> {
        self.file
            .take()
            .filter(|file| !file.filename.is_empty())
            .map(|file| ObjectUpload::new(file.filename, file.data))
            .ok_or_else(|| Error::InvalidInput("No file part in the request".to_string()))
    }

    async fn from_multipart(mut multipart: Multipart) -> std::result::Result<Self, ApiError> {
        let mut payload = Self::default();
        let reject = |e: axum::extract::multipart::MultipartError| ApiError::new(e.status(), e.body_text());

        while let Some(field) = multipart.next_field().await.map_err(reject)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) if name == FILE_FIELD => {
                    let data = field.bytes().await.map_err(reject)?;
                    payload.file = Some(FilePart { filename, data });
                }
                _ => {
                    let value = field.text().await.map_err(reject)?;
                    payload.fields.insert(name, value);
                }
            }
        }

        Ok(payload)
    }
}

impl<S> FromRequest<S> for FormPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        Ok(Self { fields, file: None })
    }
}

/// Token presented by the caller, from `x-access-token` or `Authorization: Bearer`.
fn presented_token(parts: &Parts) -> Option<&str> {
    if let Some(token) = parts.headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(token.trim()).filter(|t| !t.is_empty());
    }
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The caller resolved from a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserRecord);

impl AuthenticatedUser {
    pub fn id(&self) -> &UserId {
        &self.0.public_id
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = presented_token(parts)
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Token is missing"))?;

        let user = state
            .accounts
            .authenticate(token)
            .map_err(|e| ApiError::new(StatusCode::UNAUTHORIZED, e.to_string()))?;

        debug!(user = %user.public_id, "Caller authenticated");
        Ok(Self(user))
    }
}
