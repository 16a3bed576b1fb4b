//! Route handlers.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::info;

use cloudgate_common::{Error, Result};
use cloudgate_gateway::{AccountService, Signup};

use crate::extract::{AuthenticatedUser, FormPayload};
use crate::response::{at, ApiError, ApiResponse, Route};
use crate::state::AppState;

type Reply = std::result::Result<ApiResponse, ApiError>;

pub async fn index() -> ApiResponse {
    ApiResponse::ok("Welcome to CloudGate")
}

/// Run an account operation off the async workers; password hashing is slow.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&AccountService) -> Result<T> + Send + 'static,
{
    let accounts = state.accounts.clone();
    tokio::task::spawn_blocking(move || f(&accounts))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

#[derive(Serialize)]
struct SignupData {
    public_id: String,
}

pub async fn signup(State(state): State<AppState>, form: FormPayload) -> Reply {
    let err = at(Route::Signup);
    let signup = Signup {
        name: form.require("name").map_err(&err)?,
        email: form.require("email").map_err(&err)?,
        password: form.require("password").map_err(&err)?,
        provider: form.require("provider").map_err(&err)?,
    };

    let user = blocking(&state, move |accounts| accounts.signup(&signup))
        .await
        .map_err(&err)?;

    ApiResponse::new(
        StatusCode::CREATED,
        format!("UserId:{} Successfully registered.", user.public_id),
    )
    .with_data(&SignupData {
        public_id: user.public_id.to_string(),
    })
    .map_err(err)
}

#[derive(Serialize)]
struct LoginData {
    token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

pub async fn login(State(state): State<AppState>, form: FormPayload) -> Reply {
    let err = at(Route::Login);
    let email = form.require("email").map_err(&err)?;
    let password = form.require("password").map_err(&err)?;

    let issued = blocking(&state, move |accounts| accounts.login(&email, &password))
        .await
        .map_err(&err)?;

    ApiResponse::new(StatusCode::CREATED, "Login successful")
        .with_data(&LoginData {
            token: issued.token,
            expires_at: issued.expires_at,
        })
        .map_err(err)
}

pub async fn add(State(state): State<AppState>, user: AuthenticatedUser, form: FormPayload) -> Reply {
    let err = at(Route::Add);
    let provider = form.require("cloud_provider").map_err(&err)?;

    let tag = state
        .gateway
        .register_credentials(user.id(), &provider, form.fields())
        .map_err(&err)?;

    ApiResponse::new(StatusCode::CREATED, "Successfully, Cloud Info registered.")
        .with_data(&tag)
        .map_err(err)
}

pub async fn upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut form: FormPayload,
) -> Reply {
    let err = at(Route::Upload);
    let provider = form.require("provider").map_err(&err)?;
    let upload = form.take_upload().map_err(&err)?;

    let blob = state
        .gateway
        .upload(user.id(), &provider, upload, form.flag("is_public"))
        .await
        .map_err(&err)?;

    ApiResponse::ok("Upload Done!").with_data(&blob).map_err(err)
}

pub async fn upload_public(State(state): State<AppState>, mut form: FormPayload) -> Reply {
    let err = at(Route::UploadPublic);
    let provider = form.require("provider").map_err(&err)?;
    let upload = form.take_upload().map_err(&err)?;

    let blob = state
        .gateway
        .anonymous_upload(&provider, form.fields(), upload, form.flag("is_public"))
        .await
        .map_err(&err)?;

    ApiResponse::ok("Upload success!").with_data(&blob).map_err(err)
}

pub async fn download(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    form: FormPayload,
) -> std::result::Result<Response, ApiError> {
    let err = at(Route::Download);
    let provider = form.require("provider").map_err(&err)?;
    let filename = form.require("filename").map_err(&err)?;

    let data = state
        .gateway
        .download(user.id(), &provider, &filename)
        .await
        .map_err(&err)?;

    let content_type = mime_guess::from_path(&filename).first_or_octet_stream();
    info!(user = %user.id(), name = %filename, bytes = data.len(), "Serving download");
    Ok(([(CONTENT_TYPE, content_type.to_string())], data).into_response())
}

pub async fn view_public(State(state): State<AppState>, form: FormPayload) -> Reply {
    let err = at(Route::ViewPublic);
    let provider = form.require("provider").map_err(&err)?;
    let filename = form.require("filename").map_err(&err)?;

    let url = state
        .gateway
        .anonymous_link(&provider, form.fields(), &filename)
        .await
        .map_err(&err)?;

    ApiResponse::ok("Success").with_data(&url).map_err(err)
}

pub async fn link(State(state): State<AppState>, user: AuthenticatedUser, form: FormPayload) -> Reply {
    let err = at(Route::Link);
    let provider = form.require("provider").map_err(&err)?;
    let filename = form.require("filename").map_err(&err)?;

    let url = state
        .gateway
        .temporary_link(user.id(), &provider, &filename)
        .await
        .map_err(&err)?;

    ApiResponse::ok("Success").with_data(&url).map_err(err)
}

pub async fn all(State(state): State<AppState>, user: AuthenticatedUser, form: FormPayload) -> Reply {
    let err = at(Route::All);
    let provider = form.require("provider").map_err(&err)?;

    let blobs = state
        .gateway
        .list(user.id(), &provider)
        .await
        .map_err(&err)?;

    ApiResponse::ok("Success").with_data(&blobs).map_err(err)
}

pub async fn delete(State(state): State<AppState>, user: AuthenticatedUser, form: FormPayload) -> Reply {
    let err = at(Route::Delete);
    let provider = form.require("provider").map_err(&err)?;
    let filename = form.require("filename").map_err(&err)?;

    let deleted = state
        .gateway
        .delete(user.id(), &provider, &filename)
        .await
        .map_err(&err)?;

    let reply = if deleted {
        ApiResponse::ok("Success")
    } else {
        ApiResponse::new(
            StatusCode::BAD_REQUEST,
            "Encountered Error while deleting the object!",
        )
    };
    reply.with_data(&deleted).map_err(err)
}
