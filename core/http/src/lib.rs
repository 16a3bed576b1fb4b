//! HTTP surface for the CloudGate gateway.
//!
//! Routes accept `application/x-www-form-urlencoded` or `multipart/form-data`
//! bodies and answer with a JSON envelope, except `/download` which returns
//! the raw object.

pub mod extract;
pub mod response;
mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use response::{ApiError, ApiResponse, Route};
pub use state::AppState;

/// Build the router.
pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/signup", post(routes::signup))
        .route("/login", post(routes::login))
        .route("/add", post(routes::add))
        .route("/upload", post(routes::upload))
        .route("/upload-public", post(routes::upload_public))
        .route("/download", post(routes::download))
        .route("/view-public", post(routes::view_public))
        .route("/link", post(routes::link))
        .route("/all", post(routes::all))
        .route("/delete", post(routes::delete))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!(error = %e, "Could not install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}
