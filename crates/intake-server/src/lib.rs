//! HTTP host for the session API and per-user remote snapshots.

mod error;
pub mod routes;
pub mod session;
mod state;

use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;
pub use session::{SessionMap, SessionRecord, SessionStore};
pub use state::AppState;

/// Build the application with request tracing.
pub fn app(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "intake server listening");
    axum::serve(listener, app(state)).await
}
