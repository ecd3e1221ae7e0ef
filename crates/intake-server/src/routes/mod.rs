//! Route handlers.

pub mod health;
pub mod session;
pub mod snapshots;

use axum::Router;
use axum::routing::get;

use crate::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/session",
            get(session::get_session).post(session::upsert_session),
        )
        .route(
            "/api/snapshots/{user}",
            get(snapshots::get_snapshot).put(snapshots::put_snapshot),
        )
}
