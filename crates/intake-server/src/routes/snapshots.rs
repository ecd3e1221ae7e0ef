//! `/api/snapshots/{user}`: whole-document remote storage for sync clients.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use intake_store::StoreSnapshot;
use intake_sync::RemoteStore;
use tracing::info;

use crate::error::Result;
use crate::{ApiError, AppState};

pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<impl IntoResponse> {
    let snapshot = state
        .snapshots
        .fetch(&user)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("no snapshot for {user}")))?;
    let body = snapshot
        .to_json()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

pub async fn put_snapshot(
    State(state): State<AppState>,
    Path(user): Path<String>,
    body: String,
) -> Result<StatusCode> {
    let snapshot =
        StoreSnapshot::from_json(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state
        .snapshots
        .put(&user, &snapshot)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(user = %user, count = snapshot.cases.len(), "snapshot stored");
    Ok(StatusCode::NO_CONTENT)
}
