//! `/api/session`: store and fetch a session payload.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::{ApiError, AppState, SessionRecord};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub id: Option<String>,
}

pub async fn upsert_session(
    State(state): State<AppState>,
    body: std::result::Result<Json<UpsertRequest>, JsonRejection>,
) -> Result<Json<UpsertResponse>> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let record = state.sessions.upsert(req.id, req.created_at, req.payload);
    Ok(Json(UpsertResponse {
        id: record.id,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }))
}

pub async fn get_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionRecord>> {
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing id query parameter".into()))?;
    state
        .sessions
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no session with id {id}")))
}
