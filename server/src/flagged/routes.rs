use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::store::{self, FlaggedUrl};
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FlaggedUrlRequest {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlaggedUrlResponse {
    pub status: &'static str,
    pub url: String,
    pub changed: bool,
}

fn require_url(body: &FlaggedUrlRequest) -> Result<String, ApiError> {
    match body.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(url.to_string()),
        _ => Err(ApiError::BadRequest("URL is required".to_string())),
    }
}

/// GET /api/flagged-urls
pub async fn list_flagged(State(state): State<AppState>) -> Result<Json<Vec<FlaggedUrl>>, ApiError> {
    let db = state.db.clone();
    let urls = tokio::task::spawn_blocking(move || store::list_urls(&db)).await??;
    Ok(Json(urls))
}

/// POST /api/flagged-urls
/// Body: { "url": "..." }. 201 if newly added, 200 if already flagged.
pub async fn add_flagged(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<FlaggedUrlRequest>,
) -> Result<(StatusCode, Json<FlaggedUrlResponse>), ApiError> {
    let url = require_url(&body)?;
    let db = state.db.clone();
    let to_add = url.clone();
    let added = tokio::task::spawn_blocking(move || store::add_url(&db, &to_add)).await??;

    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(FlaggedUrlResponse {
            status: "success",
            url,
            changed: added,
        }),
    ))
}

/// DELETE /api/flagged-urls
/// Body: { "url": "..." }
pub async fn remove_flagged(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<FlaggedUrlRequest>,
) -> Result<Json<FlaggedUrlResponse>, ApiError> {
    let url = require_url(&body)?;
    let db = state.db.clone();
    let to_remove = url.clone();
    let removed = tokio::task::spawn_blocking(move || store::remove_url(&db, &to_remove)).await??;

    Ok(Json(FlaggedUrlResponse {
        status: "success",
        url,
        changed: removed,
    }))
}
