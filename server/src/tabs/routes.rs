//! REST endpoints over the tab façade.
//!
//! GET  /api/tabs?userId=        current tabs of a user
//! POST /api/tabs/close          close one tab (by id, or by URL)
//! POST /api/tabs/close-all      close every tab of a user
//! GET  /api/tabs/live?userId=   tabs showing a flagged URL
//! POST /api/tabs/close-live     close the tabs showing a flagged URL

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::service::{CloseAllOutcome, CloseOutcome};
use super::{deserialize_opt_tab_id, records, TabId, UserTabSet};
use crate::error::{require_user_id, ApiError, ApiJson};
use crate::flagged::store as flagged_store;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabsResponse {
    pub user_id: String,
    pub tabs: UserTabSet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTabRequest {
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_tab_id")]
    pub tab_id: Option<TabId>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub outcome: CloseOutcome,
}

#[derive(Debug, Serialize)]
pub struct CloseAllResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub outcome: CloseAllOutcome,
}

/// GET /api/tabs?userId=
pub async fn get_tabs(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<TabsResponse>, ApiError> {
    let user_id = require_user_id(query.user_id.as_deref())?;
    let tabs = state.tabs.get_tabs(user_id);
    Ok(Json(TabsResponse {
        user_id: user_id.to_string(),
        tabs,
    }))
}

/// POST /api/tabs/close
/// Body: { "userId": "...", "tabId": "..." } or { "userId": "...", "url": "..." }
/// Success means the directive was sent, not that the browser closed the tab.
pub async fn close_tab(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CloseTabRequest>,
) -> Result<Json<CloseResponse>, ApiError> {
    let user_id = require_user_id(body.user_id.as_deref())?;

    let (outcome, message) = match (&body.tab_id, &body.url) {
        (Some(tab_id), _) => (
            state.tabs.request_close_tab(user_id, tab_id),
            format!("Request to close tab {} sent.", tab_id),
        ),
        (None, Some(url)) if !url.trim().is_empty() => (
            state.tabs.request_close_url(user_id, url),
            format!("Request to close tab with URL {} sent.", url),
        ),
        _ => {
            return Err(ApiError::BadRequest(
                "tabId or url is required".to_string(),
            ))
        }
    };

    Ok(Json(CloseResponse {
        status: "success",
        message,
        outcome,
    }))
}

/// POST /api/tabs/close-all
/// Body: { "userId": "..." }
pub async fn close_all_tabs(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UserRequest>,
) -> Result<Json<CloseAllResponse>, ApiError> {
    let user_id = require_user_id(body.user_id.as_deref())?;
    let outcome = state.tabs.request_close_all(user_id);
    Ok(Json(CloseAllResponse {
        status: "success",
        message: format!("Request to close {} tabs sent.", outcome.closed.len()),
        outcome,
    }))
}

/// Look up which of the user's tabs show a flagged URL.
async fn load_live_tabs(state: &AppState, user_id: &str) -> Result<UserTabSet, ApiError> {
    let snapshot = state.tabs.get_tabs(user_id);
    if snapshot.is_empty() {
        return Ok(snapshot);
    }

    let db = state.db.clone();
    let urls: Vec<String> = snapshot.values().cloned().collect();
    let flagged = tokio::task::spawn_blocking(move || {
        flagged_store::matching(&db, urls.iter().map(String::as_str))
    })
    .await??;

    Ok(state.tabs.live_tabs(user_id, &flagged))
}

/// GET /api/tabs/live?userId=
pub async fn get_live_tabs(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<TabsResponse>, ApiError> {
    let user_id = require_user_id(query.user_id.as_deref())?;
    let tabs = load_live_tabs(&state, user_id).await?;
    Ok(Json(TabsResponse {
        user_id: user_id.to_string(),
        tabs,
    }))
}

/// POST /api/tabs/close-live
/// Body: { "userId": "..." }
pub async fn close_live_tabs(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UserRequest>,
) -> Result<Json<CloseAllResponse>, ApiError> {
    let user_id = require_user_id(body.user_id.as_deref())?;
    let live = load_live_tabs(&state, user_id).await?;
    let outcome = state.tabs.request_close_tabs(user_id, &records(&live));
    Ok(Json(CloseAllResponse {
        status: "success",
        message: format!("Request to close {} tabs sent.", outcome.closed.len()),
        outcome,
    }))
}
