use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Claims;
use crate::engine::notify;
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/:id/read", patch(mark_read))
        .route("/notifications/:id", delete(delete_notification))
}

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct MarkedRead {
    pub marked: usize,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Query(query): Query<InboxQuery>,
) -> Json<Vec<Notification>> {
    Json(notify::inbox_of(&state, claims.subject_id, query.unread_only))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = notify::mark_read(&state, claims.subject_id, notification_id)?;
    Ok(Json(notification))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Json<MarkedRead> {
    Json(MarkedRead {
        marked: notify::mark_all_read(&state, claims.subject_id),
    })
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    notify::delete_notification(&state, claims.subject_id, notification_id)?;
    Ok(StatusCode::NO_CONTENT)
}
