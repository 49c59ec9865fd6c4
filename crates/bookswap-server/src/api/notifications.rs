//! Notification feed handler.

use axum::extract::State;
use axum::Json;

use bookswap_store::Notification;

use crate::auth::AuthUser;
use crate::error::ApiError;

use super::AppState;

/// `GET /api/notifications` — the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let items = state
        .db
        .lock()
        .await
        .list_notifications_for_user(auth.id)?;
    Ok(Json(items))
}
