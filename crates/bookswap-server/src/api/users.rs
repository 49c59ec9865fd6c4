//! Profile handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use bookswap_store::{StoreError, UserProfile};

use crate::auth::AuthUser;
use crate::error::ApiError;

use super::AppState;

/// `GET /api/users/profile`
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .db
        .lock()
        .await
        .get_user(auth.id)
        .map_err(user_not_found)?;
    Ok(Json(UserProfile::from(&user)))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub preferred_genres: Option<Vec<String>>,
}

/// `PUT /api/users/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let phone = req.phone.as_deref().map(str::trim);
    let genres: Option<Vec<String>> = req.preferred_genres.map(|gs| {
        gs.into_iter()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect()
    });

    let user = state
        .db
        .lock()
        .await
        .update_user_profile(auth.id, name, phone, genres.as_deref())
        .map_err(user_not_found)?;
    Ok(Json(UserProfile::from(&user)))
}

/// `GET /api/users/:id` — public profile lookup.
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .db
        .lock()
        .await
        .get_user(id)
        .map_err(user_not_found)?;
    Ok(Json(UserProfile::from(&user)))
}

fn user_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => ApiError::NotFound("User not found".to_string()),
        other => other.into(),
    }
}
