//! Swap negotiation handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bookswap_store::{SwapOverview, SwapRequest};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::image_store::absolute_image_url;

use super::AppState;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSwapRequest {
    pub offered_book: Option<Uuid>,
    pub requested_book: Option<Uuid>,
    pub to_user: Option<Uuid>,
}

#[derive(Serialize)]
pub struct SwapResponse {
    pub message: String,
    pub swap: SwapRequest,
}

/// `POST /api/swaps`
pub async fn create_swap(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateSwapRequest>,
) -> Result<(StatusCode, Json<SwapResponse>), ApiError> {
    let swap = state
        .swaps
        .create(auth.id, req.offered_book, req.requested_book, req.to_user)
        .await
        .map_err(ApiError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(SwapResponse {
            message: "Swap request created".to_string(),
            swap,
        }),
    ))
}

/// `GET /api/swaps/incoming`
pub async fn list_incoming(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SwapOverview>>, ApiError> {
    let mut swaps = state
        .swaps
        .list_incoming(auth.id)
        .await
        .map_err(ApiError::from)?;
    resolve_images(&state, &mut swaps);
    Ok(Json(swaps))
}

/// `GET /api/swaps/outgoing`
pub async fn list_outgoing(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SwapOverview>>, ApiError> {
    let mut swaps = state
        .swaps
        .list_outgoing(auth.id)
        .await
        .map_err(ApiError::from)?;
    resolve_images(&state, &mut swaps);
    Ok(Json(swaps))
}

/// `POST /api/swaps/:id/accept`
pub async fn accept_swap(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SwapResponse>, ApiError> {
    let swap = state
        .swaps
        .accept(id, auth.id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(SwapResponse {
        message: "Swap accepted and completed".to_string(),
        swap,
    }))
}

/// `POST /api/swaps/:id/reject`
pub async fn reject_swap(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SwapResponse>, ApiError> {
    let swap = state
        .swaps
        .reject(id, auth.id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(SwapResponse {
        message: "Swap rejected".to_string(),
        swap,
    }))
}

fn resolve_images(state: &AppState, swaps: &mut [SwapOverview]) {
    for swap in swaps {
        for card in [&mut swap.offered_book, &mut swap.requested_book]
            .into_iter()
            .flatten()
        {
            if let Some(url) = &card.image_url {
                card.image_url = Some(absolute_image_url(&state.config.public_base_url, url));
            }
        }
    }
}
