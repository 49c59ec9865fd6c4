//! HTTP surface: application state, router assembly, and handlers.
//!
//! Handlers are a thin request/response mapping over the engines: they
//! validate input shape, delegate to the engine or store, and translate
//! typed failures into status codes via `ApiError`.

pub mod auth;
pub mod books;
pub mod notifications;
pub mod swaps;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use bookswap_store::Database;
use tokio::sync::Mutex;

use crate::auth::TokenKeys;
use crate::config::ServerConfig;
use crate::image_store::ImageStore;
use crate::otp::OtpEngine;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::swap::SwapEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub otp: OtpEngine,
    pub swaps: SwapEngine,
    pub tokens: Arc<TokenKeys>,
    pub images: Arc<ImageStore>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    // Leave headroom over the image cap for the other multipart fields.
    let body_limit = state.config.max_upload_size + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify-email", post(auth::verify_email))
        .route("/api/auth/resend-otp", post(auth::resend_otp))
        .route("/api/books", get(books::list_books).post(books::add_book))
        .route("/api/books/mine", get(books::list_my_books))
        .route(
            "/api/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/api/swaps", post(swaps::create_swap))
        .route("/api/swaps/incoming", get(swaps::list_incoming))
        .route("/api/swaps/outgoing", get(swaps::list_outgoing))
        .route("/api/swaps/:id/accept", post(swaps::accept_swap))
        .route("/api/swaps/:id/reject", post(swaps::reject_swap))
        .route("/api/notifications", get(notifications::list_notifications))
        .route(
            "/api/users/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/api/users/:id", get(users::get_user))
        .nest_service("/uploads", ServeDir::new(state.config.upload_dir.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
