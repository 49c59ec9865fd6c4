//! # bookswap-server
//!
//! HTTP backend for the BookSwap peer-to-peer book exchange.
//!
//! This binary provides:
//! - **Account onboarding** with email verification via one-time codes
//!   (SMTP delivery when configured, a development fallback otherwise)
//! - **Book catalog** with cover-image uploads served from `/uploads`
//! - **Swap negotiation**: one-for-one swap requests whose acceptance
//!   atomically exchanges ownership of the two books
//! - **In-app notifications** recorded when a swap completes
//! - **REST API** (axum) with JWT sessions and per-IP rate limiting

mod api;
mod auth;
mod config;
mod error;
mod image_store;
mod mailer;
mod otp;
mod rate_limit;
mod swap;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bookswap_store::Database;

use crate::api::AppState;
use crate::auth::TokenKeys;
use crate::config::ServerConfig;
use crate::image_store::ImageStore;
use crate::mailer::Mailer;
use crate::otp::OtpEngine;
use crate::rate_limit::RateLimiter;
use crate::swap::SwapEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bookswap_server=debug")),
        )
        .init();

    info!("Starting BookSwap server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        uploads = %config.upload_dir.display(),
        mailer = config.smtp.is_some(),
        production = config.production,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let db = Arc::new(Mutex::new(database));

    let images = Arc::new(
        ImageStore::new(config.upload_dir.clone(), config.max_upload_size)
            .await
            .map_err(|e| anyhow::anyhow!("image store init failed: {e}"))?,
    );

    let mailer = match &config.smtp {
        Some(smtp) => match Mailer::new(smtp) {
            Ok(mailer) => Some(mailer),
            Err(e) => {
                warn!(error = %e, "SMTP misconfigured, falling back to code previews");
                None
            }
        },
        None => None,
    };

    let tokens = Arc::new(TokenKeys::new(&config.jwt_secret));
    let otp = OtpEngine::new(db.clone(), mailer, config.production);
    let swaps = SwapEngine::new(db.clone());

    // Rate limiter: 10 req/s sustained, burst of 30
    let rate_limiter = RateLimiter::default();

    let app_state = AppState {
        db,
        otp,
        swaps,
        tokens,
        images,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
