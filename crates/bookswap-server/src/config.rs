//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// SMTP settings.  Present only when `SMTP_HOST` is configured; without it
/// the server runs mailer-less and falls back to returning verification
/// codes in development responses.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Env: `SMTP_HOST`
    pub host: String,

    /// Env: `SMTP_PORT`
    /// Default: `587`
    pub port: u16,

    /// Env: `SMTP_USER` / `SMTP_PASS` (both or neither).
    pub credentials: Option<(String, String)>,

    /// Sender mailbox, e.g. `BookSwap <no-reply@bookswap.local>`.
    /// Env: `SMTP_FROM`
    pub from: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.  When unset, the platform data directory is
    /// used (see `bookswap_store::Database::new`).
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Filesystem path where uploaded cover images are stored.
    /// Env: `UPLOAD_DIR`
    /// Default: `./uploads`
    pub upload_dir: PathBuf,

    /// Origin used to turn stored `/uploads/...` paths into absolute URLs
    /// in responses.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// HMAC secret for session tokens.
    /// Env: `JWT_SECRET`
    /// Default: a fixed development secret (a warning is logged).
    pub jwt_secret: String,

    /// SMTP mail delivery; `None` disables the mailer.
    pub smtp: Option<SmtpConfig>,

    /// Production mode withholds the OTP development preview.
    /// Env: `PRODUCTION` (true/false)
    /// Default: `false`
    pub production: bool,

    /// Maximum accepted cover-image upload size in bytes (5 MiB).
    /// Env: `MAX_UPLOAD_SIZE`
    pub max_upload_size: usize,
}

const DEV_JWT_SECRET: &str = "bookswap-dev-secret-change-me";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: "http://localhost:8080".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            smtp: None,
            production: false,
            max_upload_size: 5 * 1024 * 1024, // 5 MiB
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.jwt_secret = secret;
            }
        }

        if let Ok(val) = std::env::var("PRODUCTION") {
            config.production = val != "false" && val != "0";
        }

        if let Ok(val) = std::env::var("MAX_UPLOAD_SIZE") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_upload_size = n;
            }
        }

        config.smtp = Self::smtp_from_env();

        if config.jwt_secret == DEV_JWT_SECRET {
            if config.production {
                tracing::warn!("PRODUCTION is set but JWT_SECRET is the development default");
            } else {
                tracing::warn!("JWT_SECRET not set, using development default");
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    fn smtp_from_env() -> Option<SmtpConfig> {
        let host = std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty())?;

        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(587);

        let credentials = match (std::env::var("SMTP_USER"), std::env::var("SMTP_PASS")) {
            (Ok(user), Ok(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        };

        let from = std::env::var("SMTP_FROM")
            .ok()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| "BookSwap <no-reply@bookswap.local>".to_string());

        Some(SmtpConfig {
            host,
            port,
            credentials,
            from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert!(config.smtp.is_none());
        assert!(!config.production);
    }

    #[test]
    fn test_base_url_has_no_trailing_slash_default() {
        let config = ServerConfig::default();
        assert!(!config.public_base_url.ends_with('/'));
    }
}
