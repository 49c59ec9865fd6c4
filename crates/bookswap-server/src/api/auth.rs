//! Registration, login, and email-verification handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bookswap_store::{Role, StoreError, User};

use crate::auth::{self, AuthError};
use crate::error::ApiError;
use crate::otp::VerifyOutcome;

use super::AppState;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub genres: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_preview: Option<String>,
}

/// `POST /api/auth/register`
///
/// Creates the account unverified, then issues a verification code.  Mail
/// delivery failure never fails the registration; the response message says
/// which path the code took.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let input = auth::validate_registration(
        req.name.as_deref(),
        req.email.as_deref(),
        req.password.as_deref(),
        req.phone.as_deref(),
        req.genres,
    )
    .map_err(ApiError::from)?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: input.name,
        email: input.email,
        password_hash: auth::hash_password(&input.password).map_err(ApiError::from)?,
        phone: input.phone,
        preferred_genres: input.preferred_genres,
        role: Role::User,
        is_verified: false,
        otp_hash: None,
        otp_expires_at: None,
        verified_at: None,
        created_at: now,
        updated_at: now,
    };

    state
        .db
        .lock()
        .await
        .create_user(&user)
        .map_err(|e| match e {
            StoreError::DuplicateEmail => ApiError::from(AuthError::EmailTaken),
            other => other.into(),
        })?;

    let issued = state.otp.issue(&user).await.map_err(ApiError::from)?;

    let message = if issued.delivered {
        "Verification code sent to your email.".to_string()
    } else {
        "Email service not configured. Showing code for development.".to_string()
    };

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message,
            user_id: user.id,
            email: user.email,
            otp_preview: issued.preview,
        }),
    ))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// User summary returned alongside a session token.
#[derive(Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}

/// `POST /api/auth/login`
///
/// Unknown email and wrong password produce the same 401 so the endpoint
/// cannot be used to enumerate accounts.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = auth::normalize_email(req.email.as_deref().unwrap_or_default());
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = state
        .db
        .lock()
        .await
        .get_user_by_email(&email)
        .map_err(|e| match e {
            StoreError::NotFound => ApiError::from(AuthError::InvalidCredentials),
            other => other.into(),
        })?;

    if !auth::verify_password(&password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials.into());
    }
    if !user.is_verified {
        return Err(AuthError::NotVerified.into());
    }

    let token = state
        .tokens
        .issue(user.id, user.role)
        .map_err(ApiError::from)?;

    Ok(Json(LoginResponse {
        token,
        user: SessionUser::from(&user),
    }))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEmailRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyEmailResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

/// `POST /api/auth/verify-email`
///
/// A fresh verification issues a session token immediately; an
/// already-verified account gets an idempotent 200 without one.
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<VerifyEmailResponse>, ApiError> {
    let email = auth::normalize_email(req.email.as_deref().unwrap_or_default());
    let otp = req.otp.as_deref().unwrap_or_default().trim().to_string();
    if email.is_empty() || otp.is_empty() {
        return Err(ApiError::BadRequest("Email and OTP are required".to_string()));
    }

    match state.otp.verify(&email, &otp).await.map_err(ApiError::from)? {
        VerifyOutcome::Verified(user) => {
            let token = state
                .tokens
                .issue(user.id, user.role)
                .map_err(ApiError::from)?;
            Ok(Json(VerifyEmailResponse {
                message: "Email verified successfully.".to_string(),
                token: Some(token),
                user: Some(SessionUser::from(&user)),
            }))
        }
        VerifyOutcome::AlreadyVerified(_) => Ok(Json(VerifyEmailResponse {
            message: "Email already verified. You can login.".to_string(),
            token: None,
            user: None,
        })),
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResendOtpRequest {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct ResendOtpResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_preview: Option<String>,
}

/// `POST /api/auth/resend-otp`
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<ResendOtpResponse>, ApiError> {
    let email = auth::normalize_email(req.email.as_deref().unwrap_or_default());
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }

    match state.otp.resend(&email).await.map_err(ApiError::from)? {
        None => Ok(Json(ResendOtpResponse {
            message: "Email already verified. You can login.".to_string(),
            otp_preview: None,
        })),
        Some(issued) => {
            let message = if issued.delivered {
                "Verification code resent to your email.".to_string()
            } else {
                "Email service not configured. Showing code for development.".to_string()
            };
            Ok(Json(ResendOtpResponse {
                message,
                otp_preview: issued.preview,
            }))
        }
    }
}
