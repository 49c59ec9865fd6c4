//! One-time-code email verification.
//!
//! Account activation is gated behind a 6-digit code delivered out of band.
//! Only the bcrypt hash of the code and its expiry are stored on the user
//! record; issuing a new code overwrites the previous pair, and a successful
//! verification clears both columns so a code can never verify twice.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use bookswap_store::{Database, StoreError, User};

use crate::error::ApiError;
use crate::mailer::Mailer;

/// Codes are valid for this many minutes after issuance.
pub const OTP_TTL_MINUTES: i64 = 10;

/// bcrypt cost for the short-lived 6-digit codes.
const OTP_HASH_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("User not found")]
    NotFound,

    #[error("No verification code found. Please request a new code.")]
    NoPendingCode,

    #[error("Verification code expired. Please request a new code.")]
    Expired,

    #[error("Invalid verification code.")]
    Mismatch,

    #[error("Code hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::NotFound => ApiError::NotFound(e.to_string()),
            OtpError::NoPendingCode | OtpError::Expired | OtpError::Mismatch => {
                ApiError::BadRequest(e.to_string())
            }
            OtpError::Hash(inner) => ApiError::Internal(inner.to_string()),
            OtpError::Store(inner) => inner.into(),
        }
    }
}

/// Result of issuing a code.
///
/// `preview` carries the plaintext code back to the caller when no mail was
/// delivered, for presentation as a development aid; it is withheld in
/// production configurations.
#[derive(Debug)]
pub struct IssuedCode {
    pub delivered: bool,
    pub preview: Option<String>,
}

/// Outcome of a verification attempt that did not fail.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The code matched; the account is now verified.
    Verified(User),
    /// The account was already verified; verifying again is a no-op.
    AlreadyVerified(User),
}

/// Issues, expires, and validates verification codes.
#[derive(Clone)]
pub struct OtpEngine {
    db: Arc<Mutex<Database>>,
    mailer: Option<Mailer>,
    production: bool,
}

impl OtpEngine {
    pub fn new(db: Arc<Mutex<Database>>, mailer: Option<Mailer>, production: bool) -> Self {
        Self {
            db,
            mailer,
            production,
        }
    }

    /// Issue a fresh code for `user`, overwriting any previous one, and
    /// attempt delivery.
    ///
    /// Delivery failure does not fail the operation: the code is stored
    /// either way and surfaced through the development fallback instead.
    pub async fn issue(&self, user: &User) -> Result<IssuedCode, OtpError> {
        let code = generate_code();
        let hash = bcrypt::hash(&code, OTP_HASH_COST)?;
        let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

        self.db
            .lock()
            .await
            .set_user_otp(user.id, &hash, expires_at)?;

        info!(user = %user.id, "verification code issued");

        if let Some(mailer) = &self.mailer {
            match mailer.send_otp(&user.email, &user.name, &code).await {
                Ok(()) => {
                    return Ok(IssuedCode {
                        delivered: true,
                        preview: None,
                    })
                }
                Err(e) => {
                    warn!(user = %user.id, error = %e, "verification mail delivery failed");
                }
            }
        }

        Ok(IssuedCode {
            delivered: false,
            preview: (!self.production).then_some(code),
        })
    }

    /// Validate a submitted code for the account registered under `email`
    /// (already normalized by the caller).
    pub async fn verify(&self, email: &str, code: &str) -> Result<VerifyOutcome, OtpError> {
        let db = self.db.lock().await;

        let user = db.get_user_by_email(email).map_err(user_not_found)?;
        if user.is_verified {
            return Ok(VerifyOutcome::AlreadyVerified(user));
        }

        let (hash, expires_at) = match (&user.otp_hash, user.otp_expires_at) {
            (Some(hash), Some(expires_at)) => (hash.clone(), expires_at),
            _ => return Err(OtpError::NoPendingCode),
        };

        if Utc::now() > expires_at {
            return Err(OtpError::Expired);
        }
        if !bcrypt::verify(code, &hash)? {
            return Err(OtpError::Mismatch);
        }

        db.mark_user_verified(user.id, Utc::now())?;
        let user = db.get_user(user.id)?;

        info!(user = %user.id, "email verified");
        Ok(VerifyOutcome::Verified(user))
    }

    /// Re-issue a code for an unverified account.  Returns `None` when the
    /// account is already verified (nothing to do).
    pub async fn resend(&self, email: &str) -> Result<Option<IssuedCode>, OtpError> {
        let user = {
            let db = self.db.lock().await;
            db.get_user_by_email(email).map_err(user_not_found)?
        };

        if user.is_verified {
            return Ok(None);
        }

        let issued = self.issue(&user).await?;
        Ok(Some(issued))
    }
}

fn user_not_found(e: StoreError) -> OtpError {
    match e {
        StoreError::NotFound => OtpError::NotFound,
        other => OtpError::Store(other),
    }
}

/// Uniform 6-digit code in [100000, 999999].
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookswap_store::Role;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_engine(production: bool) -> (OtpEngine, Arc<Mutex<Database>>, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Mutex::new(
            Database::open_at(&dir.path().join("test.db")).unwrap(),
        ));
        let engine = OtpEngine::new(db.clone(), None, production);
        (engine, db, dir)
    }

    async fn register_user(db: &Arc<Mutex<Database>>, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Reader".to_string(),
            email: email.to_string(),
            password_hash: "$2b$10$test-hash".to_string(),
            phone: None,
            preferred_genres: vec![],
            role: Role::User,
            is_verified: false,
            otp_hash: None,
            otp_expires_at: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        db.lock().await.create_user(&user).unwrap();
        user
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[tokio::test]
    async fn issue_then_verify_marks_account() {
        let (engine, db, _dir) = test_engine(false);
        let user = register_user(&db, "alice@example.com").await;

        let issued = engine.issue(&user).await.unwrap();
        assert!(!issued.delivered);
        let code = issued.preview.expect("dev preview without a mailer");

        let outcome = engine.verify("alice@example.com", &code).await.unwrap();
        let verified = match outcome {
            VerifyOutcome::Verified(u) => u,
            other => panic!("expected fresh verification, got {other:?}"),
        };
        assert!(verified.is_verified);
        assert!(verified.verified_at.is_some());
        assert!(verified.otp_hash.is_none());
    }

    #[tokio::test]
    async fn verified_code_cannot_verify_again() {
        let (engine, db, _dir) = test_engine(false);
        let user = register_user(&db, "alice@example.com").await;

        let code = engine.issue(&user).await.unwrap().preview.unwrap();
        engine.verify("alice@example.com", &code).await.unwrap();

        // The account is verified now, so a replay is an idempotent no-op
        // rather than a second consumption.
        let outcome = engine.verify("alice@example.com", &code).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::AlreadyVerified(_)));
    }

    #[tokio::test]
    async fn missing_code_is_reported() {
        let (engine, db, _dir) = test_engine(false);
        register_user(&db, "alice@example.com").await;

        let err = engine.verify("alice@example.com", "123456").await.unwrap_err();
        assert!(matches!(err, OtpError::NoPendingCode));
    }

    #[tokio::test]
    async fn expired_code_is_rejected_even_if_correct() {
        let (engine, db, _dir) = test_engine(false);
        let user = register_user(&db, "alice@example.com").await;

        let code = engine.issue(&user).await.unwrap().preview.unwrap();

        // Rewind the stored expiry to the past.
        {
            let db = db.lock().await;
            let stored = db.get_user(user.id).unwrap();
            db.set_user_otp(
                user.id,
                stored.otp_hash.as_deref().unwrap(),
                Utc::now() - Duration::minutes(1),
            )
            .unwrap();
        }

        let err = engine.verify("alice@example.com", &code).await.unwrap_err();
        assert!(matches!(err, OtpError::Expired));
    }

    #[tokio::test]
    async fn wrong_code_is_a_mismatch() {
        let (engine, db, _dir) = test_engine(false);
        let user = register_user(&db, "alice@example.com").await;

        let code = engine.issue(&user).await.unwrap().preview.unwrap();
        let wrong = if code == "100000" { "100001" } else { "100000" };

        let err = engine.verify("alice@example.com", wrong).await.unwrap_err();
        assert!(matches!(err, OtpError::Mismatch));
    }

    #[tokio::test]
    async fn resend_invalidates_previous_code() {
        let (engine, db, _dir) = test_engine(false);
        let user = register_user(&db, "alice@example.com").await;

        let first = engine.issue(&user).await.unwrap().preview.unwrap();
        let second = engine
            .resend("alice@example.com")
            .await
            .unwrap()
            .expect("unverified account gets a new code")
            .preview
            .unwrap();

        if first != second {
            let err = engine.verify("alice@example.com", &first).await.unwrap_err();
            assert!(matches!(err, OtpError::Mismatch));
        }

        let outcome = engine.verify("alice@example.com", &second).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::Verified(_)));
    }

    #[tokio::test]
    async fn resend_is_a_noop_for_verified_accounts() {
        let (engine, db, _dir) = test_engine(false);
        let user = register_user(&db, "alice@example.com").await;
        db.lock()
            .await
            .mark_user_verified(user.id, Utc::now())
            .unwrap();

        assert!(engine.resend("alice@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (engine, _db, _dir) = test_engine(false);

        let err = engine.verify("ghost@example.com", "123456").await.unwrap_err();
        assert!(matches!(err, OtpError::NotFound));

        let err = engine.resend("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, OtpError::NotFound));
    }

    #[tokio::test]
    async fn production_withholds_the_preview() {
        let (engine, db, _dir) = test_engine(true);
        let user = register_user(&db, "alice@example.com").await;

        let issued = engine.issue(&user).await.unwrap();
        assert!(!issued.delivered);
        assert!(issued.preview.is_none());
    }
}
