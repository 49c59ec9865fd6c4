//! Credentials and session tokens.
//!
//! Passwords and session tokens are handled with black-box primitives:
//! bcrypt for one-way hashing and HS256 JWTs for the opaque bearer
//! credential.  The [`AuthUser`] extractor turns an `Authorization: Bearer`
//! header into the acting user for protected handlers; any missing, invalid,
//! or expired token is rejected with the same 401.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use bookswap_store::{Role, StoreError};

use crate::api::AppState;
use crate::error::ApiError;

/// Session token validity window.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Name, email and password are required")]
    MissingFields,

    #[error("Please provide a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters long")]
    WeakPassword,

    #[error("Email is already registered")]
    EmailTaken,

    /// Deliberately identical for unknown email and wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    NotVerified,

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingFields | AuthError::InvalidEmail | AuthError::WeakPassword => {
                ApiError::BadRequest(e.to_string())
            }
            AuthError::EmailTaken => ApiError::Conflict(e.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized(e.to_string()),
            AuthError::NotVerified => ApiError::Forbidden(e.to_string()),
            AuthError::Hash(inner) => ApiError::Internal(inner.to_string()),
            AuthError::Token(inner) => ApiError::Internal(inner.to_string()),
            AuthError::Store(inner) => inner.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Passwords and input validation
// ---------------------------------------------------------------------------

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Compare a candidate password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Trim and lowercase an email for storage and lookup.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Basic `local@domain.tld` shape check: no whitespace, exactly one `@`,
/// and a dot inside the domain with characters on both sides.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Validated registration input.
#[derive(Debug)]
pub struct RegistrationInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub preferred_genres: Vec<String>,
}

/// Check the raw registration fields and return cleaned values.
pub fn validate_registration(
    name: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
    phone: Option<&str>,
    genres: Option<Vec<String>>,
) -> Result<RegistrationInput, AuthError> {
    let name = name.map(str::trim).unwrap_or_default();
    let email = normalize_email(email.unwrap_or_default());
    let password = password.unwrap_or_default();

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }
    if !is_valid_email(&email) {
        return Err(AuthError::InvalidEmail);
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }

    let phone = phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let preferred_genres = genres
        .unwrap_or_default()
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();

    Ok(RegistrationInput {
        name: name.to_string(),
        email,
        password: password.to_string(),
        phone,
        preferred_genres,
    })
}

// ---------------------------------------------------------------------------
// Session tokens
// ---------------------------------------------------------------------------

/// Claims carried by the session token: user id, role, and the validity
/// window.  Opaque to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Signing and verification keys for session tokens.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for the given user, valid for [`TOKEN_TTL_DAYS`].
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &self.encoding,
        )?)
    }

    /// Decode and validate a token (signature + expiry).
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// The authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let token = header.strip_prefix("Bearer ").unwrap_or(header);
        if token.is_empty() {
            return Err(ApiError::Unauthorized("No token provided".to_string()));
        }

        let claims = state
            .tokens
            .decode(token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("reader@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("reader@examplecom"));
        assert!(!is_valid_email("reader@.com"));
    }

    #[test]
    fn registration_validation_rules() {
        let err = validate_registration(None, Some("a@b.co"), Some("secret1"), None, None)
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingFields));

        let err = validate_registration(
            Some("Alice"),
            Some("not-an-email"),
            Some("secret1"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail));

        let err =
            validate_registration(Some("Alice"), Some("a@b.co"), Some("short"), None, None)
                .unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword));

        let input = validate_registration(
            Some("  Alice  "),
            Some("  Alice@Example.COM "),
            Some("secret1"),
            Some(" 555-0100 "),
            Some(vec!["  sci-fi ".to_string(), "  ".to_string()]),
        )
        .unwrap();
        assert_eq!(input.name, "Alice");
        assert_eq!(input.email, "alice@example.com");
        assert_eq!(input.phone.as_deref(), Some("555-0100"));
        assert_eq!(input.preferred_genres, vec!["sci-fi".to_string()]);
    }

    #[test]
    fn token_round_trip() {
        let keys = TokenKeys::new("test-secret");
        let id = Uuid::new_v4();

        let token = keys.issue(id, Role::User).unwrap();
        let claims = keys.decode(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::User);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_rejected_with_wrong_secret() {
        let keys = TokenKeys::new("test-secret");
        let other = TokenKeys::new("different-secret");

        let token = keys.issue(Uuid::new_v4(), Role::User).unwrap();
        assert!(other.decode(&token).is_err());
    }
}
