//! Domain model structs persisted in the SQLite database.
//!
//! Outward-facing projections ([`UserProfile`], [`UserSummary`],
//! [`SwapOverview`]) derive `Serialize`; the full [`User`] record
//! deliberately does not, so the password and OTP hashes can never leak
//! through a response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A TEXT column held a value outside the expected enum.
#[derive(Debug, Error)]
#[error("unrecognized {column} value: {value}")]
pub struct InvalidColumnValue {
    pub column: &'static str,
    pub value: String,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Account role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidColumnValue> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(InvalidColumnValue {
                column: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A registered account.
///
/// `password_hash` and `otp_hash` are one-way bcrypt hashes; the plaintext
/// password and verification code are never stored.  `otp_hash` and
/// `otp_expires_at` are always present together or absent together.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Trimmed and lowercased; unique across all accounts.
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub preferred_genres: Vec<String>,
    pub role: Role,
    pub is_verified: bool,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outward projection of a [`User`] with the secret columns stripped.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub preferred_genres: Vec<String>,
    pub role: Role,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            preferred_genres: user.preferred_genres.clone(),
            role: user.role,
            is_verified: user.is_verified,
            verified_at: user.verified_at,
            created_at: user.created_at,
        }
    }
}

/// Minimal identity used when presenting a counterpart in a swap or the
/// owner of a book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

/// Physical condition of a listed book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookCondition {
    New,
    Good,
    Old,
}

impl BookCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookCondition::New => "new",
            BookCondition::Good => "good",
            BookCondition::Old => "old",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidColumnValue> {
        match s {
            "new" => Ok(BookCondition::New),
            "good" => Ok(BookCondition::Good),
            "old" => Ok(BookCondition::Old),
            other => Err(InvalidColumnValue {
                column: "condition",
                value: other.to_string(),
            }),
        }
    }
}

/// A listed book.  `owner_id` always references an existing user; ownership
/// changes only through the completed-swap transaction.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    pub condition: Option<BookCondition>,
    pub genre: Option<String>,
    /// Server-relative path of the stored cover image, e.g. `/uploads/<file>`.
    pub image_url: Option<String>,
    pub available: bool,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Title-and-cover projection of a book used in swap listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookCard {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
}

// ---------------------------------------------------------------------------
// SwapRequest
// ---------------------------------------------------------------------------

/// Status of a swap request.
///
/// The engine transitions `pending` directly to `completed` or `rejected`;
/// both are terminal.  `accepted` exists for wire compatibility but is never
/// persisted by the current engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Accepted => "accepted",
            SwapStatus::Rejected => "rejected",
            SwapStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidColumnValue> {
        match s {
            "pending" => Ok(SwapStatus::Pending),
            "accepted" => Ok(SwapStatus::Accepted),
            "rejected" => Ok(SwapStatus::Rejected),
            "completed" => Ok(SwapStatus::Completed),
            other => Err(InvalidColumnValue {
                column: "status",
                value: other.to_string(),
            }),
        }
    }

    /// True for states that permit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Rejected | SwapStatus::Completed)
    }
}

impl std::fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed one-for-one exchange of book ownership.
///
/// The user and book fields are lookups, not owning references: deleting a
/// swap request never deletes a user or a book, and a referenced book may be
/// deleted out from under a still-pending request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SwapRequest {
    pub id: Uuid,
    /// The user initiating the swap; must own `offered_book` at creation.
    pub from_user: Uuid,
    /// The user being asked; must own `requested_book` at creation.
    pub to_user: Uuid,
    pub offered_book: Uuid,
    pub requested_book: Uuid,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
}

/// A swap request enriched for presentation: the counterpart's identity and
/// both books' title/cover.  Book cards are `None` when the underlying book
/// has been deleted since the request was created.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SwapOverview {
    pub id: Uuid,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub counterpart: UserSummary,
    pub offered_book: Option<BookCard>,
    pub requested_book: Option<BookCard>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// An append-only per-user message.  Never mutated after creation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
