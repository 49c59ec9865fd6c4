//! Shared fixtures for the store tests.

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::models::{Book, BookCondition, Role, SwapRequest, SwapStatus, User};
use crate::Database;

pub(crate) fn open_test_db() -> (Database, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::open_at(&dir.path().join("test.db")).unwrap();
    (db, dir)
}

pub(crate) fn sample_user(email: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        name: email.split('@').next().unwrap_or("reader").to_string(),
        email: email.to_string(),
        password_hash: "$2b$10$test-hash".to_string(),
        phone: Some("555-0100".to_string()),
        preferred_genres: vec!["sci-fi".to_string(), "history".to_string()],
        role: Role::User,
        is_verified: true,
        otp_hash: None,
        otp_expires_at: None,
        verified_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_book(owner_id: Uuid, title: &str) -> Book {
    let now = Utc::now();
    Book {
        id: Uuid::new_v4(),
        title: title.to_string(),
        author: "Anonymous".to_string(),
        description: "A well-loved copy.".to_string(),
        condition: Some(BookCondition::Good),
        genre: None,
        image_url: None,
        available: true,
        owner_id,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_swap(
    from_user: Uuid,
    to_user: Uuid,
    offered_book: Uuid,
    requested_book: Uuid,
) -> SwapRequest {
    SwapRequest {
        id: Uuid::new_v4(),
        from_user,
        to_user,
        offered_book,
        requested_book,
        status: SwapStatus::Pending,
        created_at: Utc::now(),
    }
}
