//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `books`, `swap_requests`, and
//! `notifications`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id               TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name             TEXT NOT NULL,
    email            TEXT NOT NULL UNIQUE,       -- stored trimmed + lowercased
    password_hash    TEXT NOT NULL,              -- bcrypt
    phone            TEXT,
    preferred_genres TEXT NOT NULL DEFAULT '[]', -- JSON array of strings
    role             TEXT NOT NULL DEFAULT 'user',
    is_verified      INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    otp_hash         TEXT,                       -- bcrypt; set together with expiry
    otp_expires_at   TEXT,                       -- ISO-8601 / RFC-3339
    verified_at      TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);

-- ----------------------------------------------------------------
-- Books
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS books (
    id          TEXT PRIMARY KEY NOT NULL,       -- UUID v4
    title       TEXT NOT NULL,
    author      TEXT NOT NULL,
    description TEXT NOT NULL,
    condition   TEXT,                            -- new | good | old
    genre       TEXT,
    image_url   TEXT,                            -- server-relative /uploads path
    available   INTEGER NOT NULL DEFAULT 1,      -- boolean 0/1
    owner_id    TEXT NOT NULL,                   -- FK -> users(id)
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (owner_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_books_owner_id ON books(owner_id);

-- ----------------------------------------------------------------
-- Swap requests
-- ----------------------------------------------------------------
-- The book columns are deliberately not foreign keys: a book may be deleted
-- by its owner while a request referencing it is still pending, and listing
-- queries LEFT JOIN to tolerate the gap.
CREATE TABLE IF NOT EXISTS swap_requests (
    id             TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    from_user      TEXT NOT NULL,                -- FK -> users(id)
    to_user        TEXT NOT NULL,                -- FK -> users(id)
    offered_book   TEXT NOT NULL,
    requested_book TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'pending',
    created_at     TEXT NOT NULL,

    FOREIGN KEY (from_user) REFERENCES users(id),
    FOREIGN KEY (to_user)   REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_swaps_from_user ON swap_requests(from_user, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_swaps_to_user   ON swap_requests(to_user, created_at DESC);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,        -- UUID v4
    user_id    TEXT NOT NULL,                    -- FK -> users(id)
    message    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_notifications_user_ts
    ON notifications(user_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
