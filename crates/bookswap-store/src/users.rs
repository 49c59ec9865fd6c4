//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Role, User};
use crate::rows;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  The caller must pass an already-normalized
    /// (trimmed, lowercased) email; a unique-index violation on it surfaces
    /// as [`StoreError::DuplicateEmail`].
    pub fn create_user(&self, user: &User) -> Result<()> {
        let genres = serde_json::to_string(&user.preferred_genres)?;

        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash, phone, preferred_genres,
                                    role, is_verified, otp_hash, otp_expires_at, verified_at,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.password_hash,
                    user.phone,
                    genres,
                    user.role.as_str(),
                    user.is_verified,
                    user.otp_hash,
                    user.otp_expires_at.map(|t| t.to_rfc3339()),
                    user.verified_at.map(|t| t.to_rfc3339()),
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(inner, _)
                    if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::DuplicateEmail
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by UUID.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Fetch a single user by normalized email.
    pub fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a partial profile update (name / phone / preferred genres) and
    /// return the updated record.
    pub fn update_user_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
        preferred_genres: Option<&[String]>,
    ) -> Result<User> {
        let mut user = self.get_user(id)?;

        if let Some(name) = name {
            user.name = name.to_string();
        }
        if let Some(phone) = phone {
            user.phone = Some(phone.to_string());
        }
        if let Some(genres) = preferred_genres {
            user.preferred_genres = genres.to_vec();
        }
        user.updated_at = Utc::now();

        let genres = serde_json::to_string(&user.preferred_genres)?;
        self.conn().execute(
            "UPDATE users SET name = ?1, phone = ?2, preferred_genres = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                user.name,
                user.phone,
                genres,
                user.updated_at.to_rfc3339(),
                id.to_string(),
            ],
        )?;
        Ok(user)
    }

    /// Store a freshly issued verification-code hash and its expiry,
    /// overwriting any previous pair.
    pub fn set_user_otp(
        &self,
        id: Uuid,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET otp_hash = ?1, otp_expires_at = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                otp_hash,
                expires_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Flip the verification flag, record the timestamp, and clear both OTP
    /// columns in a single UPDATE so the code can never verify twice.
    pub fn mark_user_verified(&self, id: Uuid, verified_at: DateTime<Utc>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET is_verified = 1, verified_at = ?1,
                              otp_hash = NULL, otp_expires_at = NULL, updated_at = ?2
             WHERE id = ?3",
            params![
                verified_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, preferred_genres, role, \
                            is_verified, otp_hash, otp_expires_at, verified_at, created_at, \
                            updated_at";

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let email: String = row.get(2)?;
    let password_hash: String = row.get(3)?;
    let phone: Option<String> = row.get(4)?;
    let genres_json: String = row.get(5)?;
    let role_str: String = row.get(6)?;
    let is_verified: bool = row.get(7)?;
    let otp_hash: Option<String> = row.get(8)?;
    let otp_expires_str: Option<String> = row.get(9)?;
    let verified_str: Option<String> = row.get(10)?;
    let created_str: String = row.get(11)?;
    let updated_str: String = row.get(12)?;

    let preferred_genres: Vec<String> = serde_json::from_str(&genres_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let role = Role::parse(&role_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(User {
        id: rows::uuid_col(0, &id_str)?,
        name,
        email,
        password_hash,
        phone,
        preferred_genres,
        role,
        is_verified,
        otp_hash,
        otp_expires_at: rows::opt_ts_col(9, otp_expires_str.as_deref())?,
        verified_at: rows::opt_ts_col(10, verified_str.as_deref())?,
        created_at: rows::ts_col(11, &created_str)?,
        updated_at: rows::ts_col(12, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_test_db, sample_user};

    #[test]
    fn create_and_fetch_round_trip() {
        let (db, _dir) = open_test_db();
        let user = sample_user("alice@example.com");

        db.create_user(&user).unwrap();

        let by_id = db.get_user(user.id).unwrap();
        assert_eq!(by_id.email, "alice@example.com");
        assert_eq!(by_id.preferred_genres, user.preferred_genres);

        let by_email = db.get_user_by_email("alice@example.com").unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[test]
    fn duplicate_email_rejected() {
        let (db, _dir) = open_test_db();
        db.create_user(&sample_user("bob@example.com")).unwrap();

        let err = db.create_user(&sample_user("bob@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[test]
    fn verify_clears_otp_columns() {
        let (db, _dir) = open_test_db();
        let user = sample_user("carol@example.com");
        db.create_user(&user).unwrap();

        db.set_user_otp(user.id, "$2b$fakehash", Utc::now() + chrono::Duration::minutes(10))
            .unwrap();
        let pending = db.get_user(user.id).unwrap();
        assert!(pending.otp_hash.is_some());
        assert!(pending.otp_expires_at.is_some());

        db.mark_user_verified(user.id, Utc::now()).unwrap();
        let verified = db.get_user(user.id).unwrap();
        assert!(verified.is_verified);
        assert!(verified.verified_at.is_some());
        assert!(verified.otp_hash.is_none());
        assert!(verified.otp_expires_at.is_none());
    }

    #[test]
    fn profile_update_is_partial() {
        let (db, _dir) = open_test_db();
        let user = sample_user("dora@example.com");
        db.create_user(&user).unwrap();

        let updated = db
            .update_user_profile(user.id, Some("Dora"), None, None)
            .unwrap();
        assert_eq!(updated.name, "Dora");
        assert_eq!(updated.phone, user.phone);
    }

    #[test]
    fn missing_user_is_not_found() {
        let (db, _dir) = open_test_db();
        let err = db.get_user(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
