//! Append-only [`Notification`] log.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::Result;
use crate::models::Notification;
use crate::rows;

impl Database {
    /// Append a notification.  Records are never updated or deleted.
    pub fn create_notification(&self, notification: &Notification) -> Result<()> {
        self.conn().execute(
            "INSERT INTO notifications (id, user_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.message,
                notification.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a user's notifications, newest first.
    pub fn list_notifications_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, message, created_at
             FROM notifications
             WHERE user_id = ?1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }
}

/// Map a `rusqlite::Row` to a [`Notification`].
fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id_str: String = row.get(0)?;
    let user_str: String = row.get(1)?;
    let message: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    Ok(Notification {
        id: rows::uuid_col(0, &id_str)?,
        user_id: rows::uuid_col(1, &user_str)?,
        message,
        created_at: rows::ts_col(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_test_db, sample_user};
    use chrono::{Duration, Utc};

    #[test]
    fn listing_is_per_user_and_newest_first() {
        let (db, _dir) = open_test_db();
        let alice = sample_user("alice@example.com");
        let bob = sample_user("bob@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();

        let older = Notification {
            id: Uuid::new_v4(),
            user_id: alice.id,
            message: "first".to_string(),
            created_at: Utc::now() - Duration::minutes(5),
        };
        let newer = Notification {
            id: Uuid::new_v4(),
            user_id: alice.id,
            message: "second".to_string(),
            created_at: Utc::now(),
        };
        let other = Notification {
            id: Uuid::new_v4(),
            user_id: bob.id,
            message: "not yours".to_string(),
            created_at: Utc::now(),
        };
        db.create_notification(&older).unwrap();
        db.create_notification(&newer).unwrap();
        db.create_notification(&other).unwrap();

        let list = db.list_notifications_for_user(alice.id).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].message, "second");
        assert_eq!(list[1].message, "first");
    }
}
