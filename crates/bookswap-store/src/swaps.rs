//! CRUD and the atomic ownership exchange for [`SwapRequest`] records.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{BookCard, SwapOverview, SwapRequest, SwapStatus, UserSummary};
use crate::rows;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new swap request.
    pub fn create_swap(&self, swap: &SwapRequest) -> Result<()> {
        self.conn().execute(
            "INSERT INTO swap_requests (id, from_user, to_user, offered_book, requested_book,
                                        status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                swap.id.to_string(),
                swap.from_user.to_string(),
                swap.to_user.to_string(),
                swap.offered_book.to_string(),
                swap.requested_book.to_string(),
                swap.status.as_str(),
                swap.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single swap request by UUID.
    pub fn get_swap(&self, id: Uuid) -> Result<SwapRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {SWAP_COLUMNS} FROM swap_requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_swap,
            )
            .map_err(not_found)
    }

    /// Look for a still-pending request with the exact same participants and
    /// books.  Terminal requests never match, so a rejected swap may be
    /// recreated identically.
    pub fn find_pending_swap(
        &self,
        from_user: Uuid,
        to_user: Uuid,
        offered_book: Uuid,
        requested_book: Uuid,
    ) -> Result<Option<SwapRequest>> {
        let result = self.conn().query_row(
            &format!(
                "SELECT {SWAP_COLUMNS} FROM swap_requests
                 WHERE from_user = ?1 AND to_user = ?2
                   AND offered_book = ?3 AND requested_book = ?4
                   AND status = 'pending'"
            ),
            params![
                from_user.to_string(),
                to_user.to_string(),
                offered_book.to_string(),
                requested_book.to_string(),
            ],
            row_to_swap,
        );

        match result {
            Ok(swap) => Ok(Some(swap)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Requests addressed to `user`, newest first, enriched with the
    /// initiating user's identity and both books.
    pub fn list_incoming_swaps(&self, user: Uuid) -> Result<Vec<SwapOverview>> {
        self.list_swaps_enriched(INCOMING_SQL, user)
    }

    /// Requests initiated by `user`, newest first, enriched with the
    /// recipient's identity and both books.
    pub fn list_outgoing_swaps(&self, user: Uuid) -> Result<Vec<SwapOverview>> {
        self.list_swaps_enriched(OUTGOING_SQL, user)
    }

    fn list_swaps_enriched(&self, sql: &str, user: Uuid) -> Result<Vec<SwapOverview>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![user.to_string()], row_to_overview)?;

        let mut swaps = Vec::new();
        for row in rows {
            swaps.push(row?);
        }
        Ok(swaps)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set the status of a swap request.
    pub fn set_swap_status(&self, id: Uuid, status: SwapStatus) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE swap_requests SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Execute the ownership exchange of an accepted swap as one SQLite
    /// transaction.
    ///
    /// Inside the transaction both books' owners are re-read and compared
    /// against the request; if either has drifted (a competing swap completed
    /// first) the transaction rolls back with [`StoreError::OwnershipDrift`]
    /// and nothing is written.  Otherwise the two `owner_id` values are
    /// exchanged and the request is marked `completed`, atomically.
    pub fn complete_swap(&mut self, swap: &SwapRequest) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let offered_owner: String = tx
            .query_row(
                "SELECT owner_id FROM books WHERE id = ?1",
                params![swap.offered_book.to_string()],
                |row| row.get(0),
            )
            .map_err(not_found)?;
        let requested_owner: String = tx
            .query_row(
                "SELECT owner_id FROM books WHERE id = ?1",
                params![swap.requested_book.to_string()],
                |row| row.get(0),
            )
            .map_err(not_found)?;

        if offered_owner != swap.from_user.to_string()
            || requested_owner != swap.to_user.to_string()
        {
            // Dropping the transaction rolls it back.
            return Err(StoreError::OwnershipDrift);
        }

        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE books SET owner_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![swap.to_user.to_string(), now, swap.offered_book.to_string()],
        )?;
        tx.execute(
            "UPDATE books SET owner_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                swap.from_user.to_string(),
                now,
                swap.requested_book.to_string()
            ],
        )?;
        tx.execute(
            "UPDATE swap_requests SET status = 'completed' WHERE id = ?1",
            params![swap.id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SWAP_COLUMNS: &str =
    "id, from_user, to_user, offered_book, requested_book, status, created_at";

// The book joins are LEFT JOINs: a referenced book may have been deleted by
// its owner while the request was pending, and the listing must still render.
const INCOMING_SQL: &str = "SELECT s.id, s.status, s.created_at,
            u.id, u.name, u.email,
            ob.id, ob.title, ob.image_url,
            rb.id, rb.title, rb.image_url
     FROM swap_requests s
     JOIN users u        ON u.id  = s.from_user
     LEFT JOIN books ob  ON ob.id = s.offered_book
     LEFT JOIN books rb  ON rb.id = s.requested_book
     WHERE s.to_user = ?1
     ORDER BY s.created_at DESC";

const OUTGOING_SQL: &str = "SELECT s.id, s.status, s.created_at,
            u.id, u.name, u.email,
            ob.id, ob.title, ob.image_url,
            rb.id, rb.title, rb.image_url
     FROM swap_requests s
     JOIN users u        ON u.id  = s.to_user
     LEFT JOIN books ob  ON ob.id = s.offered_book
     LEFT JOIN books rb  ON rb.id = s.requested_book
     WHERE s.from_user = ?1
     ORDER BY s.created_at DESC";

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`SwapRequest`].
fn row_to_swap(row: &rusqlite::Row<'_>) -> rusqlite::Result<SwapRequest> {
    let id_str: String = row.get(0)?;
    let from_str: String = row.get(1)?;
    let to_str: String = row.get(2)?;
    let offered_str: String = row.get(3)?;
    let requested_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;

    let status = SwapStatus::parse(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SwapRequest {
        id: rows::uuid_col(0, &id_str)?,
        from_user: rows::uuid_col(1, &from_str)?,
        to_user: rows::uuid_col(2, &to_str)?,
        offered_book: rows::uuid_col(3, &offered_str)?,
        requested_book: rows::uuid_col(4, &requested_str)?,
        status,
        created_at: rows::ts_col(6, &created_str)?,
    })
}

/// Map an enriched listing row to a [`SwapOverview`].
fn row_to_overview(row: &rusqlite::Row<'_>) -> rusqlite::Result<SwapOverview> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(1)?;
    let created_str: String = row.get(2)?;
    let user_id_str: String = row.get(3)?;
    let user_name: String = row.get(4)?;
    let user_email: String = row.get(5)?;

    let status = SwapStatus::parse(&status_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SwapOverview {
        id: rows::uuid_col(0, &id_str)?,
        status,
        created_at: rows::ts_col(2, &created_str)?,
        counterpart: UserSummary {
            id: rows::uuid_col(3, &user_id_str)?,
            name: user_name,
            email: user_email,
        },
        offered_book: book_card(row, 6)?,
        requested_book: book_card(row, 9)?,
    })
}

/// Read the three columns of an optional joined book starting at `base`.
fn book_card(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Option<BookCard>> {
    let id_str: Option<String> = row.get(base)?;
    let Some(id_str) = id_str else {
        return Ok(None);
    };
    let title: String = row.get(base + 1)?;
    let image_url: Option<String> = row.get(base + 2)?;

    Ok(Some(BookCard {
        id: rows::uuid_col(base, &id_str)?,
        title,
        image_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_test_db, sample_book, sample_swap, sample_user};

    #[test]
    fn exchange_swaps_both_owners_and_completes() {
        let (mut db, _dir) = open_test_db();
        let alice = sample_user("alice@example.com");
        let bob = sample_user("bob@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();

        let x = sample_book(alice.id, "Book X");
        let y = sample_book(bob.id, "Book Y");
        db.create_book(&x).unwrap();
        db.create_book(&y).unwrap();

        let swap = sample_swap(alice.id, bob.id, x.id, y.id);
        db.create_swap(&swap).unwrap();

        db.complete_swap(&swap).unwrap();

        assert_eq!(db.get_book(x.id).unwrap().owner_id, bob.id);
        assert_eq!(db.get_book(y.id).unwrap().owner_id, alice.id);
        assert_eq!(db.get_swap(swap.id).unwrap().status, SwapStatus::Completed);
    }

    #[test]
    fn exchange_rolls_back_on_ownership_drift() {
        let (mut db, _dir) = open_test_db();
        let alice = sample_user("alice@example.com");
        let bob = sample_user("bob@example.com");
        let carol = sample_user("carol@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();
        db.create_user(&carol).unwrap();

        let x = sample_book(alice.id, "Book X");
        let y = sample_book(bob.id, "Book Y");
        let z = sample_book(carol.id, "Book Z");
        db.create_book(&x).unwrap();
        db.create_book(&y).unwrap();
        db.create_book(&z).unwrap();

        let first = sample_swap(alice.id, bob.id, x.id, y.id);
        let second = sample_swap(carol.id, bob.id, z.id, y.id);
        db.create_swap(&first).unwrap();
        db.create_swap(&second).unwrap();

        db.complete_swap(&first).unwrap();

        // Book Y now belongs to Alice, so the competing request must fail
        // and leave every row untouched.
        let err = db.complete_swap(&second).unwrap_err();
        assert!(matches!(err, StoreError::OwnershipDrift));

        assert_eq!(db.get_book(z.id).unwrap().owner_id, carol.id);
        assert_eq!(db.get_book(y.id).unwrap().owner_id, alice.id);
        assert_eq!(db.get_swap(second.id).unwrap().status, SwapStatus::Pending);
    }

    #[test]
    fn pending_finder_ignores_terminal_requests() {
        let (db, _dir) = open_test_db();
        let alice = sample_user("alice@example.com");
        let bob = sample_user("bob@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();

        let x = sample_book(alice.id, "Book X");
        let y = sample_book(bob.id, "Book Y");
        db.create_book(&x).unwrap();
        db.create_book(&y).unwrap();

        let swap = sample_swap(alice.id, bob.id, x.id, y.id);
        db.create_swap(&swap).unwrap();

        assert!(db
            .find_pending_swap(alice.id, bob.id, x.id, y.id)
            .unwrap()
            .is_some());

        db.set_swap_status(swap.id, SwapStatus::Rejected).unwrap();

        assert!(db
            .find_pending_swap(alice.id, bob.id, x.id, y.id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn listings_enrich_counterpart_and_tolerate_deleted_books() {
        let (db, _dir) = open_test_db();
        let alice = sample_user("alice@example.com");
        let bob = sample_user("bob@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();

        let x = sample_book(alice.id, "Book X");
        let y = sample_book(bob.id, "Book Y");
        db.create_book(&x).unwrap();
        db.create_book(&y).unwrap();

        let swap = sample_swap(alice.id, bob.id, x.id, y.id);
        db.create_swap(&swap).unwrap();

        let incoming = db.list_incoming_swaps(bob.id).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].counterpart.email, "alice@example.com");
        assert_eq!(
            incoming[0].offered_book.as_ref().unwrap().title,
            "Book X"
        );

        let outgoing = db.list_outgoing_swaps(alice.id).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].counterpart.email, "bob@example.com");

        // Deleting the offered book leaves the listing readable.
        db.delete_book(x.id).unwrap();
        let incoming = db.list_incoming_swaps(bob.id).unwrap();
        assert!(incoming[0].offered_book.is_none());
        assert!(incoming[0].requested_book.is_some());
    }
}
