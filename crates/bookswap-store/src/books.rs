//! CRUD operations for [`Book`] records.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Book, BookCondition};
use crate::rows;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new book.
    pub fn create_book(&self, book: &Book) -> Result<()> {
        self.conn().execute(
            "INSERT INTO books (id, title, author, description, condition, genre, image_url,
                                available, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                book.id.to_string(),
                book.title,
                book.author,
                book.description,
                book.condition.map(|c| c.as_str()),
                book.genre,
                book.image_url,
                book.available,
                book.owner_id.to_string(),
                book.created_at.to_rfc3339(),
                book.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single book by UUID.
    pub fn get_book(&self, id: Uuid) -> Result<Book> {
        self.conn()
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                params![id.to_string()],
                row_to_book,
            )
            .map_err(not_found)
    }

    /// List all books, newest first.  When `query` is set, only books whose
    /// title, author, or genre contains the substring (case-insensitive for
    /// ASCII, per SQLite `LIKE`) are returned.
    pub fn list_books(&self, query: Option<&str>) -> Result<Vec<Book>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books
             WHERE ?1 IS NULL
                OR title  LIKE '%' || ?1 || '%'
                OR author LIKE '%' || ?1 || '%'
                OR genre  LIKE '%' || ?1 || '%'
             ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![query], row_to_book)?;

        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    /// List the books owned by a specific user, newest first.
    pub fn list_books_by_owner(&self, owner_id: Uuid) -> Result<Vec<Book>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books
             WHERE owner_id = ?1
             ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![owner_id.to_string()], row_to_book)?;

        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Persist edits to a book's descriptive fields.  Ownership is not
    /// touched here; it changes only inside [`Database::complete_swap`].
    ///
    /// [`Database::complete_swap`]: crate::Database::complete_swap
    pub fn update_book(&self, book: &Book) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE books SET title = ?1, author = ?2, description = ?3, condition = ?4,
                              genre = ?5, available = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                book.title,
                book.author,
                book.description,
                book.condition.map(|c| c.as_str()),
                book.genre,
                book.available,
                Utc::now().to_rfc3339(),
                book.id.to_string(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a book by UUID.  Returns `true` if a row was deleted.
    pub fn delete_book(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM books WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BOOK_COLUMNS: &str = "id, title, author, description, condition, genre, image_url, \
                            available, owner_id, created_at, updated_at";

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`Book`].
fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let author: String = row.get(2)?;
    let description: String = row.get(3)?;
    let condition_str: Option<String> = row.get(4)?;
    let genre: Option<String> = row.get(5)?;
    let image_url: Option<String> = row.get(6)?;
    let available: bool = row.get(7)?;
    let owner_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;

    let condition = condition_str
        .as_deref()
        .map(BookCondition::parse)
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Book {
        id: rows::uuid_col(0, &id_str)?,
        title,
        author,
        description,
        condition,
        genre,
        image_url,
        available,
        owner_id: rows::uuid_col(8, &owner_str)?,
        created_at: rows::ts_col(9, &created_str)?,
        updated_at: rows::ts_col(10, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_test_db, sample_book, sample_user};

    #[test]
    fn create_and_fetch_round_trip() {
        let (db, _dir) = open_test_db();
        let owner = sample_user("owner@example.com");
        db.create_user(&owner).unwrap();

        let book = sample_book(owner.id, "Dune");
        db.create_book(&book).unwrap();

        let fetched = db.get_book(book.id).unwrap();
        assert_eq!(fetched.title, "Dune");
        assert_eq!(fetched.owner_id, owner.id);
        assert_eq!(fetched.condition, Some(BookCondition::Good));
    }

    #[test]
    fn substring_filter_matches_title_author_genre() {
        let (db, _dir) = open_test_db();
        let owner = sample_user("owner@example.com");
        db.create_user(&owner).unwrap();

        let mut a = sample_book(owner.id, "The Left Hand of Darkness");
        a.author = "Ursula K. Le Guin".to_string();
        let mut b = sample_book(owner.id, "Neuromancer");
        b.genre = Some("cyberpunk".to_string());
        db.create_book(&a).unwrap();
        db.create_book(&b).unwrap();

        let by_title = db.list_books(Some("darkness")).unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].id, a.id);

        let by_author = db.list_books(Some("le guin")).unwrap();
        assert_eq!(by_author.len(), 1);

        let by_genre = db.list_books(Some("cyber")).unwrap();
        assert_eq!(by_genre.len(), 1);
        assert_eq!(by_genre[0].id, b.id);

        assert_eq!(db.list_books(None).unwrap().len(), 2);
        assert!(db.list_books(Some("no such book")).unwrap().is_empty());
    }

    #[test]
    fn list_by_owner_excludes_others() {
        let (db, _dir) = open_test_db();
        let alice = sample_user("alice@example.com");
        let bob = sample_user("bob@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();

        db.create_book(&sample_book(alice.id, "Book A")).unwrap();
        db.create_book(&sample_book(bob.id, "Book B")).unwrap();

        let mine = db.list_books_by_owner(alice.id).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Book A");
    }

    #[test]
    fn delete_reports_whether_row_existed() {
        let (db, _dir) = open_test_db();
        let owner = sample_user("owner@example.com");
        db.create_user(&owner).unwrap();
        let book = sample_book(owner.id, "Ephemeral");
        db.create_book(&book).unwrap();

        assert!(db.delete_book(book.id).unwrap());
        assert!(!db.delete_book(book.id).unwrap());
        assert!(matches!(db.get_book(book.id), Err(StoreError::NotFound)));
    }
}
