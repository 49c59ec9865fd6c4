//! Book catalog handlers.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bookswap_store::{Book, BookCondition, StoreError, UserSummary};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::image_store::absolute_image_url;

use super::AppState;

#[derive(Deserialize)]
pub struct ListBooksQuery {
    /// Substring filter over title, author, and genre.
    pub q: Option<String>,
}

/// `GET /api/books`
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let mut books = state.db.lock().await.list_books(q)?;
    for book in &mut books {
        resolve_image(&state, book);
    }
    Ok(Json(books))
}

#[derive(Serialize)]
pub struct BookWithOwner {
    #[serde(flatten)]
    pub book: Book,
    pub owner: UserSummary,
}

/// `GET /api/books/:id`
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookWithOwner>, ApiError> {
    let db = state.db.lock().await;
    let mut book = db.get_book(id).map_err(book_not_found)?;
    let owner = db.get_user(book.owner_id)?;
    drop(db);

    resolve_image(&state, &mut book);
    Ok(Json(BookWithOwner {
        book,
        owner: UserSummary {
            id: owner.id,
            name: owner.name,
            email: owner.email,
        },
    }))
}

/// `GET /api/books/mine`
pub async fn list_my_books(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Book>>, ApiError> {
    let mut books = state.db.lock().await.list_books_by_owner(auth.id)?;
    for book in &mut books {
        resolve_image(&state, book);
    }
    Ok(Json(books))
}

/// `POST /api/books`
///
/// Multipart form: `title`, `author`, `description` (required), `condition`,
/// `genre`, `available`, and either an `image` file part or an `image_url`
/// text field.
pub async fn add_book(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let mut title = None;
    let mut author = None;
    let mut description = None;
    let mut condition = None;
    let mut genre = None;
    let mut available = true;
    let mut image_url = None;
    let mut image: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read image field: {}", e))
                })?;
                if !data.is_empty() {
                    image = Some((data.to_vec(), file_name));
                }
            }
            _ => {
                let value = field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read field '{}': {}", name, e))
                })?;
                match name.as_str() {
                    "title" => title = Some(value),
                    "author" => author = Some(value),
                    "description" => description = Some(value),
                    "condition" => condition = Some(value),
                    "genre" => genre = Some(value),
                    "available" => available = value != "false" && value != "0",
                    "image_url" => image_url = Some(value),
                    // Unknown fields are rejected rather than silently dropped.
                    other => {
                        return Err(ApiError::BadRequest(format!(
                            "Unknown field '{}'",
                            other
                        )))
                    }
                }
            }
        }
    }

    let title = required_text("Title", title)?;
    let author = required_text("Author", author)?;
    let description = required_text("Description", description)?;
    let condition = parse_condition(condition.as_deref())?;
    let genre = genre.map(|g| g.trim().to_string()).filter(|g| !g.is_empty());

    let image_url = match image {
        Some((data, file_name)) => Some(state.images.store(&data, &file_name).await?),
        None => image_url.filter(|u| !u.trim().is_empty()),
    };

    let now = Utc::now();
    let book = Book {
        id: Uuid::new_v4(),
        title,
        author,
        description,
        condition,
        genre,
        image_url,
        available,
        owner_id: auth.id,
        created_at: now,
        updated_at: now,
    };
    state.db.lock().await.create_book(&book)?;

    let mut response = book;
    resolve_image(&state, &mut response);
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub condition: Option<String>,
    pub genre: Option<String>,
    pub available: Option<bool>,
}

/// `PUT /api/books/:id`
///
/// Owner-only edit of the descriptive fields.  Ownership itself never moves
/// here.
pub async fn update_book(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<Book>, ApiError> {
    let db = state.db.lock().await;
    let mut book = db.get_book(id).map_err(book_not_found)?;
    if book.owner_id != auth.id {
        return Err(ApiError::Forbidden(
            "You are not authorized to update this book".to_string(),
        ));
    }

    if let Some(title) = req.title {
        book.title = required_text("Title", Some(title))?;
    }
    if let Some(author) = req.author {
        book.author = required_text("Author", Some(author))?;
    }
    if let Some(description) = req.description {
        book.description = required_text("Description", Some(description))?;
    }
    if let Some(condition) = req.condition {
        book.condition = parse_condition(Some(&condition))?;
    }
    if let Some(genre) = req.genre {
        book.genre = Some(genre.trim().to_string()).filter(|g| !g.is_empty());
    }
    if let Some(available) = req.available {
        book.available = available;
    }

    db.update_book(&book)?;
    drop(db);

    resolve_image(&state, &mut book);
    Ok(Json(book))
}

#[derive(Serialize)]
pub struct DeleteBookResponse {
    pub message: String,
}

/// `DELETE /api/books/:id`
///
/// Owner-only.  The stored cover image is removed best-effort after the row.
pub async fn delete_book(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteBookResponse>, ApiError> {
    let image_url = {
        let db = state.db.lock().await;
        let book = db.get_book(id).map_err(book_not_found)?;
        if book.owner_id != auth.id {
            return Err(ApiError::Forbidden(
                "You are not authorized to delete this book".to_string(),
            ));
        }
        db.delete_book(id)?;
        book.image_url
    };

    if let Some(url) = image_url {
        if let Err(e) = state.images.delete_by_url(&url).await {
            tracing::warn!(book = %id, error = %e, "cover image cleanup failed");
        }
    }

    Ok(Json(DeleteBookResponse {
        message: "Book deleted successfully".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn book_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => ApiError::NotFound("Book not found".to_string()),
        other => other.into(),
    }
}

fn required_text(label: &str, value: Option<String>) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{label} is required"))),
    }
}

fn parse_condition(value: Option<&str>) -> Result<Option<BookCondition>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => BookCondition::parse(&raw.to_lowercase())
            .map(Some)
            .map_err(|_| {
                ApiError::BadRequest("Condition must be one of: new, good, old".to_string())
            }),
    }
}

fn resolve_image(state: &AppState, book: &mut Book) {
    if let Some(url) = &book.image_url {
        book.image_url = Some(absolute_image_url(&state.config.public_base_url, url));
    }
}
