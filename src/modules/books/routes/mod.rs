//! HTTP handlers for the books module.

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use bookshelf_http::error::AppError;
use bookshelf_kernel::api_path;
use serde_json::json;

use super::models::{Book, BookOrdering, Isbn, ListParams, NewBook, RegisterBook, SearchParams};
use super::store::StoreError;
use super::BooksState;

const MODULE: &str = "books";

/// Build the books router with its paths under `/api/books`
pub fn router(state: BooksState) -> Router {
    Router::new()
        .route(&api_path(MODULE, "/"), get(list_books).post(register_book))
        .route(&api_path(MODULE, "/search/"), get(search_books))
        .route(&api_path(MODULE, "/{id}/"), delete(delete_book))
        .route(&api_path(MODULE, "/health"), get(health_check))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "books module is healthy"
}

/// Register a book: validate the ISBN, reject duplicates, look it up, persist it
async fn register_book(
    State(state): State<BooksState>,
    body: Result<Json<RegisterBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let raw = match body {
        Ok(Json(RegisterBook { isbn: Some(isbn) })) => isbn,
        Ok(Json(RegisterBook { isbn: None })) => {
            return Err(invalid_isbn("ISBN is required".to_string()));
        }
        Err(rejection) => return Err(invalid_isbn(rejection.body_text())),
    };
    let isbn = Isbn::parse(&raw).map_err(|e| invalid_isbn(e.to_string()))?;

    if let Some(existing) = state.store.find_by_isbn(isbn.as_str())? {
        return Err(already_registered(existing));
    }

    let info = state
        .lookup
        .lookup(&isbn)
        .await?
        .ok_or_else(|| AppError::not_found("No book was found for this ISBN"))?;

    let new_book = NewBook {
        isbn: isbn.clone(),
        title: info.title,
        cover_image_url: info.cover_image_url,
    };
    let book = match state.store.insert(new_book) {
        Ok(book) => book,
        // Lost a race with a concurrent registration of the same ISBN
        Err(StoreError::Duplicate(_)) => {
            return Err(match state.store.find_by_isbn(isbn.as_str())? {
                Some(existing) => already_registered(existing),
                None => StoreError::Duplicate(isbn.to_string()).into(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        book_id = book.id,
        isbn = %book.isbn,
        has_cover = book.cover_image_url.is_some(),
        "book registered"
    );
    Ok((StatusCode::CREATED, Json(book)))
}

/// List all books in the requested order
async fn list_books(
    State(state): State<BooksState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Book>>, AppError> {
    let ordering = BookOrdering::from_param(params.ordering.as_deref());
    let books = state.store.list(ordering)?;
    Ok(Json(books))
}

/// Search books by title; a blank query matches nothing
async fn search_books(
    State(state): State<BooksState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Book>>, AppError> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let books = state.store.search_title(query)?;
    Ok(Json(books))
}

/// Delete a book by id
async fn delete_book(
    State(state): State<BooksState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Ok(Path(id)) = id else {
        return Err(AppError::not_found("Book not found"));
    };

    if state.store.delete(id)? {
        tracing::info!(book_id = id, "book deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Book not found"))
    }
}

fn invalid_isbn(reason: String) -> AppError {
    AppError::validation(
        vec![json!({ "field": "isbn", "error": reason })],
        "Enter a valid 10- or 13-digit ISBN",
    )
}

fn already_registered(existing: Book) -> AppError {
    AppError::conflict(
        vec![json!({ "book": existing })],
        "This book is already registered",
    )
}
