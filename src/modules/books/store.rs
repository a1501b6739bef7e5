//! SQLite-backed record store for registered books.

use std::sync::{Arc, Mutex, MutexGuard};

use bookshelf_http::error::AppError;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{Book, BookOrdering, NewBook};

const BOOK_COLUMNS: &str = "id, isbn, title, cover_image_url, created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a book with ISBN {0} is already registered")]
    Duplicate(String),
    #[error("database connection mutex poisoned")]
    Poisoned,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AppError::conflict(vec![], "This book is already registered"),
            other => AppError::Internal(anyhow::Error::new(other).context("book store failure")),
        }
    }
}

/// Persistence operations for books; ISBN uniqueness is enforced by the implementation.
pub trait BookStore: Send + Sync {
    fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError>;

    /// Persist a new book, stamping its creation time.
    fn insert(&self, book: NewBook) -> Result<Book, StoreError>;

    fn list(&self, ordering: BookOrdering) -> Result<Vec<Book>, StoreError>;

    /// Case-insensitive substring match on title, newest first.
    fn search_title(&self, query: &str) -> Result<Vec<Book>, StoreError>;

    /// Returns whether a book was deleted.
    fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct SqliteBookStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBookStore {
    /// Wrap a connection whose schema has been migrated.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl BookStore for SqliteBookStore {
    fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, StoreError> {
        let conn = self.lock()?;
        let book = conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM book WHERE isbn = ?1"),
                params![isbn],
                book_from_row,
            )
            .optional()?;
        Ok(book)
    }

    fn insert(&self, book: NewBook) -> Result<Book, StoreError> {
        let created_at = now_micros();
        let conn = self.lock()?;

        let result = conn.execute(
            "INSERT INTO book (isbn, title, cover_image_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                book.isbn.as_str(),
                book.title,
                book.cover_image_url,
                created_at
            ],
        );
        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(StoreError::Duplicate(book.isbn.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Book {
            id: conn.last_insert_rowid(),
            isbn: book.isbn.to_string(),
            title: book.title,
            cover_image_url: book.cover_image_url,
            created_at: from_micros(created_at)?,
        })
    }

    fn list(&self, ordering: BookOrdering) -> Result<Vec<Book>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM book ORDER BY {}",
            ordering.sql()
        ))?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn search_title(&self, query: &str) -> Result<Vec<Book>, StoreError> {
        let pattern = format!("%{}%", escape_like(query));
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM book WHERE title LIKE ?1 ESCAPE '\\' ORDER BY {}",
            BookOrdering::CreatedAtDesc.sql()
        ))?;
        let books = stmt
            .query_map(params![pattern], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM book WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    let created_at: i64 = row.get(4)?;
    Ok(Book {
        id: row.get(0)?,
        isbn: row.get(1)?,
        title: row.get(2)?,
        cover_image_url: row.get(3)?,
        created_at: from_micros(created_at).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Integer, Box::new(e))
        })?,
    })
}

fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}

fn from_micros(micros: i64) -> Result<OffsetDateTime, time::error::ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
}

impl From<time::error::ComponentRange> for StoreError {
    fn from(err: time::error::ComponentRange) -> Self {
        StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Integer,
            Box::new(err),
        ))
    }
}

/// Make `%`, `_` and `\` match literally in a LIKE pattern escaped with `\`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
