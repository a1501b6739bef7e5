use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// A registered book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned identifier
    pub id: i64,
    /// 10- or 13-digit ISBN, unique across all books
    pub isbn: String,
    /// Title as reported by the bibliographic catalog
    pub title: String,
    /// HTTPS cover image URL, when one was found
    pub cover_image_url: Option<String>,
    /// When the book was registered
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload for a book that passed the lookup chain.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub isbn: Isbn,
    pub title: String,
    pub cover_image_url: Option<String>,
}

/// Request model for registering a book.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBook {
    pub isbn: Option<String>,
}

/// Title and cover art resolved for an ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookInfo {
    pub title: String,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsbnError {
    #[error("ISBN must contain digits only")]
    NotDigits,
    #[error("ISBN must be 10 or 13 digits long, got {0}")]
    WrongLength(usize),
}

/// An ISBN made of exactly 10 or 13 ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isbn(String);

impl Isbn {
    pub fn parse(raw: &str) -> Result<Self, IsbnError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IsbnError::NotDigits);
        }
        match raw.len() {
            10 | 13 => Ok(Self(raw.to_string())),
            len => Err(IsbnError::WrongLength(len)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort order accepted by the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookOrdering {
    TitleAsc,
    TitleDesc,
    CreatedAtAsc,
    #[default]
    CreatedAtDesc,
}

impl BookOrdering {
    /// Parse the `ordering` query parameter; anything unrecognised means newest first.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("title") => Self::TitleAsc,
            Some("-title") => Self::TitleDesc,
            Some("created_at") => Self::CreatedAtAsc,
            _ => Self::CreatedAtDesc,
        }
    }

    /// SQL `ORDER BY` clause; `id` breaks ties in the same direction.
    pub fn sql(self) -> &'static str {
        match self {
            Self::TitleAsc => "title ASC, id ASC",
            Self::TitleDesc => "title DESC, id DESC",
            Self::CreatedAtAsc => "created_at ASC, id ASC",
            Self::CreatedAtDesc => "created_at DESC, id DESC",
        }
    }
}

/// Query parameters of the list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub ordering: Option<String>,
}

/// Query parameters of the search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ten_and_thirteen_digit_isbns() {
        assert_eq!(Isbn::parse("4834000826").unwrap().as_str(), "4834000826");
        assert_eq!(
            Isbn::parse("9784834000825").unwrap().to_string(),
            "9784834000825"
        );
    }

    #[test]
    fn rejects_malformed_isbns() {
        for raw in ["", "123456789X", "978-4834000825", " 4834000826", "４８３４０００８２６"] {
            assert_eq!(Isbn::parse(raw), Err(IsbnError::NotDigits), "{raw:?}");
        }
        for raw in ["123456789", "12345678901", "123456789012", "12345678901234"] {
            assert_eq!(
                Isbn::parse(raw),
                Err(IsbnError::WrongLength(raw.len())),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn ordering_falls_back_to_newest_first() {
        assert_eq!(BookOrdering::from_param(Some("title")), BookOrdering::TitleAsc);
        assert_eq!(BookOrdering::from_param(Some("-title")), BookOrdering::TitleDesc);
        assert_eq!(
            BookOrdering::from_param(Some("created_at")),
            BookOrdering::CreatedAtAsc
        );
        assert_eq!(
            BookOrdering::from_param(Some("-created_at")),
            BookOrdering::CreatedAtDesc
        );
        assert_eq!(BookOrdering::from_param(Some("isbn")), BookOrdering::CreatedAtDesc);
        assert_eq!(BookOrdering::from_param(None), BookOrdering::CreatedAtDesc);
    }

    #[test]
    fn book_serializes_created_at_as_rfc3339() {
        let book = Book {
            id: 1,
            isbn: "9784834000825".to_string(),
            title: "ぐりとぐら".to_string(),
            cover_image_url: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };

        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
        assert!(json["cover_image_url"].is_null());
    }
}
