//! ISBN lookup chain: the bibliographic catalog supplies the title, the
//! volumes API backfills a missing cover image.
//!
//! Catalog failures abort the lookup. Cover failures never do: the book is
//! still returned with its title and no cover.

pub mod catalog;
pub mod covers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bookshelf_http::error::AppError;
use bookshelf_kernel::settings::CatalogSettings;
use thiserror::Error;

use super::models::{BookInfo, Isbn};

pub use catalog::CatalogClient;
pub use covers::CoverClient;

/// Transport-level failure talking to an external catalog.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{service} did not respond in time")]
    Timeout { service: &'static str },

    #[error("could not connect to {service}")]
    Connect { service: &'static str },

    #[error("{service} responded with HTTP {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("request to {service} failed")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned an unreadable body: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },
}

impl LookupError {
    /// Classify a reqwest error; timeouts win over connection failures.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { service }
        } else if err.is_connect() {
            Self::Connect { service }
        } else if let Some(status) = err.status() {
            Self::Status { service, status }
        } else {
            Self::Request {
                service,
                source: err,
            }
        }
    }
}

impl From<LookupError> for AppError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Timeout { .. } => {
                AppError::upstream_timeout("The book catalog did not respond in time")
            }
            LookupError::Connect { .. } => {
                AppError::upstream_unavailable("Could not connect to the book catalog")
            }
            LookupError::Status { .. }
            | LookupError::Request { .. }
            | LookupError::Decode { .. } => {
                AppError::upstream_unavailable("The book catalog request failed")
            }
        }
    }
}

/// Primary lookup: resolves the title of a book.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// `Ok(None)` when the catalog has no usable entry for the ISBN.
    async fn find_title(&self, isbn: &str) -> Result<Option<BookInfo>, LookupError>;
}

/// Secondary lookup: resolves a cover image URL.
#[async_trait]
pub trait CoverSource: Send + Sync {
    async fn find_cover(&self, isbn: &str) -> Result<Option<String>, LookupError>;
}

/// Composes the catalog and cover sources into one fallback policy.
#[derive(Clone)]
pub struct BookLookup {
    catalog: Arc<dyn CatalogSource>,
    covers: Arc<dyn CoverSource>,
}

impl BookLookup {
    pub fn new(catalog: Arc<dyn CatalogSource>, covers: Arc<dyn CoverSource>) -> Self {
        Self { catalog, covers }
    }

    /// Build HTTP clients for the configured endpoints.
    pub fn from_settings(settings: &CatalogSettings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let catalog = CatalogClient::new(settings.search_endpoint.clone(), timeout)?;
        let covers = CoverClient::new(settings.volumes_endpoint.clone(), timeout)?;
        Ok(Self::new(Arc::new(catalog), Arc::new(covers)))
    }

    /// Look up title and cover art; `Ok(None)` means the catalog knows no such book.
    pub async fn lookup(&self, isbn: &Isbn) -> Result<Option<BookInfo>, LookupError> {
        let Some(mut info) = self.catalog.find_title(isbn.as_str()).await? else {
            tracing::debug!(%isbn, "catalog has no entry");
            return Ok(None);
        };

        if info.cover_image_url.is_none() {
            match self.covers.find_cover(isbn.as_str()).await {
                Ok(cover) => info.cover_image_url = cover,
                Err(e) => tracing::warn!(%isbn, error = %e, "cover lookup failed, continuing without cover"),
            }
        }

        info.cover_image_url = info.cover_image_url.map(covers::upgrade_to_https);

        tracing::debug!(%isbn, title = %info.title, has_cover = info.cover_image_url.is_some(), "lookup complete");
        Ok(Some(info))
    }
}
