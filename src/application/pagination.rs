//! Load-more cursor wrapping the CMS `next_page` URL.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;

/// Opaque cursor handed to clients; wraps the CMS-provided next page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor {
    next_page: String,
}

impl FeedCursor {
    pub fn new(next_page: impl Into<String>) -> Self {
        Self {
            next_page: next_page.into(),
        }
    }

    /// Cursor for the page after a search response, if the CMS reported one.
    pub fn from_next_page(next_page: Option<&str>) -> Option<Self> {
        next_page
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(Self::new)
    }

    pub fn next_page(&self) -> &str {
        &self.next_page
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.next_page.as_bytes())
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.trim())
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let next_page = String::from_utf8(bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        if next_page.trim().is_empty() {
            return Err(PaginationError::InvalidCursor("empty cursor".to_string()));
        }
        Ok(Self { next_page })
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
