//! Client for the headless content service.

use async_trait::async_trait;
use thiserror::Error;

mod documents;
mod prismic;
mod query;

pub use documents::{ApiInfo, Document, RefInfo, SearchResponse};
pub use prismic::PrismicClient;
pub use query::{FIRST_PUBLICATION_DATE, Ordering, Predicate, SearchQuery};

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("content request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("content service did not advertise a master ref")]
    MissingMasterRef,
    #[error("pagination URL `{0}` does not belong to the configured content service")]
    ForeignCursor(String),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Read access to the documents the site renders.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Ref of the currently published content.
    async fn master_ref(&self) -> Result<String, CmsError>;

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, CmsError>;

    /// Fetch an opaque `next_page` URL previously returned by [`ContentRepo::search`].
    async fn follow_page(&self, next_page: &str) -> Result<SearchResponse, CmsError>;
}
