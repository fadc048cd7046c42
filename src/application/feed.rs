use std::sync::Arc;

use askama::Template;
use axum::response::{Html, Response};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::error::HttpError;
use crate::application::pagination::FeedCursor;
use crate::application::stream::StreamBuilder;
use crate::cms::{
    CmsError, ContentRepo, Document, FIRST_PUBLICATION_DATE, Ordering, Predicate, SearchQuery,
    SearchResponse,
};
use crate::config::CmsSettings;
use crate::domain::error::DomainError;
use crate::domain::posts::{PostDetail, PostSummary};
use crate::domain::{dates, reading_time, rich_text};
use crate::presentation::views::{
    AdjacentPostView, FeedLoaderContext, FeedLoaderTemplate, PostCard, PostCardsTemplate,
    PostDetailContext, PostSectionView, TemplateRenderError, post_href,
};

/// Page size used when walking the whole collection.
const SLUG_PAGE_SIZE: u32 = 100;

#[derive(Clone, Debug, PartialEq)]
pub struct ListingPage {
    pub page: u32,
    pub total_pages: u32,
    pub cards: Vec<PostCard>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Cms(#[from] CmsError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Reads posts from the content service and shapes them for the views.
#[derive(Clone)]
pub struct FeedService {
    repo: Arc<dyn ContentRepo>,
    post_type: String,
    page_size: u32,
    timezone: Tz,
}

impl FeedService {
    pub fn new(repo: Arc<dyn ContentRepo>, cms: &CmsSettings, timezone: Tz) -> Self {
        Self {
            repo,
            post_type: cms.post_type.clone(),
            page_size: cms.page_size.get(),
            timezone,
        }
    }

    async fn resolve_ref(&self, preview_ref: Option<&str>) -> Result<String, FeedError> {
        match preview_ref.map(str::trim).filter(|value| !value.is_empty()) {
            Some(reference) => Ok(reference.to_string()),
            None => Ok(self.repo.master_ref().await?),
        }
    }

    fn posts_query(&self, reference: String) -> SearchQuery {
        SearchQuery::new(reference).predicate(Predicate::document_type(&self.post_type))
    }

    fn listing_query(&self, reference: String) -> SearchQuery {
        let post_type = &self.post_type;
        self.posts_query(reference)
            .order_by(Ordering::desc(FIRST_PUBLICATION_DATE))
            .page_size(self.page_size)
            .fetch([
                format!("{post_type}.title"),
                format!("{post_type}.subtitle"),
                format!("{post_type}.author"),
            ])
    }

    /// First listing page, newest first.
    pub async fn home_page(&self, preview_ref: Option<&str>) -> Result<ListingPage, FeedError> {
        self.listing_page(1, preview_ref).await
    }

    /// Listing page by number (1-based).
    pub async fn listing_page(
        &self,
        page: u32,
        preview_ref: Option<&str>,
    ) -> Result<ListingPage, FeedError> {
        let reference = self.resolve_ref(preview_ref).await?;
        let query = self.listing_query(reference).page(page.max(1));
        let response = self.repo.search(&query).await?;
        Ok(self.listing_from_response(&response))
    }

    /// Page following an encoded load-more cursor.
    pub async fn append_page(&self, cursor: &str) -> Result<ListingPage, FeedError> {
        let cursor =
            FeedCursor::decode(cursor).map_err(|err| FeedError::InvalidCursor(err.to_string()))?;
        let response = self.repo.follow_page(cursor.next_page()).await?;
        debug!(
            page = response.page,
            results = response.results.len(),
            "followed next page"
        );
        Ok(self.listing_from_response(&response))
    }

    fn listing_from_response(&self, response: &SearchResponse) -> ListingPage {
        let cards = response
            .results
            .iter()
            .filter_map(|document| match PostSummary::from_document(document) {
                Ok(summary) => Some(self.summary_to_card(summary)),
                Err(err) => {
                    warn!(document_id = %document.id, error = %err, "skipping unmappable post");
                    None
                }
            })
            .collect();

        ListingPage {
            page: response.page,
            total_pages: response.total_pages,
            cards,
            next_cursor: FeedCursor::from_next_page(response.next_page.as_deref())
                .map(|cursor| cursor.encode()),
        }
    }

    fn summary_to_card(&self, summary: PostSummary) -> PostCard {
        let published = summary.first_publication_date;
        PostCard {
            slug: summary.slug,
            title: summary.title,
            subtitle: summary.subtitle,
            author: summary.author,
            published: published.map(|instant| dates::format_card_date(instant, self.timezone)),
            iso_date: published.map(|instant| dates::format_iso(instant, self.timezone)),
        }
    }

    /// Post page by slug; `None` when no document carries that uid.
    pub async fn post_detail(
        &self,
        slug: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<PostDetailContext>, FeedError> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Ok(None);
        }

        let reference = self.resolve_ref(preview_ref).await?;
        let query = SearchQuery::new(reference.clone())
            .predicate(Predicate::uid(&self.post_type, slug))
            .page_size(1);
        let response = self.repo.search(&query).await?;

        let Some(document) = response.results.first() else {
            return Ok(None);
        };
        let post = PostDetail::from_document(document)?;

        let (previous, next) = tokio::try_join!(
            self.adjacent(&reference, &post.id, Ordering::asc(FIRST_PUBLICATION_DATE)),
            self.adjacent(&reference, &post.id, Ordering::desc(FIRST_PUBLICATION_DATE)),
        )?;

        Ok(Some(self.detail_context(post, previous, next)))
    }

    /// Neighbour of `document_id` in the given ordering.
    async fn adjacent(
        &self,
        reference: &str,
        document_id: &str,
        ordering: Ordering,
    ) -> Result<Option<AdjacentPostView>, FeedError> {
        let query = self
            .posts_query(reference.to_string())
            .order_by(ordering)
            .page_size(1)
            .after(document_id)
            .fetch([format!("{}.title", self.post_type)]);
        let response = self.repo.search(&query).await?;

        Ok(response
            .results
            .iter()
            .filter(|document| document.id != document_id)
            .find_map(adjacent_view))
    }

    fn detail_context(
        &self,
        post: PostDetail,
        previous: Option<AdjacentPostView>,
        next: Option<AdjacentPostView>,
    ) -> PostDetailContext {
        let reading_time = reading_time::estimate_minutes(&post.content);
        let published = post.first_publication_date;
        let sections = post
            .content
            .iter()
            .map(|group| PostSectionView {
                heading: group.heading.clone(),
                body_html: rich_text::as_html(&group.body),
            })
            .collect();

        PostDetailContext {
            slug: post.slug,
            title: post.title,
            banner_url: post.banner_url,
            author: post.author,
            published: published.map(|instant| dates::format_detail_date(instant, self.timezone)),
            iso_date: published.map(|instant| dates::format_iso(instant, self.timezone)),
            reading_time,
            sections,
            previous,
            next,
        }
    }

    /// Every post uid in the master ref, newest first.
    pub async fn all_slugs(&self) -> Result<Vec<String>, FeedError> {
        let reference = self.resolve_ref(None).await?;
        let mut slugs = Vec::new();
        let mut page = 1;

        loop {
            let query = self
                .posts_query(reference.clone())
                .order_by(Ordering::desc(FIRST_PUBLICATION_DATE))
                .page_size(SLUG_PAGE_SIZE)
                .page(page)
                .fetch([format!("{}.title", self.post_type)]);
            let response = self.repo.search(&query).await?;

            for document in &response.results {
                match document.uid.as_deref().map(str::trim) {
                    Some(uid) if !uid.is_empty() => slugs.push(uid.to_string()),
                    _ => warn!(document_id = %document.id, "skipping post without uid"),
                }
            }

            if response.results.is_empty() || page >= response.total_pages {
                break;
            }
            page += 1;
        }

        Ok(slugs)
    }

    /// Where a preview session for `document_id` should land.
    pub async fn preview_destination(
        &self,
        token: &str,
        document_id: Option<&str>,
    ) -> Result<String, FeedError> {
        let Some(document_id) = document_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Ok("/".to_string());
        };

        let query = SearchQuery::new(token.trim())
            .predicate(Predicate::document_id(document_id))
            .page_size(1);
        let response = self.repo.search(&query).await?;

        let destination = response
            .results
            .first()
            .filter(|document| document.doc_type == self.post_type)
            .and_then(|document| document.uid.as_deref())
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(post_href)
            .unwrap_or_else(|| "/".to_string());

        Ok(destination)
    }

    /// Succeeds when the content service answers with a master ref.
    pub async fn check_health(&self) -> Result<(), FeedError> {
        self.repo.master_ref().await?;
        Ok(())
    }
}

fn adjacent_view(document: &Document) -> Option<AdjacentPostView> {
    match PostSummary::from_document(document) {
        Ok(summary) => Some(AdjacentPostView {
            href: post_href(&summary.slug),
            title: summary.title,
        }),
        Err(err) => {
            warn!(document_id = %document.id, error = %err, "skipping unmappable neighbour");
            None
        }
    }
}

fn render_fragment<T: Template>(template: T) -> Result<String, HttpError> {
    template.render().map_err(|err| {
        HttpError::from(TemplateRenderError::new(
            "application::feed::render_fragment",
            "Template rendering failed",
            err,
        ))
    })
}

fn render_append_parts(page: ListingPage) -> Result<(Option<String>, String), HttpError> {
    let ListingPage {
        cards, next_cursor, ..
    } = page;

    let cards_html = if cards.is_empty() {
        None
    } else {
        Some(render_fragment(PostCardsTemplate { posts: cards })?)
    };
    let loader_html = render_fragment(FeedLoaderTemplate {
        loader: FeedLoaderContext::streaming(next_cursor),
    })?;

    Ok((cards_html, loader_html))
}

/// SSE answer to a datastar load-more request.
pub fn build_datastar_append_response(page: ListingPage) -> Result<Response, HttpError> {
    let (cards_html, loader_html) = render_append_parts(page)?;
    Ok(StreamBuilder::feed_append(cards_html, loader_html).into_response())
}

/// Plain HTML answer for clients that follow the load-more link directly.
pub fn build_html_append_response(page: ListingPage) -> Result<Html<String>, HttpError> {
    let (cards_html, loader_html) = render_append_parts(page)?;
    let mut html = String::new();
    html.push_str(r#"<ul id="post-list" class="post-list">"#);
    html.push_str(cards_html.as_deref().unwrap_or_default());
    html.push_str(r#"</ul><div id="feed-loader" class="feed-loader">"#);
    html.push_str(&loader_html);
    html.push_str("</div>");
    Ok(Html(html))
}
