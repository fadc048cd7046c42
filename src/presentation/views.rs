use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title(&content.title), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Utterances script attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentsView {
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

#[derive(Clone, Debug)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
}

/// Per-request page frame shared by every template.
#[derive(Clone, Debug)]
pub struct LayoutChrome {
    pub site_title: String,
    pub meta: PageMetaView,
    pub preview: bool,
    pub comments: Option<CommentsView>,
    pub static_links: bool,
}

impl LayoutChrome {
    /// `"{page} | {site}"`, used for the document title.
    pub fn with_title(self, page_title: &str) -> Self {
        let title = if page_title.trim().is_empty() {
            self.site_title.clone()
        } else {
            format!("{} | {}", page_title.trim(), self.site_title)
        };
        Self {
            meta: PageMetaView {
                title,
                ..self.meta
            },
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub meta: PageMetaView,
    pub preview: bool,
    pub comments: Option<CommentsView>,
    pub static_links: bool,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            meta: chrome.meta,
            preview: chrome.preview,
            comments: chrome.comments,
            static_links: chrome.static_links,
            content,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostCard {
    pub slug: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub published: Option<String>,
    pub iso_date: Option<String>,
}

impl PostCard {
    pub fn href(&self) -> String {
        post_href(&self.slug)
    }
}

pub fn post_href(slug: &str) -> String {
    format!("/post/{slug}")
}

/// State of the "load more" control below the listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedLoaderContext {
    /// Encoded cursor for the streaming request.
    pub next_cursor: Option<String>,
    /// Plain link used by exported pages.
    pub next_page_href: Option<String>,
}

impl FeedLoaderContext {
    pub fn streaming(next_cursor: Option<String>) -> Self {
        Self {
            next_cursor,
            next_page_href: None,
        }
    }

    pub fn linked(next_page_href: Option<String>) -> Self {
        Self {
            next_cursor: None,
            next_page_href,
        }
    }
}

/// Listing body; card and loader markup is rendered once through the
/// partial templates so full pages and streamed fragments stay identical.
#[derive(Clone, Debug)]
pub struct ListingContext {
    pub posts_html: String,
    pub loader_html: String,
    pub has_posts: bool,
}

impl ListingContext {
    pub fn render(posts: Vec<PostCard>, loader: FeedLoaderContext) -> Result<Self, AskamaError> {
        let has_posts = !posts.is_empty();
        let posts_html = PostCardsTemplate { posts }.render()?;
        let loader_html = FeedLoaderTemplate { loader }.render()?;
        Ok(Self {
            posts_html,
            loader_html,
            has_posts,
        })
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingContext>,
}

#[derive(Template)]
#[template(path = "partials/post_cards.html")]
pub struct PostCardsTemplate {
    pub posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "partials/feed_loader.html")]
pub struct FeedLoaderTemplate {
    pub loader: FeedLoaderContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostSectionView {
    pub heading: String,
    pub body_html: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdjacentPostView {
    pub title: String,
    pub href: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostDetailContext {
    pub slug: String,
    pub title: String,
    pub banner_url: Option<String>,
    pub author: String,
    pub published: Option<String>,
    pub iso_date: Option<String>,
    pub reading_time: u32,
    pub sections: Vec<PostSectionView>,
    pub previous: Option<AdjacentPostView>,
    pub next: Option<AdjacentPostView>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Página não encontrada".to_string(),
            message: "O conteúdo que você procura não existe ou foi removido.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Voltar para o início".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
