use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::debug;

use crate::{
    application::{
        chrome::ChromeService,
        error::HttpError,
        feed::{self, FeedService, ListingPage},
    },
    infra::cache::{ResponseCache, response_cache_layer},
    presentation::views::{
        FeedLoaderContext, IndexTemplate, LayoutChrome, LayoutContext, ListingContext,
        PostTemplate, TemplateRenderError, render_not_found_response, render_template_response,
    },
};

use super::{
    DATASTAR_REQUEST_HEADER, cms_health_response,
    middleware::{log_responses, set_request_context},
    preview::{enter_preview, exit_preview, preview_ref},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub chrome: Arc<ChromeService>,
    pub cache: Option<ResponseCache>,
}

pub fn build_router(state: HttpState) -> Router {
    // Datastar and preview requests are skipped by the cache layer itself.
    let cached_routes = Router::new()
        .route("/", get(index))
        .route("/post/{slug}", get(post_detail))
        .route("/ui/posts", get(posts_partial))
        .fallback(fallback);

    let cached_routes = if let Some(cache) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(cache, response_cache_layer))
    } else {
        cached_routes
    };

    let uncached_routes = Router::new()
        .route("/api/preview", get(enter_preview))
        .route("/api/exit-preview", get(exit_preview))
        .route("/_health", get(health))
        .route("/static/{*path}", get(crate::infra::assets::serve_public));

    cached_routes
        .merge(uncached_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CursorQuery {
    cursor: Option<String>,
}

/// Preview responses must never be stored by shared caches.
fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn with_preview_policy(response: Response, preview: bool) -> Response {
    if preview { no_store(response) } else { response }
}

fn render_listing(chrome: LayoutChrome, listing: ListingPage) -> Response {
    let content = match ListingContext::render(
        listing.cards,
        FeedLoaderContext::streaming(listing.next_cursor),
    ) {
        Ok(content) => content,
        Err(err) => {
            return HttpError::from(TemplateRenderError::new(
                "infra::http::public::render_listing",
                "Template rendering failed",
                err,
            ))
            .into_response();
        }
    };

    let view = LayoutContext::new(chrome.with_title("Home"), content);
    render_template_response(IndexTemplate { view }, StatusCode::OK)
}

async fn index(State(state): State<HttpState>, jar: CookieJar) -> Response {
    let preview = preview_ref(&jar);
    let chrome = state.chrome.load(preview.is_some());

    let response = match state.feed.home_page(preview.as_deref()).await {
        Ok(listing) => render_listing(chrome, listing),
        Err(err) => HttpError::from(err).into_response(),
    };
    with_preview_policy(response, preview.is_some())
}

async fn posts_partial(
    State(state): State<HttpState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CursorQuery>,
) -> Result<Response, HttpError> {
    let cursor = params
        .cursor
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            HttpError::new(
                "infra::http::posts_partial",
                StatusCode::BAD_REQUEST,
                "Missing cursor",
                "Load-more request did not carry a cursor",
            )
        })?;

    let page = state.feed.append_page(&cursor).await?;
    debug!(cards = page.cards.len(), "appending posts");

    let response = if headers.contains_key(DATASTAR_REQUEST_HEADER) {
        feed::build_datastar_append_response(page)?
    } else {
        feed::build_html_append_response(page)?.into_response()
    };
    Ok(with_preview_policy(response, preview_ref(&jar).is_some()))
}

async fn post_detail(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path(slug): Path<String>,
) -> Response {
    let preview = preview_ref(&jar);
    let chrome = state.chrome.load(preview.is_some());

    let response = match state.feed.post_detail(&slug, preview.as_deref()).await {
        Ok(Some(content)) => {
            let chrome = chrome.with_title(&content.title);
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Ok(None) => {
            debug!(slug = %slug, "unknown post, redirecting home");
            Redirect::temporary("/").into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    };
    with_preview_policy(response, preview.is_some())
}

async fn health(State(state): State<HttpState>) -> Response {
    cms_health_response(state.feed.check_health().await)
}

async fn fallback(State(state): State<HttpState>, jar: CookieJar) -> Response {
    let preview = preview_ref(&jar).is_some();
    with_preview_policy(render_not_found_response(state.chrome.load(preview)), preview)
}
