//! Rendered-response cache with per-route expiry.
//!
//! Listing pages and post pages are kept for different periods; an expired
//! entry is dropped on lookup and the page is rendered again.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::CacheSettings;

use super::http::{DATASTAR_REQUEST_HEADER, PREVIEW_COOKIE};

const SOURCE: &str = "infra::cache";
pub const CACHE_STATUS_HEADER: &str = "x-cache";

#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<LruCache<String, CachedResponse>>>,
    listing_ttl: Duration,
    post_ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: NonZeroUsize, listing_ttl: Duration, post_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            listing_ttl,
            post_ttl,
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.capacity, settings.listing_ttl, settings.post_ttl)
    }

    /// Expiry for a request path: posts revalidate more often than listings.
    pub fn ttl_for(&self, path: &str) -> Duration {
        if path.starts_with("/post/") {
            self.post_ttl
        } else {
            self.listing_ttl
        }
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<CachedResponse> {
        let mut entries = lock(&self.entries, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            debug!(key, "cached response expired");
        }
        None
    }

    pub fn put(&self, key: String, response: CachedResponse) {
        let evicted = lock(&self.entries, "put").push(key.clone(), response);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!("spacetraveling_cache_evict_total").increment(1);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<'a>(
    entries: &'a Mutex<LruCache<String, CachedResponse>>,
    op: &'static str,
) -> MutexGuard<'a, LruCache<String, CachedResponse>> {
    match entries.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = SOURCE,
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

#[derive(Clone, Debug)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedResponse {
    pub fn new(
        status: StatusCode,
        headers: &HeaderMap,
        body: Bytes,
        stored_at: Instant,
        ttl: Duration,
    ) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            status,
            headers,
            body,
            stored_at,
            ttl,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }

    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static("hit"));

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

pub fn should_store_response(response: &Response) -> bool {
    if response.status() != StatusCode::OK {
        return false;
    }

    let headers = response.headers();
    if headers.contains_key(header::SET_COOKIE) {
        return false;
    }

    if headers
        .get(header::CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("no-store"))
    {
        return false;
    }

    !headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}

fn is_cacheable_request(request: &Request<Body>) -> bool {
    if request.method() != Method::GET {
        return false;
    }
    if request.headers().contains_key(DATASTAR_REQUEST_HEADER) {
        return false;
    }
    CookieJar::from_headers(request.headers())
        .get(PREVIEW_COOKIE)
        .is_none()
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, Bytes), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let rebuilt = Response::from_parts(parts, Body::from(bytes.clone()));
            Ok((rebuilt, bytes))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}

/// Serves cached pages and stores fresh 200 responses.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<ResponseCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_cacheable_request(&request) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let key = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.clone(),
    };

    if let Some(cached) = cache.get(&key) {
        counter!("spacetraveling_cache_hit_total").increment(1);
        debug!(outcome = "hit", "serving cached response");
        return cached.into_response();
    }
    counter!("spacetraveling_cache_miss_total").increment(1);

    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    match buffer_response(response).await {
        Ok((mut response, body)) => {
            let stored = CachedResponse::new(
                response.status(),
                response.headers(),
                body,
                Instant::now(),
                cache.ttl_for(&path),
            );
            cache.put(key, stored);
            response
                .headers_mut()
                .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("miss"));
            response
        }
        Err((response, err)) => {
            warn!(error = %err, "response not cached");
            response
        }
    }
}
