//! Helpers for building server-driven datastar SSE responses.

use std::convert::Infallible;

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, Sse},
};
use datastar::prelude::{ElementPatchMode, PatchElements, PatchSignals};

pub const POST_LIST_SELECTOR: &str = "#post-list";
pub const FEED_LOADER_SELECTOR: &str = "#feed-loader";
pub const FEED_IDLE_SIGNALS: &str = r#"{"feedLoading": false}"#;

/// Builder for composing datastar-compatible SSE responses.
pub struct StreamBuilder {
    events: Vec<Event>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an element patch targeting the supplied selector.
    pub fn push_patch(
        &mut self,
        html: String,
        selector: &str,
        mode: ElementPatchMode,
    ) -> &mut Self {
        let event = PatchElements::new(html)
            .selector(selector)
            .mode(mode)
            .write_as_axum_sse_event();
        self.events.push(event);
        self
    }

    pub fn push_signals(&mut self, payload: &str) -> &mut Self {
        let event = PatchSignals::new(payload).write_as_axum_sse_event();
        self.events.push(event);
        self
    }

    /// Events for one load-more round trip: new cards, the replacement
    /// loader, then the loading flag cleared.
    pub fn feed_append(cards_html: Option<String>, loader_html: String) -> Self {
        let mut builder = Self::new();
        if let Some(html) = cards_html {
            builder.push_patch(html, POST_LIST_SELECTOR, ElementPatchMode::Append);
        }
        builder.push_patch(loader_html, FEED_LOADER_SELECTOR, ElementPatchMode::Inner);
        builder.push_signals(FEED_IDLE_SIGNALS);
        builder
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_response(self) -> Response {
        let stream = stream! {
            for event in self.events {
                yield Ok::<Event, Infallible>(event);
            }
        };
        Sse::new(stream).into_response()
    }
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}
