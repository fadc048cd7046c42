//! Preview sessions: the CMS redirects editors here with a preview ref.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::info;

use crate::application::error::HttpError;

use super::public::HttpState;

/// Cookie carrying the preview ref, named after the CMS toolbar's cookie.
pub const PREVIEW_COOKIE: &str = "io.prismic.preview";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PreviewQuery {
    token: Option<String>,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
}

/// Ref from the preview cookie, if a session is active.
pub(super) fn preview_ref(jar: &CookieJar) -> Option<String> {
    jar.get(PREVIEW_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(super) async fn enter_preview(
    State(state): State<HttpState>,
    jar: CookieJar,
    Query(query): Query<PreviewQuery>,
) -> Result<Response, HttpError> {
    let token = query
        .token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            HttpError::new(
                "infra::http::preview::enter_preview",
                StatusCode::BAD_REQUEST,
                "Missing preview token",
                "Preview request did not carry a `token` parameter",
            )
        })?;

    let destination = state
        .feed
        .preview_destination(&token, query.document_id.as_deref())
        .await?;
    info!(destination = %destination, "preview session started");

    let cookie = Cookie::build((PREVIEW_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((jar.add(cookie), Redirect::temporary(&destination)).into_response())
}

pub(super) async fn exit_preview(jar: CookieJar) -> Response {
    let jar = jar.remove(Cookie::build(PREVIEW_COOKIE).path("/"));
    (jar, Redirect::temporary("/")).into_response()
}
