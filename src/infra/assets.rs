//! Embedded static assets: served under `/static` and copied by the exporter.

use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, File, include_dir};
use mime_guess::Mime;

use crate::application::error::ErrorReport;

static STATIC_PUBLIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static/public");

const SOURCE: &str = "infra::assets::serve_public";

/// Serve embedded public static assets.
pub async fn serve_public(path: Option<Path<String>>) -> Response {
    let captured = path.map(|Path(value)| value);
    match resolve_asset(captured) {
        Some(file) => build_response(file),
        None => not_found_response(),
    }
}

/// Every embedded file with its path relative to the asset root.
pub fn public_files() -> Vec<(&'static FsPath, &'static [u8])> {
    let mut files = Vec::new();
    collect_files(&STATIC_PUBLIC_ASSETS, &mut files);
    files
}

fn collect_files(dir: &'static Dir<'static>, out: &mut Vec<(&'static FsPath, &'static [u8])>) {
    for file in dir.files() {
        out.push((file.path(), file.contents()));
    }
    for child in dir.dirs() {
        collect_files(child, out);
    }
}

fn not_found_response() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

fn resolve_asset(path: Option<String>) -> Option<&'static File<'static>> {
    let candidate = path.unwrap_or_default();
    let candidate = candidate.trim_start_matches('/');

    // No directory listings, no traversal.
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        return None;
    }

    STATIC_PUBLIC_ASSETS.get_file(candidate)
}

fn build_response(file: &'static File<'static>) -> Response {
    let mime: Mime = mime_guess::from_path(file.path()).first_or_octet_stream();
    let bytes = Bytes::from_static(file.contents());
    let len = bytes.len();

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );

    response
}
