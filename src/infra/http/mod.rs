mod middleware;
mod preview;
mod public;

pub use middleware::RequestContext;
pub use preview::PREVIEW_COOKIE;
pub use public::{HttpState, build_router};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::{error::ErrorReport, feed::FeedError};

pub const DATASTAR_REQUEST_HEADER: &str = "datastar-request";

fn cms_health_response(result: Result<(), FeedError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::cms_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
