use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tags every request with an id (the caller's, or a fresh UUID), runs it in a
/// span carrying that id, and echoes the id back on the response.
pub async fn inject_request_id(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "http_request",
        request_id = %id,
        method = %req.method(),
        path = %req.uri().path()
    );

    let started = Instant::now();
    let mut resp = async move {
        let resp = next.run(req).await;
        info!(
            "Completed with {} in {} ms",
            resp.status(),
            started.elapsed().as_millis()
        );
        resp
    }
    .instrument(span)
    .await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, val);
    }

    resp
}
