use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::histogram;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::extract::CALLER_HEADER;

const METRIC_HTTP_REQUEST_MS: &str = "murmur_http_request_ms";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag the request with a fresh id. Everything logged while the request is
/// handled runs inside a span carrying that id.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    let span = info_span!(
        "http_request",
        request_id = %ctx.request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(span).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let query = request.uri().query().map(str::to_owned);
    let caller = request
        .headers()
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis();
    histogram!(METRIC_HTTP_REQUEST_MS, "method" => method).record(elapsed_ms as f64);

    let caller = caller.as_deref().unwrap_or("");
    if status.is_success() || status.is_redirection() || status.is_informational() {
        info!(
            target: "murmur::http::response",
            status = status.as_u16(),
            elapsed_ms,
            caller,
            "request completed",
        );
        return response;
    }

    let (source, chain) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => (fallback_source(status), Vec::new()),
    };
    let query = query.as_deref().unwrap_or("");
    if status.is_server_error() {
        error!(
            target: "murmur::http::response",
            status = status.as_u16(),
            elapsed_ms,
            caller,
            query,
            source,
            chain = ?chain,
            "request failed",
        );
    } else {
        warn!(
            target: "murmur::http::response",
            status = status.as_u16(),
            elapsed_ms,
            caller,
            query,
            source,
            chain = ?chain,
            "request rejected",
        );
    }
    response
}

/// Responses produced outside the handlers carry no report.
fn fallback_source(status: StatusCode) -> &'static str {
    match status {
        StatusCode::SERVICE_UNAVAILABLE => "timeout",
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_FOUND => "router",
        _ => "unknown",
    }
}
