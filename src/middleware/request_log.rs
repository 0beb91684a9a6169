use std::time::Instant;

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

/// Client address as reported by a fronting proxy, if any.
///
/// Tries `x-forwarded-for` first, then `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
}

/// Log one line per request with its outcome and latency.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ip = client_ip(request.headers()).unwrap_or("-").to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(%method, %path, %ip, status = status.as_u16(), elapsed_ms, "request failed");
    } else {
        tracing::info!(%method, %path, %ip, status = status.as_u16(), elapsed_ms, "request completed");
    }

    response
}
