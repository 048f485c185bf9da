//! Request identity and tracing.
//!
//! # Responsibilities
//! - Honor an inbound `X-Request-Id` header
//! - Generate a UUID v4 when the header is absent
//! - Echo the identifier on the response and expose it to handlers
//!
//! # Design Decisions
//! - The identifier is for log correlation only; no uniqueness guarantee
//!   beyond "very likely unique per process"
//! - Added as the outermost request concern so even error responses
//!   carry the header

use axum::body::Body;
use axum::http::{header::HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Header carrying the correlation identifier.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation identifier attached to request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Middleware assigning and echoing the request identifier.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));

    tracing::debug!(
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
        "Request received"
    );

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
