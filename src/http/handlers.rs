//! Endpoint handlers.
//!
//! All handlers take the shared [`AppState`] plus the raw request, matching
//! the dispatch signature of the route table. Method checks live here so a
//! method-mismatch catch-all route can answer 405.

use axum::body::Body;
use axum::extract::{Form, FromRequest};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    password: String,
}

/// `GET /health`: alive only while the service is in the Serving phase.
pub async fn health(state: AppState, _request: Request<Body>) -> Response {
    if state.phase.is_alive() {
        Json(serde_json::json!({ "alive": true })).into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

/// `POST /hash`: allocate an identifier and schedule the delayed digest.
///
/// Returns the identifier immediately; no identifier is allocated when the
/// password is missing or empty.
pub async fn submit_hash(state: AppState, request: Request<Body>) -> Response {
    if request.method() != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let password = match Form::<SubmitForm>::from_request(request, &()).await {
        Ok(Form(form)) => form.password,
        Err(_) => String::new(),
    };
    if password.is_empty() {
        tracing::warn!("Password was not provided");
        return (StatusCode::BAD_REQUEST, "Password was not provided").into_response();
    }

    let id = state.store.allocate();
    if state.pipeline.submit(id, password).is_err() {
        // Pipeline only refuses jobs once shutdown has begun.
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down ...").into_response();
    }

    (StatusCode::OK, id.to_string()).into_response()
}

/// `GET /hash/{id}`: fetch a computed digest.
pub async fn fetch_hash(state: AppState, request: Request<Body>) -> Response {
    if request.method() != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let raw = request
        .uri()
        .path()
        .strip_prefix("/hash/")
        .unwrap_or_default();

    let id: u64 = match raw.parse() {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(id = raw, "Identifier is not an integer");
            return (
                StatusCode::BAD_REQUEST,
                format!("{} is not an integer.", raw),
            )
                .into_response();
        }
    };

    match state.store.get(id) {
        Some(digest) => (StatusCode::OK, digest).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("{} has no matching hash", raw),
        )
            .into_response(),
    }
}

/// `GET /shutdown`: privileged trigger for the draining transition.
pub async fn shutdown(state: AppState, _request: Request<Body>) -> Response {
    tracing::info!("Shutdown requested over HTTP");
    state.shutdown.trigger();
    (StatusCode::OK, "shutting down ...").into_response()
}

/// `GET /stats`: the aggregated statistics report.
pub async fn stats(state: AppState, _request: Request<Body>) -> Response {
    Json(state.stats.report()).into_response()
}
