//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path)
//!     → format "METHOD /path"
//!     → scan routes in registration order
//!     → first regex match wins
//!     → Return: handler or None (HTTP layer answers 404)
//! ```
//!
//! # Design Decisions
//! - Patterns are regular expressions over the "METHOD /path" string:
//!   expressive enough to embed numeric path segments directly
//! - First match wins; overlaps resolve by insertion order, not specificity
//! - Each distinct pattern string is compiled exactly once
//! - Table is built at startup and immutable while serving

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use regex::Regex;
use thiserror::Error;

/// Boxed future returned by route handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A registered route handler, shared across dispatches.
pub type RouteHandler<S> = Arc<dyn Fn(S, Request<Body>) -> HandlerFuture + Send + Sync>;

/// Error registering a route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

struct Route<S> {
    regex: Regex,
    handler: RouteHandler<S>,
}

/// Ordered table of (pattern, handler) bindings.
///
/// Dispatch matches the string `"METHOD /path"` against each pattern in
/// registration order and returns the first handler whose pattern matches.
pub struct RouteTable<S> {
    routes: Vec<Route<S>>,
    compiled: HashMap<String, Regex>,
}

impl<S> RouteTable<S> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            compiled: HashMap::new(),
        }
    }

    /// Bind a pattern to a handler.
    ///
    /// Compilation is cached by pattern text, so registering the same
    /// pattern twice reuses the compiled regex.
    pub fn register(&mut self, pattern: &str, handler: RouteHandler<S>) -> Result<(), RouteError> {
        let regex = match self.compiled.get(pattern) {
            Some(regex) => regex.clone(),
            None => {
                let regex = Regex::new(pattern).map_err(|source| RouteError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
                self.compiled.insert(pattern.to_string(), regex.clone());
                regex
            }
        };
        self.routes.push(Route { regex, handler });
        Ok(())
    }

    /// Find the first handler whose pattern matches `"METHOD /path"`.
    pub fn dispatch(&self, method: &Method, path: &str) -> Option<RouteHandler<S>> {
        let check = format!("{} {}", method, path);
        self.routes
            .iter()
            .find(|route| route.regex.is_match(&check))
            .map(|route| route.handler.clone())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<S> Default for RouteTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapt an async handler function into a [`RouteHandler`].
pub fn handler<S, F, Fut>(f: F) -> RouteHandler<S>
where
    F: Fn(S, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |state, request| Box::pin(f(state, request)))
}
