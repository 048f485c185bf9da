//! HTTP server setup and drain control.
//!
//! # Responsibilities
//! - Build the axum application around the regex route table
//! - Wire up middleware (tracing, timeout, request ID, statistics)
//! - Serve connections and coordinate the draining transition
//!
//! # Design Decisions
//! - One catch-all axum route funnels every request through the ordered
//!   route table; no match means 404
//! - Liveness goes false the instant draining starts, before the socket
//!   hard-closes
//! - Drain is bounded: connections still open after the grace period are
//!   forcibly closed

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::request::request_id_middleware;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::{PhaseCell, ServicePhase};
use crate::routing::{handler, RouteError, RouteTable};
use crate::stats::{stats_middleware, StatsCollector};
use crate::store::HashStore;
use crate::worker::PipelineHandle;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HashStore>,
    pub stats: Arc<StatsCollector>,
    pub pipeline: PipelineHandle,
    pub phase: Arc<PhaseCell>,
    pub shutdown: Shutdown,
    pub routes: Arc<RouteTable<AppState>>,
}

/// Build the service route table.
///
/// Order matters: the first matching pattern wins. The trailing
/// catch-method patterns route method mismatches to the same handlers,
/// which answer 405.
pub fn build_route_table() -> Result<RouteTable<AppState>, RouteError> {
    let mut table = RouteTable::new();
    table.register("^GET /health$", handler(handlers::health))?;
    table.register("^GET /hash/[^/]+$", handler(handlers::fetch_hash))?;
    table.register("^POST /hash$", handler(handlers::submit_hash))?;
    table.register("^GET /shutdown$", handler(handlers::shutdown))?;
    table.register("^GET /stats$", handler(handlers::stats))?;
    table.register("^[A-Z]+ /hash/[^/]+$", handler(handlers::fetch_hash))?;
    table.register("^[A-Z]+ /hash$", handler(handlers::submit_hash))?;
    Ok(table)
}

/// HTTP server for the hashing service.
pub struct HttpServer {
    router: Router,
    phase: Arc<PhaseCell>,
    drain_grace: Duration,
}

impl HttpServer {
    /// Assemble the axum application around the shared state.
    pub fn new(config: &ServiceConfig, state: AppState) -> Self {
        let phase = state.phase.clone();
        let stats = state.stats.clone();

        // Layer order, outermost first: trace, request ID, stats, timeout.
        // Stats sit outside the timeout so timed-out requests are counted.
        let router = Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(middleware::from_fn_with_state(stats, stats_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http());

        Self {
            router,
            phase,
            drain_grace: Duration::from_secs(config.timeouts.drain_grace_secs),
        }
    }

    /// Serve until shutdown, then drain within the grace period.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;

        let mut graceful_rx = shutdown.subscribe();
        let mut drain_rx = shutdown.subscribe();
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = graceful_rx.recv().await;
            })
            .into_future();
        let mut serve_task = tokio::spawn(serve);

        self.phase.set(ServicePhase::Serving);
        tracing::info!(address = %addr, "Server accepting connections");

        tokio::select! {
            // Server ended on its own (listener error).
            result = &mut serve_task => {
                self.phase.set(ServicePhase::Stopped);
                return flatten_serve(result);
            }
            _ = drain_rx.recv() => {
                self.phase.set(ServicePhase::Draining);
                tracing::info!(grace_secs = self.drain_grace.as_secs(), "Draining connections");
            }
        }

        match tokio::time::timeout(self.drain_grace, &mut serve_task).await {
            Ok(result) => flatten_serve(result)?,
            Err(_) => {
                tracing::warn!("Drain grace exceeded, closing remaining connections");
                serve_task.abort();
            }
        }

        self.phase.set(ServicePhase::Stopped);
        tracing::info!("Server stopped");
        Ok(())
    }
}

fn flatten_serve(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> std::io::Result<()> {
    match result {
        Ok(inner) => inner,
        Err(join_err) if join_err.is_cancelled() => Ok(()),
        Err(join_err) => Err(std::io::Error::other(join_err)),
    }
}

/// Catch-all axum handler funneling requests through the route table.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match state.routes.dispatch(&method, &path) {
        Some(route_handler) => route_handler(state.clone(), request).await,
        None => {
            tracing::debug!(method = %method, path = %path, "No route matched");
            (StatusCode::NOT_FOUND, "404 page not found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::SnapshotPersister;
    use crate::worker::{pipeline, PipelineOptions};
    use axum::http::Method;

    fn test_state() -> AppState {
        let store = Arc::new(HashStore::new());
        let persister = Arc::new(SnapshotPersister::new(
            std::env::temp_dir().join("hashd-server-test.json"),
        ));
        let shutdown = Shutdown::new();
        let (handle, _runner) = pipeline(
            store.clone(),
            persister,
            shutdown.clone(),
            PipelineOptions {
                hash_delay: Duration::from_millis(1),
                wait_on_drain: false,
                drain_grace: Duration::from_secs(1),
            },
        );
        AppState {
            store,
            stats: Arc::new(StatsCollector::new()),
            pipeline: handle,
            phase: Arc::new(PhaseCell::new()),
            shutdown,
            routes: Arc::new(build_route_table().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_health_reflects_phase() {
        let state = test_state();
        let req = || Request::builder().body(Body::empty()).unwrap();

        let resp = handlers::health(state.clone(), req()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.phase.set(ServicePhase::Serving);
        let resp = handlers::health(state.clone(), req()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        state.phase.set(ServicePhase::Draining);
        let resp = handlers::health(state.clone(), req()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_route_table_covers_surface() {
        let table = build_route_table().unwrap();
        assert!(table.dispatch(&Method::GET, "/health").is_some());
        assert!(table.dispatch(&Method::GET, "/hash/12").is_some());
        assert!(table.dispatch(&Method::GET, "/hash/abc").is_some());
        assert!(table.dispatch(&Method::POST, "/hash").is_some());
        assert!(table.dispatch(&Method::GET, "/shutdown").is_some());
        assert!(table.dispatch(&Method::GET, "/stats").is_some());
        // Method mismatches still route (handlers answer 405).
        assert!(table.dispatch(&Method::PUT, "/hash").is_some());
        assert!(table.dispatch(&Method::DELETE, "/hash/12").is_some());
        // Unknown paths do not.
        assert!(table.dispatch(&Method::GET, "/nope").is_none());
    }

    #[tokio::test]
    async fn test_method_mismatch_is_405() {
        let state = test_state();
        state.phase.set(ServicePhase::Serving);

        let req = Request::builder()
            .method(Method::PUT)
            .uri("/hash")
            .body(Body::empty())
            .unwrap();
        let resp = handlers::submit_hash(state.clone(), req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/hash/3")
            .body(Body::empty())
            .unwrap();
        let resp = handlers::fetch_hash(state, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_fetch_hash_edge_cases() {
        let state = test_state();

        let req = Request::builder()
            .method(Method::GET)
            .uri("/hash/abc")
            .body(Body::empty())
            .unwrap();
        let resp = handlers::fetch_hash(state.clone(), req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = Request::builder()
            .method(Method::GET)
            .uri("/hash/999")
            .body(Body::empty())
            .unwrap();
        let resp = handlers::fetch_hash(state.clone(), req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        state.store.set(1, "digest".to_string());
        let req = Request::builder()
            .method(Method::GET)
            .uri("/hash/1")
            .body(Body::empty())
            .unwrap();
        let resp = handlers::fetch_hash(state, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_password_allocates_nothing() {
        let state = test_state();

        let req = Request::builder()
            .method(Method::POST)
            .uri("/hash")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("password="))
            .unwrap();
        let resp = handlers::submit_hash(state.clone(), req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.current_identifier(), 0);
    }
}
