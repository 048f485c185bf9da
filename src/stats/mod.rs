//! Request statistics subsystem.
//!
//! # Data Flow
//! ```text
//! Request enters middleware
//!     → derive route class (METHOD:first-path-segment)
//!     → run inner handler, measure wall-clock duration
//!     → record (class, status, duration) into aggregates
//!
//! GET /stats
//!     → report(): derive averages from counts and cumulative times
//! ```
//!
//! # Design Decisions
//! - One mutex guards all aggregates; reporting is infrequent
//! - Averages are computed at read time, never stored
//! - A request whose future is dropped before completion records nothing
//! - Route class is coarse by construction to bound cardinality

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;

#[derive(Default, Clone, Copy)]
struct RouteAggregate {
    count: u64,
    cumulative: Duration,
}

/// Aggregating collector for per-route-class response statistics.
pub struct StatsCollector {
    pid: u32,
    started: Instant,
    // class -> status code -> aggregate
    aggregates: Mutex<HashMap<String, HashMap<u16, RouteAggregate>>>,
}

/// Derive the coarse route class: method plus first path segment.
///
/// `POST /hash` → `"POST:hash"`, `GET /hash/7` → `"GET:hash"`.
pub fn route_class(method: &Method, path: &str) -> String {
    let segment = path.trim_start_matches('/').split('/').next().unwrap_or("");
    format!("{}:{}", method, segment)
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
            started: Instant::now(),
            aggregates: Mutex::new(HashMap::new()),
        }
    }

    /// Record one completed request.
    pub fn record(&self, class: &str, status: StatusCode, duration: Duration) {
        let mut aggregates = self.aggregates.lock().expect("stats lock poisoned");
        let entry = aggregates
            .entry(class.to_string())
            .or_default()
            .entry(status.as_u16())
            .or_default();
        entry.count += 1;
        entry.cumulative += duration;
    }

    /// Build the serializable report. Averages are derived here.
    pub fn report(&self) -> StatsReport {
        let aggregates = self.aggregates.lock().expect("stats lock poisoned");

        let mut response_counts: HashMap<String, HashMap<String, u64>> = HashMap::new();
        let mut response_times: HashMap<String, HashMap<String, f64>> = HashMap::new();
        let mut average_times: HashMap<String, HashMap<String, f64>> = HashMap::new();
        let mut total_count = 0u64;
        let mut total_time = 0f64;

        for (class, by_status) in aggregates.iter() {
            for (status, agg) in by_status.iter() {
                let status = status.to_string();
                let secs = agg.cumulative.as_secs_f64();

                response_counts
                    .entry(class.clone())
                    .or_default()
                    .insert(status.clone(), agg.count);
                response_times
                    .entry(class.clone())
                    .or_default()
                    .insert(status.clone(), secs);
                if agg.count > 0 {
                    average_times
                        .entry(class.clone())
                        .or_default()
                        .insert(status, secs / agg.count as f64);
                }

                total_count += agg.count;
                total_time += secs;
            }
        }

        let average_time = if total_count > 0 {
            total_time / total_count as f64
        } else {
            0.0
        };

        StatsReport {
            pid: self.pid,
            uptime_secs: self.started.elapsed().as_secs_f64(),
            total_count,
            total_response_time_secs: total_time,
            average_response_time_secs: average_time,
            response_counts,
            response_times_secs: response_times,
            average_response_times_secs: average_times,
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time statistics report served by `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub pid: u32,
    pub uptime_secs: f64,
    pub total_count: u64,
    pub total_response_time_secs: f64,
    pub average_response_time_secs: f64,
    /// class → status code → request count
    pub response_counts: HashMap<String, HashMap<String, u64>>,
    /// class → status code → cumulative response time
    pub response_times_secs: HashMap<String, HashMap<String, f64>>,
    /// class → status code → derived average (absent when count is zero)
    pub average_response_times_secs: HashMap<String, HashMap<String, f64>>,
}

/// Middleware wrapping every request with duration and status recording.
pub async fn stats_middleware(
    State(stats): State<Arc<StatsCollector>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let class = route_class(request.method(), request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    // Reached only when the handler produced a response; aborted requests
    // drop this future before the record.
    stats.record(&class, response.status(), start.elapsed());
    response
}
