//! Prometheus metrics exposition
//!
//! HTTP-level metrics recorded by the router middleware:
//!
//! - `integrations_requests_total` (counter): labels `route`, `status`, `method`
//! - `integrations_request_duration_seconds` (histogram): labels `route`, `status`
//!
//! Flow-level counters (`hubspot_oauth_callbacks_total` and friends) are
//! recorded by the `hubspot-flow` crate and rendered by the same recorder.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "integrations_request_duration_seconds";

/// Bucket boundaries from 5ms up to the default upstream timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The request duration is configured with explicit buckets so it renders as
/// a histogram (`_bucket` lines) rather than a summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request.
pub fn record_request(route: &str, status: u16, method: &str, duration_secs: f64) {
    let status = status.to_string();
    metrics::counter!(
        "integrations_requests_total",
        "route" => route.to_string(),
        "status" => status.clone(),
        "method" => method.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string(), "status" => status)
        .record(duration_secs);
}
