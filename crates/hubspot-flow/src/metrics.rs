//! Flow metrics
//!
//! Emitted through the `metrics` facade; the service installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.
//!
//! - `hubspot_oauth_callbacks_total` (counter): label `outcome`
//! - `hubspot_token_archive_total` (counter): label `result`
//! - `hubspot_contacts_fetched_total` (counter)

/// Archive attempt results, kept apart so "turned off" and "broken" show up
/// as different series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveResult {
    Written,
    Failed,
    Disabled,
}

impl ArchiveResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveResult::Written => "written",
            ArchiveResult::Failed => "failed",
            ArchiveResult::Disabled => "disabled",
        }
    }
}

/// Record a finished callback with its outcome label.
pub fn record_callback(outcome: &'static str) {
    metrics::counter!("hubspot_oauth_callbacks_total", "outcome" => outcome).increment(1);
}

/// Record the result of a token archive attempt.
pub fn record_archive(result: ArchiveResult) {
    metrics::counter!("hubspot_token_archive_total", "result" => result.as_str()).increment(1);
}

/// Record the number of contacts returned by one listing call.
pub fn record_contacts_fetched(count: usize) {
    metrics::counter!("hubspot_contacts_fetched_total").increment(count as u64);
}
