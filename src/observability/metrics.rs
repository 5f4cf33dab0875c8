use metrics::{counter, histogram, describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the account engine. Calls are no-ops until a
/// recorder is installed with [`init_metrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_operation(&self, operation: &'static str, outcome: &'static str, duration_ms: f64) {
        counter!("account_operations_total", "operation" => operation, "outcome" => outcome).increment(1);
        histogram!("account_operation_duration_ms", "operation" => operation).record(duration_ms);
    }

    pub fn record_transfer_committed(&self) {
        counter!("account_transfers_total").increment(1);
    }

    pub fn record_lock_wait(&self, operation: &'static str, duration_ms: f64, acquired: bool) {
        histogram!("account_lock_wait_duration_ms", "operation" => operation, "acquired" => acquired.to_string()).record(duration_ms);
        if !acquired {
            counter!("account_lock_timeouts_total", "operation" => operation).increment(1);
        }
    }

    pub fn record_lock_release_failure(&self) {
        counter!("account_lock_release_failures_total").increment(1);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        counter!("account_cache_lookups_total", "hit" => hit.to_string()).increment(1);
    }

    pub fn record_cache_error(&self, operation: &'static str) {
        counter!("account_cache_errors_total", "operation" => operation).increment(1);
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_ms: f64) {
        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
        histogram!("http_request_duration_ms", "method" => method.to_string(), "path" => path.to_string()).record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder once and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    METRICS.get_or_init(Metrics::new);

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("account_operations_total", Unit::Count, "Account service operations by outcome");
    describe_histogram!("account_operation_duration_ms", Unit::Milliseconds, "Account service operation latency in milliseconds");
    describe_counter!("account_transfers_total", Unit::Count, "Committed fund transfers");

    describe_histogram!("account_lock_wait_duration_ms", Unit::Milliseconds, "Time spent waiting for distributed locks");
    describe_counter!("account_lock_timeouts_total", Unit::Count, "Lock acquisitions that timed out");
    describe_counter!("account_lock_release_failures_total", Unit::Count, "Lock releases that failed");

    describe_counter!("account_cache_lookups_total", Unit::Count, "Account cache lookups by hit/miss");
    describe_counter!("account_cache_errors_total", Unit::Count, "Account cache backend errors");

    describe_counter!("http_requests_total", Unit::Count, "Total HTTP requests");
    describe_histogram!("http_request_duration_ms", Unit::Milliseconds, "HTTP request latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
