use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all loyalty job metrics
const PREFIX: &str = "loyalty_jobs";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Background Job Metrics
    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_background_job_executions_total"), "Total background job runs"),
        &["job", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job run duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["job"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "Whether a background job run is in progress"),
        &["job"]
    ).expect("Failed to create background_job_running metric");

    pub static ref JOBS_ARMED: Gauge = Gauge::new(
        format!("{PREFIX}_jobs_armed"),
        "Number of background jobs currently armed"
    ).expect("Failed to create jobs_armed metric");

    pub static ref JOB_START_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_job_start_failures_total"), "Background jobs that failed to start"),
        &["job"]
    ).expect("Failed to create job_start_failures_total metric");

    // Messaging Metrics
    pub static ref MESSAGES_DELIVERED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_messages_delivered_total"), "Outbound message delivery attempts"),
        &["kind", "status"]
    ).expect("Failed to create messages_delivered_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(JOBS_ARMED.clone()));
    let _ = REGISTRY.register(Box::new(JOB_START_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MESSAGES_DELIVERED_TOTAL.clone()));
}

/// Record a finished background job run
pub fn record_background_job_execution(job: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job])
        .observe(duration.as_secs_f64());
}

pub fn set_background_job_running(job: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job])
        .set(if running { 1.0 } else { 0.0 });
}

pub fn set_jobs_armed(count: usize) {
    JOBS_ARMED.set(count as f64);
}

pub fn record_job_start_failure(job: &str) {
    JOB_START_FAILURES_TOTAL.with_label_values(&[job]).inc();
}

pub fn record_message_delivery(kind: &str, status: &str) {
    MESSAGES_DELIVERED_TOTAL
        .with_label_values(&[kind, status])
        .inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
