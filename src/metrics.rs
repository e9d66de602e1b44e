use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("voicebridge_requests_total", "Total number of translation requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter = register_counter!(
        "voicebridge_rate_limited_total",
        "Requests denied by the per-user rate limiter"
    )
    .unwrap();
    pub static ref PROVIDER_LATENCY: Histogram = register_histogram!(
        "voicebridge_provider_latency_seconds",
        "Translation provider round-trip latency in seconds"
    )
    .unwrap();
    pub static ref FILES_SWEPT_TOTAL: Counter = register_counter!(
        "voicebridge_files_swept_total",
        "Stale staged files removed by sweeps"
    )
    .unwrap();
    pub static ref DELETE_QUEUE_DROPS: Counter = register_counter!(
        "voicebridge_delete_queue_drops_total",
        "Delete requests dropped because the queue was full"
    )
    .unwrap();
}
