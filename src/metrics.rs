use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramVec, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram_vec,
};

use crate::error::BotError;

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("kinetic_requests_total", "Total number of HTTP requests")
            .expect("register kinetic_requests_total");
    pub static ref CACHE_HITS: Counter =
        register_counter!("kinetic_cache_hits_total", "Total cache hits")
            .expect("register kinetic_cache_hits_total");
    pub static ref CACHE_MISSES: Counter =
        register_counter!("kinetic_cache_misses_total", "Total cache misses")
            .expect("register kinetic_cache_misses_total");
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("kinetic_cache_size", "Current number of items in cache")
            .expect("register kinetic_cache_size");
    pub static ref AI_CALLS: Counter =
        register_counter!("kinetic_ai_calls_total", "Completion requests sent upstream")
            .expect("register kinetic_ai_calls_total");
    pub static ref AI_FAILURES: CounterVec = register_counter_vec!(
        "kinetic_ai_failures_total",
        "Completion requests that failed, by error kind",
        &["kind"]
    )
    .expect("register kinetic_ai_failures_total");
    pub static ref POSTS_TOTAL: CounterVec = register_counter_vec!(
        "kinetic_posts_total",
        "Posts and replies sent to the platform",
        &["kind"]
    )
    .expect("register kinetic_posts_total");
    pub static ref QUOTA_DAILY_USED: Gauge =
        register_gauge!("kinetic_quota_daily_used", "AI calls charged today")
            .expect("register kinetic_quota_daily_used");
    pub static ref EMERGENCY_MODE: Gauge =
        register_gauge!("kinetic_emergency_mode", "1 while AI calls are suspended")
            .expect("register kinetic_emergency_mode");
    pub static ref JOB_LATENCY: HistogramVec = register_histogram_vec!(
        "kinetic_job_latency_seconds",
        "Scheduled job latency in seconds",
        &["job"]
    )
    .expect("register kinetic_job_latency_seconds");
}

// Render the default registry in the text exposition format
pub fn gather_text() -> Result<String, BotError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| BotError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| BotError::Metrics(e.to_string()))
}
