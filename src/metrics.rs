// Metrics and observability module
// Prometheus counters for execution outcomes and request failures, plus a
// confirmation latency histogram

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Histogram,
};

pub static EXEC_OUTCOMES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_executions_total",
        "executions by terminal state",
        &["outcome"]
    )
    .unwrap()
});

pub static REQ_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "router_request_errors_total",
        "errors by upstream call",
        &["method"]
    )
    .unwrap()
});

pub static CONFIRM_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "router_confirmation_seconds",
        "time from submission to first confirmation"
    )
    .unwrap()
});
