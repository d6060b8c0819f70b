use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec,
};

pub static SIGNALS_RECEIVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "signal_execution_messages_received_total",
        "Total inbound chat messages handed to the pipeline"
    )
    .expect("messages_received counter")
});

pub static PARSE_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "signal_execution_parse_rejections_total",
        "Messages that did not match the signal template",
        &["reason"]
    )
    .expect("parse_rejections counter")
});

pub static RISK_DENIALS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "signal_execution_risk_denials_total",
        "Signals refused by the risk gate",
        &["reason"]
    )
    .expect("risk_denials counter")
});

pub static SUBMISSION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "signal_execution_submission_failures_total",
        "Order submissions that failed or were rejected",
        &["kind"]
    )
    .expect("submission_failures counter")
});

pub static ORDERS_EXECUTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "signal_execution_orders_executed_total",
        "Orders acknowledged by the exchange"
    )
    .expect("orders_executed counter")
});

pub static SUBMIT_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "signal_execution_submit_latency_seconds",
        "Order submission round trip",
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("submit_latency histogram")
});

pub fn inc_signals_received() {
    SIGNALS_RECEIVED.inc();
}

pub fn inc_parse_rejections(reason: &str) {
    PARSE_REJECTIONS.with_label_values(&[reason]).inc();
}

pub fn inc_risk_denials(reason: &str) {
    RISK_DENIALS.with_label_values(&[reason]).inc();
}

pub fn inc_submission_failures(kind: &str) {
    SUBMISSION_FAILURES.with_label_values(&[kind]).inc();
}

pub fn inc_orders_executed() {
    ORDERS_EXECUTED.inc();
}

pub fn observe_submit_latency(duration_sec: f64) {
    SUBMIT_LATENCY.observe(duration_sec);
}

/// Prometheus text exposition of the default registry.
pub fn render() -> Result<String, prometheus::Error> {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
