use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

pub static CPU_USAGE_GAUGE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("cpu_usage", "CPU usage in percentage").expect("create cpu usage gauge")
});

pub static MEMORY_USAGE_GAUGE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("memory_usage_bytes", "Resident memory usage in bytes")
        .expect("create memory usage gauge")
});

pub static MESSAGES_RECEIVED_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "messages_received_total",
        "Messages emitted by inputs, per component kind",
        &["component"]
    )
    .expect("create messages received counter")
});

pub static MESSAGES_SENT_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "messages_sent_total",
        "Messages committed by outputs, per component kind",
        &["component"]
    )
    .expect("create messages sent counter")
});

pub static ACK_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "transaction_acks_total",
        "Transaction responses observed, by outcome",
        &["outcome"]
    )
    .expect("create ack counter")
});

pub static PROCESSOR_ERROR_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "processor_errors_total",
        "Messages flagged with a processing error, per processor kind",
        &["processor"]
    )
    .expect("create processor error counter")
});

pub static MESSAGES_FILTERED_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "messages_filtered_total",
        "Messages dropped by filtering processors, per processor kind",
        &["processor"]
    )
    .expect("create filtered counter")
});

pub static ACTIVE_STREAMS_GAUGE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("active_streams", "Streams currently running")
        .expect("create active streams gauge")
});

pub static BUFFER_BACKLOG_GAUGE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "buffer_backlog_bytes",
        "Bytes held across in-memory buffers awaiting downstream acks"
    )
    .expect("create buffer backlog gauge")
});

/// Outcome label values for the ack counter.
pub mod outcome {
    pub const ACK: &str = "ack";
    pub const NACK: &str = "nack";
    pub const ERROR: &str = "error";
}
