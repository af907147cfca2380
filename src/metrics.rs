use once_cell::sync::Lazy;
use prometheus::{register_counter, Counter};

// Process gauges (cpu_usage, memory_usage_bytes) live in the telemetry
// crate; this module adds the binary-local counters fed by the poller.

pub static CPU_SECONDS_TOTAL_COUNTER: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "cpu_seconds_total",
        "Total CPU seconds consumed by the weir process"
    )
    .expect("create cpu seconds counter")
});
