//! Metric names recorded by the bus.
//!
//! Recording goes through the `metrics` facade and costs nothing until a
//! recorder is installed.

/// Metric names.
pub mod names {
    pub const DISPATCH_TOTAL: &str = "switchyard_dispatch_total";
    pub const DISPATCH_FAILURES_TOTAL: &str = "switchyard_dispatch_failures_total";
    pub const DISPATCH_SECONDS: &str = "switchyard_dispatch_seconds";
}

/// Register descriptions for the bus metrics.
pub fn describe() {
    metrics::describe_counter!(names::DISPATCH_TOTAL, "Total number of dispatched topics");
    metrics::describe_counter!(
        names::DISPATCH_FAILURES_TOTAL,
        "Dispatches aborted by a failing pipeline unit"
    );
    metrics::describe_histogram!(
        names::DISPATCH_SECONDS,
        metrics::Unit::Seconds,
        "Time spent running one dispatch"
    );
}
