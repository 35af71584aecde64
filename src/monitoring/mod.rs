#![forbid(unsafe_code)]

//! Observability: Prometheus metrics.

/// Prometheus metrics registry and counters/gauges.
pub mod metrics;
