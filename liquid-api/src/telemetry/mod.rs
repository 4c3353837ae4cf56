//! LIQUID Telemetry - Observability Infrastructure
//!
//! Structured logging via tracing-subscriber and Prometheus metrics for the
//! API layer. Everything works standalone, no collector required.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, LiquidMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
