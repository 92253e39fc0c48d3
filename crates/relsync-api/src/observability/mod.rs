//! Observability: structured logging and the metrics/health listener.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, parse_log_level, LoggingConfig};
pub use metrics::{describe_metrics, init_metrics, serve_metrics};
