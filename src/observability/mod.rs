//! Logs and metrics.
//!
//! `logging` installs the `tracing` subscriber once per process; `metrics`
//! installs the Prometheus recorder and wraps the few counters the
//! resolution engine records. Request ids come from the HTTP front's
//! middleware and show up in its trace spans.
//!
//! Without an installed recorder every metric call is a no-op, so library
//! code and tests record unconditionally.

pub mod logging;
pub mod metrics;
