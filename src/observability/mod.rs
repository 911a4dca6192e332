//! Observability subsystem.
//!
//! Structured logging is initialized in `main` (tracing-subscriber with an
//! env filter); request/response spans come from `tower_http::trace`, which
//! observes the data path without altering headers, body, or status.
//! Metrics are Prometheus counters/histograms exposed by an optional
//! exporter listener.

pub mod metrics;
