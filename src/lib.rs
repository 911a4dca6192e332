//! Caching HTTP Reverse Proxy Library
//!
//! Forwards every request to a single upstream target, streams the response
//! back with periodic flushing and trailer propagation, and replays cached
//! responses for idempotent (GET) requests.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
