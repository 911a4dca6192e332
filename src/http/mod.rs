//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing/request-id/timeout layers)
//!     → cache middleware (hit replay or miss tee)
//!     → forwarding engine (relay to upstream)
//!     → Send to client
//! ```

pub mod headers;
pub mod server;

pub use headers::{X_FORWARDED_FOR, X_PROXY_CACHED};
pub use server::HttpServer;
