//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! GET request
//!     → key.rs (SHA-1 fingerprint over URL + header block)
//!     → store.rs (TTL lookup)
//!         hit  → codec.rs deserialize → replay stored response
//!         miss → forward, tee the streamed body (middleware.rs),
//!                codec.rs serialize → store.insert
//! ```
//!
//! # Design Decisions
//! - Caching wraps the forwarding handler as a middleware layer, so it
//!   composes with tracing and request-id decorators without touching the
//!   engine
//! - The store is owned by server state and injected, never global
//! - Cache failures degrade to a miss; the forwarding path is never blocked

pub mod codec;
pub mod key;
pub mod middleware;
pub mod store;

pub use codec::CachedResponse;
pub use store::Store;
