//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → engine.rs (rewrite URI/Host/X-Forwarded-For, dispatch upstream)
//!     → relay.rs (per-request task copying upstream frames to the client)
//!     → flush.rs (coalescing buffer flushed on a fixed ~10 ms cadence)
//!     → trailers forwarded after the final data flush
//! ```
//!
//! # Design Decisions
//! - One relay task per in-flight response; the flush ticker is owned by the
//!   relay loop so no background activity survives the request
//! - Errors before upstream headers arrive surface as 502; errors mid-body
//!   are logged only (the status line is already committed)

pub mod engine;
pub mod error;
pub mod flush;
pub mod relay;

pub use engine::{ForwardingEngine, Target};
pub use error::{InvalidTarget, ProxyError};
