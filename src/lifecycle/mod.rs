//! Lifecycle management subsystem.
//!
//! Shutdown order: signal received → stop accepting → drain in-flight
//! requests → stop the cache janitor → exit.

pub mod shutdown;

pub use shutdown::Shutdown;
