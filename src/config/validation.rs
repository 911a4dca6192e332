//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Target URL must be present, parseable, and plain http
//! - Validate value ranges (TTL > 0, flush interval > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is bound, so a bad target is fatal at startup

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::proxy::Target;

/// A single semantic configuration error.
#[derive(Debug)]
pub enum ValidationError {
    MissingTargetUrl,
    InvalidTargetUrl(String),
    InvalidBindAddress(String),
    ZeroInterval(&'static str),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingTargetUrl => {
                write!(f, "upstream.target_url is required")
            }
            ValidationError::InvalidTargetUrl(reason) => {
                write!(f, "upstream.target_url is invalid: {}", reason)
            }
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "listener.bind_address {:?} is not a socket address", addr)
            }
            ValidationError::ZeroInterval(field) => {
                write!(f, "{} must be greater than zero", field)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.target_url.is_empty() {
        errors.push(ValidationError::MissingTargetUrl);
    } else if let Err(e) = Target::parse(&config.upstream.target_url) {
        errors.push(ValidationError::InvalidTargetUrl(e.to_string()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.upstream.flush_interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval("upstream.flush_interval_ms"));
    }
    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::ZeroInterval("cache.ttl_secs"));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroInterval("cache.sweep_interval_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroInterval("timeouts.request_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
