//! Shared building blocks for the optolink services
//!
//! - logging bootstrap and HTTP access logging
//! - shutdown signal handling
//! - hex formatting for frame dumps

pub mod hex;
pub mod logging;
pub mod shutdown;
