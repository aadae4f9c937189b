//! Optolink bridge service (`optosrv`)
//!
//! Polls a heating controller over the optolink serial interface, publishes
//! every decoded value to MQTT and accepts control actions over HTTP.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod publisher;
pub mod scheduler;
pub mod state;

pub use error::{OptoSrvError, Result};
