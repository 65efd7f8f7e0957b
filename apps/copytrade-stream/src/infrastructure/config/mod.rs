//! Configuration Module
//!
//! Configuration loading for the copy-trading stream.

mod settings;

pub use settings::{ConfigError, ConnectionSettings, StreamConfig};
