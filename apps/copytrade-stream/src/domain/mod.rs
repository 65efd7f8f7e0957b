//! Domain Layer - Core streaming types and business rules.
//!
//! Channel validation, topic registration and connection state live here.
//! Nothing in this layer performs I/O.

/// Channel types, endpoints and pre-flight validation.
pub mod channel;

/// Connection state and the inbound topic message envelope.
pub mod streaming;

/// Topic-to-handler registry.
pub mod subscription;
