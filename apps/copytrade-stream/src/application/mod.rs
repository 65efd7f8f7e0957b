//! Application Layer - Port definitions.
//!
//! This layer contains the interfaces that define how the streaming core
//! reaches external systems.

/// Port interfaces for external systems (WebSocket transport).
pub mod ports;
