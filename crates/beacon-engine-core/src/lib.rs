//! Beacon Engine Core - Shared types for driving an execution node
//!
//! This crate provides the data model exchanged with the execution node over
//! the Engine API, the validator set representation, and the lifecycle
//! shutdown signal shared by every layer.

pub mod error;
pub mod serialize;
pub mod shutdown;
pub mod types;

pub use error::CoreError;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use types::*;
