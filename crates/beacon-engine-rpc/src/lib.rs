//! Beacon Engine RPC - Transport to the execution node
//!
//! This crate provides the JWT-authenticated Engine API client, the plain
//! JSON-RPC client used for chain introspection, and the
//! [`ExecutionClient`] seam the consensus layer drives.

pub mod auth;
pub mod client;
pub mod error;
pub mod execution;

pub use auth::{JwtSecret, JWT_SECRET_LEN};
pub use client::RpcClient;
pub use error::{ErrorKind, RpcError};
pub use execution::{BlockTag, ChainMethods, ExecutionClient, HttpExecutionClient};
