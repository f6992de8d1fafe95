//! JSON-RPC API Layer
//!
//! Control surface for a running SlowPoke pool: read and tune the service
//! time, inspect queue and worker stats, push simulated work.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
