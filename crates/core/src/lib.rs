// SlowPoke Core - Bounded Queue, Tunable Service Time & Worker Pool
// NO network dependencies

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
