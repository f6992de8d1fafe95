// Application Layer - Worker loop, pool supervision and load generation

pub mod load;
pub mod pool;
pub mod worker;


// Re-exports
pub use load::{LoadGenerator, LoadSummary};
pub use pool::{PoolStats, ShutdownReport, WorkerPool};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
