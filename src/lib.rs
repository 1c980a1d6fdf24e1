pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod patient;
mod pipeline;
pub mod replication;
pub mod report;
pub mod trace;

// Re-export commonly used types
pub use crate::config::SimulationConfig;
pub use crate::error::{ConfigError, EngineError, SimulationError};
pub use crate::orchestrator::{run_batch, BatchReport};
pub use crate::replication::{Replication, RunReport};
