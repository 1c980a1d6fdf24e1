//! Error taxonomy for the simulator.
//!
//! Configuration faults are detected eagerly before any event is scheduled.
//! Engine faults are invariant violations inside a running replication and
//! abort it. Degenerate statistics (a category with zero observations) are
//! not errors; the derived metrics layer substitutes a defined zero.

use thiserror::Error;

/// Rejected settings, reported before the batch starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("number of runs must be at least 1")]
    NoRuns,

    #[error("{role} capacity must be at least 1")]
    ZeroCapacity { role: &'static str },

    #[error("{table} percentages sum to {sum} (expected 100)")]
    TableSum { table: String, sum: f64 },

    #[error("{table} holds a percentage outside 0..=100 ({value})")]
    PercentageRange { table: String, value: f64 },

    #[error("{context}: distribution mean must be a positive finite number (got {mean})")]
    InvalidMean { context: String, mean: f64 },

    #[error("{context}: normal std dev must be a non-negative finite number (got {std_dev})")]
    InvalidStdDev { context: String, std_dev: f64 },

    #[error("{field} must be a non-negative finite number (got {value})")]
    InvalidTime { field: &'static str, value: f64 },

    #[error("{field} must be a non-negative finite amount (got {value})")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("horizon must be positive")]
    EmptyHorizon,

    #[error("could not read settings file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse settings file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Invariant violation inside a running replication. Fatal for the run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event scheduled at {at} behind the clock at {now}")]
    ScheduleInPast { at: f64, now: f64 },

    #[error("event scheduled at a non-finite timestamp")]
    NonFiniteTimestamp,

    #[error("[{resource}] released ticket {ticket} which is not currently granted")]
    ReleaseNotGranted { resource: &'static str, ticket: u64 },

    #[error("[{resource}] withdrew ticket {ticket} which is not waiting")]
    WithdrawNotQueued { resource: &'static str, ticket: u64 },

    #[error("patient {patient} reached a routing decision with no assigned priority")]
    PriorityUnset { patient: u64 },

    #[error("patient {patient} has no open visit for {stage}")]
    VisitMissing { patient: u64, stage: &'static str },

    #[error("patient {patient} holds no ticket for {stage}")]
    TicketMissing { patient: u64, stage: &'static str },

    #[error("patient {patient} with priority {priority} cannot be routed to {stage}")]
    InvalidRoute {
        patient: u64,
        priority: &'static str,
        stage: &'static str,
    },

    #[error("patient {patient} is unknown to this replication")]
    UnknownPatient { patient: u64 },
}

/// Top-level failure of a batch.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("replication {run} failed: {source}")]
    Replication {
        run: usize,
        #[source]
        source: EngineError,
    },

    #[error("could not write results: {0}")]
    Report(#[from] std::io::Error),
}
