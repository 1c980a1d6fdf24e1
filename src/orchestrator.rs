//! Batch driver: runs N independent replications in parallel.
//!
//! Replications share nothing but the configuration. Each one seeds its
//! own random stream from `master seed + run index`, so the batch result
//! is reproducible run by run no matter how rayon schedules the work.
//! Reports come back in run order.

use log::info;
use rayon::prelude::*;
use uuid::Uuid;

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::replication::{Replication, RunReport};

/// Results of a whole batch, in run order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Tag for correlating the batch across log output and result files.
    pub batch_id: Uuid,
    pub runs: Vec<RunReport>,
}

impl BatchReport {
    /// Mean over runs of a per-run summary value.
    pub fn mean_of<F>(&self, value: F) -> f64
    where
        F: Fn(&RunReport) -> f64,
    {
        if self.runs.is_empty() {
            return 0.0;
        }
        let total: f64 = self.runs.iter().map(value).sum();
        total / self.runs.len() as f64
    }
}

/// Run every replication the configuration asks for.
pub fn run_batch(config: &SimulationConfig) -> Result<BatchReport, SimulationError> {
    config.validate()?;
    let batch_id = Uuid::new_v4();
    let number_of_runs = config.general.number_of_runs;
    info!(
        "[Batch {}] launching {} replications, master seed {}",
        batch_id, number_of_runs, config.general.seed
    );

    let runs: Vec<RunReport> = (0..number_of_runs)
        .into_par_iter()
        .map(|run_index| {
            let replication =
                Replication::new(config.clone(), run_index).map_err(SimulationError::Config)?;
            replication
                .run()
                .map_err(|source| SimulationError::Replication {
                    run: run_index,
                    source,
                })
        })
        .collect::<Result<Vec<_>, SimulationError>>()?;

    info!("[Batch {}] all {} replications finished", batch_id, number_of_runs);
    Ok(BatchReport { batch_id, runs })
}
