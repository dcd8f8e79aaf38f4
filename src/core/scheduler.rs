use crate::types::{ChipError, ChipResult, TileOutcome, TileWindow};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fans one independent task per window over the worker pool and collects
/// the outcomes in submission order, whatever order tasks finish in. Any
/// task error aborts the whole batch.
pub struct TileScheduler {
    threads: Option<usize>,
}

impl TileScheduler {
    /// Scheduler on the global worker pool
    pub fn new() -> Self {
        Self { threads: None }
    }

    /// Scheduler with its own pool of exactly `threads` workers
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: Some(threads),
        }
    }

    pub fn run<F>(&self, windows: &[TileWindow], task: F) -> ChipResult<Vec<TileOutcome>>
    where
        F: Fn(&TileWindow) -> ChipResult<TileOutcome> + Sync,
    {
        match self.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        ChipError::Processing(format!("failed to build worker pool: {}", e))
                    })?;
                log::info!(
                    "Dispatching {} tile window(s) across {} worker(s)",
                    windows.len(),
                    threads
                );
                pool.install(|| execute(windows, &task))
            }
            None => {
                log::info!(
                    "Dispatching {} tile window(s) across {} worker(s)",
                    windows.len(),
                    rayon::current_num_threads()
                );
                execute(windows, &task)
            }
        }
    }
}

impl Default for TileScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "parallel")]
fn execute<F>(windows: &[TileWindow], task: &F) -> ChipResult<Vec<TileOutcome>>
where
    F: Fn(&TileWindow) -> ChipResult<TileOutcome> + Sync,
{
    // collect() on a Result keeps item order and surfaces a task error
    windows.par_iter().map(task).collect()
}

#[cfg(not(feature = "parallel"))]
fn execute<F>(windows: &[TileWindow], task: &F) -> ChipResult<Vec<TileOutcome>>
where
    F: Fn(&TileWindow) -> ChipResult<TileOutcome> + Sync,
{
    windows.iter().map(task).collect()
}
