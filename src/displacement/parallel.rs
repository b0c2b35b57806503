//! Ordered parallel map with a bounded worker count.
//!
//! Work items are independent; each produces one output slot and the ordered
//! `collect` is the only synchronization point. Output order always matches
//! input order, so results are identical for any worker count.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Environment variable holding the worker count (`0` or `auto` = all cores).
pub const ENV_WORKERS: &str = "SPT_WORKERS";
/// Environment variable holding the minimum items per parallel task.
pub const ENV_CHUNK_SIZE: &str = "SPT_CHUNK_SIZE";

const DEFAULT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of worker threads; `<= 1` runs sequentially on the caller's thread.
    pub workers: usize,
    /// Minimum number of consecutive items handed to one task.
    pub chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self::sequential()
    }
}

impl ParallelConfig {
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// One worker per available hardware thread.
    pub fn all_cores() -> Self {
        Self::with_workers(available_workers())
    }

    /// Read `SPT_WORKERS` / `SPT_CHUNK_SIZE`, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self, AnalysisError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (unset keys keep the sequential defaults).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::sequential();

        if let Some(raw) = lookup(ENV_WORKERS) {
            let raw = raw.trim();
            config.workers = if raw.eq_ignore_ascii_case("auto") {
                available_workers()
            } else {
                match raw.parse::<usize>() {
                    Ok(0) => available_workers(),
                    Ok(n) => n,
                    Err(_) => {
                        return Err(AnalysisError::InvalidConfig(format!(
                            "{ENV_WORKERS} must be a non-negative integer or 'auto', got '{raw}'."
                        )));
                    }
                }
            };
        }

        if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
            let raw = raw.trim();
            config.chunk_size = match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "{ENV_CHUNK_SIZE} must be a positive integer, got '{raw}'."
                    )));
                }
            };
        }

        Ok(config)
    }

    pub fn is_parallel(&self) -> bool {
        self.workers > 1
    }
}

fn available_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Map `f` over `items`, preserving order.
pub fn parallel_map<T, R, F>(config: &ParallelConfig, items: &[T], f: F) -> Result<Vec<R>, AnalysisError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if !config.is_parallel() {
        return Ok(items.iter().map(f).collect());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| AnalysisError::ThreadPool(e.to_string()))?;

    let min_len = config.chunk_size.max(1);
    Ok(pool.install(|| items.par_iter().with_min_len(min_len).map(f).collect()))
}
