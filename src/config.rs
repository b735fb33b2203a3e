//! Dataset and loader configuration.
//!
//! The data home is an explicit value handed to the builder and the data
//! module. [`DataConfig::from_env`] resolves it from `TASK_TRAINED_DATA_HOME`
//! once, at startup.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TaskRnnError, TaskRnnResult};

/// Environment variable naming the dataset root directory.
pub const DATA_HOME_ENV: &str = "TASK_TRAINED_DATA_HOME";

/// Location of persisted dataset artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory holding one artifact per dataset name
    pub data_home: PathBuf,
}

impl DataConfig {
    /// Use an explicit data home.
    pub fn new(data_home: impl Into<PathBuf>) -> Self {
        Self {
            data_home: data_home.into(),
        }
    }

    /// Resolve the data home from [`DATA_HOME_ENV`].
    ///
    /// # Errors
    /// Returns [`TaskRnnError::Configuration`] when the variable is unset or empty.
    pub fn from_env() -> TaskRnnResult<Self> {
        match env::var(DATA_HOME_ENV) {
            Ok(value) if !value.trim().is_empty() => Ok(Self::new(value)),
            Ok(_) => Err(TaskRnnError::Configuration(format!(
                "{DATA_HOME_ENV} is set but empty"
            ))),
            Err(e) => Err(TaskRnnError::Configuration(format!(
                "{DATA_HOME_ENV} could not be resolved: {e}"
            ))),
        }
    }

    /// Root directory for artifacts.
    pub fn data_home(&self) -> &Path {
        &self.data_home
    }
}

/// Parameters identifying one generated dataset.
///
/// Together with the environment's name and timestep count these form the
/// dataset name, which doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetParams {
    /// Number of simulated trajectories
    pub n_samples: usize,
    /// Seed for the train/valid/test split
    pub seed: u64,
    /// Noise level recorded in the dataset name
    pub noise: f64,
    /// Extra task parameters, appended to the name in this order
    pub task_params: Vec<(String, String)>,
}

impl Default for DatasetParams {
    fn default() -> Self {
        Self {
            n_samples: 2000,
            seed: 0,
            noise: 0.0,
            task_params: Vec::new(),
        }
    }
}

impl DatasetParams {
    pub fn with_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Append a task parameter to the dataset name.
    pub fn with_task_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.task_params.push((key.into(), value.to_string()));
        self
    }
}

/// Batching configuration for [`TaskBatchLoader`](crate::data::TaskBatchLoader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Number of trajectories per batch
    pub batch_size: usize,
    /// Number of prefetch worker threads (0 = build batches on the caller's thread)
    pub num_workers: usize,
    /// Batches buffered per worker
    pub prefetch_factor: usize,
    /// Seed for train shuffling; `None` draws a fresh seed from entropy
    pub shuffle_seed: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            num_workers: 4,
            prefetch_factor: 2,
            shuffle_seed: None,
        }
    }
}

impl LoaderConfig {
    /// Small single-threaded configuration for tests
    pub fn test() -> Self {
        Self {
            batch_size: 8,
            num_workers: 0,
            prefetch_factor: 1,
            shuffle_seed: Some(42),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_prefetch_factor(mut self, prefetch_factor: usize) -> Self {
        self.prefetch_factor = prefetch_factor;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub(crate) fn validate(&self) -> TaskRnnResult<()> {
        if self.batch_size == 0 {
            return Err(TaskRnnError::invalid_config("batch_size must be positive"));
        }
        if self.num_workers > 0 && self.prefetch_factor == 0 {
            return Err(TaskRnnError::invalid_config(
                "prefetch_factor must be positive when workers are enabled",
            ));
        }
        Ok(())
    }
}
