//! Dataset generation, splitting and caching.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::artifact::{ArtifactMetadata, DatasetArtifact, Split, ARTIFACT_EXTENSION};
use super::env::TaskEnvironment;
use super::split::two_stage_split;
use crate::config::{DataConfig, DatasetParams};
use crate::error::{TaskRnnError, TaskRnnResult};

/// Whether `build` found an existing artifact or generated a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Generated,
}

/// Location and identity of a persisted dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    name: String,
    path: PathBuf,
    status: CacheStatus,
}

impl ArtifactHandle {
    /// Dataset name, also the cache key
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> CacheStatus {
        self.status
    }

    pub fn is_cache_hit(&self) -> bool {
        self.status == CacheStatus::Hit
    }
}

/// Canonical dataset name:
/// `<env>_<n_samples>S_<n_timesteps>T_<seed>seed_<noise>[_<key>_<value>]*`.
pub fn dataset_name(env_name: &str, n_timesteps: usize, params: &DatasetParams) -> String {
    let mut name = format!(
        "{env_name}_{}S_{n_timesteps}T_{}seed_{}",
        params.n_samples, params.seed, params.noise
    );
    for (key, value) in &params.task_params {
        name.push_str(&format!("_{key}_{value}"));
    }
    name
}

/// Generates, splits and persists task datasets under a data home.
///
/// A dataset is generated at most once per name: if the artifact file
/// already exists, `build` returns it untouched. Existence is the only cache
/// check, so two parameter sets mapping to the same name share one artifact.
#[derive(Debug, Clone)]
pub struct TaskDatasetBuilder {
    config: DataConfig,
}

impl TaskDatasetBuilder {
    pub fn new(config: DataConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Path of the artifact holding dataset `name`
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.config
            .data_home()
            .join(format!("{name}.{ARTIFACT_EXTENSION}"))
    }

    /// Produce the artifact for `env` and `params`, reusing a cached one if present.
    ///
    /// # Errors
    /// [`TaskRnnError::InvalidConfig`] when the split would leave a partition
    /// empty, [`TaskRnnError::Generation`] when the environment returns
    /// mis-shaped trajectories, and IO/serialization errors from the write.
    pub fn build<E>(&self, env: &mut E, params: &DatasetParams) -> TaskRnnResult<ArtifactHandle>
    where
        E: TaskEnvironment + ?Sized,
    {
        let n_timesteps = env.n_timesteps();
        let name = dataset_name(env.dataset_name(), n_timesteps, params);
        let path = self.artifact_path(&name);

        if path.is_file() {
            info!("Loading dataset {name}");
            return Ok(ArtifactHandle {
                name,
                path,
                status: CacheStatus::Hit,
            });
        }

        info!("Generating dataset {name}");
        if params.n_samples == 0 {
            return Err(TaskRnnError::invalid_config("n_samples must be positive"));
        }
        let split = two_stage_split(params.n_samples, params.seed)?;
        debug!(
            train = split.train.len(),
            valid = split.valid.len(),
            test = split.test.len(),
            "split {name}"
        );

        let trajectories = env.generate_dataset(params.n_samples)?;
        trajectories.validate(params.n_samples, n_timesteps)?;

        let mut artifact = DatasetArtifact::new(ArtifactMetadata {
            name: name.clone(),
            env_name: env.dataset_name().to_string(),
            input_labels: env.input_labels().to_vec(),
            output_labels: env.output_labels().to_vec(),
            n_samples: params.n_samples,
            n_timesteps,
            seed: params.seed,
            noise: params.noise,
            task_params: params.task_params.clone(),
        });

        for (split_kind, indices) in [
            (Split::Train, &split.train),
            (Split::Valid, &split.valid),
            (Split::Test, &split.test),
        ] {
            artifact.insert_partition(
                split_kind,
                indices,
                &trajectories.outputs,
                &trajectories.inputs,
                &trajectories.combined,
            );
        }

        artifact.save_atomic(&path)?;
        info!("Saved dataset {name} to {}", path.display());

        Ok(ArtifactHandle {
            name,
            path,
            status: CacheStatus::Generated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_name_without_params() {
        let params = DatasetParams::default().with_n_samples(100);
        assert_eq!(dataset_name("NBFF", 10, &params), "NBFF_100S_10T_0seed_0");
    }

    #[test]
    fn test_dataset_name_appends_params_in_order() {
        let params = DatasetParams::default()
            .with_n_samples(2000)
            .with_seed(3)
            .with_noise(0.05)
            .with_task_param("n_bits", 3)
            .with_task_param("switch_prob", 0.01);

        assert_eq!(
            dataset_name("NBFF", 200, &params),
            "NBFF_2000S_200T_3seed_0.05_n_bits_3_switch_prob_0.01"
        );
    }

    #[test]
    fn test_artifact_path_uses_data_home() {
        let builder = TaskDatasetBuilder::new(DataConfig::new("/data"));
        assert_eq!(
            builder.artifact_path("NBFF_100S_10T_0seed_0"),
            PathBuf::from("/data/NBFF_100S_10T_0seed_0.ttd")
        );
    }
}
