//! In-memory access to a persisted dataset.

use std::path::Path;
use std::sync::Arc;

use burn::tensor::backend::Backend;
use ndarray::{Array3, ArrayView2, Axis};
use tracing::{info, warn};

use super::artifact::{
    ArtifactMetadata, DatasetArtifact, Split, DATA_FIELD, INDS_FIELD, INPUTS_FIELD,
    OUTPUTS_FIELD,
};
use super::builder::{ArtifactHandle, TaskDatasetBuilder};
use super::env::TaskEnvironment;
use super::loader::TaskBatchLoader;
use crate::config::{DataConfig, DatasetParams, LoaderConfig};
use crate::error::{TaskRnnError, TaskRnnResult};

/// Aligned arrays of one partition. Row `i` of every array belongs to the
/// trajectory originally generated as sample `inds[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPartition {
    pub outputs: Array3<f32>,
    pub inputs: Array3<f32>,
    pub combined: Array3<f32>,
    pub inds: Vec<usize>,
}

/// Borrowed view of one trajectory.
#[derive(Debug, Clone, Copy)]
pub struct TaskSample<'a> {
    pub output: ArrayView2<'a, f32>,
    pub input: ArrayView2<'a, f32>,
    pub combined: ArrayView2<'a, f32>,
    pub index: usize,
}

impl TaskPartition {
    pub fn len(&self) -> usize {
        self.inds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inds.is_empty()
    }

    pub fn n_timesteps(&self) -> usize {
        self.outputs.len_of(Axis(1))
    }

    pub fn get(&self, row: usize) -> Option<TaskSample<'_>> {
        if row >= self.len() {
            return None;
        }
        Some(TaskSample {
            output: self.outputs.index_axis(Axis(0), row),
            input: self.inputs.index_axis(Axis(0), row),
            combined: self.combined.index_axis(Axis(0), row),
            index: self.inds[row],
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskSample<'_>> {
        (0..self.len()).filter_map(move |row| self.get(row))
    }

    /// Pull one partition's fields out of `artifact`, checking alignment.
    fn take_from(
        artifact: &mut DatasetArtifact,
        split: Split,
        path: &Path,
    ) -> TaskRnnResult<Self> {
        let mut take = |suffix: &str| {
            let field = split.field(suffix);
            artifact
                .remove(&field)
                .ok_or_else(|| TaskRnnError::corrupt(path, format!("missing field {field}")))
                .map(|array| (field, array))
        };

        let (data_field, combined) = take(DATA_FIELD)?;
        let (outputs_field, outputs) = take(OUTPUTS_FIELD)?;
        let (inputs_field, inputs) = take(INPUTS_FIELD)?;
        let (inds_field, inds) = take(INDS_FIELD)?;

        let to_array = |field: &str, array: super::artifact::StoredArray| {
            array
                .into_array3()
                .map_err(|reason| TaskRnnError::corrupt(path, format!("{field}: {reason}")))
        };
        let combined = to_array(&data_field, combined)?;
        let outputs = to_array(&outputs_field, outputs)?;
        let inputs = to_array(&inputs_field, inputs)?;
        let inds = inds
            .into_indices()
            .map_err(|reason| TaskRnnError::corrupt(path, format!("{inds_field}: {reason}")))?;

        let expected_rows = inds.len();
        let expected_steps = outputs.len_of(Axis(1));
        for (field, array) in [
            (&data_field, &combined),
            (&outputs_field, &outputs),
            (&inputs_field, &inputs),
        ] {
            let rows = array.len_of(Axis(0));
            if rows != expected_rows {
                return Err(TaskRnnError::corrupt(
                    path,
                    format!("{field} has {rows} rows but {inds_field} has {expected_rows}"),
                ));
            }
            let steps = array.len_of(Axis(1));
            if steps != expected_steps {
                return Err(TaskRnnError::corrupt(
                    path,
                    format!("{field} has {steps} timesteps, expected {expected_steps}"),
                ));
            }
        }

        Ok(Self {
            outputs,
            inputs,
            combined,
            inds,
        })
    }
}

/// Train/valid/test partitions of one dataset, held in memory.
///
/// # Example
///
/// ```no_run
/// use burn::backend::NdArray;
/// use task_rnn::config::{DataConfig, LoaderConfig};
/// use task_rnn::data::TaskDataModule;
///
/// type Backend = NdArray<f32>;
/// let device = Default::default();
///
/// let path = DataConfig::from_env()?.data_home().join("NBFF_2000S_200T_0seed_0.ttd");
/// let data = TaskDataModule::load_path(&path, LoaderConfig::default())?;
///
/// let mut train = data.train_batches::<Backend>(true, &device);
/// for batch in train.epoch() {
///     let (outputs, inputs, combined, inds) = batch.into_tuple();
/// }
/// # Ok::<(), task_rnn::error::TaskRnnError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TaskDataModule {
    metadata: ArtifactMetadata,
    train: Arc<TaskPartition>,
    valid: Arc<TaskPartition>,
    test: Arc<TaskPartition>,
    loader: LoaderConfig,
}

impl TaskDataModule {
    /// Load the artifact behind `handle`.
    pub fn load(handle: &ArtifactHandle, loader: LoaderConfig) -> TaskRnnResult<Self> {
        Self::load_path(handle.path(), loader)
    }

    /// Load the artifact stored at `path`.
    ///
    /// # Errors
    /// [`TaskRnnError::ArtifactMissing`] if the file is absent,
    /// [`TaskRnnError::ArtifactCorrupt`] if a field is missing or partitions
    /// are misaligned, [`TaskRnnError::InvalidConfig`] for an unusable loader config.
    pub fn load_path(path: &Path, loader: LoaderConfig) -> TaskRnnResult<Self> {
        loader.validate()?;

        let mut artifact = DatasetArtifact::load(path)?;
        let train = TaskPartition::take_from(&mut artifact, Split::Train, path)?;
        let valid = TaskPartition::take_from(&mut artifact, Split::Valid, path)?;
        let test = TaskPartition::take_from(&mut artifact, Split::Test, path)?;

        let metadata = artifact.metadata;
        if path.file_stem().and_then(|stem| stem.to_str()) != Some(metadata.name.as_str()) {
            warn!(
                "artifact {} records dataset name {}",
                path.display(),
                metadata.name
            );
        }
        info!(
            train = train.len(),
            valid = valid.len(),
            test = test.len(),
            "Loaded dataset {}",
            metadata.name
        );

        Ok(Self {
            metadata,
            train: Arc::new(train),
            valid: Arc::new(valid),
            test: Arc::new(test),
            loader,
        })
    }

    /// Build the dataset if needed, then load it.
    pub fn prepare<E>(
        config: DataConfig,
        env: &mut E,
        params: &DatasetParams,
        loader: LoaderConfig,
    ) -> TaskRnnResult<Self>
    where
        E: TaskEnvironment + ?Sized,
    {
        let handle = TaskDatasetBuilder::new(config).build(env, params)?;
        Self::load(&handle, loader)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn input_labels(&self) -> &[String] {
        &self.metadata.input_labels
    }

    pub fn output_labels(&self) -> &[String] {
        &self.metadata.output_labels
    }

    pub fn loader_config(&self) -> &LoaderConfig {
        &self.loader
    }

    pub fn partition(&self, split: Split) -> &TaskPartition {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    pub fn train(&self) -> &TaskPartition {
        &self.train
    }

    pub fn valid(&self) -> &TaskPartition {
        &self.valid
    }

    pub fn test(&self) -> &TaskPartition {
        &self.test
    }

    /// Batches over the train partition, reshuffled on every epoch when `shuffle` is set.
    pub fn train_batches<B: Backend>(
        &self,
        shuffle: bool,
        device: &B::Device,
    ) -> TaskBatchLoader<B> {
        TaskBatchLoader::new(Arc::clone(&self.train), self.loader.clone(), shuffle, device)
    }

    /// Batches over the valid partition in stored order.
    pub fn valid_batches<B: Backend>(&self, device: &B::Device) -> TaskBatchLoader<B> {
        TaskBatchLoader::new(Arc::clone(&self.valid), self.loader.clone(), false, device)
    }

    /// Batches over the test partition in stored order.
    pub fn test_batches<B: Backend>(&self, device: &B::Device) -> TaskBatchLoader<B> {
        TaskBatchLoader::new(Arc::clone(&self.test), self.loader.clone(), false, device)
    }
}
