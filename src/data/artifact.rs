//! Single-file dataset artifact.
//!
//! An artifact is a versioned, bincode-encoded map from field name to a
//! typed multi-dimensional array, plus descriptive metadata. Writes go to a
//! temporary file in the target directory and are renamed into place, so a
//! crash mid-write never leaves a file at the cache path.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{TaskRnnError, TaskRnnResult};

/// File extension of dataset artifacts
pub const ARTIFACT_EXTENSION: &str = "ttd";

/// Current artifact format version
pub const ARTIFACT_VERSION: u32 = 1;

/// Field suffix of the combined trajectories
pub const DATA_FIELD: &str = "data";
/// Field suffix of the target trajectories
pub const OUTPUTS_FIELD: &str = "outputs";
/// Field suffix of the input trajectories
pub const INPUTS_FIELD: &str = "inputs";
/// Field suffix of the original sample indices
pub const INDS_FIELD: &str = "inds";

/// Dataset partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }

    /// Artifact field name, e.g. `train_outputs`
    pub fn field(&self, suffix: &str) -> String {
        format!("{}_{}", self.as_str(), suffix)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named numeric array stored in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredArray {
    F32 { shape: Vec<usize>, data: Vec<f32> },
    I64 { shape: Vec<usize>, data: Vec<i64> },
}

impl StoredArray {
    pub fn from_array3(array: &Array3<f32>) -> Self {
        StoredArray::F32 {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    pub fn from_indices(indices: &[usize]) -> Self {
        StoredArray::I64 {
            shape: vec![indices.len()],
            data: indices.iter().map(|&i| i as i64).collect(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            StoredArray::F32 { shape, .. } | StoredArray::I64 { shape, .. } => shape,
        }
    }

    /// Number of rows along the first axis
    pub fn rows(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    pub(crate) fn into_array3(self) -> Result<Array3<f32>, String> {
        match self {
            StoredArray::F32 { shape, data } => match shape.as_slice() {
                &[rows, steps, dim] => Array3::from_shape_vec((rows, steps, dim), data)
                    .map_err(|e| format!("array data does not match shape {shape:?}: {e}")),
                _ => Err(format!("expected a 3-D array, found shape {shape:?}")),
            },
            StoredArray::I64 { .. } => Err("expected f32 trajectories, found i64".to_string()),
        }
    }

    pub(crate) fn into_indices(self) -> Result<Vec<usize>, String> {
        match self {
            StoredArray::I64 { shape, data } => {
                if shape.len() != 1 || shape[0] != data.len() {
                    return Err(format!("expected a 1-D index array, found shape {shape:?}"));
                }
                data.into_iter()
                    .map(|i| usize::try_from(i).map_err(|_| format!("negative index {i}")))
                    .collect()
            }
            StoredArray::F32 { .. } => Err("expected i64 indices, found f32".to_string()),
        }
    }
}

/// Descriptive information recorded alongside the arrays.
///
/// Not used for cache validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub env_name: String,
    pub input_labels: Vec<String>,
    pub output_labels: Vec<String>,
    pub n_samples: usize,
    pub n_timesteps: usize,
    pub seed: u64,
    pub noise: f64,
    pub task_params: Vec<(String, String)>,
}

/// In-memory form of an artifact file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetArtifact {
    version: u32,
    pub metadata: ArtifactMetadata,
    fields: BTreeMap<String, StoredArray>,
}

impl DatasetArtifact {
    pub fn new(metadata: ArtifactMetadata) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            metadata,
            fields: BTreeMap::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn insert(&mut self, name: impl Into<String>, array: StoredArray) {
        self.fields.insert(name.into(), array);
    }

    pub fn get(&self, name: &str) -> Option<&StoredArray> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<StoredArray> {
        self.fields.remove(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Store the three trajectory arrays and the index array of one partition.
    pub fn insert_partition(
        &mut self,
        split: Split,
        indices: &[usize],
        outputs: &Array3<f32>,
        inputs: &Array3<f32>,
        combined: &Array3<f32>,
    ) {
        self.insert(
            split.field(DATA_FIELD),
            StoredArray::from_array3(&combined.select(Axis(0), indices)),
        );
        self.insert(
            split.field(OUTPUTS_FIELD),
            StoredArray::from_array3(&outputs.select(Axis(0), indices)),
        );
        self.insert(
            split.field(INPUTS_FIELD),
            StoredArray::from_array3(&inputs.select(Axis(0), indices)),
        );
        self.insert(split.field(INDS_FIELD), StoredArray::from_indices(indices));
    }

    /// Write the artifact to `path` through a temporary file and an atomic rename.
    pub fn save_atomic(&self, path: &Path) -> TaskRnnResult<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            bincode::serialize_into(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(std::io::Error::from)?;
        Ok(())
    }

    /// Read an artifact from `path`.
    ///
    /// # Errors
    /// [`TaskRnnError::ArtifactMissing`] when no file exists,
    /// [`TaskRnnError::ArtifactCorrupt`] when it cannot be decoded or has an
    /// unknown version.
    pub fn load(path: &Path) -> TaskRnnResult<Self> {
        if !path.is_file() {
            return Err(TaskRnnError::ArtifactMissing {
                path: path.to_path_buf(),
            });
        }

        let bytes = fs::read(path)?;
        let artifact: Self = bincode::deserialize(&bytes)
            .map_err(|e| TaskRnnError::corrupt(path, format!("cannot decode artifact: {e}")))?;

        if artifact.version != ARTIFACT_VERSION {
            return Err(TaskRnnError::corrupt(
                path,
                format!(
                    "unsupported artifact version {} (expected {ARTIFACT_VERSION})",
                    artifact.version
                ),
            ));
        }

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn metadata() -> ArtifactMetadata {
        ArtifactMetadata {
            name: "toy_4S_3T_0seed_0".to_string(),
            env_name: "toy".to_string(),
            input_labels: vec!["in".to_string()],
            output_labels: vec!["out".to_string()],
            n_samples: 4,
            n_timesteps: 3,
            seed: 0,
            noise: 0.0,
            task_params: vec![],
        }
    }

    #[test]
    fn test_split_field_names() {
        assert_eq!(Split::Train.field(DATA_FIELD), "train_data");
        assert_eq!(Split::Valid.field(OUTPUTS_FIELD), "valid_outputs");
        assert_eq!(Split::Test.field(INDS_FIELD), "test_inds");
    }

    #[test]
    fn test_stored_array_shape_checks() {
        let array =
            Array3::<f32>::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 12 + j * 4 + k) as f32);
        let stored = StoredArray::from_array3(&array);
        assert_eq!(stored.shape(), &[2, 3, 4]);
        assert_eq!(stored.rows(), 2);
        assert_eq!(stored.clone().into_array3().unwrap(), array);
        assert!(stored.into_indices().is_err());

        let bad = StoredArray::F32 {
            shape: vec![2, 3, 4],
            data: vec![0.0; 5],
        };
        assert!(bad.into_array3().is_err());

        let negative = StoredArray::I64 {
            shape: vec![1],
            data: vec![-1],
        };
        assert!(negative.into_indices().is_err());
    }

    #[test]
    fn test_insert_partition_selects_rows() {
        let outputs = Array3::<f32>::from_shape_fn((4, 3, 1), |(i, _, _)| i as f32);
        let inputs = outputs.mapv(|v| v * 10.0);
        let combined = outputs.mapv(|v| v * 100.0);

        let mut artifact = DatasetArtifact::new(metadata());
        artifact.insert_partition(Split::Test, &[3, 1], &outputs, &inputs, &combined);

        let selected = artifact.get("test_inputs").unwrap().clone().into_array3().unwrap();
        assert_eq!(selected[[0, 0, 0]], 30.0);
        assert_eq!(selected[[1, 2, 0]], 10.0);
        assert_eq!(
            artifact.get("test_inds").unwrap().clone().into_indices().unwrap(),
            vec![3, 1]
        );
        assert_eq!(artifact.field_names().count(), 4);
    }

    #[test]
    fn test_save_is_atomic_and_loadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("toy.ttd");

        let mut artifact = DatasetArtifact::new(metadata());
        artifact.insert("train_inds", StoredArray::from_indices(&[0, 2]));
        artifact.save_atomic(&path).unwrap();

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1, "temporary file should be renamed away");

        let loaded = DatasetArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.version(), ARTIFACT_VERSION);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = DatasetArtifact::load(&dir.path().join("absent.ttd")).unwrap_err();
        assert!(matches!(err, TaskRnnError::ArtifactMissing { .. }));
    }

    #[test]
    fn test_load_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toy.ttd");

        let mut artifact = DatasetArtifact::new(metadata());
        artifact.insert("train_inds", StoredArray::from_indices(&[0, 1, 2, 3]));
        artifact.save_atomic(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = DatasetArtifact::load(&path).unwrap_err();
        assert!(matches!(err, TaskRnnError::ArtifactCorrupt { .. }));
    }
}
