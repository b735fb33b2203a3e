//! Synthetic task datasets.
//!
//! The pipeline runs in two steps:
//!
//! 1. [`TaskDatasetBuilder::build`] asks a [`TaskEnvironment`] for trajectories,
//!    splits them train/valid/test and persists one artifact per dataset name.
//!    An existing artifact is reused as-is.
//! 2. [`TaskDataModule::load`] reads the artifact back and hands out
//!    [`TaskBatchLoader`]s over each partition.

pub mod artifact;
pub mod builder;
pub mod env;
pub mod loader;
pub mod module;
pub mod split;

pub use artifact::{ArtifactMetadata, DatasetArtifact, Split, StoredArray};
pub use builder::{dataset_name, ArtifactHandle, CacheStatus, TaskDatasetBuilder};
pub use env::{TaskEnvironment, TaskTrajectories};
pub use loader::{Epoch, TaskBatch, TaskBatchLoader};
pub use module::{TaskDataModule, TaskPartition, TaskSample};
pub use split::{two_stage_split, SplitIndices, HOLDOUT_FRACTION};
