//! # task-rnn
//!
//! Recurrent dynamics models trained on synthetic behavioral tasks, built on
//! the Burn framework.
//!
//! ## Features
//!
//! - **Cells**: Vanilla, GRU, NoisyGRU and Driscoll recurrent cells behind one
//!   [`RecurrentCell`](cells::RecurrentCell) step interface
//! - **Unrolling**: [`rnn::unroll`] drives any cell over a `[batch, time, features]` sequence
//! - **Datasets**: seeded two-stage train/valid/test splits, cached as one
//!   artifact file per dataset name
//! - **Loading**: batched, optionally shuffled iteration with prefetch workers
//!
//! ## Quick Start
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use task_rnn::prelude::*;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let mut cell = CellHyperparams::new(CellKind::Driscoll, 32)
//!     .with_gamma(0.1)
//!     .build::<Backend>();
//! cell.init(3, 3, &device);
//!
//! let inputs = Tensor::<Backend, 3>::zeros([8, 50, 3], &device);
//! let trajectory = unroll(cell.as_ref(), inputs, None).unwrap();
//! assert_eq!(trajectory.latents.dims(), [8, 50, 32]);
//! ```
//!
//! Datasets are built once per name under the data home and reloaded on
//! later runs; see [`data`] for the pipeline.

pub mod cells;
pub mod config;
pub mod data;
pub mod error;
pub mod rnn;

pub mod prelude {
    pub use crate::cells::{
        Binding, CellHyperparams, CellKind, DriscollRnn, GruRnn, NoisyGruRnn, RecurrentCell,
        VanillaRnn,
    };
    pub use crate::config::{DataConfig, DatasetParams, LoaderConfig};
    pub use crate::data::{
        ArtifactHandle, CacheStatus, Split, TaskBatch, TaskDataModule, TaskDatasetBuilder,
        TaskEnvironment, TaskTrajectories,
    };
    pub use crate::error::{TaskRnnError, TaskRnnResult};
    pub use crate::rnn::{unroll, Trajectory};
}
