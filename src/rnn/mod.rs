//! # Sequence Unrolling
//!
//! Drives a bound [`RecurrentCell`] across a batch of trajectories, one
//! timestep at a time, threading the hidden state through every step.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `inputs` | `[batch, seq_len, input_size]` (batch-first, as stored in the dataset) |
//! | `initial_state` | `[batch, latent_size]`, zeros when `None` |
//! | `Trajectory::outputs` | `[batch, seq_len, output_size]` |
//! | `Trajectory::latents` | `[batch, seq_len, latent_size]` (state *after* each step) |
//! | `Trajectory::final_state` | `[batch, latent_size]` |
//!
//! ## Example
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use task_rnn::cells::{DriscollRnnConfig, RecurrentCell};
//! use task_rnn::rnn::unroll;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let mut cell = DriscollRnnConfig::new(32).init::<Backend>();
//! cell.init(3, 3, &device);
//!
//! let inputs = Tensor::<Backend, 3>::zeros([4, 10, 3], &device);
//! let trajectory = unroll(&cell, inputs, None).unwrap();
//!
//! assert_eq!(trajectory.outputs.dims(), [4, 10, 3]);
//! assert_eq!(trajectory.latents.dims(), [4, 10, 32]);
//! ```

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::cells::RecurrentCell;
use crate::error::{TaskRnnError, TaskRnnResult};

/// Outputs and hidden states collected over a sequence
#[derive(Debug, Clone)]
pub struct Trajectory<B: Backend> {
    /// Cell outputs, `[batch, seq_len, output_size]`
    pub outputs: Tensor<B, 3>,
    /// Hidden state after each step, `[batch, seq_len, latent_size]`
    pub latents: Tensor<B, 3>,
    /// Hidden state after the last step, `[batch, latent_size]`
    pub final_state: Tensor<B, 2>,
}

/// Run `cell` over every timestep of `inputs`.
///
/// # Errors
/// Propagates the cell's [`TaskRnnError::UnboundCell`] and
/// [`TaskRnnError::ShapeMismatch`] errors; an empty sequence is rejected with
/// [`TaskRnnError::InvalidConfig`].
pub fn unroll<B, C>(
    cell: &C,
    inputs: Tensor<B, 3>,
    initial_state: Option<Tensor<B, 2>>,
) -> TaskRnnResult<Trajectory<B>>
where
    B: Backend,
    C: RecurrentCell<B> + ?Sized,
{
    let device = inputs.device();
    let [batch_size, seq_len, _] = inputs.dims();
    if seq_len == 0 {
        return Err(TaskRnnError::invalid_config("cannot unroll an empty sequence"));
    }

    let mut state = initial_state
        .unwrap_or_else(|| Tensor::<B, 2>::zeros([batch_size, cell.latent_size()], &device));

    let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);
    let mut latents: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

    for t in 0..seq_len {
        // inputs[batch, t, features] -> [batch, features]
        let step_input = inputs.clone().narrow(1, t, 1).squeeze_dim::<2>(1);

        let (output, next_state) = cell.step(step_input, state)?;
        outputs.push(output);
        latents.push(next_state.clone());
        state = next_state;
    }

    Ok(Trajectory {
        outputs: Tensor::stack(outputs, 1),
        latents: Tensor::stack(latents, 1),
        final_state: state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::{CellHyperparams, CellKind, GruRnnConfig, VanillaRnnConfig};
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_unroll_shapes_for_every_kind() {
        let device = Default::default();

        for kind in CellKind::ALL {
            let mut cell = CellHyperparams::new(kind, 16).build::<TestBackend>();
            cell.init(3, 2, &device);

            let inputs = Tensor::<TestBackend, 3>::zeros([4, 7, 3], &device);
            let trajectory = unroll(cell.as_ref(), inputs, None).unwrap();

            assert_eq!(trajectory.outputs.dims(), [4, 7, 2], "{kind}");
            assert_eq!(trajectory.latents.dims(), [4, 7, 16], "{kind}");
            assert_eq!(trajectory.final_state.dims(), [4, 16], "{kind}");
        }
    }

    #[test]
    fn test_unroll_matches_manual_steps() {
        let device = Default::default();
        let mut cell = GruRnnConfig::new(8).init::<TestBackend>();
        cell.init(3, 2, &device);

        let inputs =
            Tensor::<TestBackend, 3>::random([2, 5, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let trajectory = unroll(&cell, inputs.clone(), None).unwrap();

        let mut hidden = Tensor::<TestBackend, 2>::zeros([2, 8], &device);
        let mut output = None;
        for t in 0..5 {
            let x = inputs.clone().narrow(1, t, 1).squeeze_dim::<2>(1);
            let (y, h) = cell.step(x, hidden).unwrap();
            output = Some(y);
            hidden = h;
        }

        let last_output = trajectory.outputs.narrow(1, 4, 1).squeeze_dim::<2>(1);
        let diff = (last_output - output.unwrap()).abs().max().into_scalar();
        assert!(diff < 1e-6);

        let state_diff = (trajectory.final_state - hidden).abs().max().into_scalar();
        assert!(state_diff < 1e-6);
    }

    #[test]
    fn test_unroll_uses_initial_state() {
        let device = Default::default();
        let mut cell = VanillaRnnConfig::new(4).init::<TestBackend>();
        cell.init(2, 1, &device);

        let inputs = Tensor::<TestBackend, 3>::zeros([1, 1, 2], &device);
        let from_zero = unroll(&cell, inputs.clone(), None).unwrap();
        let from_ones = unroll(
            &cell,
            inputs,
            Some(Tensor::<TestBackend, 2>::ones([1, 4], &device)),
        )
        .unwrap();

        let diff = (from_zero.final_state - from_ones.final_state)
            .abs()
            .sum()
            .into_scalar();
        assert!(diff > 0.0);
    }

    #[test]
    fn test_unroll_unbound_cell_fails() {
        let device = Default::default();
        let cell = GruRnnConfig::new(4).init::<TestBackend>();
        let inputs = Tensor::<TestBackend, 3>::zeros([1, 3, 2], &device);

        assert!(matches!(
            unroll(&cell, inputs, None),
            Err(TaskRnnError::UnboundCell { .. })
        ));
    }

    #[test]
    fn test_unroll_empty_sequence_fails() {
        let device = Default::default();
        let mut cell = GruRnnConfig::new(4).init::<TestBackend>();
        cell.init(2, 1, &device);
        let inputs = Tensor::<TestBackend, 3>::zeros([1, 0, 2], &device);

        assert!(matches!(
            unroll(&cell, inputs, None),
            Err(TaskRnnError::InvalidConfig(_))
        ));
    }
}
