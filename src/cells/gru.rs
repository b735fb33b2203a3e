//! Gated recurrent unit cell with a linear readout.

use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::{check_step_shapes, readout, recurrent_initializer, Binding, RecurrentCell};
use crate::error::{TaskRnnError, TaskRnnResult};

/// GRU gate equations
///
/// - r = σ(W_ir x + b_ir + W_hr h + b_hr)
/// - z = σ(W_iz x + b_iz + W_hz h + b_hz)
/// - n = tanh(W_in x + b_in + r * (W_hn h + b_hn))
/// - h' = (1 - z) * n + z * h
#[derive(Module, Debug)]
pub struct GruGates<B: Backend> {
    input_map: Linear<B>,     // Maps input to 3 * latent_size (r, z, n)
    recurrent_map: Linear<B>, // Maps hidden state to 3 * latent_size (r, z, n)
}

impl<B: Backend> GruGates<B> {
    pub fn new(input_size: usize, latent_size: usize, device: &B::Device) -> Self {
        let input_map = LinearConfig::new(input_size, 3 * latent_size)
            .with_bias(true)
            .with_initializer(recurrent_initializer(latent_size))
            .init(device);

        let recurrent_map = LinearConfig::new(latent_size, 3 * latent_size)
            .with_bias(true)
            .with_initializer(recurrent_initializer(latent_size))
            .init(device);

        Self {
            input_map,
            recurrent_map,
        }
    }

    /// Compute the next hidden state `[batch, latent_size]`.
    pub fn forward(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let input_chunks = self.input_map.forward(input).chunk(3, 1);
        let recurrent_chunks = self.recurrent_map.forward(hidden.clone()).chunk(3, 1);

        let reset_gate =
            activation::sigmoid(input_chunks[0].clone() + recurrent_chunks[0].clone());
        let update_gate =
            activation::sigmoid(input_chunks[1].clone() + recurrent_chunks[1].clone());
        let candidate =
            (input_chunks[2].clone() + reset_gate * recurrent_chunks[2].clone()).tanh();

        // h' = (1 - z) * n + z * h
        let keep = update_gate.clone().neg().add_scalar(1.0);
        keep * candidate + update_gate * hidden
    }
}

/// Weights of a bound GRU cell, shared with [`NoisyGruRnn`](super::NoisyGruRnn).
#[derive(Module, Debug)]
pub struct GruWeights<B: Backend> {
    pub(crate) gates: GruGates<B>,
    pub(crate) readout: Linear<B>,
    #[module(skip)]
    pub(crate) input_size: usize,
    #[module(skip)]
    pub(crate) output_size: usize,
}

impl<B: Backend> GruWeights<B> {
    pub fn new(
        input_size: usize,
        latent_size: usize,
        output_size: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            gates: GruGates::new(input_size, latent_size, device),
            readout: readout(latent_size, output_size, device),
            input_size,
            output_size,
        }
    }

    pub(crate) fn binding(&self) -> Binding {
        Binding::Bound {
            input_size: self.input_size,
            output_size: self.output_size,
        }
    }
}

/// Configuration for [`GruRnn`]
#[derive(Config, Debug)]
pub struct GruRnnConfig {
    /// Hidden state width
    pub latent_size: usize,
}

impl GruRnnConfig {
    /// Create an unbound GRU cell
    pub fn init<B: Backend>(&self) -> GruRnn<B> {
        GruRnn {
            latent_size: self.latent_size,
            weights: None,
        }
    }
}

/// GRU recurrence with the output read from the *new* hidden state.
#[derive(Module, Debug)]
pub struct GruRnn<B: Backend> {
    #[module(skip)]
    latent_size: usize,
    pub(crate) weights: Option<GruWeights<B>>,
}

impl<B: Backend> GruRnn<B> {
    const NAME: &'static str = "GRU";
}

impl<B: Backend> RecurrentCell<B> for GruRnn<B> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn latent_size(&self) -> usize {
        self.latent_size
    }

    fn binding(&self) -> Binding {
        self.weights
            .as_ref()
            .map_or(Binding::Unbound, GruWeights::binding)
    }

    fn init(&mut self, input_size: usize, output_size: usize, device: &B::Device) {
        self.weights = Some(GruWeights::new(
            input_size,
            self.latent_size,
            output_size,
            device,
        ));
    }

    fn step(
        &self,
        input: Tensor<B, 2>,
        hidden: Tensor<B, 2>,
    ) -> TaskRnnResult<(Tensor<B, 2>, Tensor<B, 2>)> {
        let weights = self
            .weights
            .as_ref()
            .ok_or(TaskRnnError::UnboundCell { model: Self::NAME })?;
        check_step_shapes(
            Self::NAME,
            &input,
            &hidden,
            weights.input_size,
            self.latent_size,
        )?;

        let hidden = weights.gates.forward(input, hidden);
        let output = weights.readout.forward(hidden.clone());
        Ok((output, hidden))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::test_utils::{assert_close, fill_linear, to_vec};
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn bound_cell(
        input_size: usize,
        latent_size: usize,
        output_size: usize,
    ) -> GruRnn<TestBackend> {
        let device = Default::default();
        let mut cell = GruRnnConfig::new(latent_size).init::<TestBackend>();
        cell.init(input_size, output_size, &device);
        cell
    }

    #[test]
    fn test_gru_unbound_step_fails() {
        let device = Default::default();
        let cell = GruRnnConfig::new(8).init::<TestBackend>();

        let input = Tensor::<TestBackend, 2>::zeros([2, 3], &device);
        let hidden = Tensor::<TestBackend, 2>::zeros([2, 8], &device);

        let err = cell.step(input, hidden).unwrap_err();
        assert!(matches!(err, TaskRnnError::UnboundCell { model: "GRU" }));
    }

    #[test]
    fn test_gru_forward_shapes() {
        let device = Default::default();
        let cell = bound_cell(3, 16, 2);

        for batch_size in [1, 4, 32] {
            let input = Tensor::<TestBackend, 2>::zeros([batch_size, 3], &device);
            let hidden = Tensor::<TestBackend, 2>::zeros([batch_size, 16], &device);

            let (output, hidden) = cell.step(input, hidden).unwrap();
            assert_eq!(output.dims(), [batch_size, 2]);
            assert_eq!(hidden.dims(), [batch_size, 16]);
        }
    }

    #[test]
    fn test_gru_zero_weights_halve_state() {
        // With all weights and biases at zero: r = z = 0.5, n = 0, so h' = h / 2
        let device = Default::default();
        let mut cell = bound_cell(3, 4, 2);
        {
            let weights = cell.weights.as_mut().unwrap();
            fill_linear(&mut weights.gates.input_map, 0.0);
            fill_linear(&mut weights.gates.recurrent_map, 0.0);
        }

        let input = Tensor::<TestBackend, 2>::ones([1, 3], &device);
        let hidden = Tensor::<TestBackend, 2>::from_floats([[1.0, -2.0, 0.5, 4.0]], &device);

        let (_, next) = cell.step(input, hidden).unwrap();
        assert_close(&to_vec(next), &[0.5, -1.0, 0.25, 2.0], 1e-6);
    }

    #[test]
    fn test_gru_readout_uses_new_state() {
        let device = Default::default();
        let cell = bound_cell(3, 8, 2);

        let input =
            Tensor::<TestBackend, 2>::random([2, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let hidden =
            Tensor::<TestBackend, 2>::random([2, 8], Distribution::Uniform(-1.0, 1.0), &device);

        let (output, next) = cell.step(input, hidden).unwrap();
        let expected = cell.weights.as_ref().unwrap().readout.forward(next);

        assert_close(&to_vec(output), &to_vec(expected), 1e-6);
    }

    #[test]
    fn test_gru_step_is_deterministic() {
        let device = Default::default();
        let cell = bound_cell(3, 8, 2);

        let input =
            Tensor::<TestBackend, 2>::random([4, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let hidden =
            Tensor::<TestBackend, 2>::random([4, 8], Distribution::Uniform(-1.0, 1.0), &device);

        let (out1, h1) = cell.step(input.clone(), hidden.clone()).unwrap();
        let (out2, h2) = cell.step(input, hidden).unwrap();

        assert_eq!(to_vec(out1), to_vec(out2));
        assert_eq!(to_vec(h1), to_vec(h2));
    }

    #[test]
    fn test_gru_state_stays_bounded() {
        let device = Default::default();
        let cell = bound_cell(3, 8, 2);

        let mut hidden = Tensor::<TestBackend, 2>::zeros([1, 8], &device);
        for _ in 0..20 {
            let input = Tensor::<TestBackend, 2>::random(
                [1, 3],
                Distribution::Uniform(-5.0, 5.0),
                &device,
            );
            (_, hidden) = cell.step(input, hidden).unwrap();
        }

        let max = hidden.abs().max().into_scalar();
        assert!(max <= 1.0, "GRU state is a convex mix of tanh values, got {max}");
    }

    #[test]
    fn test_gru_rebind_recreates_weights() {
        let device = Default::default();
        let mut cell = bound_cell(3, 8, 2);
        cell.init(5, 1, &device);

        assert_eq!(
            cell.binding(),
            Binding::Bound {
                input_size: 5,
                output_size: 1
            }
        );

        let input = Tensor::<TestBackend, 2>::zeros([2, 5], &device);
        let hidden = Tensor::<TestBackend, 2>::zeros([2, 8], &device);
        let (output, _) = cell.step(input, hidden).unwrap();
        assert_eq!(output.dims(), [2, 1]);
    }
}
