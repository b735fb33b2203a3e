//! GRU cell with Gaussian noise injected into the carried hidden state.
//!
//! The output is read from the gated state *before* the noise is added, so the
//! readout never sees the perturbation meant for the next step.

use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::gru::GruWeights;
use super::{add_noise, check_step_shapes, Binding, RecurrentCell};
use crate::error::{TaskRnnError, TaskRnnResult};

/// Configuration for [`NoisyGruRnn`]
#[derive(Config, Debug)]
pub struct NoisyGruRnnConfig {
    /// Hidden state width
    pub latent_size: usize,
    /// Standard deviation of the state noise
    #[config(default = 0.05)]
    pub noise_level: f64,
}

impl NoisyGruRnnConfig {
    /// Create an unbound noisy GRU cell
    pub fn init<B: Backend>(&self) -> NoisyGruRnn<B> {
        NoisyGruRnn {
            latent_size: self.latent_size,
            noise_level: self.noise_level,
            weights: None,
        }
    }
}

/// Noisy GRU
///
/// - h_g = GRU(x, h)
/// - y = W_o h_g + b_o
/// - h' = h_g + ε, ε ~ N(0, noise_level²)
#[derive(Module, Debug)]
pub struct NoisyGruRnn<B: Backend> {
    #[module(skip)]
    latent_size: usize,
    #[module(skip)]
    noise_level: f64,
    pub(crate) weights: Option<GruWeights<B>>,
}

impl<B: Backend> NoisyGruRnn<B> {
    const NAME: &'static str = "NoisyGRU";

    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }
}

impl<B: Backend> RecurrentCell<B> for NoisyGruRnn<B> {
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

        let gated = weights.gates.forward(input, hidden);
        let output = weights.readout.forward(gated.clone());
        let hidden = add_noise(gated, self.noise_level);
        Ok((output, hidden))
    }
}
