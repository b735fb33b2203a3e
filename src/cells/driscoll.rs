//! Leaky continuous-time recurrent cell
//!
//! Euler discretisation of a leaky integrator with noise injected inside the
//! nonlinearity. Reference: Driscoll, Shenoy & Sussillo, "Flexible multitask
//! computation in recurrent networks utilizes shared dynamical motifs", 2022.
//!
//! The readout is taken from the hidden state passed *into* the step, so the
//! output at time `t` reflects the state before input `t` has acted on it.

use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::{add_noise, check_step_shapes, readout, Binding, RecurrentCell};
use crate::error::{TaskRnnError, TaskRnnResult};

/// Configuration for [`DriscollRnn`]
#[derive(Config, Debug)]
pub struct DriscollRnnConfig {
    /// Hidden state width
    pub latent_size: usize,
    /// Standard deviation of the noise added inside the nonlinearity
    #[config(default = 0.05)]
    pub noise_level: f64,
    /// Weight of the nonlinear drive in the update; `1 - gamma` weights the recurrence
    #[config(default = 0.2)]
    pub gamma: f64,
}

impl DriscollRnnConfig {
    /// Create an unbound Driscoll cell
    pub fn init<B: Backend>(&self) -> DriscollRnn<B> {
        DriscollRnn {
            latent_size: self.latent_size,
            noise_level: self.noise_level,
            gamma: self.gamma,
            weights: None,
        }
    }
}

/// Weights of a bound Driscoll cell
#[derive(Module, Debug)]
pub struct DriscollWeights<B: Backend> {
    /// Recurrent weights (no bias)
    pub(crate) rec_w: Linear<B>,
    /// Input weights (no bias)
    pub(crate) inp_w: Linear<B>,
    /// Bias inside the nonlinearity, zero-initialised
    pub(crate) bias: Param<Tensor<B, 1>>,
    pub(crate) readout: Linear<B>,
    #[module(skip)]
    pub(crate) input_size: usize,
    #[module(skip)]
    pub(crate) output_size: usize,
}

impl<B: Backend> DriscollWeights<B> {
    pub fn new(
        input_size: usize,
        latent_size: usize,
        output_size: usize,
        device: &B::Device,
    ) -> Self {
        let rec_w = LinearConfig::new(latent_size, latent_size)
            .with_bias(false)
            .init(device);
        let inp_w = LinearConfig::new(input_size, latent_size)
            .with_bias(false)
            .init(device);

        Self {
            rec_w,
            inp_w,
            bias: Param::from_tensor(Tensor::zeros([latent_size], device)),
            readout: readout(latent_size, output_size, device),
            input_size,
            output_size,
        }
    }
}

/// Driscoll leaky-integrator RNN
///
/// - r = recW h
/// - y = W_o h + b_o
/// - h' = (1 - γ) r + γ tanh(r + inpW x + bias + ε), ε ~ N(0, noise_level²)
#[derive(Module, Debug)]
pub struct DriscollRnn<B: Backend> {
    #[module(skip)]
    latent_size: usize,
    #[module(skip)]
    noise_level: f64,
    #[module(skip)]
    gamma: f64,
    pub(crate) weights: Option<DriscollWeights<B>>,
}

impl<B: Backend> DriscollRnn<B> {
    const NAME: &'static str = "Driscoll";

    pub fn noise_level(&self) -> f64 {
        self.noise_level
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl<B: Backend> RecurrentCell<B> for DriscollRnn<B> {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn latent_size(&self) -> usize {
        self.latent_size
    }

    fn binding(&self) -> Binding {
        match &self.weights {
            Some(weights) => Binding::Bound {
                input_size: weights.input_size,
                output_size: weights.output_size,
            },
            None => Binding::Unbound,
        }
    }

    fn init(&mut self, input_size: usize, output_size: usize, device: &B::Device) {
        self.weights = Some(DriscollWeights::new(
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

        // Readout from the pre-update state
        let output = weights.readout.forward(hidden.clone());

        let recurrent = weights.rec_w.forward(hidden);
        let drive = recurrent.clone()
            + weights.inp_w.forward(input)
            + weights.bias.val().unsqueeze::<2>();
        let drive = add_noise(drive, self.noise_level);

        let hidden = recurrent.mul_scalar(1.0 - self.gamma) + drive.tanh().mul_scalar(self.gamma);
        Ok((output, hidden))
    }
}
