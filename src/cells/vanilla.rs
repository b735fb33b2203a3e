use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::{check_step_shapes, readout, recurrent_initializer, Binding, RecurrentCell};
use crate::error::{TaskRnnError, TaskRnnResult};

/// Nonlinearity of the vanilla recurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Nonlinearity {
    #[default]
    Tanh,
    Relu,
}

impl Nonlinearity {
    fn apply<B: Backend>(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Nonlinearity::Tanh => x.tanh(),
            Nonlinearity::Relu => activation::relu(x),
        }
    }
}

/// Weights of a bound vanilla cell
#[derive(Module, Debug)]
pub struct VanillaWeights<B: Backend> {
    pub(crate) input_map: Linear<B>,
    pub(crate) recurrent_map: Linear<B>,
    pub(crate) readout: Linear<B>,
    #[module(skip)]
    pub(crate) input_size: usize,
    #[module(skip)]
    pub(crate) output_size: usize,
}

impl<B: Backend> VanillaWeights<B> {
    pub fn new(
        input_size: usize,
        latent_size: usize,
        output_size: usize,
        device: &B::Device,
    ) -> Self {
        let input_map = LinearConfig::new(input_size, latent_size)
            .with_bias(true)
            .with_initializer(recurrent_initializer(latent_size))
            .init(device);

        let recurrent_map = LinearConfig::new(latent_size, latent_size)
            .with_bias(true)
            .with_initializer(recurrent_initializer(latent_size))
            .init(device);

        Self {
            input_map,
            recurrent_map,
            readout: readout(latent_size, output_size, device),
            input_size,
            output_size,
        }
    }
}

/// Configuration for [`VanillaRnn`]
#[derive(Config, Debug)]
pub struct VanillaRnnConfig {
    /// Hidden state width
    pub latent_size: usize,
    /// Recurrence nonlinearity
    #[config(default = "Nonlinearity::Tanh")]
    pub nonlinearity: Nonlinearity,
}

impl VanillaRnnConfig {
    /// Create an unbound vanilla cell
    pub fn init<B: Backend>(&self) -> VanillaRnn<B> {
        VanillaRnn {
            latent_size: self.latent_size,
            nonlinearity: Ignored(self.nonlinearity),
            weights: None,
        }
    }
}

/// Single-layer Elman recurrence
///
/// - h' = act(W_ih x + b_ih + W_hh h + b_hh)
/// - y = W_o h' + b_o
#[derive(Module, Debug)]
pub struct VanillaRnn<B: Backend> {
    #[module(skip)]
    latent_size: usize,
    nonlinearity: Ignored<Nonlinearity>,
    pub(crate) weights: Option<VanillaWeights<B>>,
}

impl<B: Backend> VanillaRnn<B> {
    const NAME: &'static str = "Vanilla";

    pub fn nonlinearity(&self) -> Nonlinearity {
        self.nonlinearity.0
    }
}

impl<B: Backend> RecurrentCell<B> for VanillaRnn<B> {
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
        self.weights = Some(VanillaWeights::new(
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

        let pre_activation =
            weights.input_map.forward(input) + weights.recurrent_map.forward(hidden);
        let hidden = self.nonlinearity.0.apply(pre_activation);
        let output = weights.readout.forward(hidden.clone());
        Ok((output, hidden))
    }
}
