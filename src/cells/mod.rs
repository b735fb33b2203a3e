//! # Recurrent Cell Implementations
//!
//! Single-timestep recurrent dynamics models. Each cell maps an input row and
//! the caller's hidden state to an output row and the next hidden state; the
//! hidden state is never stored inside the cell. Sequences are driven by
//! [`crate::rnn::unroll`] or by a training loop calling [`RecurrentCell::step`]
//! directly.
//!
//! ## Cell Types
//!
//! | Cell | Update | Readout from |
//! |------|--------|--------------|
//! | [`VanillaRnn`] | `h' = act(W_ih x + b_ih + W_hh h + b_hh)` | new state `h'` |
//! | [`GruRnn`] | gated recurrent unit | new state `h'` |
//! | [`NoisyGruRnn`] | GRU, then `h' = h_g + ε` | pre-noise state `h_g` |
//! | [`DriscollRnn`] | `h' = (1-γ) r + γ tanh(r + inpW x + b + ε)`, `r = recW h` | old state `h` |
//!
//! Driscoll's output lags its hidden update by one step: it is read from the
//! state passed in, not the state returned.
//!
//! ## Lifecycle
//!
//! Cells are built unbound from their hyperparameter config and only receive
//! weights once [`RecurrentCell::init`] binds the input and output sizes:
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use task_rnn::cells::{Binding, GruRnnConfig, RecurrentCell};
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! let mut cell = GruRnnConfig::new(16).init::<Backend>();
//! assert_eq!(cell.binding(), Binding::Unbound);
//!
//! cell.init(3, 2, &device);
//! let input = Tensor::<Backend, 2>::zeros([4, 3], &device);
//! let hidden = Tensor::<Backend, 2>::zeros([4, 16], &device);
//! let (output, hidden) = cell.step(input, hidden).unwrap();
//!
//! assert_eq!(output.dims(), [4, 2]);
//! assert_eq!(hidden.dims(), [4, 16]);
//! ```
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | `input` | `[batch, input_size]` |
//! | `hidden` | `[batch, latent_size]` |
//! | `output` | `[batch, output_size]` |

pub mod driscoll;
pub mod gru;
pub mod noisy_gru;
pub mod vanilla;

use std::fmt;
use std::str::FromStr;

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{TaskRnnError, TaskRnnResult};

pub use driscoll::{DriscollRnn, DriscollRnnConfig, DriscollWeights};
pub use gru::{GruGates, GruRnn, GruRnnConfig, GruWeights};
pub use noisy_gru::{NoisyGruRnn, NoisyGruRnnConfig};
pub use vanilla::{Nonlinearity, VanillaRnn, VanillaRnnConfig, VanillaWeights};

/// Whether a cell has weights for concrete input/output sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Hyperparameters only; `step` fails with [`TaskRnnError::UnboundCell`]
    Unbound,
    /// Weights exist for these sizes
    Bound {
        input_size: usize,
        output_size: usize,
    },
}

/// A discrete-time recurrent update rule plus its readout.
pub trait RecurrentCell<B: Backend> {
    /// Short model name used in errors and logs
    fn name(&self) -> &'static str;

    /// Width of the hidden state threaded through `step`
    fn latent_size(&self) -> usize;

    /// Current binding state
    fn binding(&self) -> Binding;

    /// Bind input and output sizes, creating fresh parameters.
    ///
    /// Calling this again discards the previous weights and creates new ones
    /// for the new sizes.
    fn init(&mut self, input_size: usize, output_size: usize, device: &B::Device);

    /// Advance one timestep.
    ///
    /// # Arguments
    /// * `input` - `[batch, input_size]`
    /// * `hidden` - `[batch, latent_size]`
    ///
    /// # Returns
    /// `(output [batch, output_size], next_hidden [batch, latent_size])`
    ///
    /// # Errors
    /// [`TaskRnnError::UnboundCell`] before `init`, [`TaskRnnError::ShapeMismatch`]
    /// when the input width, hidden width or batch sizes disagree.
    fn step(
        &self,
        input: Tensor<B, 2>,
        hidden: Tensor<B, 2>,
    ) -> TaskRnnResult<(Tensor<B, 2>, Tensor<B, 2>)>;

    fn is_bound(&self) -> bool {
        matches!(self.binding(), Binding::Bound { .. })
    }

    fn input_size(&self) -> Option<usize> {
        match self.binding() {
            Binding::Bound { input_size, .. } => Some(input_size),
            Binding::Unbound => None,
        }
    }

    fn output_size(&self) -> Option<usize> {
        match self.binding() {
            Binding::Bound { output_size, .. } => Some(output_size),
            Binding::Unbound => None,
        }
    }
}

/// The four cell variants, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Vanilla,
    Gru,
    NoisyGru,
    Driscoll,
}

impl CellKind {
    pub const ALL: [CellKind; 4] = [
        CellKind::Vanilla,
        CellKind::Gru,
        CellKind::NoisyGru,
        CellKind::Driscoll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Vanilla => "vanilla",
            CellKind::Gru => "gru",
            CellKind::NoisyGru => "noisy_gru",
            CellKind::Driscoll => "driscoll",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CellKind {
    type Err = TaskRnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "vanilla" | "rnn" => Ok(CellKind::Vanilla),
            "gru" => Ok(CellKind::Gru),
            "noisy_gru" | "noisygru" => Ok(CellKind::NoisyGru),
            "driscoll" => Ok(CellKind::Driscoll),
            other => Err(TaskRnnError::invalid_config(format!(
                "unknown cell kind '{other}', expected one of vanilla, gru, noisy_gru, driscoll"
            ))),
        }
    }
}

/// Hyperparameters for building any cell variant by kind.
///
/// `noise_level` only applies to NoisyGRU and Driscoll, `gamma` only to Driscoll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellHyperparams {
    pub kind: CellKind,
    pub latent_size: usize,
    pub noise_level: f64,
    pub gamma: f64,
}

impl CellHyperparams {
    pub fn new(kind: CellKind, latent_size: usize) -> Self {
        Self {
            kind,
            latent_size,
            noise_level: 0.05,
            gamma: 0.2,
        }
    }

    pub fn with_noise_level(mut self, noise_level: f64) -> Self {
        self.noise_level = noise_level;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Build an unbound cell of the configured kind.
    pub fn build<B: Backend>(&self) -> Box<dyn RecurrentCell<B>> {
        match self.kind {
            CellKind::Vanilla => Box::new(VanillaRnnConfig::new(self.latent_size).init::<B>()),
            CellKind::Gru => Box::new(GruRnnConfig::new(self.latent_size).init::<B>()),
            CellKind::NoisyGru => Box::new(
                NoisyGruRnnConfig::new(self.latent_size)
                    .with_noise_level(self.noise_level)
                    .init::<B>(),
            ),
            CellKind::Driscoll => Box::new(
                DriscollRnnConfig::new(self.latent_size)
                    .with_noise_level(self.noise_level)
                    .with_gamma(self.gamma)
                    .init::<B>(),
            ),
        }
    }
}

/// Reject inputs whose widths or batch sizes disagree with the bound sizes.
pub(crate) fn check_step_shapes<B: Backend>(
    model: &'static str,
    input: &Tensor<B, 2>,
    hidden: &Tensor<B, 2>,
    input_size: usize,
    latent_size: usize,
) -> TaskRnnResult<()> {
    let [batch, width] = input.dims();
    if width != input_size {
        return Err(TaskRnnError::shape_mismatch(
            format!("{model} input [batch, {input_size}]"),
            format!("[{batch}, {width}]"),
        ));
    }

    let [hidden_batch, hidden_width] = hidden.dims();
    if hidden_width != latent_size {
        return Err(TaskRnnError::shape_mismatch(
            format!("{model} hidden state [batch, {latent_size}]"),
            format!("[{hidden_batch}, {hidden_width}]"),
        ));
    }

    if hidden_batch != batch {
        return Err(TaskRnnError::shape_mismatch(
            format!("hidden state batch of {batch}"),
            format!("{hidden_batch}"),
        ));
    }

    Ok(())
}

/// Readout `y = W_o h + b_o` with Burn's default initialisation.
pub(crate) fn readout<B: Backend>(
    latent_size: usize,
    output_size: usize,
    device: &B::Device,
) -> Linear<B> {
    LinearConfig::new(latent_size, output_size)
        .with_bias(true)
        .init(device)
}

/// Uniform `±1/sqrt(latent_size)` initialisation used by recurrent layers.
pub(crate) fn recurrent_initializer(latent_size: usize) -> Initializer {
    let bound = 1.0 / (latent_size.max(1) as f64).sqrt();
    Initializer::Uniform {
        min: -bound,
        max: bound,
    }
}

/// Add elementwise `N(0, noise_level²)` noise; non-positive levels add nothing.
pub(crate) fn add_noise<B: Backend>(tensor: Tensor<B, 2>, noise_level: f64) -> Tensor<B, 2> {
    if noise_level > 0.0 {
        let noise = tensor.random_like(Distribution::Normal(0.0, noise_level));
        tensor + noise
    } else {
        tensor
    }
}
