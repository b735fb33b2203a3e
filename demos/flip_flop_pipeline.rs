//! End-to-end pipeline on a 3-bit flip-flop task
//!
//! Generates (or reloads) a dataset under `TASK_TRAINED_DATA_HOME`, then runs
//! each cell kind over one batch. Exits with a configuration error when the
//! variable is unset.
//!
//! Run with `TASK_TRAINED_DATA_HOME=/tmp/task-data RUST_LOG=debug` to see
//! cache and loader events.

use std::error::Error;

use burn::backend::NdArray;
use ndarray::{s, Array3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use task_rnn::prelude::*;
use tracing_subscriber::EnvFilter;

type Backend = NdArray<f32>;

struct FlipFlop {
    n_bits: usize,
    n_timesteps: usize,
    switch_prob: f64,
    input_labels: Vec<String>,
    output_labels: Vec<String>,
}

impl FlipFlop {
    fn new(n_bits: usize, n_timesteps: usize, switch_prob: f64) -> Self {
        Self {
            n_bits,
            n_timesteps,
            switch_prob,
            input_labels: (0..n_bits).map(|i| format!("pulse_{i}")).collect(),
            output_labels: (0..n_bits).map(|i| format!("bit_{i}")).collect(),
        }
    }
}

impl TaskEnvironment for FlipFlop {
    fn dataset_name(&self) -> &str {
        "NBFF"
    }

    fn n_timesteps(&self) -> usize {
        self.n_timesteps
    }

    fn input_labels(&self) -> &[String] {
        &self.input_labels
    }

    fn output_labels(&self) -> &[String] {
        &self.output_labels
    }

    fn generate_dataset(&mut self, n_samples: usize) -> TaskRnnResult<TaskTrajectories> {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let shape = (n_samples, self.n_timesteps, self.n_bits);
        let mut inputs = Array3::<f32>::zeros(shape);
        let mut outputs = Array3::<f32>::zeros(shape);

        for sample in 0..n_samples {
            for bit in 0..self.n_bits {
                let mut state = 0.0;
                for t in 0..self.n_timesteps {
                    if rng.gen_bool(self.switch_prob) {
                        state = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                        inputs[[sample, t, bit]] = state;
                    }
                    outputs[[sample, t, bit]] = state;
                }
            }
        }

        let mut combined = Array3::<f32>::zeros((n_samples, self.n_timesteps, 2 * self.n_bits));
        combined.slice_mut(s![.., .., ..self.n_bits]).assign(&outputs);
        combined.slice_mut(s![.., .., self.n_bits..]).assign(&inputs);
        Ok(TaskTrajectories::new(outputs, inputs, combined))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("task_rnn=info".parse()?))
        .init();

    println!("=== Flip-Flop Pipeline ===\n");

    let config = DataConfig::from_env()?;
    println!("Data home: {}", config.data_home().display());

    let switch_prob = 0.02;
    let mut env = FlipFlop::new(3, 100, switch_prob);
    let params = DatasetParams::default()
        .with_n_samples(500)
        .with_task_param("n_bits", 3)
        .with_task_param("switch_prob", switch_prob);

    let handle = TaskDatasetBuilder::new(config).build(&mut env, &params)?;
    println!("Dataset: {} ({:?})", handle.name(), handle.status());

    let data = TaskDataModule::load(&handle, LoaderConfig::default().with_batch_size(32))?;
    println!(
        "  train/valid/test: {}/{}/{}",
        data.train().len(),
        data.valid().len(),
        data.test().len()
    );
    println!("  inputs:  {:?}", data.input_labels());
    println!("  outputs: {:?}", data.output_labels());
    println!();

    let device = Default::default();
    let mut train = data.train_batches::<Backend>(true, &device);
    let Some(batch) = train.epoch().next() else {
        println!("Train partition is empty");
        return Ok(());
    };
    println!("First train batch: {} trajectories", batch.len());
    println!("  inputs shape:  {:?}", batch.inputs.dims());
    println!("  outputs shape: {:?}", batch.outputs.dims());
    println!();

    for kind in CellKind::ALL {
        let mut cell = CellHyperparams::new(kind, 64).build::<Backend>();
        cell.init(data.input_labels().len(), data.output_labels().len(), &device);

        let trajectory = unroll(cell.as_ref(), batch.inputs.clone(), None)?;
        let mse = (trajectory.outputs - batch.outputs.clone())
            .powf_scalar(2.0)
            .mean()
            .into_scalar();

        println!("{:<10} untrained MSE: {:.4}", cell.name(), mse);
    }

    Ok(())
}
