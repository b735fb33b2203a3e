//! Shared fixtures for integration tests.

#![allow(dead_code)]

use ndarray::{s, Array3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use task_rnn::data::{TaskEnvironment, TaskTrajectories};
use task_rnn::error::TaskRnnResult;

/// N-bit flip-flop: each input channel emits sparse ±1 pulses and the matching
/// output channel holds the sign of the last pulse.
pub struct FlipFlopEnv {
    n_bits: usize,
    n_timesteps: usize,
    switch_prob: f64,
    seed: u64,
    input_labels: Vec<String>,
    output_labels: Vec<String>,
    pub generate_calls: usize,
}

impl FlipFlopEnv {
    pub fn new(n_bits: usize, n_timesteps: usize) -> Self {
        Self {
            n_bits,
            n_timesteps,
            switch_prob: 0.05,
            seed: 11,
            input_labels: (0..n_bits).map(|i| format!("pulse_{i}")).collect(),
            output_labels: (0..n_bits).map(|i| format!("bit_{i}")).collect(),
            generate_calls: 0,
        }
    }

    pub fn n_bits(&self) -> usize {
        self.n_bits
    }
}

impl TaskEnvironment for FlipFlopEnv {
    fn dataset_name(&self) -> &str {
        "FlipFlop"
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
        self.generate_calls += 1;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let shape = (n_samples, self.n_timesteps, self.n_bits);
        let mut inputs = Array3::<f32>::zeros(shape);
        let mut outputs = Array3::<f32>::zeros(shape);
        for sample in 0..n_samples {
            for bit in 0..self.n_bits {
                let mut state = 0.0;
                for t in 0..self.n_timesteps {
                    if rng.gen_bool(self.switch_prob) {
                        let pulse = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                        inputs[[sample, t, bit]] = pulse;
                        state = pulse;
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

/// Environment returning trajectories one sample short.
pub struct ShortEnv {
    labels: Vec<String>,
}

impl ShortEnv {
    pub fn new() -> Self {
        Self {
            labels: vec!["x".to_string()],
        }
    }
}

impl TaskEnvironment for ShortEnv {
    fn dataset_name(&self) -> &str {
        "Short"
    }

    fn n_timesteps(&self) -> usize {
        5
    }

    fn input_labels(&self) -> &[String] {
        &self.labels
    }

    fn output_labels(&self) -> &[String] {
        &self.labels
    }

    fn generate_dataset(&mut self, n_samples: usize) -> TaskRnnResult<TaskTrajectories> {
        let rows = n_samples.saturating_sub(1);
        let array = Array3::<f32>::zeros((rows, 5, 1));
        Ok(TaskTrajectories::new(array.clone(), array.clone(), array))
    }
}
