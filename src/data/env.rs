//! Task environment collaborator interface.

use ndarray::{Array3, Axis};

use crate::error::{TaskRnnError, TaskRnnResult};

/// Simulated trajectories, each array shaped `[n_samples, n_timesteps, dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTrajectories {
    /// Target trajectories
    pub outputs: Array3<f32>,
    /// Driving input trajectories
    pub inputs: Array3<f32>,
    /// Combined trajectories
    pub combined: Array3<f32>,
}

impl TaskTrajectories {
    pub fn new(outputs: Array3<f32>, inputs: Array3<f32>, combined: Array3<f32>) -> Self {
        Self {
            outputs,
            inputs,
            combined,
        }
    }

    /// Number of samples along the first axis of `outputs`
    pub fn n_samples(&self) -> usize {
        self.outputs.len_of(Axis(0))
    }

    /// Check that every collection holds `n_samples` rows of `n_timesteps` steps.
    pub(crate) fn validate(&self, n_samples: usize, n_timesteps: usize) -> TaskRnnResult<()> {
        for (field, array) in [
            ("outputs", &self.outputs),
            ("inputs", &self.inputs),
            ("combined", &self.combined),
        ] {
            let rows = array.len_of(Axis(0));
            if rows != n_samples {
                return Err(TaskRnnError::generation(format!(
                    "{field} holds {rows} samples, expected {n_samples}"
                )));
            }
            let steps = array.len_of(Axis(1));
            if steps != n_timesteps {
                return Err(TaskRnnError::generation(format!(
                    "{field} holds {steps} timesteps, expected {n_timesteps}"
                )));
            }
        }
        Ok(())
    }
}

/// A behavioral task simulator that can synthesize a dataset.
///
/// Implementations live outside this crate; the dataset builder only relies on
/// the identity and shape information below.
pub trait TaskEnvironment {
    /// Identity used as the prefix of the dataset name
    fn dataset_name(&self) -> &str;

    /// Number of timesteps per simulated trajectory
    fn n_timesteps(&self) -> usize;

    /// Names of the input channels, in column order
    fn input_labels(&self) -> &[String];

    /// Names of the output channels, in column order
    fn output_labels(&self) -> &[String];

    /// Simulate `n_samples` trajectories.
    fn generate_dataset(&mut self, n_samples: usize) -> TaskRnnResult<TaskTrajectories>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectories(samples: usize, steps: usize) -> TaskTrajectories {
        TaskTrajectories::new(
            Array3::zeros((samples, steps, 2)),
            Array3::zeros((samples, steps, 3)),
            Array3::zeros((samples, steps, 5)),
        )
    }

    #[test]
    fn test_validate_accepts_consistent_shapes() {
        let trajectories = trajectories(10, 4);
        assert_eq!(trajectories.n_samples(), 10);
        assert!(trajectories.validate(10, 4).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_sample_count() {
        let mut trajectories = trajectories(10, 4);
        trajectories.inputs = Array3::zeros((9, 4, 3));

        let err = trajectories.validate(10, 4).unwrap_err();
        assert!(matches!(err, TaskRnnError::Generation(_)));
    }

    #[test]
    fn test_validate_rejects_wrong_timesteps() {
        let trajectories = trajectories(10, 4);
        assert!(trajectories.validate(10, 5).is_err());
    }
}
