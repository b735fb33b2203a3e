//! Two-stage train/valid/test holdout.
//!
//! Stage one holds out 20% of all sample indices as `test`; stage two holds
//! out 20% of the remainder as `valid`, leaving 64% for `train`. Both stages
//! use the same seed. Held-out sizes are `ceil(0.2 * n)`.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{TaskRnnError, TaskRnnResult};

/// Fraction held out at each stage
pub const HOLDOUT_FRACTION: f64 = 0.2;

/// Sample indices of each partition, in split order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    pub fn total(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }
}

/// Number of items held out from `n` at `fraction`.
pub fn holdout_size(n: usize, fraction: f64) -> usize {
    (fraction * n as f64).ceil() as usize
}

/// Split `indices` into `(kept, held_out)` using a seeded permutation.
///
/// # Errors
/// [`TaskRnnError::InvalidConfig`] when either side would be empty.
pub fn holdout_split(
    indices: &[usize],
    fraction: f64,
    seed: u64,
) -> TaskRnnResult<(Vec<usize>, Vec<usize>)> {
    let n = indices.len();
    let n_held = holdout_size(n, fraction);
    if n_held == 0 || n_held >= n {
        return Err(TaskRnnError::invalid_config(format!(
            "cannot hold out {fraction} of {n} samples without leaving a partition empty"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let held = order[..n_held].iter().map(|&i| indices[i]).collect();
    let kept = order[n_held..].iter().map(|&i| indices[i]).collect();
    Ok((kept, held))
}

/// Split `0..n_samples` into train/valid/test with the two-stage cascade.
pub fn two_stage_split(n_samples: usize, seed: u64) -> TaskRnnResult<SplitIndices> {
    let indices: Vec<usize> = (0..n_samples).collect();
    let (remaining, test) = holdout_split(&indices, HOLDOUT_FRACTION, seed)?;
    let (train, valid) = holdout_split(&remaining, HOLDOUT_FRACTION, seed)?;

    Ok(SplitIndices { train, valid, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_split_sizes_for_hundred_samples() {
        let split = two_stage_split(100, 0).unwrap();
        assert_eq!(split.train.len(), 64);
        assert_eq!(split.valid.len(), 16);
        assert_eq!(split.test.len(), 20);
    }

    #[test]
    fn test_split_is_disjoint_and_exhaustive() {
        for n in [3, 5, 10, 17, 64, 100, 257, 2000] {
            for seed in [0, 1, 42] {
                let split = two_stage_split(n, seed).unwrap();
                let mut seen = HashSet::new();
                for &i in split.train.iter().chain(&split.valid).chain(&split.test) {
                    assert!(i < n);
                    assert!(seen.insert(i), "index {i} appears twice (n={n}, seed={seed})");
                }
                assert_eq!(seen.len(), n);
            }
        }
    }

    #[test]
    fn test_split_sizes_follow_cascade() {
        for n in [3, 7, 12, 13, 99, 1001] {
            let split = two_stage_split(n, 3).unwrap();
            let n_test = holdout_size(n, HOLDOUT_FRACTION);
            let n_valid = holdout_size(n - n_test, HOLDOUT_FRACTION);

            assert_eq!(split.test.len(), n_test);
            assert_eq!(split.valid.len(), n_valid);
            assert_eq!(split.train.len(), n - n_test - n_valid);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = two_stage_split(500, 7).unwrap();
        let b = two_stage_split(500, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_changes_membership() {
        let a = two_stage_split(500, 7).unwrap();
        let b = two_stage_split(500, 8).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn test_too_few_samples() {
        assert!(two_stage_split(0, 0).is_err());
        assert!(two_stage_split(1, 0).is_err());
        assert!(two_stage_split(2, 0).is_err());
        assert!(two_stage_split(3, 0).is_ok());
    }

    #[test]
    fn test_holdout_size_rounds_up() {
        assert_eq!(holdout_size(100, 0.2), 20);
        assert_eq!(holdout_size(80, 0.2), 16);
        assert_eq!(holdout_size(12, 0.2), 3);
        assert_eq!(holdout_size(0, 0.2), 0);
    }
}
