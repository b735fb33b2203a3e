//! Batched, optionally shuffled and prefetched iteration over a partition.
//!
//! A [`TaskBatchLoader`] is restartable: every call to [`TaskBatchLoader::epoch`]
//! plans a fresh pass over the partition. With shuffling enabled each pass
//! draws a new row order; without it rows come out in stored order.
//!
//! With `num_workers > 0`, batches are assembled on worker threads. Worker `w`
//! builds batches `w, w + W, w + 2W, …` into its own bounded channel and the
//! epoch reads the channels round-robin, so the batch sequence is identical to
//! single-threaded loading.

use std::panic;
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use ndarray::{Array3, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::module::TaskPartition;
use crate::config::LoaderConfig;

/// One batch of aligned trajectories.
#[derive(Debug, Clone)]
pub struct TaskBatch<B: Backend> {
    /// Targets, `[batch, n_timesteps, output_dim]`
    pub outputs: Tensor<B, 3>,
    /// Inputs, `[batch, n_timesteps, input_dim]`
    pub inputs: Tensor<B, 3>,
    /// Combined trajectories, `[batch, n_timesteps, combined_dim]`
    pub combined: Tensor<B, 3>,
    /// Original sample indices, `[batch]`
    pub inds: Tensor<B, 1, Int>,
}

impl<B: Backend> TaskBatch<B> {
    /// Gather `rows` of `partition` onto `device`.
    pub fn from_rows(partition: &TaskPartition, rows: &[usize], device: &B::Device) -> Self {
        let inds: Vec<i64> = rows.iter().map(|&row| partition.inds[row] as i64).collect();

        Self {
            outputs: gather(&partition.outputs, rows, device),
            inputs: gather(&partition.inputs, rows, device),
            combined: gather(&partition.combined, rows, device),
            inds: Tensor::from_data(TensorData::new(inds, [rows.len()]), device),
        }
    }

    /// Number of trajectories in the batch
    pub fn len(&self) -> usize {
        self.inds.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(outputs, inputs, combined, inds)`
    pub fn into_tuple(self) -> (Tensor<B, 3>, Tensor<B, 3>, Tensor<B, 3>, Tensor<B, 1, Int>) {
        (self.outputs, self.inputs, self.combined, self.inds)
    }
}

fn gather<B: Backend>(array: &Array3<f32>, rows: &[usize], device: &B::Device) -> Tensor<B, 3> {
    let shape = [rows.len(), array.len_of(Axis(1)), array.len_of(Axis(2))];
    let data: Vec<f32> = array.select(Axis(0), rows).iter().copied().collect();
    Tensor::from_data(TensorData::new(data, shape), device)
}

/// Restartable batch loader over one partition.
pub struct TaskBatchLoader<B: Backend> {
    partition: Arc<TaskPartition>,
    config: LoaderConfig,
    shuffle: bool,
    rng: ChaCha8Rng,
    device: B::Device,
}

impl<B: Backend> TaskBatchLoader<B> {
    pub(crate) fn new(
        partition: Arc<TaskPartition>,
        config: LoaderConfig,
        shuffle: bool,
        device: &B::Device,
    ) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            partition,
            config,
            shuffle,
            rng,
            device: device.clone(),
        }
    }

    /// Number of batches per epoch
    pub fn len(&self) -> usize {
        self.partition.len().div_ceil(self.config.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.partition.len()
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    /// Start a new pass over the partition.
    pub fn epoch(&mut self) -> Epoch<B> {
        let mut order: Vec<usize> = (0..self.partition.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        let plan: Vec<Vec<usize>> = order
            .chunks(self.config.batch_size)
            .map(<[usize]>::to_vec)
            .collect();
        let total = plan.len();

        let source = if self.config.num_workers == 0 || total == 0 {
            EpochSource::Inline {
                partition: Arc::clone(&self.partition),
                plan,
                device: self.device.clone(),
            }
        } else {
            self.spawn_workers(plan)
        };

        debug!(
            batches = total,
            shuffle = self.shuffle,
            workers = self.config.num_workers,
            "starting epoch"
        );

        Epoch {
            source,
            next_batch: 0,
            total,
        }
    }

    fn spawn_workers(&self, plan: Vec<Vec<usize>>) -> EpochSource<B> {
        let num_workers = self.config.num_workers.min(plan.len());
        let mut receivers = Vec::with_capacity(num_workers);
        let mut workers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (sender, receiver) = sync_channel(self.config.prefetch_factor);
            let assigned: Vec<Vec<usize>> = plan
                .iter()
                .skip(worker_id)
                .step_by(num_workers)
                .cloned()
                .collect();
            let partition = Arc::clone(&self.partition);
            let device = self.device.clone();

            let handle = thread::spawn(move || {
                for rows in assigned {
                    let batch = TaskBatch::<B>::from_rows(&partition, &rows, &device);
                    // Receiver gone: the epoch was dropped early
                    if sender.send(batch).is_err() {
                        break;
                    }
                }
            });

            receivers.push(receiver);
            workers.push(Some(handle));
        }

        EpochSource::Prefetch { receivers, workers }
    }
}

enum EpochSource<B: Backend> {
    Inline {
        partition: Arc<TaskPartition>,
        plan: Vec<Vec<usize>>,
        device: B::Device,
    },
    Prefetch {
        receivers: Vec<Receiver<TaskBatch<B>>>,
        workers: Vec<Option<JoinHandle<()>>>,
    },
}

/// One pass over a partition, yielding [`TaskBatch`]es in plan order.
pub struct Epoch<B: Backend> {
    source: EpochSource<B>,
    next_batch: usize,
    total: usize,
}

impl<B: Backend> Iterator for Epoch<B> {
    type Item = TaskBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_batch >= self.total {
            return None;
        }
        let index = self.next_batch;
        self.next_batch += 1;

        match &mut self.source {
            EpochSource::Inline {
                partition,
                plan,
                device,
            } => Some(TaskBatch::from_rows(&**partition, &plan[index], device)),
            EpochSource::Prefetch { receivers, workers } => {
                let worker_id = index % receivers.len();
                match receivers[worker_id].recv() {
                    Ok(batch) => Some(batch),
                    Err(_) => {
                        // The worker hung up before producing its batch: surface its panic
                        if let Some(Err(payload)) = workers[worker_id].take().map(JoinHandle::join)
                        {
                            panic::resume_unwind(payload);
                        }
                        self.next_batch = self.total;
                        None
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next_batch;
        (remaining, Some(remaining))
    }
}

impl<B: Backend> ExactSizeIterator for Epoch<B> {}

impl<B: Backend> Drop for Epoch<B> {
    fn drop(&mut self) {
        if let EpochSource::Prefetch { receivers, workers } = &mut self.source {
            // Unblock workers waiting on a full channel, then wait for them
            receivers.clear();
            for handle in workers.iter_mut().filter_map(Option::take) {
                let _ = handle.join();
            }
        }
    }
}
