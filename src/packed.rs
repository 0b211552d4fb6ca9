//! Packed variable-length sequences
//!
//! A packed batch stores its sequences sorted by decreasing length and
//! compacted time step by time step: step `t` contributes `batch_sizes[t]`
//! rows to `data`. `sorted_indices[i]` is the original batch position of
//! sorted row `i`; `unsorted_indices` is its inverse.
//!
//! ```text
//! lengths [2, 3, 1]  ->  sorted order [1, 0, 2]
//! batch_sizes [3, 2, 1], data rows: t0: b1 b0 b2 | t1: b1 b0 | t2: b1
//! ```

use crate::error::{RnnError, RnnResult};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use std::cmp::Reverse;

/// A batch of variable-length sequences packed by time step
#[derive(Debug, Clone)]
pub struct PackedSequence<B: Backend> {
    data: Tensor<B, 2>,
    batch_sizes: Vec<usize>,
    sorted_indices: Option<Tensor<B, 1, Int>>,
    unsorted_indices: Option<Tensor<B, 1, Int>>,
}

impl<B: Backend> PackedSequence<B> {
    /// Pack `data` (`[total, features]`) with the given per-step batch sizes
    ///
    /// `unsorted_indices` is derived from `sorted_indices`. `None` means the
    /// batch is already in its original order.
    pub fn new(
        data: Tensor<B, 2>,
        batch_sizes: Vec<usize>,
        sorted_indices: Option<Tensor<B, 1, Int>>,
    ) -> RnnResult<Self> {
        let unsorted_indices = sorted_indices.as_ref().map(invert_permutation).transpose()?;
        Self::from_parts(data, batch_sizes, sorted_indices, unsorted_indices)
    }

    /// Assemble a packed sequence from all four parts
    pub fn from_parts(
        data: Tensor<B, 2>,
        batch_sizes: Vec<usize>,
        sorted_indices: Option<Tensor<B, 1, Int>>,
        unsorted_indices: Option<Tensor<B, 1, Int>>,
    ) -> RnnResult<Self> {
        validate_batch_sizes(&batch_sizes, data.dims()[0])?;
        for indices in [&sorted_indices, &unsorted_indices].into_iter().flatten() {
            if indices.dims()[0] != batch_sizes[0] {
                return Err(RnnError::PackedSequence(format!(
                    "expected {} indices, got {}",
                    batch_sizes[0],
                    indices.dims()[0]
                )));
            }
            invert_permutation(indices)?;
        }
        if sorted_indices.is_some() != unsorted_indices.is_some() {
            return Err(RnnError::PackedSequence(
                "sorted_indices and unsorted_indices must be given together".to_string(),
            ));
        }

        Ok(Self {
            data,
            batch_sizes,
            sorted_indices,
            unsorted_indices,
        })
    }

    /// Same batch structure around new data
    pub(crate) fn with_data(&self, data: Tensor<B, 2>) -> Self {
        Self {
            data,
            batch_sizes: self.batch_sizes.clone(),
            sorted_indices: self.sorted_indices.clone(),
            unsorted_indices: self.unsorted_indices.clone(),
        }
    }

    pub fn data(&self) -> &Tensor<B, 2> {
        &self.data
    }

    pub fn into_data(self) -> Tensor<B, 2> {
        self.data
    }

    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    pub fn sorted_indices(&self) -> Option<&Tensor<B, 1, Int>> {
        self.sorted_indices.as_ref()
    }

    pub fn unsorted_indices(&self) -> Option<&Tensor<B, 1, Int>> {
        self.unsorted_indices.as_ref()
    }

    /// Batch size of the first (largest) time step
    pub fn max_batch_size(&self) -> usize {
        self.batch_sizes[0]
    }
}

fn validate_batch_sizes(batch_sizes: &[usize], rows: usize) -> RnnResult<()> {
    let Some(&first) = batch_sizes.first() else {
        return Err(RnnError::PackedSequence(
            "batch_sizes must not be empty".to_string(),
        ));
    };
    if first == 0 {
        return Err(RnnError::PackedSequence(
            "batch_sizes must be positive".to_string(),
        ));
    }
    if batch_sizes.windows(2).any(|w| w[1] > w[0] || w[1] == 0) {
        return Err(RnnError::PackedSequence(format!(
            "batch_sizes must be positive and non-increasing, got {batch_sizes:?}"
        )));
    }
    let total: usize = batch_sizes.iter().sum();
    if total != rows {
        return Err(RnnError::PackedSequence(format!(
            "batch_sizes sum to {total} but data has {rows} rows"
        )));
    }
    Ok(())
}

/// Read an index tensor back as positions
pub fn index_values<B: Backend>(indices: &Tensor<B, 1, Int>) -> RnnResult<Vec<usize>> {
    indices
        .to_data()
        .iter::<i64>()
        .map(|i| {
            usize::try_from(i)
                .map_err(|_| RnnError::PackedSequence(format!("negative index {i}")))
        })
        .collect()
}

/// Index tensor holding `values`
pub fn index_tensor<B: Backend>(values: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = values.iter().map(|&i| i as i64).collect();
    Tensor::from_data(TensorData::new(data, [values.len()]), device)
}

/// Inverse of a permutation: `inverse[permutation[i]] = i`
pub fn invert_permutation<B: Backend>(
    permutation: &Tensor<B, 1, Int>,
) -> RnnResult<Tensor<B, 1, Int>> {
    let values = index_values(permutation)?;
    let mut inverse = vec![usize::MAX; values.len()];
    for (i, &p) in values.iter().enumerate() {
        if p >= values.len() || inverse[p] != usize::MAX {
            return Err(RnnError::PackedSequence(format!(
                "{values:?} is not a permutation"
            )));
        }
        inverse[p] = i;
    }
    Ok(index_tensor(&inverse, &permutation.device()))
}

/// Pack a padded batch of sequences
///
/// `input` is `[seq, batch, features]`, or `[batch, seq, features]` when
/// `batch_first`. With `enforce_sorted`, `lengths` must already be
/// non-increasing and no sort permutation is recorded.
pub fn pack_padded_sequence<B: Backend>(
    input: Tensor<B, 3>,
    lengths: &[usize],
    batch_first: bool,
    enforce_sorted: bool,
) -> RnnResult<PackedSequence<B>> {
    let input = if batch_first {
        input.swap_dims(0, 1)
    } else {
        input
    };
    let [seq_len, batch, features] = input.dims();

    if lengths.len() != batch {
        return Err(RnnError::PackedSequence(format!(
            "expected {batch} lengths, got {}",
            lengths.len()
        )));
    }
    if let Some(&bad) = lengths.iter().find(|&&l| l == 0 || l > seq_len) {
        return Err(RnnError::PackedSequence(format!(
            "lengths must be in 1..={seq_len}, got {bad}"
        )));
    }

    let (input, sorted_lengths, sorted_indices) = if enforce_sorted {
        if lengths.windows(2).any(|w| w[1] > w[0]) {
            return Err(RnnError::PackedSequence(format!(
                "lengths must be sorted in decreasing order, got {lengths:?}"
            )));
        }
        (input, lengths.to_vec(), None)
    } else {
        let mut order: Vec<usize> = (0..batch).collect();
        order.sort_by_key(|&i| Reverse(lengths[i]));
        let sorted_lengths = order.iter().map(|&i| lengths[i]).collect();
        let indices = index_tensor::<B>(&order, &input.device());
        (input.select(1, indices.clone()), sorted_lengths, Some(indices))
    };

    let max_len = sorted_lengths[0];
    let batch_sizes: Vec<usize> = (0..max_len)
        .map(|t| sorted_lengths.iter().filter(|&&l| l > t).count())
        .collect();

    let steps: Vec<Tensor<B, 2>> = batch_sizes
        .iter()
        .enumerate()
        .map(|(t, &bs)| {
            input
                .clone()
                .narrow(0, t, 1)
                .reshape([batch, features])
                .narrow(0, 0, bs)
        })
        .collect();

    PackedSequence::new(Tensor::cat(steps, 0), batch_sizes, sorted_indices)
}

/// Inverse of [`pack_padded_sequence`]
///
/// Returns the zero-padded batch in original order together with the
/// length of every sequence.
pub fn pad_packed_sequence<B: Backend>(
    sequence: &PackedSequence<B>,
    batch_first: bool,
) -> RnnResult<(Tensor<B, 3>, Vec<usize>)> {
    let data = sequence.data();
    let [_, features] = data.dims();
    let device = data.device();
    let max_batch = sequence.max_batch_size();

    let mut offset = 0;
    let mut steps = Vec::with_capacity(sequence.batch_sizes().len());
    for &bs in sequence.batch_sizes() {
        let step = data.clone().narrow(0, offset, bs);
        offset += bs;
        steps.push(if bs < max_batch {
            Tensor::cat(
                vec![step, Tensor::zeros([max_batch - bs, features], &device)],
                0,
            )
        } else {
            step
        });
    }
    let mut padded: Tensor<B, 3> = Tensor::stack(steps, 0);

    let sorted_lengths: Vec<usize> = (0..max_batch)
        .map(|i| sequence.batch_sizes().iter().filter(|&&bs| bs > i).count())
        .collect();
    let lengths = match sequence.unsorted_indices() {
        Some(unsorted) => {
            padded = padded.select(1, unsorted.clone());
            index_values(unsorted)?
                .into_iter()
                .map(|i| sorted_lengths[i])
                .collect()
        }
        None => sorted_lengths,
    };

    if batch_first {
        padded = padded.swap_dims(0, 1);
    }
    Ok((padded, lengths))
}
