//! Recurrent hidden state
//!
//! RNN and GRU carry a single tensor, LSTM carries `(h, c)`. Every tensor has
//! shape `[num_layers * num_directions, batch, hidden_size]`.

use crate::error::{RnnError, RnnResult};
use crate::mode::RnnMode;
use crate::shape::ShapeValidator;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// Reorder `tensor` along `dim`: position `i` receives row `permutation[i]`
pub fn apply_permutation<B: Backend>(
    tensor: Tensor<B, 3>,
    permutation: Tensor<B, 1, Int>,
    dim: usize,
) -> Tensor<B, 3> {
    tensor.select(dim, permutation)
}

/// Hidden state of a recurrent layer
#[derive(Debug, Clone)]
pub enum HiddenState<B: Backend> {
    /// RNN / GRU state
    Single(Tensor<B, 3>),
    /// LSTM `(h, c)` state
    Pair(Tensor<B, 3>, Tensor<B, 3>),
}

impl<B: Backend> HiddenState<B> {
    /// Zero state for `mode`, with both LSTM tensors sharing `shape`
    pub fn zeros(mode: RnnMode, shape: [usize; 3], device: &B::Device) -> Self {
        let zeros = Tensor::<B, 3>::zeros(shape, device);
        match mode.state_arity() {
            2 => Self::Pair(zeros.clone(), zeros),
            _ => Self::Single(zeros),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Pair(..) => 2,
        }
    }

    /// The `h` tensor
    pub fn hidden(&self) -> &Tensor<B, 3> {
        match self {
            Self::Single(h) | Self::Pair(h, _) => h,
        }
    }

    /// The LSTM cell state, if any
    pub fn cell(&self) -> Option<&Tensor<B, 3>> {
        match self {
            Self::Single(_) => None,
            Self::Pair(_, c) => Some(c),
        }
    }

    /// The single state tensor of an RNN or GRU
    pub fn into_single(self, mode: RnnMode) -> RnnResult<Tensor<B, 3>> {
        match self {
            Self::Single(h) => Ok(h),
            Self::Pair(..) => Err(RnnError::HiddenArity {
                mode: mode.as_str(),
                expected: 1,
                actual: 2,
            }),
        }
    }

    /// The `(h, c)` pair of an LSTM
    pub fn into_pair(self) -> RnnResult<(Tensor<B, 3>, Tensor<B, 3>)> {
        match self {
            Self::Pair(h, c) => Ok((h, c)),
            Self::Single(_) => Err(RnnError::HiddenArity {
                mode: RnnMode::Lstm.as_str(),
                expected: 2,
                actual: 1,
            }),
        }
    }

    /// Reindex the batch axis; identity when `permutation` is `None`
    pub fn permute(self, permutation: Option<&Tensor<B, 1, Int>>) -> Self {
        let Some(permutation) = permutation else {
            return self;
        };
        match self {
            Self::Single(h) => Self::Single(apply_permutation(h, permutation.clone(), 1)),
            Self::Pair(h, c) => Self::Pair(
                apply_permutation(h, permutation.clone(), 1),
                apply_permutation(c, permutation.clone(), 1),
            ),
        }
    }

    /// Check arity against `mode`, then every tensor against `expected`
    pub fn check(
        &self,
        mode: RnnMode,
        validator: &ShapeValidator<'_>,
        expected: [usize; 3],
    ) -> RnnResult<()> {
        if self.arity() != mode.state_arity() {
            return Err(RnnError::HiddenArity {
                mode: mode.as_str(),
                expected: mode.state_arity(),
                actual: self.arity(),
            });
        }
        match self {
            Self::Single(h) => validator.check_hidden_shape(&h.dims(), expected, "hidden"),
            Self::Pair(h, c) => {
                validator.check_hidden_shape(&h.dims(), expected, "hidden[0]")?;
                validator.check_hidden_shape(&c.dims(), expected, "hidden[1]")
            }
        }
    }
}

impl<B: Backend> From<Tensor<B, 3>> for HiddenState<B> {
    fn from(hidden: Tensor<B, 3>) -> Self {
        Self::Single(hidden)
    }
}

impl<B: Backend> From<(Tensor<B, 3>, Tensor<B, 3>)> for HiddenState<B> {
    fn from((h, c): (Tensor<B, 3>, Tensor<B, 3>)) -> Self {
        Self::Pair(h, c)
    }
}
