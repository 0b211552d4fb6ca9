//! Single-timestep cell updates
//!
//! Gate layouts follow the fused weight rows:
//! - LSTM: `[i, f, g, o]`
//!   - c' = σ(f) * c + σ(i) * tanh(g)
//!   - h' = σ(o) * tanh(c')
//! - GRU: `[r, z, n]`
//!   - n = tanh(W_in x + b_in + σ(r) * (W_hn h + b_hn))
//!   - h' = (1 - z) * n + z * h

use super::KernelArgs;
use crate::error::{RnnError, RnnResult};
use crate::mode::{Kernel, Nonlinearity};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Weights of one (layer, direction) cell
#[derive(Debug, Clone)]
pub(crate) struct CellWeights<B: Backend> {
    w_ih: Tensor<B, 2>,
    w_hh: Tensor<B, 2>,
    b_ih: Option<Tensor<B, 1>>,
    b_hh: Option<Tensor<B, 1>>,
}

impl<B: Backend> CellWeights<B> {
    /// Pull the cell weights of `(layer, direction)` out of the flat list
    pub fn gather(args: &KernelArgs<'_, B>, layer: usize, direction: usize) -> RnnResult<Self> {
        let offset = args.layout.group_offset(layer, direction);
        let w_ih = matrix_at(args, offset)?;
        let w_hh = matrix_at(args, offset + 1)?;
        let (b_ih, b_hh) = if args.has_biases {
            (
                Some(vector_at(args, offset + 2)?),
                Some(vector_at(args, offset + 3)?),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            w_ih,
            w_hh,
            b_ih,
            b_hh,
        })
    }

    fn input_projection(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        linear(input, &self.w_ih, self.b_ih.as_ref())
    }

    fn hidden_projection(&self, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        linear(hidden, &self.w_hh, self.b_hh.as_ref())
    }

    /// Advance `state` by one timestep of `input`
    pub fn step(&self, kernel: Kernel, input: Tensor<B, 2>, state: CellState<B>) -> CellState<B> {
        let gi = self.input_projection(input);
        let gh = self.hidden_projection(state.h.clone());

        match kernel {
            Kernel::Rnn(nonlinearity) => {
                let pre = gi + gh;
                let h = match nonlinearity {
                    Nonlinearity::Tanh => pre.tanh(),
                    Nonlinearity::Relu => activation::relu(pre),
                };
                CellState { h, c: None }
            }
            Kernel::Lstm => {
                let gates = (gi + gh).chunk(4, 1);
                let input_gate = activation::sigmoid(gates[0].clone());
                let forget_gate = activation::sigmoid(gates[1].clone());
                let cell_gate = gates[2].clone().tanh();
                let output_gate = activation::sigmoid(gates[3].clone());

                let c = state
                    .c
                    .unwrap_or_else(|| Tensor::zeros(state.h.dims(), &state.h.device()));
                let c = forget_gate * c + input_gate * cell_gate;
                let h = output_gate * c.clone().tanh();
                CellState { h, c: Some(c) }
            }
            Kernel::Gru => {
                let i = gi.chunk(3, 1);
                let h = gh.chunk(3, 1);
                let reset = activation::sigmoid(i[0].clone() + h[0].clone());
                let update = activation::sigmoid(i[1].clone() + h[1].clone());
                let new = (i[2].clone() + reset * h[2].clone()).tanh();

                // (1 - z) * n + z * h
                let h = new.clone() + update * (state.h - new);
                CellState { h, c: None }
            }
        }
    }
}

fn linear<B: Backend>(
    input: Tensor<B, 2>,
    weight: &Tensor<B, 2>,
    bias: Option<&Tensor<B, 1>>,
) -> Tensor<B, 2> {
    let output = input.matmul(weight.clone().transpose());
    match bias {
        Some(bias) => output + bias.clone().unsqueeze::<2>(),
        None => output,
    }
}

fn missing<B: Backend>(args: &KernelArgs<'_, B>, index: usize) -> RnnError {
    let name = args
        .layout
        .slots()
        .get(index)
        .map(|slot| slot.name.clone())
        .unwrap_or_else(|| format!("flat weight {index}"));
    RnnError::MissingParameter(name)
}

fn matrix_at<B: Backend>(args: &KernelArgs<'_, B>, index: usize) -> RnnResult<Tensor<B, 2>> {
    args.weights
        .get(index)
        .and_then(Option::as_ref)
        .and_then(|w| w.tensor.matrix())
        .cloned()
        .ok_or_else(|| missing(args, index))
}

fn vector_at<B: Backend>(args: &KernelArgs<'_, B>, index: usize) -> RnnResult<Tensor<B, 1>> {
    args.weights
        .get(index)
        .and_then(Option::as_ref)
        .and_then(|w| w.tensor.vector())
        .cloned()
        .ok_or_else(|| missing(args, index))
}

/// Per-sample recurrent state of one cell: `[batch, hidden_size]`
#[derive(Debug, Clone)]
pub(crate) struct CellState<B: Backend> {
    pub h: Tensor<B, 2>,
    pub c: Option<Tensor<B, 2>>,
}

impl<B: Backend> CellState<B> {
    /// State of the first `active` rows
    pub fn head(&self, active: usize) -> Self {
        if active == self.h.dims()[0] {
            return self.clone();
        }
        Self {
            h: self.h.clone().narrow(0, 0, active),
            c: self.c.as_ref().map(|c| c.clone().narrow(0, 0, active)),
        }
    }

    /// Replace the first rows with `update`, keeping the rest
    pub fn merge(self, update: Self) -> Self {
        let batch = self.h.dims()[0];
        let active = update.h.dims()[0];
        if active == batch {
            return update;
        }
        let keep = |old: Tensor<B, 2>, new: Tensor<B, 2>| {
            Tensor::cat(vec![new, old.narrow(0, active, batch - active)], 0)
        };
        Self {
            h: keep(self.h, update.h),
            c: match (self.c, update.c) {
                (Some(old), Some(new)) => Some(keep(old, new)),
                (_, new) => new,
            },
        }
    }
}
