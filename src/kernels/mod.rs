//! Reference recurrent kernels
//!
//! A kernel consumes the flat weight list and runs every layer and direction
//! of the configured stack over a padded or packed sequence.
//!
//! ## Call Shapes
//!
//! | Input | Sequence | Hidden | Output |
//! |-------|----------|--------|--------|
//! | Padded | `[seq, batch, input]` (or batch-first) | `[L*D, batch, hidden]` | `[seq, batch, D*hidden]` |
//! | Packed | `[total, input]` + `batch_sizes` | `[L*D, batch_sizes[0], hidden]` | `[total, D*hidden]` |
//!
//! ## Packed Input
//!
//! Step `t` only advances the first `batch_sizes[t]` rows of the state; the
//! other rows keep their value. Running forward, a finished sequence keeps
//! its last state. Running backward, a sequence starts from its initial
//! state at its own last step.

mod cell;

use crate::error::{RnnError, RnnResult};
use crate::hidden::HiddenState;
use crate::mode::Kernel;
use crate::weights::{FlatWeight, WeightLayout};
use burn::nn::{Dropout, DropoutConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use cell::{CellState, CellWeights};

/// Sequence a kernel can run over
///
/// `Output` is the form the kernel hands back, so a padded input always
/// yields a padded output and a packed input a packed one.
pub trait Sequence<B: Backend> {
    type Output;

    fn dims(&self) -> Vec<usize>;

    /// Rows advanced at each step, `None` for a padded batch
    fn batch_sizes(&self) -> Option<&[usize]>;

    fn device(&self) -> B::Device;

    /// Per-step `[rows, features]` inputs, in time order
    fn steps(&self) -> Vec<Tensor<B, 2>>;

    /// Join per-step outputs of width `features` back into this form
    fn assemble(&self, outputs: Vec<Tensor<B, 2>>, batch: usize, features: usize) -> Self::Output;
}

/// `[seq, batch, features]`, or `[batch, seq, features]` when `batch_first`
#[derive(Debug, Clone)]
pub struct PaddedInput<B: Backend> {
    pub data: Tensor<B, 3>,
    pub batch_first: bool,
}

/// `[total, features]` rows grouped by time step
#[derive(Debug, Clone)]
pub struct PackedInput<'a, B: Backend> {
    pub data: Tensor<B, 2>,
    pub batch_sizes: &'a [usize],
}

impl<B: Backend> Sequence<B> for PaddedInput<B> {
    type Output = Tensor<B, 3>;

    fn dims(&self) -> Vec<usize> {
        self.data.dims().to_vec()
    }

    fn batch_sizes(&self) -> Option<&[usize]> {
        None
    }

    fn device(&self) -> B::Device {
        self.data.device()
    }

    fn steps(&self) -> Vec<Tensor<B, 2>> {
        let data = if self.batch_first {
            self.data.clone().swap_dims(0, 1)
        } else {
            self.data.clone()
        };
        let [seq_len, batch, features] = data.dims();
        (0..seq_len)
            .map(|t| data.clone().narrow(0, t, 1).reshape([batch, features]))
            .collect()
    }

    fn assemble(&self, outputs: Vec<Tensor<B, 2>>, batch: usize, features: usize) -> Tensor<B, 3> {
        let output: Tensor<B, 3> = if outputs.is_empty() {
            Tensor::zeros([0, batch, features], &self.device())
        } else {
            Tensor::stack(outputs, 0)
        };
        if self.batch_first {
            output.swap_dims(0, 1)
        } else {
            output
        }
    }
}

impl<B: Backend> Sequence<B> for PackedInput<'_, B> {
    type Output = Tensor<B, 2>;

    fn dims(&self) -> Vec<usize> {
        self.data.dims().to_vec()
    }

    fn batch_sizes(&self) -> Option<&[usize]> {
        Some(self.batch_sizes)
    }

    fn device(&self) -> B::Device {
        self.data.device()
    }

    fn steps(&self) -> Vec<Tensor<B, 2>> {
        let mut offset = 0;
        self.batch_sizes
            .iter()
            .map(|&size| {
                let step = self.data.clone().narrow(0, offset, size);
                offset += size;
                step
            })
            .collect()
    }

    fn assemble(&self, outputs: Vec<Tensor<B, 2>>, _batch: usize, features: usize) -> Tensor<B, 2> {
        if outputs.is_empty() {
            return Tensor::zeros([0, features], &self.device());
        }
        Tensor::cat(outputs, 0)
    }
}

/// Everything besides the sequence and hidden state a kernel needs
#[derive(Debug, Clone)]
pub struct KernelArgs<'a, B: Backend> {
    /// Flat weight list, aligned with `layout`
    pub weights: &'a [Option<FlatWeight<B>>],
    pub layout: &'a WeightLayout,
    pub has_biases: bool,
    pub num_layers: usize,
    /// Dropout probability between layers
    pub dropout: f64,
    pub training: bool,
    pub bidirectional: bool,
}

impl<B: Backend> KernelArgs<'_, B> {
    fn num_directions(&self) -> usize {
        if self.bidirectional {
            2
        } else {
            1
        }
    }
}

impl Kernel {
    /// Run the full stack over `input` starting from `hidden`
    pub fn run<B: Backend, S: Sequence<B>>(
        self,
        input: S,
        hidden: HiddenState<B>,
        args: &KernelArgs<'_, B>,
    ) -> RnnResult<(S::Output, HiddenState<B>)> {
        let (h0, c0) = match (self, hidden) {
            (Kernel::Lstm, HiddenState::Pair(h, c)) => (h, Some(c)),
            (Kernel::Rnn(_) | Kernel::Gru, HiddenState::Single(h)) => (h, None),
            (kernel, hidden) => {
                return Err(RnnError::HiddenArity {
                    mode: kernel.name(),
                    expected: if kernel == Kernel::Lstm { 2 } else { 1 },
                    actual: hidden.arity(),
                })
            }
        };
        let [_, batch, hidden_size] = h0.dims();
        let steps = input.steps();

        log::trace!(
            "Running {} kernel over {} steps ({} layers, {} directions)",
            self.name(),
            steps.len(),
            args.num_layers,
            args.num_directions()
        );

        let stack = run_stack(self, steps, h0, c0, args)?;
        let output = input.assemble(stack.outputs, batch, args.num_directions() * hidden_size);

        let hidden = match stack.c_n {
            Some(c_n) => HiddenState::Pair(stack.h_n, c_n),
            None => HiddenState::Single(stack.h_n),
        };
        Ok((output, hidden))
    }

    fn name(self) -> &'static str {
        match self {
            Kernel::Rnn(_) => "RNN",
            Kernel::Lstm => "LSTM",
            Kernel::Gru => "GRU",
        }
    }
}

struct StackOutput<B: Backend> {
    /// Top layer output per step, directions concatenated
    outputs: Vec<Tensor<B, 2>>,
    h_n: Tensor<B, 3>,
    c_n: Option<Tensor<B, 3>>,
}

fn run_stack<B: Backend>(
    kernel: Kernel,
    steps: Vec<Tensor<B, 2>>,
    h0: Tensor<B, 3>,
    c0: Option<Tensor<B, 3>>,
    args: &KernelArgs<'_, B>,
) -> RnnResult<StackOutput<B>> {
    let [_, batch, hidden_size] = h0.dims();
    let directions = args.num_directions();
    let dropout: Dropout = DropoutConfig::new(args.dropout).init();

    let mut layer_input = steps;
    let mut h_n = Vec::with_capacity(args.num_layers * directions);
    let mut c_n = Vec::with_capacity(args.num_layers * directions);

    for layer in 0..args.num_layers {
        let mut per_direction = Vec::with_capacity(directions);
        for direction in 0..directions {
            let index = layer * directions + direction;
            let weights = CellWeights::gather(args, layer, direction)?;
            let state = CellState {
                h: h0.clone().narrow(0, index, 1).reshape([batch, hidden_size]),
                c: c0
                    .as_ref()
                    .map(|c| c.clone().narrow(0, index, 1).reshape([batch, hidden_size])),
            };

            let (outputs, state) =
                run_direction(kernel, &weights, &layer_input, state, direction == 1);
            h_n.push(state.h);
            if let Some(c) = state.c {
                c_n.push(c);
            }
            per_direction.push(outputs);
        }

        let mut outputs = concat_directions(per_direction);
        if args.training && args.dropout > 0.0 && layer + 1 < args.num_layers {
            outputs = outputs
                .into_iter()
                .map(|x| {
                    // Dropout rescales by 1 / (1 - p), undefined at p = 1
                    if args.dropout >= 1.0 {
                        x.zeros_like()
                    } else {
                        dropout.forward(x)
                    }
                })
                .collect();
        }
        layer_input = outputs;
    }

    Ok(StackOutput {
        outputs: layer_input,
        h_n: Tensor::stack(h_n, 0),
        c_n: (!c_n.is_empty()).then(|| Tensor::stack(c_n, 0)),
    })
}

/// Run one direction of one layer over every step
fn run_direction<B: Backend>(
    kernel: Kernel,
    weights: &CellWeights<B>,
    steps: &[Tensor<B, 2>],
    mut state: CellState<B>,
    reverse: bool,
) -> (Vec<Tensor<B, 2>>, CellState<B>) {
    let order: Vec<usize> = if reverse {
        (0..steps.len()).rev().collect()
    } else {
        (0..steps.len()).collect()
    };

    let mut outputs: Vec<Option<Tensor<B, 2>>> = vec![None; steps.len()];
    for t in order {
        let input = steps[t].clone();
        let active = input.dims()[0];
        let next = weights.step(kernel, input, state.head(active));
        outputs[t] = Some(next.h.clone());
        state = state.merge(next);
    }

    (outputs.into_iter().flatten().collect(), state)
}

fn concat_directions<B: Backend>(mut per_direction: Vec<Vec<Tensor<B, 2>>>) -> Vec<Tensor<B, 2>> {
    if per_direction.len() == 1 {
        return per_direction.remove(0);
    }
    let backward = per_direction.pop().unwrap_or_default();
    let forward = per_direction.pop().unwrap_or_default();
    forward
        .into_iter()
        .zip(backward)
        .map(|(f, b)| Tensor::cat(vec![f, b], 1))
        .collect()
}
