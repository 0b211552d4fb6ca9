//! # Recurrent Layers
//!
//! Sequence layers built on the shared [`Recurrent`] base. **These are the
//! primary APIs most users should use.**
//!
//! ## Available Layers
//!
//! | Layer | Config | Gates | Hidden state |
//! |-------|--------|-------|--------------|
//! | [`Rnn`] | [`RnnConfig`] | 1 | `h` |
//! | [`Lstm`] | [`LstmConfig`] | 4 (`i, f, g, o`) | `(h, c)` |
//! | [`Gru`] | [`GruConfig`] | 3 (`r, z, n`) | `h` |
//!
//! ## Quick Start
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use recurrent::prelude::*;
//!
//! let device = Default::default();
//! let lstm = LstmConfig::new(16, 32)
//!     .with_num_layers(2)
//!     .init::<NdArray>(&device)
//!     .unwrap();
//!
//! // [seq_len=10, batch=4, features=16]
//! let input = Tensor::<NdArray, 3>::zeros([10, 4, 16], &device);
//! let (output, (h, c)) = lstm.forward(input, None).unwrap();
//!
//! assert_eq!(output.dims(), [10, 4, 32]);
//! assert_eq!(h.dims(), [2, 4, 32]);
//! assert_eq!(c.dims(), [2, 4, 32]);
//! ```
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | Input | `[seq_len, batch, input_size]` (`[batch, seq_len, input_size]` with `batch_first`) |
//! | Output | `[seq_len, batch, num_directions * hidden_size]` |
//! | Hidden | `[num_layers * num_directions, batch, hidden_size]` |
//!
//! `batch_first` only affects input and output; hidden state is always
//! layer-major.
//!
//! ## Variable-Length Batches
//!
//! Pack the batch with [`pack_padded_sequence`](crate::packed::pack_padded_sequence)
//! and call `forward_packed`. Hidden state goes in and comes out in the
//! caller's batch order; the sort used for packing never leaks out.

mod base;
mod elman;
mod gru;
mod lstm;

pub use base::Recurrent;
pub use elman::{Rnn, RnnConfig};
pub use gru::{Gru, GruConfig};
pub use lstm::{Lstm, LstmConfig, LstmState};
