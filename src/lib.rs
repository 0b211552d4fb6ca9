//! # Recurrent - RNN, LSTM and GRU layers for Burn
//!
//! Multi-layer, optionally bidirectional recurrent layers with
//! packed-sequence support, built on the Burn framework.
//!
//! ## Features
//!
//! - **Three variants**: Elman RNN (tanh or ReLU), LSTM and GRU behind one shared base
//! - **Stacked and bidirectional**: any number of layers, with dropout between them while training
//! - **Packed sequences**: variable-length batches with the sort order restored on the way out
//! - **Named weights**: `weight_ih_l0`, `bias_hh_l1_reverse`, ... grouped per layer and direction
//! - **Fused-kernel hook**: weights can be handed to a device driver for contiguous flattening
//!
//! ## Quick Start
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use recurrent::prelude::*;
//!
//! let device = Default::default();
//! let gru = GruConfig::new(8, 16)
//!     .with_bidirectional(true)
//!     .init::<NdArray>(&device)
//!     .unwrap();
//!
//! let input = Tensor::<NdArray, 3>::zeros([5, 2, 8], &device);
//! let (output, h_n) = gru.forward(input, None).unwrap();
//!
//! assert_eq!(output.dims(), [5, 2, 32]);
//! assert_eq!(h_n.dims(), [2, 2, 16]);
//! ```
//!
//! ## Shared Base
//!
//! The typed layers wrap [`Recurrent`](rnn::Recurrent), which can also be
//! built directly from a [`RecurrentConfig`] for any [`RnnMode`]:
//!
//! ```rust
//! use burn::backend::NdArray;
//! use recurrent::prelude::*;
//!
//! let device = Default::default();
//! let layer = RecurrentConfig::new(RnnMode::Lstm, 4, 3)
//!     .with_num_layers(2)
//!     .init::<NdArray>(&device)
//!     .unwrap();
//!
//! assert_eq!(layer.flat_weights().len(), 8);
//! assert_eq!(
//!     layer.summary(),
//!     "LSTM(input_size=4, hidden_size=3, num_layers=2, bias=true, \
//!      batch_first=false, dropout=0, bidirectional=false)"
//! );
//! ```

pub mod config;
pub mod error;
pub mod hidden;
pub mod kernels;
pub mod mode;
pub mod packed;
pub mod rnn;
pub mod shape;
pub mod weights;

pub use config::RecurrentConfig;
pub use error::{ErrorKind, RnnError, RnnResult};
pub use mode::{Nonlinearity, RnnMode};

pub mod prelude {
    pub use crate::config::RecurrentConfig;
    pub use crate::error::{RnnError, RnnResult};
    pub use crate::hidden::HiddenState;
    pub use crate::mode::{Nonlinearity, RnnMode};
    pub use crate::packed::{pack_padded_sequence, pad_packed_sequence, PackedSequence};
    pub use crate::rnn::{Gru, GruConfig, Lstm, LstmConfig, Recurrent, Rnn, RnnConfig};
    pub use crate::weights::{FlattenDriver, NoFusedKernel, WeightTensor};
}
