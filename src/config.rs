//! Shared configuration for recurrent layers

use crate::error::{RnnError, RnnResult};
use crate::mode::RnnMode;
use burn::config::Config;

/// Configuration shared by every recurrent variant
///
/// Created once when a layer is built and never mutated afterwards.
/// The variant-facing configs ([`RnnConfig`](crate::rnn::RnnConfig),
/// [`LstmConfig`](crate::rnn::LstmConfig), [`GruConfig`](crate::rnn::GruConfig))
/// all lower into this record.
#[derive(Config, Debug)]
pub struct RecurrentConfig {
    /// Cell variant
    pub mode: RnnMode,
    /// Number of features in the input
    pub input_size: usize,
    /// Number of features in the hidden state
    pub hidden_size: usize,
    /// Number of stacked recurrent layers
    #[config(default = 1)]
    pub num_layers: usize,
    /// Whether the layers use `b_ih` and `b_hh` bias vectors
    #[config(default = true)]
    pub bias: bool,
    /// Input and output are `[batch, seq, feature]` instead of `[seq, batch, feature]`
    #[config(default = false)]
    pub batch_first: bool,
    /// Dropout probability applied to the outputs of every layer but the last
    #[config(default = 0.0)]
    pub dropout: f64,
    /// Run a reverse pass as well and concatenate both directions
    #[config(default = false)]
    pub bidirectional: bool,
}

impl RecurrentConfig {
    pub fn num_directions(&self) -> usize {
        if self.bidirectional {
            2
        } else {
            1
        }
    }

    pub fn gate_size(&self) -> usize {
        self.mode.gate_multiplier() * self.hidden_size
    }

    /// Number of weight tensors per (layer, direction) pair
    pub fn weights_per_group(&self) -> usize {
        if self.bias {
            4
        } else {
            2
        }
    }

    /// Check the invariants a layer relies on
    ///
    /// Non-zero dropout on a single-layer network is allowed but has no
    /// effect, so it only logs a warning.
    pub fn validate(&self) -> RnnResult<()> {
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(RnnError::InvalidDropout(self.dropout));
        }
        for (field, value) in [
            ("input_size", self.input_size),
            ("hidden_size", self.hidden_size),
            ("num_layers", self.num_layers),
        ] {
            if value == 0 {
                return Err(RnnError::InvalidSize { field, value });
            }
        }

        if self.dropout > 0.0 && self.num_layers == 1 {
            log::warn!(
                "dropout option adds dropout after all but last recurrent layer, \
                 so non-zero dropout expects num_layers greater than 1, \
                 but got dropout={} and num_layers={}",
                self.dropout,
                self.num_layers
            );
        }
        Ok(())
    }
}
