//! Elman RNN layer
//!
//! `h_t = act(x_t W_ih^T + b_ih + h_{t-1} W_hh^T + b_hh)` with `act` either
//! tanh or ReLU.

use super::base::Recurrent;
use crate::config::RecurrentConfig;
use crate::error::RnnResult;
use crate::mode::{Nonlinearity, RnnMode};
use crate::packed::PackedSequence;
use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration of an [`Rnn`] layer
#[derive(Config, Debug)]
pub struct RnnConfig {
    /// Number of features in the input
    pub input_size: usize,
    /// Number of features in the hidden state
    pub hidden_size: usize,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = "Nonlinearity::Tanh")]
    pub nonlinearity: Nonlinearity,
    #[config(default = true)]
    pub bias: bool,
    #[config(default = false)]
    pub batch_first: bool,
    #[config(default = 0.0)]
    pub dropout: f64,
    #[config(default = false)]
    pub bidirectional: bool,
}

impl RnnConfig {
    /// The shared configuration this lowers into
    pub fn recurrent(&self) -> RecurrentConfig {
        RecurrentConfig::new(self.nonlinearity.into(), self.input_size, self.hidden_size)
            .with_num_layers(self.num_layers)
            .with_bias(self.bias)
            .with_batch_first(self.batch_first)
            .with_dropout(self.dropout)
            .with_bidirectional(self.bidirectional)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnResult<Rnn<B>> {
        Ok(Rnn {
            base: self.recurrent().init(device)?,
        })
    }
}

/// Multi-layer Elman RNN
#[derive(Module, Debug)]
pub struct Rnn<B: Backend> {
    base: Recurrent<B>,
}

impl<B: Backend> Rnn<B> {
    /// Run over a padded sequence
    ///
    /// # Returns
    /// `(output, h_n)`; `h_n` is `[num_layers * num_directions, batch, hidden_size]`
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        hidden: Option<Tensor<B, 3>>,
    ) -> RnnResult<(Tensor<B, 3>, Tensor<B, 3>)> {
        let (output, hidden) = self.base.forward(input, hidden.map(Into::into))?;
        Ok((output, hidden.into_single(self.mode())?))
    }

    /// Run over a packed sequence
    pub fn forward_packed(
        &self,
        input: &PackedSequence<B>,
        hidden: Option<Tensor<B, 3>>,
    ) -> RnnResult<(PackedSequence<B>, Tensor<B, 3>)> {
        let (output, hidden) = self.base.forward_packed(input, hidden.map(Into::into))?;
        Ok((output, hidden.into_single(self.mode())?))
    }

    /// `RNN_TANH` or `RNN_RELU`
    pub fn mode(&self) -> RnnMode {
        self.base.config().mode
    }

    pub fn base(&self) -> &Recurrent<B> {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Recurrent<B> {
        &mut self.base
    }
}
