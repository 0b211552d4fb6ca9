//! Gated recurrent unit layer

use super::base::Recurrent;
use crate::config::RecurrentConfig;
use crate::error::RnnResult;
use crate::mode::RnnMode;
use crate::packed::PackedSequence;
use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration of a [`Gru`] layer
#[derive(Config, Debug)]
pub struct GruConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = true)]
    pub bias: bool,
    #[config(default = false)]
    pub batch_first: bool,
    #[config(default = 0.0)]
    pub dropout: f64,
    #[config(default = false)]
    pub bidirectional: bool,
}

impl GruConfig {
    pub fn recurrent(&self) -> RecurrentConfig {
        RecurrentConfig::new(RnnMode::Gru, self.input_size, self.hidden_size)
            .with_num_layers(self.num_layers)
            .with_bias(self.bias)
            .with_batch_first(self.batch_first)
            .with_dropout(self.dropout)
            .with_bidirectional(self.bidirectional)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnResult<Gru<B>> {
        Ok(Gru {
            base: self.recurrent().init(device)?,
        })
    }
}

/// Multi-layer GRU
///
/// Gate rows are ordered `[r, z, n]` in every weight and bias.
#[derive(Module, Debug)]
pub struct Gru<B: Backend> {
    base: Recurrent<B>,
}

impl<B: Backend> Gru<B> {
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        hidden: Option<Tensor<B, 3>>,
    ) -> RnnResult<(Tensor<B, 3>, Tensor<B, 3>)> {
        let (output, hidden) = self.base.forward(input, hidden.map(Into::into))?;
        Ok((output, hidden.into_single(RnnMode::Gru)?))
    }

    pub fn forward_packed(
        &self,
        input: &PackedSequence<B>,
        hidden: Option<Tensor<B, 3>>,
    ) -> RnnResult<(PackedSequence<B>, Tensor<B, 3>)> {
        let (output, hidden) = self.base.forward_packed(input, hidden.map(Into::into))?;
        Ok((output, hidden.into_single(RnnMode::Gru)?))
    }

    pub fn base(&self) -> &Recurrent<B> {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Recurrent<B> {
        &mut self.base
    }
}
