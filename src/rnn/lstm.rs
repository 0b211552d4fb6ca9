//! Long short-term memory layer

use super::base::Recurrent;
use crate::config::RecurrentConfig;
use crate::error::RnnResult;
use crate::hidden::HiddenState;
use crate::mode::RnnMode;
use crate::packed::PackedSequence;
use burn::config::Config;
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration of an [`Lstm`] layer
#[derive(Config, Debug)]
pub struct LstmConfig {
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

impl LstmConfig {
    pub fn recurrent(&self) -> RecurrentConfig {
        RecurrentConfig::new(RnnMode::Lstm, self.input_size, self.hidden_size)
            .with_num_layers(self.num_layers)
            .with_bias(self.bias)
            .with_batch_first(self.batch_first)
            .with_dropout(self.dropout)
            .with_bidirectional(self.bidirectional)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnResult<Lstm<B>> {
        Ok(Lstm {
            base: self.recurrent().init(device)?,
        })
    }
}

/// `(h, c)` state of an [`Lstm`]
pub type LstmState<B> = (Tensor<B, 3>, Tensor<B, 3>);

/// Multi-layer LSTM
///
/// Gate rows are ordered `[i, f, g, o]` in every weight and bias.
#[derive(Module, Debug)]
pub struct Lstm<B: Backend> {
    base: Recurrent<B>,
}

impl<B: Backend> Lstm<B> {
    /// Run over a padded sequence
    ///
    /// # Arguments
    /// * `input` - `[seq, batch, input_size]` (or batch-first)
    /// * `state` - Optional `(h_0, c_0)`, each `[num_layers * num_directions, batch, hidden_size]`
    ///
    /// # Returns
    /// `(output, (h_n, c_n))`
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        state: Option<LstmState<B>>,
    ) -> RnnResult<(Tensor<B, 3>, LstmState<B>)> {
        let (output, hidden) = self.base.forward(input, state.map(HiddenState::from))?;
        Ok((output, hidden.into_pair()?))
    }

    pub fn forward_packed(
        &self,
        input: &PackedSequence<B>,
        state: Option<LstmState<B>>,
    ) -> RnnResult<(PackedSequence<B>, LstmState<B>)> {
        let (output, hidden) = self
            .base
            .forward_packed(input, state.map(HiddenState::from))?;
        Ok((output, hidden.into_pair()?))
    }

    pub fn base(&self) -> &Recurrent<B> {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Recurrent<B> {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RnnError;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    #[test]
    fn test_lstm_without_bias_has_two_weights_per_group() {
        let device = get_test_device();
        let lstm = LstmConfig::new(4, 3)
            .with_num_layers(2)
            .with_bias(false)
            .init::<TestBackend>(&device)
            .unwrap();

        assert_eq!(
            lstm.base().flat_weights_names(),
            vec!["weight_ih_l0", "weight_hh_l0", "weight_ih_l1", "weight_hh_l1"]
        );
        assert_eq!(lstm.base().weight("weight_ih_l1").unwrap().dims(), vec![12, 3]);
    }

    #[test]
    fn test_lstm_state_shapes() {
        let device = get_test_device();
        let lstm = LstmConfig::new(4, 3)
            .with_bidirectional(true)
            .with_batch_first(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::random([2, 7, 4], Distribution::Default, &device);

        let (output, (h, c)) = lstm.forward(input, None).unwrap();
        assert_eq!(output.dims(), [2, 7, 6]);
        assert_eq!(h.dims(), [2, 2, 3]);
        assert_eq!(c.dims(), [2, 2, 3]);
    }

    #[test]
    fn test_lstm_rejects_mismatched_cell_state() {
        let device = get_test_device();
        let lstm = LstmConfig::new(4, 3).init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 3>::zeros([5, 2, 4], &device);
        let h = Tensor::zeros([1, 2, 3], &device);
        let c = Tensor::zeros([1, 3, 3], &device);

        let err = lstm.forward(input, Some((h, c))).unwrap_err();
        assert_eq!(
            err,
            RnnError::HiddenShape {
                label: "hidden[1]",
                expected: [1, 2, 3],
                actual: vec![1, 3, 3],
            }
        );
    }
}
