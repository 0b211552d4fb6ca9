//! Shared recurrent layer
//!
//! [`Recurrent`] holds the weights of any variant and runs the forward
//! pipeline every variant shares:
//!
//! ```text
//! resolve hidden -> validate -> dispatch kernel -> restore batch order
//! ```

use crate::config::RecurrentConfig;
use crate::error::RnnResult;
use crate::hidden::HiddenState;
use crate::kernels::{KernelArgs, PackedInput, PaddedInput, Sequence};
use crate::packed::PackedSequence;
use crate::shape::ShapeValidator;
use crate::weights::{
    maybe_flatten, FlatWeight, FlattenDriver, NoFusedKernel, ParameterStore, WeightLayout,
    WeightParam, WeightTensor,
};
use burn::module::{Ignored, Module};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

impl RecurrentConfig {
    /// Build a layer on `device` with the default (non-fused) driver
    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnResult<Recurrent<B>> {
        self.init_with_driver(device, &NoFusedKernel)
    }

    /// Build a layer on `device`, flattening its weights through `driver`
    /// when the fused path applies
    pub fn init_with_driver<B: Backend, D: FlattenDriver<B> + ?Sized>(
        &self,
        device: &B::Device,
        driver: &D,
    ) -> RnnResult<Recurrent<B>> {
        self.validate()?;

        let layout = WeightLayout::new(self);
        let weights = ParameterStore::new(layout, init_bound(self.hidden_size), device);
        let mut layer = Recurrent {
            weights,
            config: Ignored(self.clone()),
        };
        layer.flatten_parameters(driver);
        Ok(layer)
    }
}

/// Half-width of the uniform initialization range
fn init_bound(hidden_size: usize) -> f64 {
    1.0 / (hidden_size as f64).sqrt()
}

/// Multi-layer recurrent layer shared by RNN, LSTM and GRU
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct Recurrent<B: Backend> {
    /// Every weight and bias, read in flat order by the kernels
    weights: ParameterStore<B>,
    config: Ignored<RecurrentConfig>,
}

impl<B: Backend> Recurrent<B> {
    pub fn config(&self) -> &RecurrentConfig {
        &self.config.0
    }

    /// Run over a padded sequence
    ///
    /// # Arguments
    /// * `input` - `[seq, batch, input_size]`, or `[batch, seq, input_size]`
    ///   when `batch_first` is set
    /// * `hidden` - Initial state, zeros when `None`
    ///
    /// # Returns
    /// `(output, hidden)` with output `[seq, batch, num_directions * hidden_size]`
    /// (batch-first when configured) and hidden `[num_layers * num_directions, batch, hidden_size]`
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        hidden: Option<HiddenState<B>>,
    ) -> RnnResult<(Tensor<B, 3>, HiddenState<B>)> {
        let input = PaddedInput {
            data: input,
            batch_first: self.config.batch_first,
        };
        self.forward_helper(input, hidden, None, None)
    }

    /// Run over a packed sequence
    ///
    /// A caller-supplied `hidden` is in the original batch order, and so is
    /// the returned state. The output keeps the batch structure of `input`.
    pub fn forward_packed(
        &self,
        input: &PackedSequence<B>,
        hidden: Option<HiddenState<B>>,
    ) -> RnnResult<(PackedSequence<B>, HiddenState<B>)> {
        let sequence = PackedInput {
            data: input.data().clone(),
            batch_sizes: input.batch_sizes(),
        };
        let (data, hidden) = self.forward_helper(
            sequence,
            hidden,
            input.sorted_indices(),
            input.unsorted_indices(),
        )?;
        Ok((input.with_data(data), hidden))
    }

    fn forward_helper<S: Sequence<B>>(
        &self,
        input: S,
        hidden: Option<HiddenState<B>>,
        sorted_indices: Option<&Tensor<B, 1, Int>>,
        unsorted_indices: Option<&Tensor<B, 1, Int>>,
    ) -> RnnResult<(S::Output, HiddenState<B>)> {
        let dims = input.dims();
        let device = input.device();
        let mode = self.config.mode;
        let validator = ShapeValidator::new(self.config());

        validator.check_input(&dims, input.batch_sizes())?;
        let expected = validator.expected_hidden_shape(&dims, input.batch_sizes())?;

        // Zeros are the same in any batch order; only a caller's state is
        // moved into sorted order. Its shape is checked first since the
        // permutation indexes its batch axis.
        let hidden = match hidden {
            None => HiddenState::zeros(mode, expected, &device),
            Some(hidden) => {
                hidden.check(mode, &validator, expected)?;
                hidden.permute(sorted_indices)
            }
        };

        let weights = self.weights.flat_weights();
        let args = KernelArgs {
            weights: &weights,
            layout: self.weights.layout(),
            has_biases: self.config.bias,
            num_layers: self.config.num_layers,
            dropout: self.config.dropout,
            training: B::ad_enabled(),
            bidirectional: self.config.bidirectional,
        };
        let (output, hidden) = mode.kernel().run(input, hidden, &args)?;

        Ok((output, hidden.permute(unsorted_indices)))
    }

    /// Try to move the weights into the fused contiguous layout
    ///
    /// Returns whether `driver` rewrote them. Ineligible weights are left
    /// untouched.
    pub fn flatten_parameters<D: FlattenDriver<B> + ?Sized>(&mut self, driver: &D) -> bool {
        maybe_flatten(&mut self.weights, &self.config.0, driver)
    }

    /// Move the layer to `device`, then re-flatten its weights there
    ///
    /// A device move reallocates every parameter, so any earlier
    /// flattening no longer applies.
    pub fn to(self, device: &B::Device, driver: &impl FlattenDriver<B>) -> Self {
        let mut layer = self.to_device(device);
        layer.flatten_parameters(driver);
        layer
    }

    /// Resample every weight from `U(-1/sqrt(hidden_size), 1/sqrt(hidden_size))`
    pub fn reset_parameters(&mut self) {
        self.weights
            .reset_parameters(init_bound(self.config.hidden_size));
    }

    /// Weights grouped per (layer, direction), absent slots skipped
    pub fn all_weights(&self) -> Vec<Vec<(&str, WeightTensor<B>)>> {
        self.weights.all_weights()
    }

    /// Weight registered under `name`, e.g. `weight_hh_l1_reverse`
    pub fn weight(&self, name: &str) -> Option<WeightTensor<B>> {
        self.weights.lookup(name)
    }

    /// Replace the weight registered under `name`
    pub fn register_weight(&mut self, name: &str, tensor: WeightTensor<B>) -> RnnResult<()> {
        self.weights.register(name, tensor).map(|_| ())
    }

    /// Parameter registered under `name`, with its identity
    pub fn parameter(&self, name: &str) -> Option<WeightParam<B>> {
        self.weights.parameter(name)
    }

    /// Register `param` itself under `name`
    ///
    /// Registering one parameter under several names ties those slots
    /// together; flattening then leaves the weights alone.
    pub fn register_parameter(&mut self, name: &str, param: WeightParam<B>) -> RnnResult<()> {
        self.weights.register_param(name, param)
    }

    /// Remove the weight registered under `name`
    ///
    /// The slot shows up as absent in [`flat_weights`](Self::flat_weights)
    /// and forward fails with
    /// [`RnnError::MissingParameter`](crate::RnnError::MissingParameter)
    /// until a weight is registered again.
    pub fn remove_parameter(&mut self, name: &str) -> Option<WeightTensor<B>> {
        self.weights.remove(name)
    }

    /// Registered weights in layout order, `None` for removed slots
    pub fn flat_weights(&self) -> Vec<Option<FlatWeight<B>>> {
        self.weights.flat_weights()
    }

    pub fn flat_weights_names(&self) -> Vec<&str> {
        self.weights.flat_weights_names().collect()
    }

    /// One-line description, e.g. `GRU(input_size=4, hidden_size=3, ...)`
    pub fn summary(&self) -> String {
        let config = self.config();
        format!(
            "{}(input_size={}, hidden_size={}, num_layers={}, bias={}, batch_first={}, \
             dropout={}, bidirectional={})",
            config.mode.layer_name(),
            config.input_size,
            config.hidden_size,
            config.num_layers,
            config.bias,
            config.batch_first,
            config.dropout,
            config.bidirectional
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RnnError;
    use crate::mode::RnnMode;
    use crate::packed::index_tensor;
    use burn::backend::NdArray;
    use burn::module::{ModuleMapper, ParamId};
    use burn::tensor::backend::Backend as BurnBackend;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    fn values<const D: usize>(tensor: &Tensor<TestBackend, D>) -> Vec<f32> {
        tensor.to_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_init_rejects_bad_dropout() {
        let device = get_test_device();
        let config = RecurrentConfig::new(RnnMode::Gru, 4, 3).with_dropout(1.5);
        let err = config.init::<TestBackend>(&device).unwrap_err();
        assert_eq!(err, RnnError::InvalidDropout(1.5));
    }

    #[test]
    fn test_summary() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::Lstm, 4, 3)
            .with_num_layers(2)
            .with_dropout(0.5)
            .init::<TestBackend>(&device)
            .unwrap();
        assert_eq!(
            layer.summary(),
            "LSTM(input_size=4, hidden_size=3, num_layers=2, bias=true, batch_first=false, \
             dropout=0.5, bidirectional=false)"
        );
    }

    #[test]
    fn test_forward_shapes_batch_first() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::Gru, 4, 3)
            .with_batch_first(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::random([2, 5, 4], Distribution::Default, &device);

        let (output, hidden) = layer.forward(input, None).unwrap();
        assert_eq!(output.dims(), [2, 5, 3]);
        assert_eq!(hidden.hidden().dims(), [1, 2, 3]);
    }

    #[test]
    fn test_forward_rejects_wrong_features() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::RnnTanh, 4, 3)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::zeros([5, 2, 6], &device);

        let err = layer.forward(input, None).unwrap_err();
        assert_eq!(err, RnnError::InputSize { expected: 4, actual: 6 });
    }

    #[test]
    fn test_forward_rejects_wrong_arity() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::Gru, 4, 3)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::zeros([5, 2, 4], &device);
        let pair = HiddenState::zeros(RnnMode::Lstm, [1, 2, 3], &device);

        let err = layer.forward(input, Some(pair)).unwrap_err();
        assert!(matches!(err, RnnError::HiddenArity { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn test_removed_weight_fails_forward() {
        let device = get_test_device();
        let mut layer = RecurrentConfig::new(RnnMode::Lstm, 4, 3)
            .init::<TestBackend>(&device)
            .unwrap();
        assert!(layer.remove_parameter("bias_hh_l0").is_some());
        assert!(layer.flat_weights()[3].is_none());
        assert_eq!(layer.flat_weights_names()[3], "bias_hh_l0");

        let input = Tensor::<TestBackend, 3>::zeros([2, 1, 4], &device);
        let err = layer.forward(input, None).unwrap_err();
        assert_eq!(err, RnnError::MissingParameter("bias_hh_l0".to_string()));
    }

    #[test]
    fn test_register_weight_changes_output() {
        let device = get_test_device();
        let mut layer = RecurrentConfig::new(RnnMode::RnnRelu, 2, 2)
            .with_bias(false)
            .init::<TestBackend>(&device)
            .unwrap();
        let identity = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0], [2, 2]),
            &device,
        );
        layer
            .register_weight("weight_ih_l0", WeightTensor::Matrix(identity))
            .unwrap();
        layer
            .register_weight(
                "weight_hh_l0",
                WeightTensor::Matrix(Tensor::zeros([2, 2], &device)),
            )
            .unwrap();

        // h = relu(x) with identity input weights and no recurrence
        let input = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0f32, -2.0], [1, 1, 2]),
            &device,
        );
        let (output, _) = layer.forward(input, None).unwrap();
        assert_eq!(values(&output), vec![1.0, 0.0]);
    }

    #[test]
    fn test_reset_parameters_within_bound() {
        let device = get_test_device();
        let mut layer = RecurrentConfig::new(RnnMode::Gru, 3, 16)
            .init::<TestBackend>(&device)
            .unwrap();
        layer.reset_parameters();

        for group in layer.all_weights() {
            assert_eq!(group.len(), 4);
            for (_, weight) in group {
                let data = weight.to_data().to_vec::<f32>().unwrap();
                assert!(data.iter().all(|v| v.abs() <= 0.25));
            }
        }
    }

    #[test]
    fn test_to_device_keeps_parameter_ids() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::Lstm, 3, 2)
            .with_bidirectional(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let before: Vec<_> = layer.flat_weights().iter().flatten().map(|w| w.id).collect();

        let layer = layer.to(&device, &NoFusedKernel);
        let after: Vec<_> = layer.flat_weights().iter().flatten().map(|w| w.id).collect();
        assert_eq!(before, after);
        assert_eq!(after.len(), 8);
    }

    #[test]
    fn test_packed_identity_order_matches_padded() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::Gru, 2, 3)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::random([3, 2, 2], Distribution::Default, &device);

        let (padded, padded_hidden) = layer.forward(input.clone(), None).unwrap();
        let packed =
            PackedSequence::new(input.reshape([6, 2]), vec![2, 2, 2], None).unwrap();
        let (output, hidden) = layer.forward_packed(&packed, None).unwrap();

        let padded = values(&padded);
        let output = values(output.data());
        for (a, b) in padded.iter().zip(&output) {
            assert!((a - b).abs() < 1e-5);
        }
        let (a, b) = (values(padded_hidden.hidden()), values(hidden.hidden()));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_supplied_hidden_is_sorted_then_restored() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::RnnTanh, 1, 2)
            .init::<TestBackend>(&device)
            .unwrap();
        // two sequences of length 1, sorted order [1, 0]
        let data = Tensor::<TestBackend, 2>::zeros([2, 1], &device);
        let packed = PackedSequence::new(data, vec![2], Some(index_tensor(&[1, 0], &device)))
            .unwrap();
        let hidden = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![0.5f32, 0.5, -0.5, -0.5], [1, 2, 2]),
            &device,
        );

        // the same computation with the batch already in sorted order
        let reference = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![-0.5f32, -0.5, 0.5, 0.5], [1, 2, 2]),
            &device,
        );
        let (_, expected) = layer
            .forward(Tensor::zeros([1, 2, 1], &device), Some(reference.into()))
            .unwrap();
        let expected = values(expected.hidden());

        let (_, result) = layer.forward_packed(&packed, Some(hidden.into())).unwrap();
        let result = values(result.hidden());
        // original row 0 ran as sorted row 1
        for (got, want) in result[0..2].iter().zip(&expected[2..4]) {
            assert!((got - want).abs() < 1e-6);
        }
        for (got, want) in result[2..4].iter().zip(&expected[0..2]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    /// Mapper that zeroes every parameter
    struct Zeroing;

    impl<B: BurnBackend> ModuleMapper<B> for Zeroing {
        fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
            tensor.zeros_like()
        }
    }

    #[test]
    fn test_forward_follows_loaded_record() {
        let device = get_test_device();
        let config = RecurrentConfig::new(RnnMode::Lstm, 3, 4).with_bidirectional(true);
        let layer = config.init::<TestBackend>(&device).unwrap();
        let source = config.init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 3>::random([3, 2, 3], Distribution::Default, &device);

        let (_, expected) = source.forward(input.clone(), None).unwrap();
        let (_, before) = layer.forward(input.clone(), None).unwrap();
        let layer = layer.load_record(source.into_record());
        let (_, hidden) = layer.forward(input, None).unwrap();

        assert_ne!(values(before.hidden()), values(expected.hidden()));
        assert_eq!(values(hidden.hidden()), values(expected.hidden()));
        assert_eq!(
            values(hidden.cell().unwrap()),
            values(expected.cell().unwrap())
        );
    }

    #[test]
    fn test_forward_follows_mapped_parameters() {
        let device = get_test_device();
        let layer = RecurrentConfig::new(RnnMode::RnnTanh, 3, 4)
            .with_num_layers(2)
            .init::<TestBackend>(&device)
            .unwrap();
        let input = Tensor::<TestBackend, 3>::random([3, 2, 3], Distribution::Default, &device);

        let layer = layer.map(&mut Zeroing);
        let (output, hidden) = layer.forward(input, None).unwrap();

        assert!(values(&output).iter().all(|v| *v == 0.0));
        assert!(values(hidden.hidden()).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_shared_parameter_is_reported_as_one_id() {
        let device = get_test_device();
        let mut layer = RecurrentConfig::new(RnnMode::RnnTanh, 3, 3)
            .with_bidirectional(true)
            .init::<TestBackend>(&device)
            .unwrap();
        let shared = layer.parameter("weight_hh_l0").unwrap();
        layer
            .register_parameter("weight_hh_l0_reverse", shared.clone())
            .unwrap();

        let flat = layer.flat_weights();
        let forward_id = flat[1].as_ref().unwrap().id;
        let reverse_id = flat[5].as_ref().unwrap().id;
        assert_eq!(forward_id, shared.id());
        assert_eq!(reverse_id, shared.id());
    }
}
