#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;
    use burn::tensor::{Distribution, Tensor};
    use recurrent::prelude::*;
    use recurrent::weights::{FlattenRequest, WeightTensor};
    use std::cell::RefCell;

    type Backend = NdArray<f32>;
    type Device = <Backend as BurnBackend>::Device;

    /// Driver that records every flatten request
    #[derive(Default)]
    struct RecordingDriver {
        fused: bool,
        reject_vectors: bool,
        requests: RefCell<Vec<FlattenRequest>>,
    }

    impl RecordingDriver {
        fn fused() -> Self {
            Self {
                fused: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl FlattenDriver<Backend> for RecordingDriver {
        fn is_fused_device(&self, _device: &Device) -> bool {
            self.fused
        }

        fn is_acceptable(&self, weight: &WeightTensor<Backend>) -> bool {
            !(self.reject_vectors && matches!(weight, WeightTensor::Vector(_)))
        }

        fn flatten(&self, weights: &mut [WeightTensor<Backend>], request: &FlattenRequest) {
            // copy into fresh storage; values and shapes stay the same
            for weight in weights.iter_mut() {
                *weight = match weight.clone() {
                    WeightTensor::Matrix(t) => WeightTensor::Matrix(t * 1.0),
                    WeightTensor::Vector(t) => WeightTensor::Vector(t * 1.0),
                };
            }
            self.requests.borrow_mut().push(*request);
        }
    }

    fn snapshot(layer: &Recurrent<Backend>) -> Vec<Option<Vec<f32>>> {
        layer
            .flat_weights()
            .iter()
            .map(|w| {
                w.as_ref()
                    .map(|w| w.tensor.to_data().to_vec::<f32>().unwrap())
            })
            .collect()
    }

    fn create_layer() -> Recurrent<Backend> {
        let device = Default::default();
        RecurrentConfig::new(RnnMode::Lstm, 3, 4)
            .with_num_layers(2)
            .with_bidirectional(true)
            .init::<Backend>(&device)
            .unwrap()
    }

    #[test]
    fn test_default_driver_never_flattens() {
        let mut layer = create_layer();
        let before = snapshot(&layer);

        assert!(!layer.flatten_parameters(&NoFusedKernel));
        assert_eq!(snapshot(&layer), before);
    }

    #[test]
    fn test_eligible_weights_are_flattened() {
        let mut layer = create_layer();
        let before = snapshot(&layer);
        let ids: Vec<_> = layer.flat_weights().iter().flatten().map(|w| w.id).collect();
        let driver = RecordingDriver::fused();

        assert!(layer.flatten_parameters(&driver));

        assert_eq!(driver.calls(), 1);
        let request = driver.requests.borrow()[0];
        assert_eq!(request.bias_count, 4);
        assert_eq!(request.mode_code, 2);
        assert_eq!(request.input_size, 3);
        assert_eq!(request.hidden_size, 4);
        assert_eq!(request.num_layers, 2);
        assert!(request.bidirectional);
        assert!(!request.batch_first);

        let after_ids: Vec<_> = layer.flat_weights().iter().flatten().map(|w| w.id).collect();
        assert_eq!(ids, after_ids);
        assert_eq!(snapshot(&layer), before);
    }

    #[test]
    fn test_non_fused_device_is_untouched() {
        let mut layer = create_layer();
        let before = snapshot(&layer);
        let driver = RecordingDriver::default();

        assert!(!layer.flatten_parameters(&driver));
        assert_eq!(driver.calls(), 0);
        assert_eq!(snapshot(&layer), before);
    }

    #[test]
    fn test_rejected_weight_is_untouched() {
        let mut layer = create_layer();
        let before = snapshot(&layer);
        let driver = RecordingDriver {
            fused: true,
            reject_vectors: true,
            ..Default::default()
        };

        assert!(!layer.flatten_parameters(&driver));
        assert_eq!(driver.calls(), 0);
        assert_eq!(snapshot(&layer), before);
    }

    #[test]
    fn test_partial_registration_is_untouched() {
        let mut layer = create_layer();
        layer.remove_parameter("weight_hh_l1_reverse");
        let before = snapshot(&layer);
        let driver = RecordingDriver::fused();

        assert!(!layer.flatten_parameters(&driver));
        assert_eq!(driver.calls(), 0);
        assert_eq!(snapshot(&layer), before);
        assert!(before[13].is_none());
    }

    #[test]
    fn test_shared_parameter_is_untouched() {
        let device = Default::default();
        let mut layer = RecurrentConfig::new(RnnMode::RnnTanh, 3, 3)
            .with_bidirectional(true)
            .init::<Backend>(&device)
            .unwrap();
        let shared = layer.parameter("weight_hh_l0").unwrap();
        layer
            .register_parameter("weight_hh_l0_reverse", shared)
            .unwrap();
        let before = snapshot(&layer);
        let driver = RecordingDriver::fused();

        assert!(!layer.flatten_parameters(&driver));
        assert_eq!(driver.calls(), 0);
        assert_eq!(snapshot(&layer), before);
        assert_eq!(before[1], before[5]);
    }

    #[test]
    fn test_forward_unchanged_by_flattening() {
        let device = Default::default();
        let mut layer = create_layer();
        let input = Tensor::<Backend, 3>::random([4, 2, 3], Distribution::Default, &device);

        let (before, _) = layer.forward(input.clone(), None).unwrap();
        assert!(layer.flatten_parameters(&RecordingDriver::fused()));
        let (after, _) = layer.forward(input, None).unwrap();

        assert_eq!(
            before.to_data().to_vec::<f32>().unwrap(),
            after.to_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_move_reflattens() {
        let device = Default::default();
        let layer = create_layer();
        let driver = RecordingDriver::fused();

        let layer = layer.to(&device, &driver);
        assert_eq!(driver.calls(), 1);
        assert_eq!(layer.flat_weights().len(), 16);
        assert!(layer.flat_weights().iter().all(Option::is_some));
    }

    #[test]
    fn test_init_with_fused_driver() {
        let device = Default::default();
        let driver = RecordingDriver::fused();
        let layer = RecurrentConfig::new(RnnMode::RnnRelu, 2, 2)
            .with_bias(false)
            .init_with_driver::<Backend, _>(&device, &driver)
            .unwrap();

        assert_eq!(driver.calls(), 1);
        assert_eq!(driver.requests.borrow()[0].bias_count, 2);
        assert_eq!(driver.requests.borrow()[0].mode_code, 0);
        assert_eq!(layer.flat_weights().len(), 2);
    }
}
