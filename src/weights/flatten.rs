//! Contiguous weight flattening for fused accelerator kernels
//!
//! Fused recurrent kernels run faster when every weight of a layer lives in
//! one contiguous buffer. Rewriting the layout is purely an optimization:
//! any failed precondition silently leaves the weights untouched.

use super::store::{FlatWeight, ParameterStore, WeightTensor};
use crate::config::RecurrentConfig;
use burn::module::ParamId;
use burn::tensor::backend::Backend;
use burn::tensor::DType;
use std::collections::HashSet;
use std::fmt;

/// Arguments of the fused weight-flatten primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenRequest {
    /// Weights per (layer, direction): 4 with bias, 2 without
    pub bias_count: usize,
    pub input_size: usize,
    /// Driver mode code, see [`RnnMode::mode_code`](crate::RnnMode::mode_code)
    pub mode_code: u8,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub batch_first: bool,
    pub bidirectional: bool,
}

impl FlattenRequest {
    pub fn new(config: &RecurrentConfig) -> Self {
        Self {
            bias_count: config.weights_per_group(),
            input_size: config.input_size,
            mode_code: config.mode.mode_code(),
            hidden_size: config.hidden_size,
            num_layers: config.num_layers,
            batch_first: config.batch_first,
            bidirectional: config.bidirectional,
        }
    }
}

/// Device driver owning the fused weight-flatten primitive
pub trait FlattenDriver<B: Backend> {
    /// Whether tensors on `device` can take the fused path
    fn is_fused_device(&self, device: &B::Device) -> bool;

    /// Driver-specific compatibility check for a single weight
    fn is_acceptable(&self, _weight: &WeightTensor<B>) -> bool {
        true
    }

    /// Rewrite `weights` into a contiguous layout
    ///
    /// Called without gradient tracking. Must keep every tensor's shape and
    /// values; only the storage layout may change.
    fn flatten(&self, weights: &mut [WeightTensor<B>], request: &FlattenRequest);
}

/// Driver for backends without a fused kernel: flattening never applies
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFusedKernel;

impl<B: Backend> FlattenDriver<B> for NoFusedKernel {
    fn is_fused_device(&self, _device: &B::Device) -> bool {
        false
    }

    fn flatten(&self, _weights: &mut [WeightTensor<B>], _request: &FlattenRequest) {}
}

/// Why the flat weights cannot take the fused path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// Some slots have no registered parameter
    Partial { present: usize, expected: usize },
    MixedDtype,
    /// A weight lives on a device without a fused kernel
    Device,
    /// The driver refused a weight
    Rejected,
    /// Two entries share the same parameter
    Aliased,
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial { present, expected } => {
                write!(f, "only {present} of {expected} weights are registered")
            }
            Self::MixedDtype => f.write_str("weights have different element types"),
            Self::Device => f.write_str("weights are not on a fused-kernel device"),
            Self::Rejected => f.write_str("driver rejected a weight"),
            Self::Aliased => f.write_str("weights share storage"),
        }
    }
}

/// What the eligibility check needs to know about one flat weight
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: ParamId,
    pub dtype: DType,
    pub fused_device: bool,
    pub acceptable: bool,
}

impl Candidate {
    pub fn inspect<B: Backend, D: FlattenDriver<B> + ?Sized>(
        weight: &FlatWeight<B>,
        driver: &D,
    ) -> Self {
        Self {
            id: weight.id,
            dtype: weight.tensor.dtype(),
            fused_device: driver.is_fused_device(&weight.tensor.device()),
            acceptable: driver.is_acceptable(&weight.tensor),
        }
    }
}

/// Check whether `candidates` qualify for the fused path
///
/// Requires exactly `expected` present entries of one element type, all on
/// a fused device, all accepted by the driver, and no two sharing a
/// parameter.
pub fn check_eligibility(
    candidates: &[Option<Candidate>],
    expected: usize,
) -> Result<(), Ineligible> {
    let present: Vec<&Candidate> = candidates.iter().flatten().collect();
    if candidates.len() != expected || present.len() != expected || expected == 0 {
        return Err(Ineligible::Partial {
            present: present.len(),
            expected,
        });
    }

    let dtype = &present[0].dtype;
    for candidate in &present {
        if &candidate.dtype != dtype {
            return Err(Ineligible::MixedDtype);
        }
        if !candidate.fused_device {
            return Err(Ineligible::Device);
        }
        if !candidate.acceptable {
            return Err(Ineligible::Rejected);
        }
    }

    let unique: HashSet<ParamId> = present.iter().map(|c| c.id).collect();
    if unique.len() != present.len() {
        return Err(Ineligible::Aliased);
    }
    Ok(())
}

/// Flatten the store's weights in place when the fused path is available
///
/// Returns whether the driver rewrote the weights. Never fails: an
/// ineligible store is left exactly as it was.
pub fn maybe_flatten<B: Backend, D: FlattenDriver<B> + ?Sized>(
    store: &mut ParameterStore<B>,
    config: &RecurrentConfig,
    driver: &D,
) -> bool {
    let flat = store.flat_weights();
    let candidates: Vec<Option<Candidate>> = flat
        .iter()
        .map(|entry| entry.as_ref().map(|w| Candidate::inspect(w, driver)))
        .collect();

    if let Err(reason) = check_eligibility(&candidates, store.layout().len()) {
        log::debug!("Skipping weight flattening: {reason}");
        return false;
    }

    let (ids, mut tensors): (Vec<ParamId>, Vec<WeightTensor<B>>) = flat
        .into_iter()
        .flatten()
        .map(|w| (w.id, w.tensor.detach()))
        .unzip();

    let request = FlattenRequest::new(config);
    driver.flatten(&mut tensors, &request);

    let rewritten = ids
        .into_iter()
        .zip(tensors)
        .map(|(id, tensor)| FlatWeight { id, tensor })
        .collect();
    store.write_back(rewritten);

    log::debug!(
        "Flattened {} recurrent weights (mode code {})",
        store.layout().len(),
        request.mode_code
    );
    true
}
