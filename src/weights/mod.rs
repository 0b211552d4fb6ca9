//! # Recurrent Weights
//!
//! Weight bookkeeping shared by every recurrent variant.
//!
//! | Part | Role |
//! |------|------|
//! | [`WeightLayout`] | Ordered weight slots (names and shapes) for a configuration |
//! | [`ParameterStore`] | Registered parameters and the flat weight list read from them |
//! | [`maybe_flatten`] | Contiguous-layout rewrite for fused kernels, when eligible |
//!
//! ## Slot Order
//!
//! For every layer, then every direction:
//!
//! ```text
//! weight_ih_l{k}{suffix}  [gate_size, layer_input_size]
//! weight_hh_l{k}{suffix}  [gate_size, hidden_size]
//! bias_ih_l{k}{suffix}    [gate_size]          (bias only)
//! bias_hh_l{k}{suffix}    [gate_size]          (bias only)
//! ```
//!
//! `suffix` is `_reverse` for the backward direction, `layer_input_size` is
//! `input_size` for layer 0 and `hidden_size * num_directions` above it.

mod flatten;
mod layout;
mod store;

pub use flatten::{
    check_eligibility, maybe_flatten, Candidate, FlattenDriver, FlattenRequest, Ineligible,
    NoFusedKernel,
};
pub use layout::{WeightLayout, WeightRole, WeightSlot};
pub use store::{FlatWeight, ParameterStore, WeightParam, WeightTensor};
