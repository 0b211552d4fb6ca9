use super::layout::{WeightLayout, WeightRole};
use crate::error::{RnnError, RnnResult};
use burn::module::{Ignored, Module, Param, ParamId};
use burn::tensor::backend::Backend;
use burn::tensor::{DType, Distribution, Tensor, TensorData};

/// A weight matrix or a bias vector
#[derive(Debug, Clone)]
pub enum WeightTensor<B: Backend> {
    Matrix(Tensor<B, 2>),
    Vector(Tensor<B, 1>),
}

impl<B: Backend> WeightTensor<B> {
    pub fn dims(&self) -> Vec<usize> {
        match self {
            Self::Matrix(t) => t.dims().to_vec(),
            Self::Vector(t) => t.dims().to_vec(),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::Matrix(t) => t.dtype(),
            Self::Vector(t) => t.dtype(),
        }
    }

    pub fn device(&self) -> B::Device {
        match self {
            Self::Matrix(t) => t.device(),
            Self::Vector(t) => t.device(),
        }
    }

    pub fn to_data(&self) -> TensorData {
        match self {
            Self::Matrix(t) => t.to_data(),
            Self::Vector(t) => t.to_data(),
        }
    }

    pub fn detach(self) -> Self {
        match self {
            Self::Matrix(t) => Self::Matrix(t.detach()),
            Self::Vector(t) => Self::Vector(t.detach()),
        }
    }

    pub fn matrix(&self) -> Option<&Tensor<B, 2>> {
        match self {
            Self::Matrix(t) => Some(t),
            Self::Vector(_) => None,
        }
    }

    pub fn vector(&self) -> Option<&Tensor<B, 1>> {
        match self {
            Self::Vector(t) => Some(t),
            Self::Matrix(_) => None,
        }
    }
}

/// A registered parameter: a weight matrix or a bias vector
///
/// Registering the same parameter under two slot names makes both slots
/// share one [`ParamId`], which the flattening check treats as aliasing.
#[derive(Debug, Clone)]
pub enum WeightParam<B: Backend> {
    Matrix(Param<Tensor<B, 2>>),
    Vector(Param<Tensor<B, 1>>),
}

impl<B: Backend> WeightParam<B> {
    pub fn id(&self) -> ParamId {
        match self {
            Self::Matrix(param) => param.id,
            Self::Vector(param) => param.id,
        }
    }

    pub fn val(&self) -> WeightTensor<B> {
        match self {
            Self::Matrix(param) => WeightTensor::Matrix(param.val()),
            Self::Vector(param) => WeightTensor::Vector(param.val()),
        }
    }
}

/// Entry of the flat weight list: an alias of a stored parameter
#[derive(Debug, Clone)]
pub struct FlatWeight<B: Backend> {
    /// Identity of the parameter the tensor belongs to
    pub id: ParamId,
    pub tensor: WeightTensor<B>,
}

/// Owner of every recurrent weight
///
/// Keeps the slot layout and the registered parameters together. The flat
/// weight list is read straight from the parameters in layout order, so it
/// follows device moves, loaded records and optimizer steps; a slot without
/// a registered parameter shows up as `None`.
#[derive(Module, Debug)]
pub struct ParameterStore<B: Backend> {
    matrices: Vec<Option<Param<Tensor<B, 2>>>>,
    vectors: Vec<Option<Param<Tensor<B, 1>>>>,
    layout: Ignored<WeightLayout>,
}

impl<B: Backend> ParameterStore<B> {
    /// Register every slot of `layout`, sampled from `U(-bound, bound)`
    pub fn new(layout: WeightLayout, bound: f64, device: &B::Device) -> Self {
        let len = layout.len();
        let mut store = Self {
            matrices: vec![None; len],
            vectors: vec![None; len],
            layout: Ignored(layout),
        };
        for index in 0..len {
            store.init_slot(index, bound, device);
        }
        store
    }

    fn init_slot(&mut self, index: usize, bound: f64, device: &B::Device) {
        let slot = &self.layout.slots()[index];
        let dist = Distribution::Uniform(-bound, bound);
        if slot.role.is_bias() {
            let tensor = Tensor::random([slot.shape[0]], dist, device);
            self.vectors[index] = Some(Param::from_tensor(tensor));
        } else {
            let tensor = Tensor::random([slot.shape[0], slot.shape[1]], dist, device);
            self.matrices[index] = Some(Param::from_tensor(tensor));
        }
    }

    pub fn layout(&self) -> &WeightLayout {
        &self.layout.0
    }

    /// Flat weight list, aligned with [`WeightLayout::slots`]
    pub fn flat_weights(&self) -> Vec<Option<FlatWeight<B>>> {
        (0..self.layout.len()).map(|i| self.entry(i)).collect()
    }

    pub fn flat_weights_names(&self) -> impl Iterator<Item = &str> {
        self.layout.names()
    }

    fn param(&self, index: usize) -> Option<WeightParam<B>> {
        if let Some(param) = &self.matrices[index] {
            return Some(WeightParam::Matrix(param.clone()));
        }
        self.vectors[index].clone().map(WeightParam::Vector)
    }

    fn entry(&self, index: usize) -> Option<FlatWeight<B>> {
        self.param(index).map(|param| FlatWeight {
            id: param.id(),
            tensor: param.val(),
        })
    }

    /// Tensor registered under `name`
    pub fn lookup(&self, name: &str) -> Option<WeightTensor<B>> {
        let index = self.layout.position(name)?;
        self.entry(index).map(|entry| entry.tensor)
    }

    /// Parameter registered under `name`, identity included
    pub fn parameter(&self, name: &str) -> Option<WeightParam<B>> {
        let index = self.layout.position(name)?;
        self.param(index)
    }

    fn checked_index(&self, name: &str, dims: Vec<usize>) -> RnnResult<usize> {
        let index = self
            .layout
            .position(name)
            .ok_or_else(|| RnnError::MissingParameter(name.to_string()))?;
        let slot = &self.layout.slots()[index];
        if dims != slot.shape {
            return Err(RnnError::WeightShape {
                name: name.to_string(),
                expected: slot.shape.clone(),
                actual: dims,
            });
        }
        Ok(index)
    }

    /// Register `tensor` under the slot `name`, replacing any previous value
    ///
    /// The slot keeps its parameter identity and gradient flag. The tensor
    /// must match the slot shape exactly.
    pub fn register(&mut self, name: &str, tensor: WeightTensor<B>) -> RnnResult<WeightTensor<B>> {
        let index = self.checked_index(name, tensor.dims())?;

        match tensor.clone() {
            WeightTensor::Matrix(t) => {
                self.matrices[index] = Some(match self.matrices[index].take() {
                    Some(param) => param.map(|old| t.set_require_grad(old.is_require_grad())),
                    None => Param::from_tensor(t),
                });
            }
            WeightTensor::Vector(t) => {
                self.vectors[index] = Some(match self.vectors[index].take() {
                    Some(param) => param.map(|old| t.set_require_grad(old.is_require_grad())),
                    None => Param::from_tensor(t),
                });
            }
        }
        Ok(tensor)
    }

    /// Register `param` under the slot `name`, identity included
    ///
    /// Unlike [`register`](Self::register) the slot takes over the
    /// parameter's [`ParamId`], so one parameter can back several slots.
    pub fn register_param(&mut self, name: &str, param: WeightParam<B>) -> RnnResult<()> {
        let index = self.checked_index(name, param.val().dims())?;
        match param {
            WeightParam::Matrix(param) => {
                self.vectors[index] = None;
                self.matrices[index] = Some(param);
            }
            WeightParam::Vector(param) => {
                self.matrices[index] = None;
                self.vectors[index] = Some(param);
            }
        }
        Ok(())
    }

    /// Drop the parameter registered under `name`
    ///
    /// The slot stays in the layout and appears as absent in the flat list.
    pub fn remove(&mut self, name: &str) -> Option<WeightTensor<B>> {
        let index = self.layout.position(name)?;
        match self.layout.slots()[index].role {
            WeightRole::InputWeight | WeightRole::HiddenWeight => self.matrices[index]
                .take()
                .map(|param| WeightTensor::Matrix(param.val())),
            WeightRole::InputBias | WeightRole::HiddenBias => self.vectors[index]
                .take()
                .map(|param| WeightTensor::Vector(param.val())),
        }
    }

    /// Write rewritten flat weights back into their parameters
    ///
    /// Identities and gradient flags are kept; entries must be aligned with
    /// the layout.
    pub(crate) fn write_back(&mut self, weights: Vec<FlatWeight<B>>) {
        for (index, weight) in weights.into_iter().enumerate() {
            match weight.tensor {
                WeightTensor::Matrix(t) => {
                    if let Some(param) = self.matrices[index].take() {
                        self.matrices[index] =
                            Some(param.map(|old| t.set_require_grad(old.is_require_grad())));
                    }
                }
                WeightTensor::Vector(t) => {
                    if let Some(param) = self.vectors[index].take() {
                        self.vectors[index] =
                            Some(param.map(|old| t.set_require_grad(old.is_require_grad())));
                    }
                }
            }
        }
    }

    /// Resample every registered parameter from `U(-bound, bound)`
    pub fn reset_parameters(&mut self, bound: f64) {
        let dist = || Distribution::Uniform(-bound, bound);
        for param in self.matrices.iter_mut() {
            if let Some(p) = param.take() {
                *param = Some(p.map(|t| Tensor::random(t.dims(), dist(), &t.device())));
            }
        }
        for param in self.vectors.iter_mut() {
            if let Some(p) = param.take() {
                *param = Some(p.map(|t| Tensor::random(t.dims(), dist(), &t.device())));
            }
        }
    }

    /// Registered weights grouped per (layer, direction), in flat order
    pub fn all_weights(&self) -> Vec<Vec<(&str, WeightTensor<B>)>> {
        let per_group = self.layout.per_group();
        self.layout
            .groups()
            .enumerate()
            .map(|(group, slots)| {
                slots
                    .iter()
                    .enumerate()
                    .filter_map(|(i, slot)| {
                        self.entry(group * per_group + i)
                            .map(|entry| (slot.name.as_str(), entry.tensor))
                    })
                    .collect()
            })
            .collect()
    }
}
