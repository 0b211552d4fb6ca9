use crate::config::RecurrentConfig;

/// Role of a weight tensor inside one (layer, direction) group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightRole {
    /// `weight_ih`: `[gate_size, layer_input_size]`
    InputWeight,
    /// `weight_hh`: `[gate_size, hidden_size]`
    HiddenWeight,
    /// `bias_ih`: `[gate_size]`
    InputBias,
    /// `bias_hh`: `[gate_size]`
    HiddenBias,
}

impl WeightRole {
    const WITH_BIAS: [WeightRole; 4] = [
        Self::InputWeight,
        Self::HiddenWeight,
        Self::InputBias,
        Self::HiddenBias,
    ];

    fn prefix(self) -> &'static str {
        match self {
            Self::InputWeight => "weight_ih",
            Self::HiddenWeight => "weight_hh",
            Self::InputBias => "bias_ih",
            Self::HiddenBias => "bias_hh",
        }
    }

    pub fn is_bias(self) -> bool {
        matches!(self, Self::InputBias | Self::HiddenBias)
    }
}

/// One logical weight parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightSlot {
    pub name: String,
    pub shape: Vec<usize>,
    pub layer: usize,
    pub direction: usize,
    pub role: WeightRole,
}

/// Ordered list of weight slots for a configuration
///
/// Slots are emitted layer-major, then direction, then role
/// (`weight_ih`, `weight_hh`, `bias_ih`, `bias_hh`). Names are the only
/// key correlating a slot with its stored parameter, so they are unique:
/// `weight_ih_l{layer}` with a `_reverse` suffix for direction 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightLayout {
    slots: Vec<WeightSlot>,
    per_group: usize,
    num_directions: usize,
}

impl WeightLayout {
    pub fn new(config: &RecurrentConfig) -> Self {
        let gate_size = config.gate_size();
        let num_directions = config.num_directions();
        let per_group = config.weights_per_group();
        let roles = &WeightRole::WITH_BIAS[..per_group];

        let mut slots = Vec::with_capacity(config.num_layers * num_directions * per_group);
        for layer in 0..config.num_layers {
            let layer_input_size = if layer == 0 {
                config.input_size
            } else {
                config.hidden_size * num_directions
            };
            for direction in 0..num_directions {
                let suffix = if direction == 1 { "_reverse" } else { "" };
                for &role in roles {
                    let shape = match role {
                        WeightRole::InputWeight => vec![gate_size, layer_input_size],
                        WeightRole::HiddenWeight => vec![gate_size, config.hidden_size],
                        WeightRole::InputBias | WeightRole::HiddenBias => vec![gate_size],
                    };
                    slots.push(WeightSlot {
                        name: format!("{}_l{}{}", role.prefix(), layer, suffix),
                        shape,
                        layer,
                        direction,
                        role,
                    });
                }
            }
        }

        Self {
            slots,
            per_group,
            num_directions,
        }
    }

    pub fn slots(&self) -> &[WeightSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    /// Position of the slot called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.name == name)
    }

    /// Weights per (layer, direction) group: 4 with bias, 2 without
    pub fn per_group(&self) -> usize {
        self.per_group
    }

    /// Slots grouped per (layer, direction), in flat order
    pub fn groups(&self) -> impl Iterator<Item = &[WeightSlot]> {
        self.slots.chunks(self.per_group)
    }

    /// Flat index of the first slot of the (layer, direction) group
    pub fn group_offset(&self, layer: usize, direction: usize) -> usize {
        (layer * self.num_directions + direction) * self.per_group
    }
}
