//! Recurrent layer variants
//!
//! Every per-variant difference lives in the table of methods on [`RnnMode`]:
//! gate multiplier, hidden-state arity, kernel selector and the mode code
//! understood by fused accelerator drivers.

use crate::error::RnnError;
use std::fmt;
use std::str::FromStr;

/// Recurrent cell variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RnnMode {
    /// Elman RNN with tanh nonlinearity
    #[serde(rename = "RNN_TANH")]
    RnnTanh,
    /// Elman RNN with ReLU nonlinearity
    #[serde(rename = "RNN_RELU")]
    RnnRelu,
    /// Long short-term memory
    #[serde(rename = "LSTM")]
    Lstm,
    /// Gated recurrent unit
    #[serde(rename = "GRU")]
    Gru,
}

/// Nonlinearity of a plain RNN cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nonlinearity {
    #[default]
    Tanh,
    Relu,
}

/// Kernel selected for a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// Shared Elman kernel, parameterized by nonlinearity
    Rnn(Nonlinearity),
    Lstm,
    Gru,
}

impl RnnMode {
    pub const ALL: [RnnMode; 4] = [Self::RnnTanh, Self::RnnRelu, Self::Lstm, Self::Gru];

    /// Multiplier applied to `hidden_size` to get the gate size
    pub fn gate_multiplier(self) -> usize {
        match self {
            Self::Lstm => 4,
            Self::Gru => 3,
            Self::RnnTanh | Self::RnnRelu => 1,
        }
    }

    /// Number of tensors making up the hidden state
    pub fn state_arity(self) -> usize {
        match self {
            Self::Lstm => 2,
            _ => 1,
        }
    }

    pub fn kernel(self) -> Kernel {
        match self {
            Self::RnnTanh => Kernel::Rnn(Nonlinearity::Tanh),
            Self::RnnRelu => Kernel::Rnn(Nonlinearity::Relu),
            Self::Lstm => Kernel::Lstm,
            Self::Gru => Kernel::Gru,
        }
    }

    /// Mode code used by fused accelerator drivers
    ///
    /// These must line up with the driver convention:
    /// `0 = RNN_RELU`, `1 = RNN_TANH`, `2 = LSTM`, `3 = GRU`.
    pub fn mode_code(self) -> u8 {
        match self {
            Self::RnnRelu => 0,
            Self::RnnTanh => 1,
            Self::Lstm => 2,
            Self::Gru => 3,
        }
    }

    /// Inverse of [`RnnMode::mode_code`]
    pub fn from_mode_code(code: u8) -> Result<Self, RnnError> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.mode_code() == code)
            .ok_or_else(|| RnnError::UnsupportedMode(format!("mode code {code}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RnnTanh => "RNN_TANH",
            Self::RnnRelu => "RNN_RELU",
            Self::Lstm => "LSTM",
            Self::Gru => "GRU",
        }
    }

    /// Name of the layer type used in summaries
    pub fn layer_name(self) -> &'static str {
        match self {
            Self::RnnTanh | Self::RnnRelu => "RNN",
            Self::Lstm => "LSTM",
            Self::Gru => "GRU",
        }
    }
}

impl From<Nonlinearity> for RnnMode {
    fn from(nonlinearity: Nonlinearity) -> Self {
        match nonlinearity {
            Nonlinearity::Tanh => Self::RnnTanh,
            Nonlinearity::Relu => Self::RnnRelu,
        }
    }
}

impl fmt::Display for RnnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RnnMode {
    type Err = RnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RnnError::UnsupportedMode(s.to_string()))
    }
}

impl FromStr for Nonlinearity {
    type Err = RnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tanh" => Ok(Self::Tanh),
            "relu" => Ok(Self::Relu),
            _ => Err(RnnError::UnsupportedMode(format!("nonlinearity {s}"))),
        }
    }
}
