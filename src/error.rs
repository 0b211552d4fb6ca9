//! Error types for recurrent layers

/// Broad category of an [`RnnError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration, raised at construction time
    Configuration,
    /// Input or hidden-state shape does not match the layer
    ShapeMismatch,
    /// Mode or kernel lookup failed
    UnsupportedMode,
    /// A weight slot has no registered parameter
    MissingParameter,
}

/// Errors raised by recurrent layers
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RnnError {
    #[error(
        "dropout should be a number in range [0, 1] representing the probability \
         of an element being zeroed, got {0}"
    )]
    InvalidDropout(f64),

    #[error("{field} must be at least 1, got {value}")]
    InvalidSize { field: &'static str, value: usize },

    #[error("Unknown mode: {0}")]
    UnsupportedMode(String),

    #[error("input must have {expected} dimensions, got {actual}")]
    InputRank { expected: usize, actual: usize },

    #[error("input.size(-1) must be equal to input_size. Expected {expected} got {actual}")]
    InputSize { expected: usize, actual: usize },

    #[error("Expected {label} size {expected:?}, got {actual:?}")]
    HiddenShape {
        label: &'static str,
        expected: [usize; 3],
        actual: Vec<usize>,
    },

    #[error("{mode} expects {expected} hidden state tensor(s), got {actual}")]
    HiddenArity {
        mode: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid packed sequence: {0}")]
    PackedSequence(String),

    #[error("Parameter {name} expects shape {expected:?}, got {actual:?}")]
    WeightShape {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Missing parameter {0}")]
    MissingParameter(String),
}

impl RnnError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDropout(_) | Self::InvalidSize { .. } => ErrorKind::Configuration,
            Self::UnsupportedMode(_) => ErrorKind::UnsupportedMode,
            Self::InputRank { .. }
            | Self::InputSize { .. }
            | Self::HiddenShape { .. }
            | Self::HiddenArity { .. }
            | Self::PackedSequence(_)
            | Self::WeightShape { .. } => ErrorKind::ShapeMismatch,
            Self::MissingParameter(_) => ErrorKind::MissingParameter,
        }
    }
}

/// Result type for recurrent layer operations
pub type RnnResult<T> = Result<T, RnnError>;
