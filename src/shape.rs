//! Input and hidden-state shape checks
//!
//! Checks operate on plain dimension slices so they can run before any
//! kernel is touched, whatever the static rank of the caller's tensors.

use crate::config::RecurrentConfig;
use crate::error::{RnnError, RnnResult};

/// Validates forward arguments against a configuration
#[derive(Debug, Clone, Copy)]
pub struct ShapeValidator<'a> {
    config: &'a RecurrentConfig,
}

impl<'a> ShapeValidator<'a> {
    pub fn new(config: &'a RecurrentConfig) -> Self {
        Self { config }
    }

    /// Check input rank and feature size
    ///
    /// Packed input (`batch_sizes` present) is `[total, features]`, padded
    /// input is rank 3.
    pub fn check_input(&self, input: &[usize], batch_sizes: Option<&[usize]>) -> RnnResult<()> {
        let expected = if batch_sizes.is_some() { 2 } else { 3 };
        if input.len() != expected {
            return Err(RnnError::InputRank {
                expected,
                actual: input.len(),
            });
        }

        let features = input[input.len() - 1];
        if features != self.config.input_size {
            return Err(RnnError::InputSize {
                expected: self.config.input_size,
                actual: features,
            });
        }
        Ok(())
    }

    /// `(num_layers * num_directions, batch, hidden_size)` for this input
    ///
    /// The batch comes from `batch_sizes[0]` for packed input, otherwise
    /// from the batch axis chosen by `batch_first`.
    pub fn expected_hidden_shape(
        &self,
        input: &[usize],
        batch_sizes: Option<&[usize]>,
    ) -> RnnResult<[usize; 3]> {
        let mini_batch = match batch_sizes {
            Some(sizes) => sizes.first().copied().ok_or_else(|| {
                RnnError::PackedSequence("batch_sizes must not be empty".to_string())
            })?,
            None => {
                let axis = if self.config.batch_first { 0 } else { 1 };
                *input.get(axis).ok_or(RnnError::InputRank {
                    expected: 3,
                    actual: input.len(),
                })?
            }
        };
        Ok([
            self.config.num_layers * self.config.num_directions(),
            mini_batch,
            self.config.hidden_size,
        ])
    }

    /// Require `hidden` to equal `expected` dimension by dimension
    pub fn check_hidden_shape(
        &self,
        hidden: &[usize],
        expected: [usize; 3],
        label: &'static str,
    ) -> RnnResult<()> {
        if hidden != expected.as_slice() {
            return Err(RnnError::HiddenShape {
                label,
                expected,
                actual: hidden.to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::RnnMode;

    fn config() -> RecurrentConfig {
        RecurrentConfig::new(RnnMode::Lstm, 4, 3)
            .with_num_layers(2)
            .with_bidirectional(true)
    }

    #[test]
    fn test_check_input_rank() {
        let config = config();
        let validator = ShapeValidator::new(&config);

        assert!(validator.check_input(&[5, 2, 4], None).is_ok());
        assert!(validator.check_input(&[9, 4], Some(&[2, 2])).is_ok());
        assert_eq!(
            validator.check_input(&[5, 2, 4], Some(&[2, 2])),
            Err(RnnError::InputRank {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(
            validator.check_input(&[5, 4], None),
            Err(RnnError::InputRank {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_check_input_features() {
        let config = config();
        let validator = ShapeValidator::new(&config);

        let err = validator.check_input(&[5, 2, 7], None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "input.size(-1) must be equal to input_size. Expected 4 got 7"
        );
    }

    #[test]
    fn test_expected_hidden_shape() {
        let config = config();
        let validator = ShapeValidator::new(&config);
        assert_eq!(
            validator.expected_hidden_shape(&[5, 2, 4], None).unwrap(),
            [4, 2, 3]
        );
        assert_eq!(
            validator.expected_hidden_shape(&[6, 4], Some(&[3, 2, 1])).unwrap(),
            [4, 3, 3]
        );

        let batch_first = config.clone().with_batch_first(true);
        let validator = ShapeValidator::new(&batch_first);
        assert_eq!(
            validator.expected_hidden_shape(&[5, 2, 4], None).unwrap(),
            [4, 5, 3]
        );
    }

    #[test]
    fn test_check_hidden_shape_labels() {
        let config = config();
        let validator = ShapeValidator::new(&config);

        assert!(validator
            .check_hidden_shape(&[4, 2, 3], [4, 2, 3], "hidden")
            .is_ok());
        let err = validator
            .check_hidden_shape(&[4, 2, 3, 1], [4, 2, 3], "hidden[0]")
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected hidden[0] size [4, 2, 3], got [4, 2, 3, 1]");
    }
}
