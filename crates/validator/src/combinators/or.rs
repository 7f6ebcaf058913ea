//! OR combinator — logical disjunction of validators.

use crate::core::{Validate, ValidationError, ValidatorMetadata};

/// Combines two validators with logical OR: either must pass. On failure,
/// reports the right validator's error (the left's is usually less
/// relevant once both have been tried).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Or<L, R> {
    left: L,
    right: R,
}

impl<L, R> Or<L, R> {
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L, R> Validate for Or<L, R>
where
    L: Validate,
    R: Validate<Input = L::Input>,
{
    type Input = L::Input;

    fn validate(&self, input: &Self::Input) -> Result<(), ValidationError> {
        match self.left.validate(input) {
            Ok(()) => Ok(()),
            Err(_) => self.right.validate(input),
        }
    }

    fn metadata(&self) -> ValidatorMetadata {
        let left_meta = self.left.metadata();
        let right_meta = self.right.metadata();
        ValidatorMetadata::new(format!("Or({}, {})", left_meta.name, right_meta.name))
    }
}
