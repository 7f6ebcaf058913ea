//! NOT combinator — negates a validator's result.

use crate::core::{Validate, ValidationError, ValidatorMetadata};

/// Negates a validator: passes when the inner validator fails, and vice
/// versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Not<V> {
    inner: V,
}

impl<V> Validate for Not<V>
where
    V: Validate,
{
    type Input = V::Input;

    fn validate(&self, input: &Self::Input) -> Result<(), ValidationError> {
        match self.inner.validate(input) {
            Ok(()) => Err(ValidationError::new("not", "negated validator unexpectedly passed")),
            Err(_) => Ok(()),
        }
    }

    fn metadata(&self) -> ValidatorMetadata {
        ValidatorMetadata::new(format!("Not({})", self.inner.metadata().name))
    }
}

pub fn not<V>(inner: V) -> Not<V>
where
    V: Validate,
{
    Not { inner }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Contains(&'static str);

    impl Validate for Contains {
        type Input = str;
        fn validate(&self, input: &str) -> Result<(), ValidationError> {
            if input.contains(self.0) {
                Ok(())
            } else {
                Err(ValidationError::new("contains", "substring not found"))
            }
        }
    }

    #[test]
    fn not_flips_pass_to_fail_and_back() {
        let validator = not(Contains("bad"));
        assert!(validator.validate("good").is_ok());
        assert!(validator.validate("bad word").is_err());
    }
}
