//! The validator core: the `Validate` trait and supporting metadata types.

mod error;

pub use error::ValidationError;

use std::borrow::Cow;

/// Something that can check a value of type `Input` and report a
/// structured failure.
///
/// `Input` is typically `?Sized` (`str`, `[T]`, `serde_json::Value`) so
/// validators can be called against borrowed data without an allocation.
pub trait Validate {
    /// The type this validator inspects.
    type Input: ?Sized;

    /// Runs the check, returning the first failure encountered.
    fn validate(&self, input: &Self::Input) -> Result<(), ValidationError>;

    /// Metadata describing this validator, used for diagnostics and
    /// combinator introspection. The default is adequate for leaf
    /// validators; combinators override it to merge their children's
    /// metadata.
    fn metadata(&self) -> ValidatorMetadata {
        ValidatorMetadata::new(std::any::type_name::<Self>())
    }
}

/// Combinator methods available on every `Validate` implementor.
pub trait ValidateExt: Validate + Sized {
    /// Both `self` and `other` must pass.
    fn and<V>(self, other: V) -> crate::combinators::And<Self, V>
    where
        V: Validate<Input = Self::Input>,
    {
        crate::combinators::And::new(self, other)
    }

    /// Either `self` or `other` must pass.
    fn or<V>(self, other: V) -> crate::combinators::Or<Self, V>
    where
        V: Validate<Input = Self::Input>,
    {
        crate::combinators::Or::new(self, other)
    }

    /// Validates a `serde_json::Value`, reporting a `type_mismatch` error
    /// if the JSON type doesn't coerce to `Self::Input`.
    fn validate_any(&self, value: &serde_json::Value) -> Result<(), ValidationError>
    where
        Self: JsonValidate,
    {
        JsonValidate::validate_any(self, value)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Bridges a typed `Validate` impl to untyped `serde_json::Value` input.
///
/// Implemented for validators whose `Input` nebula-validator knows how to
/// coerce out of a JSON value (`str`, numeric primitives, `bool`,
/// `serde_json::Value` itself for size/collection validators).
pub trait JsonValidate {
    fn validate_any(&self, value: &serde_json::Value) -> Result<(), ValidationError>;
}

/// Relative cost of running a validator, used by callers that need to
/// order or budget validation work (e.g. cheapest-first combinators).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationComplexity {
    Constant,
    Linear,
    Expensive,
}

/// Descriptive metadata about a validator, mostly useful for logging and
/// combinator introspection rather than runtime behavior.
#[derive(Debug, Clone)]
pub struct ValidatorMetadata {
    pub name: Cow<'static, str>,
    pub description: Option<Cow<'static, str>>,
    pub complexity: ValidationComplexity,
    pub cacheable: bool,
    pub tags: Vec<Cow<'static, str>>,
}

impl ValidatorMetadata {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            description: None,
            complexity: ValidationComplexity::Constant,
            cacheable: true,
            tags: Vec::new(),
        }
    }
}
