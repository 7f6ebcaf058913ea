//! Combinators that build larger validators out of smaller ones.

mod and;
mod not;
mod or;

pub use and::{And, AndAll, and_all};
pub use not::{Not, not};
pub use or::Or;
