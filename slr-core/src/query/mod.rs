//! Sparse dot-product query construction and top-k execution

mod builder;
mod collector;
mod executor;
mod impact;
mod scorer;
#[cfg(test)]
mod scoring_tests;

pub use builder::*;
pub use collector::*;
pub use executor::*;
pub use impact::*;
pub use scorer::*;
