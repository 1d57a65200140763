//! Consensus rules

pub mod validation;

pub use validation::BlockValidator;
