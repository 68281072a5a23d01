//! Mathematical utilities for the aggregation models

/// Numerically stable arithmetic on log-probabilities
pub mod logspace;
