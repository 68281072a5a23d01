//! Label aggregation over an aligned response matrix
//!
//! This module contains the estimators:
//! - Majority vote with a seeded tie-break
//! - The binary latent class model fitted by EM
//! - Method selection and the combined result record

/// Binary latent class model and its EM fit
pub mod latent_class;
/// Majority vote baseline
pub mod majority;
/// Method selection and aggregation output
pub mod result;

pub use latent_class::{EmConfig, EmSummary, LatentClassModel, LatentClassParameters};
pub use majority::MajorityVote;
pub use result::{AggregationMethod, AggregationOptions, AggregationResult, aggregate};
