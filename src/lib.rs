//! Overlapping mosaic clipping and crowd label aggregation
//!
//! Large images are carved into half-overlapping windows that are shuffled
//! into mosaics, so that workers judge small regions without seeing whole
//! originals. Their judgments are mapped back onto the source geometry,
//! deduplicated across overlapping windows, and fused into one label per
//! region by majority vote or by a binary latent class model fitted with EM.

#![forbid(unsafe_code)]

/// Majority vote and latent class estimators over a response matrix
pub mod aggregation;
/// Parsing and alignment of worker responses onto unique source cells
pub mod alignment;
/// Information loss of a labelling run against a reference run
pub mod analysis;
/// Input/output operations and error handling
pub mod io;
/// Log-space arithmetic for the latent class model
pub mod math;
/// Window tiling, mosaic assembly and the mappings between them
pub mod spatial;

pub use io::error::{PipelineError, Result};
