//! Conversion of raw worker responses into a response matrix
//!
//! This module contains the result alignment stage:
//! - Response record and response string parsing
//! - The cell-by-worker judgment matrix
//! - Resolution of grid coordinates back to unique source cells

/// Mosaic-to-source resolution and deduplication of judgments
pub mod aligner;
/// Cell-by-worker judgment matrix
pub mod matrix;
/// Worker response records and parsing
pub mod response;

pub use aligner::{AlignedResponses, AlignmentReport, NegativePolicy, ResponseAligner};
pub use matrix::{Label, ResponseMatrix};
pub use response::{WorkerResponse, parse_response};
