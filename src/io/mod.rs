//! Input/output stack around the pipeline core
//!
//! This module contains everything that touches the outside world:
//! - Error types and run constants
//! - Command-line parsing and stage orchestration
//! - Image decoding, mosaic rendering and masked exports
//! - JSON persistence of mapping tables and results
//! - Progress display

/// Command-line interface and stage runner
pub mod cli;
/// Pipeline constants and defaults
pub mod configuration;
/// Error types and helpers
pub mod error;
/// Source image loading and rendering
pub mod image;
/// JSON records exchanged between stages
pub mod persistence;
/// Progress bars for long-running stages
pub mod progress;
