//! Evaluation of labelling runs against a reference run

/// Label distributions, index alignment and information loss distances
pub mod information_loss;

pub use information_loss::{Distance, align_rows, information_loss, label_distributions};
