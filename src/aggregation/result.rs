//! Aggregation method selection and the combined per-cell result

use crate::aggregation::latent_class::{EmConfig, LatentClassModel, LatentClassParameters};
use crate::aggregation::majority::MajorityVote;
use crate::alignment::matrix::{Label, ResponseMatrix};
use crate::io::configuration::{DEFAULT_EM_TOLERANCE, DEFAULT_LABEL_THRESHOLD, DEFAULT_SEED};
use crate::io::error::{Result, invalid_parameter};
use log::info;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy used to turn a response matrix into labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum AggregationMethod {
    /// Positive if any worker marked the cell
    #[value(name = "none")]
    #[serde(rename = "none")]
    AnyPositive,
    /// Sign of the vote total, ties broken by a seeded coin
    #[value(name = "mv")]
    #[serde(rename = "mv")]
    MajorityVote,
    /// Binary latent class model fitted by EM
    #[default]
    #[value(name = "lc")]
    #[serde(rename = "lc")]
    LatentClass,
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AnyPositive => "none",
            Self::MajorityVote => "mv",
            Self::LatentClass => "lc",
        };
        f.write_str(name)
    }
}

/// Settings shared by every aggregation method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationOptions {
    /// Strategy to run
    pub method: AggregationMethod,
    /// Seed of the majority vote tie-break coin
    pub seed: u64,
    /// Relative Q change at which EM stops
    pub tolerance: f64,
    /// Posterior threshold for a positive latent class label
    pub threshold: f64,
    /// EM iteration cap and validation mode
    pub em: EmConfig,
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            method: AggregationMethod::default(),
            seed: DEFAULT_SEED,
            tolerance: DEFAULT_EM_TOLERANCE,
            threshold: DEFAULT_LABEL_THRESHOLD,
            em: EmConfig::default(),
        }
    }
}

/// Estimated label of every unique cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Strategy that produced the labels
    pub method: AggregationMethod,
    /// `+1` / `-1` per cell, in unique cell order
    pub labels: Vec<Label>,
    /// Positive-class probability per cell where the method provides one
    pub probabilities: Vec<Option<f64>>,
    /// Fitted model parameters for the latent class method
    pub latent_class: Option<LatentClassParameters>,
}

impl AggregationResult {
    /// Indices of cells labelled positive
    pub fn positive_cells(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(cell, label)| label.is_positive().then_some(cell))
            .collect()
    }
}

/// Aggregate a response matrix with the configured method
///
/// # Errors
///
/// Returns an error if the threshold lies outside `[0, 1]`, or if the latent
/// class fit rejects the matrix or fails strict validation
pub fn aggregate(matrix: &ResponseMatrix, options: &AggregationOptions) -> Result<AggregationResult> {
    if !(0.0..=1.0).contains(&options.threshold) {
        return Err(invalid_parameter(
            "threshold",
            &options.threshold,
            &"must lie in [0, 1]",
        ));
    }

    let votes = MajorityVote::new(matrix);
    let result = match options.method {
        AggregationMethod::AnyPositive => AggregationResult {
            method: options.method,
            labels: votes.any_positive_labels(),
            probabilities: votes.soft_probabilities(),
            latent_class: None,
        },
        AggregationMethod::MajorityVote => {
            let mut rng = StdRng::seed_from_u64(options.seed);
            AggregationResult {
                method: options.method,
                labels: votes.labels(&mut rng),
                probabilities: votes.soft_probabilities(),
                latent_class: None,
            }
        }
        AggregationMethod::LatentClass => {
            let mut model = LatentClassModel::new(matrix, options.em)?;
            model.run_em(options.tolerance)?;
            AggregationResult {
                method: options.method,
                labels: model.estimated_labels(options.threshold),
                probabilities: model.posteriors().into_iter().map(Some).collect(),
                latent_class: model.parameters(),
            }
        }
    };

    info!(
        "{} aggregation labelled {} of {} cells positive",
        result.method,
        result.positive_cells().len(),
        result.labels.len()
    );
    Ok(result)
}
