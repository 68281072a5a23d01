//! Information loss of a labelling run against a ground-truth run
//!
//! Both runs are turned into smoothed per-cell label distributions, the
//! ground truth rows are reordered onto the target's unique cell index, and
//! the per-cell distances are averaged.

use crate::alignment::matrix::{Label, ResponseMatrix};
use crate::io::error::{PipelineError, Result, computation_error, invalid_parameter};
use crate::spatial::index::UniqueCellIndex;
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column of the negative label in a distribution table
const NEGATIVE_COLUMN: usize = 0;
/// Column of the positive label in a distribution table
const POSITIVE_COLUMN: usize = 1;

/// Distance between two label distributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Half the L1 norm of the difference (total variation)
    L1,
    /// Half the Euclidean norm of the difference
    L2,
    /// Kullback-Leibler divergence of the reference from the target, in bits
    #[default]
    Kl,
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::Kl => "kl",
        };
        f.write_str(name)
    }
}

impl Distance {
    /// Distance between a target row and a reference row
    pub fn between(self, target: ArrayView1<'_, f64>, reference: ArrayView1<'_, f64>) -> f64 {
        let pairs = target.iter().zip(reference.iter());
        match self {
            Self::L1 => 0.5 * pairs.map(|(p, q)| (p - q).abs()).sum::<f64>(),
            Self::L2 => 0.5 * pairs.map(|(p, q)| (p - q).powi(2)).sum::<f64>().sqrt(),
            Self::Kl => pairs
                .filter(|&(_, &q)| q != 0.0)
                .map(|(p, q)| q * (q / p).log2())
                .sum(),
        }
    }
}

/// Smoothed empirical label distribution of every cell
///
/// Row `i` holds `[Pr(-1), Pr(+1)]` for cell `i`, estimated from its
/// judgments plus `smoothing` pseudo-counts per label. A row without any mass
/// (no judgments and no smoothing) is uniform.
///
/// # Errors
///
/// Returns an error if `smoothing` is negative or not finite
pub fn label_distributions(matrix: &ResponseMatrix, smoothing: f64) -> Result<Array2<f64>> {
    if !smoothing.is_finite() || smoothing < 0.0 {
        return Err(invalid_parameter(
            "smoothing",
            &smoothing,
            &"must be finite and non-negative",
        ));
    }

    let mut counts = Array2::from_elem((matrix.num_cells(), 2), smoothing);
    for (cell, mut row) in counts.axis_iter_mut(Axis(0)).enumerate() {
        for (_, label) in matrix.cell_judgments(cell) {
            let column = match label {
                Label::Negative => NEGATIVE_COLUMN,
                Label::Positive => POSITIVE_COLUMN,
            };
            if let Some(count) = row.get_mut(column) {
                *count += 1.0;
            }
        }

        let total = row.sum();
        if total > 0.0 {
            row /= total;
        } else {
            row.fill(0.5);
        }
    }

    Ok(counts)
}

/// Reorder reference rows so that row `i` describes `target.locations()[i]`
///
/// # Errors
///
/// Returns an `Alignment` error if the two indexes differ in size, if a target
/// cell is missing from the reference index, or if `rows` does not match the
/// reference index
pub fn align_rows(
    target: &UniqueCellIndex,
    reference: &UniqueCellIndex,
    rows: &Array2<f64>,
) -> Result<Array2<f64>> {
    if target.len() != reference.len() {
        return Err(PipelineError::Alignment {
            expected: target.len(),
            found: reference.len(),
            reason: "cell indexes have different lengths".to_owned(),
        });
    }
    if rows.nrows() != reference.len() {
        return Err(PipelineError::Alignment {
            expected: reference.len(),
            found: rows.nrows(),
            reason: "distribution rows do not match the reference index".to_owned(),
        });
    }

    let order = target
        .locations()
        .iter()
        .map(|location| {
            reference
                .position(location)
                .ok_or_else(|| PipelineError::Alignment {
                    expected: target.len(),
                    found: reference.len(),
                    reason: format!(
                        "cell of image {} at ({}, {}) is missing from the reference",
                        location.image_id, location.rect.row, location.rect.col
                    ),
                })
        })
        .collect::<Result<Vec<usize>>>()?;

    Ok(rows.select(Axis(0), &order))
}

/// Mean per-cell distance between two aligned distribution tables
///
/// # Errors
///
/// Returns an `Alignment` error if the tables differ in shape or are empty,
/// and a `Computation` error if any cell's distance is infinite, which happens
/// for KL when a target probability is zero where the reference has mass
pub fn information_loss(
    target: &Array2<f64>,
    reference: &Array2<f64>,
    distance: Distance,
) -> Result<f64> {
    if target.dim() != reference.dim() || target.nrows() == 0 {
        return Err(PipelineError::Alignment {
            expected: target.nrows(),
            found: reference.nrows(),
            reason: "distribution tables must have the same non-empty shape".to_owned(),
        });
    }

    let distances: Vec<f64> = target
        .axis_iter(Axis(0))
        .zip(reference.axis_iter(Axis(0)))
        .map(|(p, q)| distance.between(p, q))
        .collect();

    let infinite = distances.iter().filter(|d| !d.is_finite()).count();
    if infinite > 0 {
        return Err(computation_error(
            "information loss",
            &format!(
                "{infinite} of {} cells have an infinite {distance} distance; use a positive smoothing",
                distances.len()
            ),
        ));
    }

    Ok(distances.iter().sum::<f64>() / distances.len() as f64)
}
