//! Majority vote baseline over a response matrix

use crate::alignment::matrix::{Label, ResponseMatrix};
use crate::math::logspace::{LN_HALF, ln_or_neg_infinity};
use ndarray::Array2;
use rand::Rng;

/// Unweighted vote of every worker that judged a cell
#[derive(Debug, Clone, Copy)]
pub struct MajorityVote<'a> {
    matrix: &'a ResponseMatrix,
}

impl<'a> MajorityVote<'a> {
    /// Vote over the given matrix
    pub const fn new(matrix: &'a ResponseMatrix) -> Self {
        Self { matrix }
    }

    /// Signed vote total of every cell
    pub fn scores(&self) -> Vec<i64> {
        (0..self.matrix.num_cells())
            .map(|cell| self.matrix.score(cell))
            .collect()
    }

    /// Fraction of positive judgments per cell, `None` where nobody judged
    pub fn soft_probabilities(&self) -> Vec<Option<f64>> {
        (0..self.matrix.num_cells())
            .map(|cell| {
                let (pos, neg) = self.matrix.counts(cell);
                let total = pos + neg;
                (total > 0).then(|| pos as f64 / total as f64)
            })
            .collect()
    }

    /// Log-probabilities of the positive (row 0) and negative (row 1) class
    ///
    /// Cells without judgments get `ln 0.5` for both classes.
    pub fn log_probabilities(&self) -> Array2<f64> {
        let num_cells = self.matrix.num_cells();
        let mut log_probs = Array2::from_elem((2, num_cells), LN_HALF);

        for cell in 0..num_cells {
            let (pos, neg) = self.matrix.counts(cell);
            let total = pos + neg;
            if total == 0 {
                continue;
            }
            let positive = ln_or_neg_infinity(pos as f64 / total as f64);
            let negative = ln_or_neg_infinity(neg as f64 / total as f64);
            if let Some(slot) = log_probs.get_mut([0, cell]) {
                *slot = positive;
            }
            if let Some(slot) = log_probs.get_mut([1, cell]) {
                *slot = negative;
            }
        }

        log_probs
    }

    /// Label of every cell, ties broken by a fair coin
    ///
    /// Cells nobody judged are ties as well.
    pub fn labels<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Label> {
        self.scores()
            .into_iter()
            .map(|score| {
                Label::from_score(score).unwrap_or_else(|| {
                    if rng.random_bool(0.5) {
                        Label::Positive
                    } else {
                        Label::Negative
                    }
                })
            })
            .collect()
    }

    /// Positive wherever at least one worker marked the cell
    pub fn any_positive_labels(&self) -> Vec<Label> {
        (0..self.matrix.num_cells())
            .map(|cell| {
                if self.matrix.counts(cell).0 > 0 {
                    Label::Positive
                } else {
                    Label::Negative
                }
            })
            .collect()
    }
}
