//! Cell-by-worker matrix of binary judgments
//!
//! An entry is `Some(label)` when the worker judged the cell and `None` when
//! they never did, so a missing judgment can never be confused with a tie.
//! On disk the matrix uses the signed convention `+1` / `-1` / `0`.

use crate::io::error::{PipelineError, Result, invalid_parameter};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A binary judgment or estimate for one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Label {
    /// The cell contains the region of interest (`+1`)
    Positive,
    /// The cell does not contain it (`-1`)
    Negative,
}

impl Label {
    /// Signed value of the label
    pub const fn sign(self) -> i8 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    /// Label of a signed score, `None` for zero
    pub const fn from_score(score: i64) -> Option<Self> {
        if score > 0 {
            Some(Self::Positive)
        } else if score < 0 {
            Some(Self::Negative)
        } else {
            None
        }
    }

    /// Whether the label is positive
    pub const fn is_positive(self) -> bool {
        matches!(self, Self::Positive)
    }
}

impl From<Label> for i8 {
    fn from(label: Label) -> Self {
        label.sign()
    }
}

impl TryFrom<i8> for Label {
    type Error = PipelineError;

    fn try_from(value: i8) -> Result<Self> {
        match value {
            1 => Ok(Self::Positive),
            -1 => Ok(Self::Negative),
            _ => Err(invalid_parameter("label", &value, &"must be +1 or -1")),
        }
    }
}

/// Decode one signed matrix entry
///
/// # Errors
///
/// Returns an error for values other than `-1`, `0` and `+1`
pub fn entry_from_sign(value: i8) -> Result<Option<Label>> {
    match value {
        0 => Ok(None),
        other => Label::try_from(other).map(Some),
    }
}

/// Encode one matrix entry as `+1` / `-1` / `0`
pub fn entry_to_sign(entry: Option<Label>) -> i8 {
    entry.map_or(0, Label::sign)
}

/// Judgments indexed by (unique cell, worker)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<i8>>", into = "Vec<Vec<i8>>")]
pub struct ResponseMatrix {
    entries: Array2<Option<Label>>,
}

impl ResponseMatrix {
    /// Create a matrix with no judgments
    pub fn new(num_cells: usize, num_workers: usize) -> Self {
        Self {
            entries: Array2::from_elem((num_cells, num_workers), None),
        }
    }

    /// Build a matrix from signed rows, one row per cell
    ///
    /// # Errors
    ///
    /// Returns an error if rows have different lengths or contain values
    /// other than `-1`, `0` and `+1`
    pub fn from_signed_rows(rows: &[Vec<i8>]) -> Result<Self> {
        let num_workers = rows.first().map_or(0, Vec::len);
        let mut matrix = Self::new(rows.len(), num_workers);

        for (cell, row) in rows.iter().enumerate() {
            if row.len() != num_workers {
                return Err(invalid_parameter(
                    "response matrix",
                    &format!("row {cell} has {} entries", row.len()),
                    &format!("every row must have {num_workers} entries"),
                ));
            }
            for (worker, &value) in row.iter().enumerate() {
                if let Some(label) = entry_from_sign(value)? {
                    matrix.set(cell, worker, label);
                }
            }
        }

        Ok(matrix)
    }

    /// Signed rows, one per cell
    pub fn to_signed_rows(&self) -> Vec<Vec<i8>> {
        self.entries
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|&entry| entry_to_sign(entry)).collect())
            .collect()
    }

    /// Number of unique cells (rows)
    pub fn num_cells(&self) -> usize {
        self.entries.nrows()
    }

    /// Number of workers (columns)
    pub fn num_workers(&self) -> usize {
        self.entries.ncols()
    }

    /// Judgment of a worker on a cell
    pub fn get(&self, cell: usize, worker: usize) -> Option<Label> {
        self.entries.get((cell, worker)).copied().flatten()
    }

    /// Record a judgment and return the one it replaced
    ///
    /// Out-of-range positions are ignored.
    pub fn set(&mut self, cell: usize, worker: usize, label: Label) -> Option<Label> {
        self.entries
            .get_mut((cell, worker))
            .and_then(|entry| entry.replace(label))
    }

    /// All judgments on one cell, one entry per worker
    pub fn cell(&self, cell: usize) -> ArrayView1<'_, Option<Label>> {
        self.entries.row(cell)
    }

    /// Judged entries of one worker as (cell, label) pairs
    pub fn worker_judgments(&self, worker: usize) -> impl Iterator<Item = (usize, Label)> + '_ {
        self.entries
            .column(worker)
            .into_iter()
            .enumerate()
            .filter_map(|(cell, entry)| entry.map(|label| (cell, label)))
    }

    /// Judged entries of one cell as (worker, label) pairs
    pub fn cell_judgments(&self, cell: usize) -> impl Iterator<Item = (usize, Label)> + '_ {
        self.entries
            .row(cell)
            .into_iter()
            .enumerate()
            .filter_map(|(worker, entry)| entry.map(|label| (worker, label)))
    }

    /// Positive and negative judgment counts on one cell
    pub fn counts(&self, cell: usize) -> (usize, usize) {
        self.cell_judgments(cell)
            .fold((0, 0), |(pos, neg), (_, label)| match label {
                Label::Positive => (pos + 1, neg),
                Label::Negative => (pos, neg + 1),
            })
    }

    /// Sum of signed judgments on one cell
    pub fn score(&self, cell: usize) -> i64 {
        self.cell_judgments(cell)
            .map(|(_, label)| i64::from(label.sign()))
            .sum()
    }

    /// Total number of judged entries
    pub fn num_judgments(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }
}

impl TryFrom<Vec<Vec<i8>>> for ResponseMatrix {
    type Error = PipelineError;

    fn try_from(rows: Vec<Vec<i8>>) -> Result<Self> {
        Self::from_signed_rows(&rows)
    }
}

impl From<ResponseMatrix> for Vec<Vec<i8>> {
    fn from(matrix: ResponseMatrix) -> Self {
        matrix.to_signed_rows()
    }
}
