//! Maps worker responses from mosaic grid coordinates back onto source cells
//!
//! Every response is resolved through the [`MosaicIndex`] built from the
//! mapping table, and every resolved placement is folded into its row of the
//! [`UniqueCellIndex`]. Coordinates that cannot be resolved are dropped and
//! counted rather than aborting the batch.

use crate::alignment::matrix::{Label, ResponseMatrix};
use crate::alignment::response::{WorkerResponse, parse_response};
use crate::io::error::Result;
use crate::spatial::geometry::{GridCoord, TilingParams};
use crate::spatial::index::{MosaicIndex, UniqueCellIndex};
use crate::spatial::mosaic::MappingTable;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How cells a worker did not mark are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NegativePolicy {
    /// Every unmarked cell of a shown mosaic is a negative judgment
    #[default]
    ClosedWorld,
    /// Only marked cells are recorded; unmarked cells stay unjudged
    PositiveOnly,
}

/// Per-batch counters collected while aligning responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Responses that carried a response string
    pub responses: usize,
    /// Records without a response string
    pub skipped_responses: usize,
    /// Positive judgments written to the matrix
    pub positives: usize,
    /// Negative judgments written to the matrix
    pub negatives: usize,
    /// Coordinates that did not resolve to any cell
    pub dropped: usize,
    /// Tokens that were neither an elapsed time nor a coordinate
    pub malformed_tokens: usize,
    /// Responses whose positives and negatives did not cover the grid exactly
    pub coverage_mismatches: usize,
    /// Judgments that overwrote an opposite judgment by the same worker
    pub conflicts: usize,
}

/// Aligned batch: cell index, worker columns and the response matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedResponses {
    /// Row order of the matrix
    pub cells: UniqueCellIndex,
    /// Column order of the matrix
    pub workers: Vec<String>,
    /// Judgments indexed by (cell, worker)
    pub matrix: ResponseMatrix,
    /// Counters of the alignment pass
    pub report: AlignmentReport,
}

/// Converts raw worker responses into a deduplicated response matrix
#[derive(Debug, Clone)]
pub struct ResponseAligner {
    params: TilingParams,
    index: MosaicIndex,
    cells: UniqueCellIndex,
    policy: NegativePolicy,
}

impl ResponseAligner {
    /// Build the lookups for a mapping table
    ///
    /// # Errors
    ///
    /// Returns an error if the table is inconsistent or maps two cells onto
    /// the same mosaic location
    pub fn new(table: &MappingTable, policy: NegativePolicy) -> Result<Self> {
        table.validate()?;
        let index = MosaicIndex::new(table)?;
        let cells = UniqueCellIndex::from_locations(&table.original_locations);

        info!(
            "indexed {} cells ({} unique) across {} mosaics",
            index.len(),
            cells.len(),
            table.num_mosaics
        );

        Ok(Self {
            params: table.params,
            index,
            cells,
            policy,
        })
    }

    /// Unique cells that rows of the produced matrix refer to
    pub const fn cells(&self) -> &UniqueCellIndex {
        &self.cells
    }

    /// Active negative policy
    pub const fn policy(&self) -> NegativePolicy {
        self.policy
    }

    /// Align a batch of responses
    ///
    /// Workers become columns in order of first appearance, including workers
    /// whose records carry no response string. When a worker judges the same
    /// unique cell more than once, the later judgment wins; within a response
    /// positives are written before negatives.
    pub fn align(&self, responses: &[WorkerResponse]) -> AlignedResponses {
        let mut workers: Vec<String> = Vec::new();
        let mut columns: HashMap<&str, usize> = HashMap::new();
        for record in responses {
            if !columns.contains_key(record.worker_id.as_str()) {
                columns.insert(record.worker_id.as_str(), workers.len());
                workers.push(record.worker_id.clone());
            }
        }

        let grid_size = self.params.mosaic_grid_size();
        let mut matrix = ResponseMatrix::new(self.cells.len(), workers.len());
        let mut report = AlignmentReport::default();

        for record in responses {
            let (Some(raw), Some(&worker)) = (
                record.response.as_deref(),
                columns.get(record.worker_id.as_str()),
            ) else {
                report.skipped_responses += 1;
                continue;
            };
            report.responses += 1;

            let parsed = parse_response(raw);
            if !parsed.malformed.is_empty() {
                debug!(
                    "worker {} mosaic {}: ignoring malformed tokens {:?}",
                    record.worker_id, record.mosaic_id, parsed.malformed
                );
                report.malformed_tokens += parsed.malformed.len();
            }

            let negatives: Vec<GridCoord> = match self.policy {
                NegativePolicy::ClosedWorld => GridCoord::all(grid_size)
                    .filter(|coord| !parsed.positives.contains(coord))
                    .collect(),
                NegativePolicy::PositiveOnly => Vec::new(),
            };

            if self.policy == NegativePolicy::ClosedWorld
                && parsed.positives.len() + negatives.len() != grid_size * grid_size
            {
                warn!(
                    "worker {} mosaic {}: {} positives and {} negatives do not cover the {grid_size}x{grid_size} grid",
                    record.worker_id,
                    record.mosaic_id,
                    parsed.positives.len(),
                    negatives.len()
                );
                report.coverage_mismatches += 1;
            }

            let judgments = parsed
                .positives
                .iter()
                .map(|&coord| (coord, Label::Positive))
                .chain(negatives.into_iter().map(|coord| (coord, Label::Negative)));

            let mut dropped = 0;
            for (coord, label) in judgments {
                let Some(row) = self
                    .index
                    .resolve_grid(record.mosaic_id, coord)
                    .and_then(|location| self.cells.position(&location))
                else {
                    debug!(
                        "worker {} mosaic {}: no cell at {coord}",
                        record.worker_id, record.mosaic_id
                    );
                    dropped += 1;
                    continue;
                };

                if matrix
                    .set(row, worker, label)
                    .is_some_and(|previous| previous != label)
                {
                    report.conflicts += 1;
                }
                match label {
                    Label::Positive => report.positives += 1,
                    Label::Negative => report.negatives += 1,
                }
            }

            if dropped > 0 {
                warn!(
                    "worker {} mosaic {}: dropped {dropped} unresolvable coordinates",
                    record.worker_id, record.mosaic_id
                );
                report.dropped += dropped;
            }
        }

        info!(
            "aligned {} responses from {} workers: {} positive, {} negative, {} dropped, {} conflicts",
            report.responses,
            workers.len(),
            report.positives,
            report.negatives,
            report.dropped,
            report.conflicts
        );

        AlignedResponses {
            cells: self.cells.clone(),
            workers,
            matrix,
            report,
        }
    }
}
