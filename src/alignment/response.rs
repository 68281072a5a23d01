//! Worker response records and the response string parser
//!
//! A response string looks like `"46.899 06_07 07_07"`: the elapsed time in
//! seconds followed by the grid coordinates the worker marked positive.

use crate::spatial::geometry::GridCoord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One worker's answer for one mosaic, as exported by the worker platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    /// Platform identifier of the worker
    pub worker_id: String,
    /// Mosaic the worker was shown
    pub mosaic_id: usize,
    /// Raw response string, `None` if the worker skipped this mosaic
    #[serde(default)]
    pub response: Option<String>,
}

impl WorkerResponse {
    /// Create a response record
    pub fn new(worker_id: impl Into<String>, mosaic_id: usize, response: Option<&str>) -> Self {
        Self {
            worker_id: worker_id.into(),
            mosaic_id,
            response: response.map(str::to_owned),
        }
    }
}

/// Parsed content of a response string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Elapsed time reported by the interface, if readable
    pub elapsed: Option<f64>,
    /// Distinct coordinates marked positive
    pub positives: BTreeSet<GridCoord>,
    /// Tokens that could not be read as `<row>_<col>`
    pub malformed: Vec<String>,
}

/// Parse a raw response string
///
/// The first token is always the elapsed time. Repeated coordinates collapse
/// into one. Unreadable tokens are collected rather than rejected so that the
/// caller can count and report them.
pub fn parse_response(raw: &str) -> ParsedResponse {
    let mut tokens = raw.split_whitespace();
    let mut parsed = ParsedResponse::default();

    if let Some(first) = tokens.next() {
        match first.parse::<f64>() {
            Ok(elapsed) if elapsed.is_finite() => parsed.elapsed = Some(elapsed),
            _ => parsed.malformed.push(first.to_owned()),
        }
    }

    for token in tokens {
        match parse_coordinate(token) {
            Some(coord) => {
                parsed.positives.insert(coord);
            }
            None => parsed.malformed.push(token.to_owned()),
        }
    }

    parsed
}

/// Parse a single `<row>_<col>` token
pub fn parse_coordinate(token: &str) -> Option<GridCoord> {
    let (row, col) = token.split_once('_')?;
    Some(GridCoord::new(row.parse().ok()?, col.parse().ok()?))
}
