//! JSON records passed between pipeline stages

use crate::aggregation::result::AggregationResult;
use crate::alignment::aligner::AlignedResponses;
use crate::alignment::matrix::Label;
use crate::alignment::response::WorkerResponse;
use crate::io::error::{PipelineError, Result, WithPath};
use crate::spatial::index::UniqueCellIndex;
use crate::spatial::mosaic::MappingTable;
use log::info;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Aggregation output written next to the converted responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationOutput {
    /// Row order of the labels
    pub cells: UniqueCellIndex,
    /// Column order of the fitted worker parameters
    pub workers: Vec<String>,
    /// Labels and fitted parameters
    pub result: AggregationResult,
}

#[derive(Deserialize)]
struct LabelRecord {
    cells: UniqueCellIndex,
    result: LabelList,
}

#[derive(Deserialize)]
struct LabelList {
    labels: Vec<Label>,
}

/// Write a record as pretty-printed JSON, creating parent directories
///
/// # Errors
///
/// Returns an error if the file cannot be created or the record fails to encode
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }

    let file = File::create(path).map_err(|e| PipelineError::FileSystem {
        path: path.to_path_buf(),
        operation: "create file",
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).with_path(path)?;
    writer.flush().map_err(|e| PipelineError::FileSystem {
        path: path.to_path_buf(),
        operation: "write file",
        source: e,
    })
}

/// Read a JSON record
///
/// # Errors
///
/// Returns an error if the file cannot be opened or does not decode
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| PipelineError::FileSystem {
        path: path.to_path_buf(),
        operation: "open file",
        source: e,
    })?;
    serde_json::from_reader(BufReader::new(file)).with_path(path)
}

/// Read a mapping table and check that it still describes a bijection
///
/// # Errors
///
/// Returns an error if the file is unreadable or the table is inconsistent
pub fn load_mapping(path: &Path) -> Result<MappingTable> {
    let table: MappingTable = read_json(path)?;
    table.validate()?;
    info!(
        "loaded mapping of {} cells over {} images and {} mosaics",
        table.len(),
        table.images.len(),
        table.num_mosaics
    );
    Ok(table)
}

/// Read a worker response export
///
/// # Errors
///
/// Returns an error if the file is unreadable or malformed
pub fn load_responses(path: &Path) -> Result<Vec<WorkerResponse>> {
    let responses: Vec<WorkerResponse> = read_json(path)?;
    info!("loaded {} response records", responses.len());
    Ok(responses)
}

/// Read a converted response batch
///
/// # Errors
///
/// Returns an error if the file is unreadable, malformed, or its matrix does
/// not match its cell and worker lists
pub fn load_converted(path: &Path) -> Result<AlignedResponses> {
    let aligned: AlignedResponses = read_json(path)?;
    let shape = (aligned.matrix.num_cells(), aligned.matrix.num_workers());
    // An empty matrix decodes with zero columns regardless of the worker list
    let workers_match = aligned.matrix.num_cells() == 0 || shape.1 == aligned.workers.len();
    if shape.0 != aligned.cells.len() || !workers_match {
        return Err(PipelineError::Alignment {
            expected: aligned.cells.len(),
            found: shape.0,
            reason: format!(
                "matrix of {}x{} does not match {} cells and {} workers in {}",
                shape.0,
                shape.1,
                aligned.cells.len(),
                aligned.workers.len(),
                path.display()
            ),
        });
    }
    Ok(aligned)
}

/// Read the cell index and labels of an aggregation output
///
/// Fitted parameters are skipped, so outputs of every method load the same way.
///
/// # Errors
///
/// Returns an error if the file is unreadable, malformed, or holds a
/// different number of labels than cells
pub fn load_labels(path: &Path) -> Result<(UniqueCellIndex, Vec<Label>)> {
    let record: LabelRecord = read_json(path)?;
    if record.cells.len() != record.result.labels.len() {
        return Err(PipelineError::Alignment {
            expected: record.cells.len(),
            found: record.result.labels.len(),
            reason: format!("label count does not match the cell index in {}", path.display()),
        });
    }
    Ok((record.cells, record.result.labels))
}
