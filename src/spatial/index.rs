//! Constant-time lookups over the mapping tables
//!
//! [`MosaicIndex`] inverts the clipping step (mosaic placement to original
//! placement). [`UniqueCellIndex`] collapses cells that overlapping windows
//! cut from the same source region into one canonical row.

use crate::io::error::{Result, consistency_error};
use crate::spatial::geometry::{GridCoord, MosaicLocation, OriginalLocation};
use crate::spatial::mosaic::MappingTable;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Hash map from mosaic placement back to original placement
#[derive(Debug, Clone)]
pub struct MosaicIndex {
    by_mosaic: HashMap<MosaicLocation, OriginalLocation>,
    clickable_size: usize,
}

impl MosaicIndex {
    /// Index every cell of a mapping table
    ///
    /// # Errors
    ///
    /// Returns a `Consistency` error if two cells share a mosaic location
    pub fn new(table: &MappingTable) -> Result<Self> {
        let mut by_mosaic = HashMap::with_capacity(table.len());
        for (original, mosaic) in table.pairs() {
            if by_mosaic.insert(*mosaic, *original).is_some() {
                return Err(consistency_error(
                    "mosaic index",
                    &format!(
                        "mosaic {} holds two cells at ({}, {})",
                        mosaic.mosaic_id, mosaic.rect.row, mosaic.rect.col
                    ),
                ));
            }
        }

        Ok(Self {
            by_mosaic,
            clickable_size: table.params.clickable_size(),
        })
    }

    /// Original placement of the cell at a mosaic placement
    pub fn resolve(&self, location: &MosaicLocation) -> Option<OriginalLocation> {
        self.by_mosaic.get(location).copied()
    }

    /// Original placement of the cell a worker addressed by grid coordinate
    ///
    /// Returns `None` for coordinates outside every placed subinstance, such
    /// as the empty slots of a partially filled mosaic.
    pub fn resolve_grid(&self, mosaic_id: usize, coord: GridCoord) -> Option<OriginalLocation> {
        self.resolve(&MosaicLocation {
            mosaic_id,
            rect: coord.to_rect(self.clickable_size),
        })
    }

    /// Number of indexed cells
    pub fn len(&self) -> usize {
        self.by_mosaic.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.by_mosaic.is_empty()
    }
}

/// Deduplicated, ordered set of original cell placements
///
/// Row `i` of a response matrix refers to `locations()[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<OriginalLocation>", into = "Vec<OriginalLocation>")]
pub struct UniqueCellIndex {
    locations: Vec<OriginalLocation>,
    positions: HashMap<OriginalLocation, usize>,
}

impl UniqueCellIndex {
    /// Collapse duplicate placements into a sorted canonical list
    pub fn from_locations<'a, I>(locations: I) -> Self
    where
        I: IntoIterator<Item = &'a OriginalLocation>,
    {
        let unique: BTreeSet<OriginalLocation> = locations.into_iter().copied().collect();
        Self::from(unique.into_iter().collect::<Vec<_>>())
    }

    /// Row of a placement, if present
    pub fn position(&self, location: &OriginalLocation) -> Option<usize> {
        self.positions.get(location).copied()
    }

    /// Whether a placement is present
    pub fn contains(&self, location: &OriginalLocation) -> bool {
        self.positions.contains_key(location)
    }

    /// Placements in row order
    pub fn locations(&self) -> &[OriginalLocation] {
        &self.locations
    }

    /// Placement at a row
    pub fn get(&self, row: usize) -> Option<&OriginalLocation> {
        self.locations.get(row)
    }

    /// Number of unique cells
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether there are no cells
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

// Keeps the given order; later repeats of a placement are dropped
impl From<Vec<OriginalLocation>> for UniqueCellIndex {
    fn from(locations: Vec<OriginalLocation>) -> Self {
        let mut positions = HashMap::with_capacity(locations.len());
        let mut ordered = Vec::with_capacity(locations.len());
        for location in locations {
            if !positions.contains_key(&location) {
                positions.insert(location, ordered.len());
                ordered.push(location);
            }
        }
        Self {
            locations: ordered,
            positions,
        }
    }
}

impl From<UniqueCellIndex> for Vec<OriginalLocation> {
    fn from(index: UniqueCellIndex) -> Self {
        index.locations
    }
}
