//! Spatial decomposition of source images into shuffled mosaics
//!
//! This module contains the clipping engine:
//! - Run geometry and placement records
//! - Overlapping window tiling
//! - Seeded mosaic assembly and the persisted mapping table
//! - Hash indexes for inverting the mapping

/// Run parameters, image dimensions and cell placement records
pub mod geometry;
/// Lookups from mosaic placements and deduplicated cell indexes
pub mod index;
/// Seeded mosaic assembly and the persisted mapping table
pub mod mosaic;
/// Overlapping window and cell generation
pub mod tiler;

pub use geometry::{CellRect, GridCoord, MosaicLocation, OriginalLocation, TilingParams};
pub use index::{MosaicIndex, UniqueCellIndex};
pub use mosaic::{MappingTable, MosaicAssembler};
pub use tiler::Tiler;
