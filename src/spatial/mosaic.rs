//! Seeded shuffling of subinstances into fixed-size mosaic canvases
//!
//! The permutation is drawn once from a generator seeded with the run seed,
//! so the same seed and subinstance count always reproduce the same mosaics.
//! The resulting [`MappingTable`] is the persisted bridge between clipping and
//! result alignment.

use crate::io::error::{Result, consistency_error};
use crate::spatial::geometry::{
    CellRect, ImageDims, MosaicLocation, OriginalLocation, SourceImage, TilingParams,
};
use crate::spatial::tiler::{Tiler, Tiling};
use log::info;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Placement of every cell after shuffling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicLayout {
    /// `permutation[slot]` is the subinstance placed in global slot `slot`
    pub permutation: Vec<usize>,
    /// Number of mosaic canvases
    pub num_mosaics: usize,
    /// Mosaic location of every cell, index-aligned with [`Tiling::cells`]
    pub locations: Vec<MosaicLocation>,
}

/// Packs permuted subinstances into mosaics
#[derive(Debug, Clone, Copy)]
pub struct MosaicAssembler {
    params: TilingParams,
}

impl MosaicAssembler {
    /// Create an assembler for the given run geometry
    pub const fn new(params: TilingParams) -> Self {
        Self { params }
    }

    /// Draw the seeded permutation of `count` subinstance indices
    pub fn permutation(&self, count: usize) -> Vec<usize> {
        let mut rng = StdRng::seed_from_u64(self.params.seed());
        let mut order: Vec<usize> = (0..count).collect();
        order.shuffle(&mut rng);
        order
    }

    /// Number of mosaics needed for `num_subinstances` windows
    pub const fn mosaic_count(&self, num_subinstances: usize) -> usize {
        num_subinstances.div_ceil(self.params.slots_per_mosaic())
    }

    /// Assign every cell of a tiling to a mosaic location
    ///
    /// Slots are filled in mosaic order, then row-major inside a mosaic; the
    /// last mosaic may be partially filled.
    ///
    /// # Errors
    ///
    /// Returns a `Consistency` error if the tiling's cell count does not match
    /// its subinstance count, or if some cell ends up without a placement
    pub fn assemble(&self, tiling: &Tiling) -> Result<MosaicLayout> {
        let num_subinstances = tiling.num_subinstances();
        let per_subinstance = self.params.cells_per_subinstance();
        if tiling.num_cells() != num_subinstances * per_subinstance {
            return Err(consistency_error(
                "mosaic assembly",
                &format!(
                    "{} cells do not split into {num_subinstances} subinstances of {per_subinstance}",
                    tiling.num_cells()
                ),
            ));
        }

        let size = self.params.subinstance_size();
        let clickable = self.params.clickable_size();
        let expand = self.params.expand();
        let side = self.params.num_to_combine();

        let permutation = self.permutation(num_subinstances);
        let num_mosaics = self.mosaic_count(num_subinstances);
        let mut placed: Vec<Option<MosaicLocation>> = vec![None; tiling.num_cells()];

        let mut slots = permutation.iter().copied();
        'mosaics: for mosaic_id in 0..num_mosaics {
            for i in 0..side {
                for j in 0..side {
                    let Some(subinstance) = slots.next() else {
                        break 'mosaics;
                    };
                    for l in 0..expand {
                        for m in 0..expand {
                            let cell = subinstance * per_subinstance + l * expand + m;
                            if let Some(slot) = placed.get_mut(cell) {
                                *slot = Some(MosaicLocation {
                                    mosaic_id,
                                    rect: CellRect::square(
                                        size * i + l * clickable,
                                        size * j + m * clickable,
                                        clickable,
                                    ),
                                });
                            }
                        }
                    }
                }
            }
        }

        let locations = placed
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                consistency_error("mosaic assembly", &"some cells were not placed in a mosaic")
            })?;

        Ok(MosaicLayout {
            permutation,
            num_mosaics,
            locations,
        })
    }
}

/// Persisted clipping state consumed by result alignment
///
/// `original_locations[i]` and `mosaic_locations[i]` describe the same cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    /// Run geometry and seed
    pub params: TilingParams,
    /// Source images in id order
    pub images: Vec<SourceImage>,
    /// Number of overlapping windows
    pub num_subinstances: usize,
    /// Number of mosaic canvases
    pub num_mosaics: usize,
    /// Cell placements in source images
    pub original_locations: Vec<OriginalLocation>,
    /// Cell placements in mosaics
    pub mosaic_locations: Vec<MosaicLocation>,
}

impl MappingTable {
    /// Tile the padded images and assemble mosaics in one pass
    ///
    /// # Errors
    ///
    /// Returns an error if tiling or assembly detects a consistency problem
    pub fn build(params: TilingParams, images: Vec<SourceImage>) -> Result<Self> {
        let dims: Vec<ImageDims> = images.iter().map(|image| image.padded).collect();
        let tiling = Tiler::new(params).tile(&dims)?;
        let layout = MosaicAssembler::new(params).assemble(&tiling)?;

        info!(
            "assembled {} subinstances into {} mosaics ({} slots each)",
            tiling.num_subinstances(),
            layout.num_mosaics,
            params.slots_per_mosaic()
        );

        Ok(Self {
            params,
            images,
            num_subinstances: tiling.num_subinstances(),
            num_mosaics: layout.num_mosaics,
            original_locations: tiling.cells,
            mosaic_locations: layout.locations,
        })
    }

    /// Number of cells in the table
    pub fn len(&self) -> usize {
        self.original_locations.len()
    }

    /// Whether the table holds no cells
    pub fn is_empty(&self) -> bool {
        self.original_locations.is_empty()
    }

    /// Iterate over (original, mosaic) placement pairs
    pub fn pairs(&self) -> impl Iterator<Item = (&OriginalLocation, &MosaicLocation)> {
        self.original_locations.iter().zip(&self.mosaic_locations)
    }

    /// Verify that a loaded table still describes a bijective mapping
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid, the two location lists
    /// are not index-aligned, a location references an unknown image or
    /// mosaic, or two cells share a mosaic location
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;

        let expected = self.num_subinstances * self.params.cells_per_subinstance();
        if self.original_locations.len() != expected || self.mosaic_locations.len() != expected {
            return Err(consistency_error(
                "mapping table",
                &format!(
                    "expected {expected} cells, found {} original and {} mosaic locations",
                    self.original_locations.len(),
                    self.mosaic_locations.len()
                ),
            ));
        }

        if let Some(bad) = self
            .original_locations
            .iter()
            .find(|location| location.image_id >= self.images.len())
        {
            return Err(consistency_error(
                "mapping table",
                &format!("cell references unknown image {}", bad.image_id),
            ));
        }

        let mut seen = HashSet::with_capacity(self.mosaic_locations.len());
        for location in &self.mosaic_locations {
            if location.mosaic_id >= self.num_mosaics {
                return Err(consistency_error(
                    "mapping table",
                    &format!("cell references unknown mosaic {}", location.mosaic_id),
                ));
            }
            if !seen.insert(*location) {
                return Err(consistency_error(
                    "mapping table",
                    &format!(
                        "two cells share mosaic {} at ({}, {})",
                        location.mosaic_id, location.rect.row, location.rect.col
                    ),
                ));
            }
        }

        Ok(())
    }
}
