//! Overlapping window decomposition of padded source images
//!
//! Windows of `subinstance_size` pixels are placed at a stride of half their
//! extent, so every region is fully interior to at least one window. Each
//! window is split into an `expand × expand` grid of clickable cells.

use crate::io::error::{Result, consistency_error};
use crate::spatial::geometry::{CellRect, ImageDims, OriginalLocation, TilingParams};
use log::{debug, info};

/// One overlapping window over a padded source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subinstance {
    /// Source image the window lies in
    pub image_id: usize,
    /// Top row of the window in pixels
    pub row: usize,
    /// Left column of the window in pixels
    pub col: usize,
}

/// Output of a tiling pass
///
/// `cells[s * expand² + l * expand + m]` is cell `(l, m)` of `subinstances[s]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiling {
    /// Windows in image, row, column order
    pub subinstances: Vec<Subinstance>,
    /// Original location of every cell, grouped by subinstance
    pub cells: Vec<OriginalLocation>,
}

impl Tiling {
    /// Number of windows produced
    pub fn num_subinstances(&self) -> usize {
        self.subinstances.len()
    }

    /// Number of cells produced
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }
}

/// Deterministic window and cell generator
#[derive(Debug, Clone, Copy)]
pub struct Tiler {
    params: TilingParams,
}

impl Tiler {
    /// Create a tiler for the given run geometry
    pub const fn new(params: TilingParams) -> Self {
        Self { params }
    }

    /// Number of half-overlapping windows along an axis of `extent` pixels
    ///
    /// Equals `ceil(2 * extent / subinstance_size - 1)`, clamped at zero.
    pub const fn window_count(&self, extent: usize) -> usize {
        let size = self.params.subinstance_size();
        if 2 * extent <= size {
            0
        } else {
            (2 * extent - 1) / size
        }
    }

    /// Total number of windows over a set of padded images
    ///
    /// A padded axis is a multiple of the step and at least one window long,
    /// so it holds `extent / step - 1` window origins.
    ///
    /// # Errors
    ///
    /// Returns a `Consistency` error if an axis is shorter than one window or
    /// not a multiple of the step
    pub fn expected_subinstances(&self, images: &[ImageDims]) -> Result<usize> {
        let step = self.params.step_size();
        let size = self.params.subinstance_size();
        let origins = |image_id: usize, extent: usize| {
            if extent < size || extent % step != 0 {
                return Err(consistency_error(
                    "tiling",
                    &format!(
                        "image {image_id} has an axis of {extent} px; \
                         images must be padded to a multiple of {step} of at least {size} first"
                    ),
                ));
            }
            Ok(extent / step - 1)
        };

        images
            .iter()
            .enumerate()
            .map(|(image_id, dims)| -> Result<usize> {
                Ok(origins(image_id, dims.rows)? * origins(image_id, dims.cols)?)
            })
            .sum()
    }

    /// Decompose padded images into subinstances and cells
    ///
    /// `images[i]` holds the padded dimensions of the image with id `i`.
    ///
    /// # Errors
    ///
    /// Returns a `Consistency` error if:
    /// - An image was not padded to the run geometry
    /// - The number of emitted windows differs from the stride count
    pub fn tile(&self, images: &[ImageDims]) -> Result<Tiling> {
        let step = self.params.step_size();
        let size = self.params.subinstance_size();
        let clickable = self.params.clickable_size();
        let expand = self.params.expand();

        let expected = self.expected_subinstances(images)?;
        let mut subinstances = Vec::with_capacity(expected);
        let mut cells = Vec::with_capacity(expected * self.params.cells_per_subinstance());

        for (image_id, dims) in images.iter().enumerate() {
            let num_rows = self.window_count(dims.rows);
            let num_cols = self.window_count(dims.cols);
            debug!(
                "image {image_id}: {}x{} px -> {num_rows}x{num_cols} windows",
                dims.rows, dims.cols
            );

            for j in 0..num_rows {
                for k in 0..num_cols {
                    let window = CellRect::square(step * j, step * k, size);
                    subinstances.push(Subinstance {
                        image_id,
                        row: window.row,
                        col: window.col,
                    });
                    for l in 0..expand {
                        for m in 0..expand {
                            cells.push(OriginalLocation {
                                image_id,
                                rect: CellRect::square(
                                    window.row + l * clickable,
                                    window.col + m * clickable,
                                    clickable,
                                ),
                            });
                        }
                    }
                }
            }
        }

        if subinstances.len() != expected {
            return Err(consistency_error(
                "tiling",
                &format!(
                    "emitted {} subinstances but the padded extents hold {expected}",
                    subinstances.len()
                ),
            ));
        }

        info!(
            "tiled {} images into {} subinstances and {} cells",
            images.len(),
            subinstances.len(),
            cells.len()
        );

        Ok(Tiling {
            subinstances,
            cells,
        })
    }
}
