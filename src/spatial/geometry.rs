//! Run parameters and cell placement records in both coordinate spaces
//!
//! A cell is addressed by an [`OriginalLocation`] in its source image and by a
//! [`MosaicLocation`] in the canvas shown to workers. Both wrap the same
//! axis-aligned [`CellRect`], so the two tables produced at clipping time can
//! be compared and hashed directly.

use crate::io::error::{Result, invalid_parameter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geometry and seed shared by every stage of one clipping run
///
/// Construct through [`TilingParams::new`] so that the divisibility
/// invariants hold; deserialized values must be re-checked with
/// [`TilingParams::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilingParams {
    subinstance_size: usize,
    clickable_size: usize,
    num_to_combine: usize,
    seed: u64,
}

impl TilingParams {
    /// Create validated run parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `subinstance_size` is zero or odd
    /// - `clickable_size` is zero or does not divide `subinstance_size`
    /// - `num_to_combine` is zero
    pub fn new(
        subinstance_size: usize,
        clickable_size: usize,
        num_to_combine: usize,
        seed: u64,
    ) -> Result<Self> {
        let params = Self {
            subinstance_size,
            clickable_size,
            num_to_combine,
            seed,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the geometric invariants
    ///
    /// # Errors
    ///
    /// Returns an `InvalidParameter` error naming the first violated invariant
    pub fn validate(&self) -> Result<()> {
        if self.subinstance_size == 0 || self.subinstance_size % 2 != 0 {
            return Err(invalid_parameter(
                "subinstance_size",
                &self.subinstance_size,
                &"must be a positive even number",
            ));
        }
        if self.clickable_size == 0 {
            return Err(invalid_parameter(
                "clickable_size",
                &self.clickable_size,
                &"must be positive",
            ));
        }
        if self.subinstance_size % self.clickable_size != 0 {
            return Err(invalid_parameter(
                "clickable_size",
                &self.clickable_size,
                &format!("must divide subinstance_size ({})", self.subinstance_size),
            ));
        }
        if self.num_to_combine == 0 {
            return Err(invalid_parameter(
                "num_to_combine",
                &self.num_to_combine,
                &"must be positive",
            ));
        }
        Ok(())
    }

    /// Side length of a clipping window in pixels
    pub const fn subinstance_size(&self) -> usize {
        self.subinstance_size
    }

    /// Side length of a clickable cell in pixels
    pub const fn clickable_size(&self) -> usize {
        self.clickable_size
    }

    /// Number of subinstances along one side of a mosaic
    pub const fn num_to_combine(&self) -> usize {
        self.num_to_combine
    }

    /// Seed of the mosaic permutation
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Stride between neighbouring windows (half a window)
    pub const fn step_size(&self) -> usize {
        self.subinstance_size / 2
    }

    /// Number of cells along one side of a subinstance
    pub const fn expand(&self) -> usize {
        self.subinstance_size / self.clickable_size
    }

    /// Number of cells in one subinstance
    pub const fn cells_per_subinstance(&self) -> usize {
        self.expand() * self.expand()
    }

    /// Number of subinstance slots in one mosaic
    pub const fn slots_per_mosaic(&self) -> usize {
        self.num_to_combine * self.num_to_combine
    }

    /// Number of clickable cells along one side of a mosaic
    pub const fn mosaic_grid_size(&self) -> usize {
        self.num_to_combine * self.expand()
    }

    /// Side length of a mosaic canvas in pixels
    pub const fn mosaic_extent(&self) -> usize {
        self.num_to_combine * self.subinstance_size
    }

    /// Extent of an image axis after zero-padding
    ///
    /// Short axes grow to exactly one window; longer axes grow to the next
    /// multiple of the step size. Nothing is ever cropped.
    pub const fn padded_extent(&self, extent: usize) -> usize {
        let step = self.step_size();
        if extent <= self.subinstance_size {
            self.subinstance_size
        } else if extent % step != 0 {
            extent + (step - extent % step)
        } else {
            extent
        }
    }
}

/// Pixel dimensions of an image axis pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDims {
    /// Number of pixel rows
    pub rows: usize,
    /// Number of pixel columns
    pub cols: usize,
}

impl ImageDims {
    /// Create dimensions from a row and column count
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

/// A source image known to the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImage {
    /// Position of the image in the run (`image_id` of its cells)
    pub id: usize,
    /// File name the image was loaded from
    pub name: String,
    /// Dimensions as loaded
    pub original: ImageDims,
    /// Dimensions after zero-padding
    pub padded: ImageDims,
}

impl SourceImage {
    /// Record an image and derive its padded dimensions
    pub fn new(
        id: usize,
        name: impl Into<String>,
        original: ImageDims,
        params: &TilingParams,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            original,
            padded: ImageDims::new(
                params.padded_extent(original.rows),
                params.padded_extent(original.cols),
            ),
        }
    }
}

/// Axis-aligned pixel rectangle, top-left anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRect {
    /// Top row in pixels
    pub row: usize,
    /// Left column in pixels
    pub col: usize,
    /// Height in pixels
    pub height: usize,
    /// Width in pixels
    pub width: usize,
}

impl CellRect {
    /// Square rectangle of side `size` at (`row`, `col`)
    pub const fn square(row: usize, col: usize, size: usize) -> Self {
        Self {
            row,
            col,
            height: size,
            width: size,
        }
    }

    /// Exclusive bottom edge
    pub const fn bottom(&self) -> usize {
        self.row + self.height
    }

    /// Exclusive right edge
    pub const fn right(&self) -> usize {
        self.col + self.width
    }

    /// Whether the rectangle lies fully inside an image of the given size
    pub const fn fits_within(&self, dims: ImageDims) -> bool {
        self.bottom() <= dims.rows && self.right() <= dims.cols
    }
}

/// Placement of a cell in its source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OriginalLocation {
    /// Source image the cell was cut from
    pub image_id: usize,
    /// Pixel rectangle inside the padded source image
    pub rect: CellRect,
}

/// Placement of a cell in a mosaic canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MosaicLocation {
    /// Mosaic the cell was packed into
    pub mosaic_id: usize,
    /// Pixel rectangle inside the mosaic canvas
    pub rect: CellRect,
}

/// Clickable-cell coordinate inside a mosaic grid (not pixels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    /// Cell row
    pub row: usize,
    /// Cell column
    pub col: usize,
}

impl GridCoord {
    /// Create a grid coordinate
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Pixel rectangle addressed by this coordinate in a mosaic
    pub const fn to_rect(self, clickable_size: usize) -> CellRect {
        CellRect::square(
            self.row * clickable_size,
            self.col * clickable_size,
            clickable_size,
        )
    }

    /// Whether the coordinate lies inside a square grid of the given side
    pub const fn within(self, grid_size: usize) -> bool {
        self.row < grid_size && self.col < grid_size
    }

    /// Every coordinate of a square grid in row-major order
    pub fn all(grid_size: usize) -> impl Iterator<Item = Self> {
        (0..grid_size).flat_map(move |row| (0..grid_size).map(move |col| Self::new(row, col)))
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}_{:02}", self.row, self.col)
    }
}
