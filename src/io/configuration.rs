//! Pipeline constants and runtime configuration defaults

// Clipping defaults
/// Fixed seed for reproducible mosaic permutations
pub const DEFAULT_SEED: u64 = 42;

/// Default side length of a clipping window in pixels (must be even)
pub const DEFAULT_SUBINSTANCE_SIZE: usize = 50;

/// Default side length of a clickable area in pixels
pub const DEFAULT_CLICKABLE_SIZE: usize = 10;

/// Default number of subinstances on one side of a mosaic
pub const DEFAULT_NUM_TO_COMBINE: usize = 4;

// Aggregation defaults
/// Relative Q-function change below which EM stops
pub const DEFAULT_EM_TOLERANCE: f64 = 1e-10;

// Guards against a Q-function that oscillates without settling
/// Maximum number of EM iterations before giving up on convergence
pub const DEFAULT_MAX_EM_ITERATIONS: usize = 10_000;

/// Relative Q-function drop tolerated as rounding noise before it counts as a decrease
pub const Q_DECREASE_TOLERANCE: f64 = 1e-12;

/// Posterior threshold above which a cell is labelled positive
pub const DEFAULT_LABEL_THRESHOLD: f64 = 0.5;

/// Pseudo-count added to both labels when building per-cell distributions
pub const DEFAULT_SMOOTHING: f64 = 0.1;

// Output settings
/// Directory (inside the run directory) receiving rendered mosaics
pub const MOSAIC_DIR: &str = "mosaics";
/// Directory receiving source images with positive cells painted over
pub const MASKED_DIR: &str = "masked_images";
/// File name of the persisted mapping tables
pub const MAPPING_FILE: &str = "mapping.json";
/// File name of the aligned response matrix
pub const CONVERTED_FILE: &str = "converted.json";
/// File name of the aggregation output
pub const AGGREGATION_FILE: &str = "aggregation.json";
/// Colour painted over positive cells
pub const MASK_COLOR: [u8; 3] = [255, 0, 255];

/// Image file extensions picked up when loading a source directory
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

// Progress bar display settings
/// Width of progress bars in characters
pub const PROGRESS_BAR_WIDTH: u16 = 40;
