//! Source image loading, mosaic rendering and masked result export

use crate::io::configuration::{IMAGE_EXTENSIONS, MASK_COLOR};
use crate::io::error::{PipelineError, Result, WithPath, consistency_error};
use crate::io::progress::StageProgress;
use crate::spatial::geometry::{
    ImageDims, MosaicLocation, OriginalLocation, SourceImage, TilingParams,
};
use crate::spatial::mosaic::MappingTable;
use image::{Rgb, RgbImage, imageops};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// A source image zero-padded to its normalized extent
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Identity and dimensions of the image
    pub source: SourceImage,
    /// Padded pixels, `source.padded` in size
    pub pixels: RgbImage,
}

impl LoadedImage {
    /// Pad decoded pixels to the extent the run geometry requires
    ///
    /// The original content stays anchored at the top-left corner; the
    /// added border is black.
    pub fn from_pixels(id: usize, name: &str, pixels: &RgbImage, params: &TilingParams) -> Self {
        let original = ImageDims::new(pixels.height() as usize, pixels.width() as usize);
        let source = SourceImage::new(id, name, original, params);
        let mut padded = RgbImage::new(source.padded.cols as u32, source.padded.rows as u32);
        imageops::replace(&mut padded, pixels, 0, 0);
        Self {
            source,
            pixels: padded,
        }
    }
}

/// Image files of a directory in name order
///
/// # Errors
///
/// Returns an error if the directory cannot be read
pub fn collect_image_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_error = |e| PipelineError::FileSystem {
        path: dir.to_path_buf(),
        operation: "read directory",
        source: e,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if supported && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load and pad images, ids assigned in the given order
///
/// # Errors
///
/// Returns an error if an image fails to decode
pub fn load_images(
    paths: &[PathBuf],
    params: &TilingParams,
    progress: &StageProgress,
) -> Result<Vec<LoadedImage>> {
    let mut images = Vec::with_capacity(paths.len());

    for (id, path) in paths.iter().enumerate() {
        let pixels = image::open(path).with_path(path)?.to_rgb8();
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        images.push(LoadedImage::from_pixels(id, &name, &pixels, params));
        progress.inc();
    }

    info!("loaded {} images", images.len());
    Ok(images)
}

/// Paint one mosaic by copying each of its cells from the source image
///
/// Unfilled slots of the last mosaic stay black.
///
/// # Errors
///
/// Returns a `Consistency` error if `mosaic_id` is not a mosaic of the table
/// or one of its cells references an image that was not provided
pub fn render_mosaic(
    table: &MappingTable,
    images: &[LoadedImage],
    mosaic_id: usize,
) -> Result<RgbImage> {
    if mosaic_id >= table.num_mosaics {
        return Err(unknown_mosaic(mosaic_id));
    }
    let cells: Vec<_> = table
        .pairs()
        .filter(|(_, placement)| placement.mosaic_id == mosaic_id)
        .collect();
    paint_mosaic(table, images, &cells)
}

fn unknown_mosaic(mosaic_id: usize) -> PipelineError {
    consistency_error(
        "mosaic rendering",
        &format!("cell references unknown mosaic {mosaic_id}"),
    )
}

fn paint_mosaic(
    table: &MappingTable,
    images: &[LoadedImage],
    cells: &[(&OriginalLocation, &MosaicLocation)],
) -> Result<RgbImage> {
    let extent = table.params.mosaic_extent() as u32;
    let mut canvas = RgbImage::new(extent, extent);

    for (original, placement) in cells {
        let source = images.get(original.image_id).ok_or_else(|| {
            consistency_error(
                "mosaic rendering",
                &format!("cell references unloaded image {}", original.image_id),
            )
        })?;

        let rect = original.rect;
        let cell = imageops::crop_imm(
            &source.pixels,
            rect.col as u32,
            rect.row as u32,
            rect.width as u32,
            rect.height as u32,
        )
        .to_image();
        imageops::replace(
            &mut canvas,
            &cell,
            placement.rect.col as i64,
            placement.rect.row as i64,
        );
    }

    Ok(canvas)
}

/// Copy of a source image, cropped back to its original size, with the
/// given cells painted in the mask colour
pub fn render_masked_image<'a, I>(image: &LoadedImage, cells: I) -> RgbImage
where
    I: IntoIterator<Item = &'a OriginalLocation>,
{
    let original = image.source.original;
    let mut masked =
        imageops::crop_imm(&image.pixels, 0, 0, original.cols as u32, original.rows as u32)
            .to_image();

    for location in cells {
        if location.image_id != image.source.id {
            continue;
        }
        let rect = location.rect;
        for y in rect.row..rect.bottom().min(original.rows) {
            for x in rect.col..rect.right().min(original.cols) {
                if let Some(pixel) = masked.get_pixel_mut_checked(x as u32, y as u32) {
                    *pixel = Rgb(MASK_COLOR);
                }
            }
        }
    }

    masked
}

/// Save an image as PNG, creating parent directories as needed
///
/// # Errors
///
/// Returns an error if the directory cannot be created or encoding fails
pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }

    image.save(path).map_err(|e| PipelineError::ImageExport {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Render every mosaic of the table and save it as `<dir>/<mosaic_id>.png`
///
/// Mosaics are rendered and written one at a time, so only one canvas is held
/// in memory. The progress bar advances once per written file.
///
/// # Errors
///
/// Returns a `Consistency` error if a cell references an unknown image or
/// mosaic, or an I/O error if a mosaic cannot be written
pub fn save_mosaics(
    table: &MappingTable,
    images: &[LoadedImage],
    dir: &Path,
    progress: &StageProgress,
) -> Result<()> {
    let mut by_mosaic = vec![Vec::new(); table.num_mosaics];
    for (original, placement) in table.pairs() {
        by_mosaic
            .get_mut(placement.mosaic_id)
            .ok_or_else(|| unknown_mosaic(placement.mosaic_id))?
            .push((original, placement));
    }

    for (mosaic_id, cells) in by_mosaic.iter().enumerate() {
        let mosaic = paint_mosaic(table, images, cells)?;
        save_png(&mosaic, &dir.join(format!("{mosaic_id}.png")))?;
        progress.inc();
    }
    info!("wrote {} mosaics to {}", table.num_mosaics, dir.display());
    Ok(())
}
