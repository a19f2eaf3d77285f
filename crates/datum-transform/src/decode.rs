//! Decoding of encoded images into records.
//!
//! This is the thin decoding collaborator the transformer consumes: it turns
//! image files into channel-major byte records and scans directories for them.

use datum_core::{ColorMode, Error, Record, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// Converts a decoded image into a CHW byte record
pub fn record_from_image(
    image: &DynamicImage,
    mode: ColorMode,
    label: Option<i64>,
) -> Result<Record> {
    let gray = match mode {
        ColorMode::Gray => true,
        ColorMode::Color => false,
        ColorMode::Native => !image.color().has_color(),
    };

    let (width, height) = (image.width() as usize, image.height() as usize);
    let plane = width * height;

    if gray {
        let luma = image.to_luma8();
        return Record::from_bytes(1, height, width, luma.into_raw(), label);
    }

    // Interleaved HWC to planar CHW
    let rgb = image.to_rgb8();
    let mut data = vec![0u8; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        data[i] = pixel[0];
        data[plane + i] = pixel[1];
        data[2 * plane + i] = pixel[2];
    }

    Record::from_bytes(3, height, width, data, label)
}

/// Loads image files from disk as records
pub struct RecordLoader {
    /// Root directory for relative paths
    root_dir: PathBuf,
    color_mode: ColorMode,
}

impl RecordLoader {
    /// Creates a new loader
    pub fn new(root_dir: impl Into<PathBuf>, color_mode: ColorMode) -> Self {
        Self {
            root_dir: root_dir.into(),
            color_mode,
        }
    }

    /// Gets the full path for an image
    pub fn full_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_dir.join(path)
        }
    }

    /// Decodes one image file into a record
    pub fn load_record(&self, path: &Path, label: Option<i64>) -> Result<Record> {
        let full_path = self.full_path(path);

        if !full_path.exists() {
            return Err(Error::Image(format!(
                "Image file not found: {}",
                full_path.display()
            )));
        }

        let image = image::open(&full_path)
            .map_err(|e| Error::Image(format!("Failed to load image {}: {}", full_path.display(), e)))?;

        record_from_image(&image, self.color_mode, label)
    }

    /// Scans a directory (non-recursively) for image files, sorted by path
    pub fn scan_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let full_dir = self.full_path(dir);

        if !full_dir.is_dir() {
            return Err(Error::Image(format!(
                "Not a directory: {}",
                full_dir.display()
            )));
        }

        let mut images = Vec::new();
        for entry in std::fs::read_dir(&full_dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                images.push(path);
            }
        }

        images.sort();
        Ok(images)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
