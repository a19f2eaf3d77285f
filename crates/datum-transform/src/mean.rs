//! Mean references for per-pixel mean subtraction.
//!
//! A [`MeanReference`] is loaded once when a transformer is built and shared
//! read-only afterwards. Loading goes through the [`MeanLoader`] trait so the
//! persisted format stays replaceable; the default format is a JSON document
//! holding the shape and the channel-major values.

use datum_core::{ColorMode, Error, MeanSpec, PixelData, Record, Result, TransformConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::decode::record_from_image;

/// A (channels, height, width) mean image
#[derive(Debug, Clone, PartialEq)]
pub struct MeanReference {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

/// On-disk layout of a JSON mean file
#[derive(Debug, Serialize, Deserialize)]
struct MeanFile {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl MeanReference {
    /// Creates a mean reference, validating the value count against the shape
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(Error::ResourceLoad(format!(
                "mean shape must be non-zero, got {}x{}x{}",
                channels, height, width
            )));
        }
        if data.len() != channels * height * width {
            return Err(Error::ResourceLoad(format!(
                "mean shape {}x{}x{} needs {} values, got {}",
                channels,
                height,
                width,
                channels * height * width,
                data.len()
            )));
        }

        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Shape as `[channels, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mean value at (channel, row, column)
    #[inline]
    pub fn value(&self, channel: usize, row: usize, col: usize) -> f64 {
        f64::from(self.data[(channel * self.height + row) * self.width + col])
    }

    /// One row of one channel
    #[inline]
    pub fn row(&self, channel: usize, row: usize) -> &[f32] {
        let start = (channel * self.height + row) * self.width;
        &self.data[start..start + self.width]
    }

    /// Average of each channel plane
    pub fn channel_means(&self) -> Vec<f64> {
        let plane = self.height * self.width;
        self.data
            .chunks(plane)
            .map(|values| values.iter().map(|&v| f64::from(v)).sum::<f64>() / plane as f64)
            .collect()
    }

    /// Checks that a record can be normalized against this reference.
    ///
    /// Crops read the mean at the same coordinates as the data, so the
    /// reference must cover the whole record.
    pub fn check_covers(&self, record: &Record) -> Result<()> {
        if self.channels != record.channels() {
            return Err(Error::Geometry(format!(
                "mean has {} channels but record has {}",
                self.channels,
                record.channels()
            )));
        }
        if self.height < record.height() || self.width < record.width() {
            return Err(Error::Geometry(format!(
                "mean {}x{} is smaller than record {}x{}",
                self.height,
                self.width,
                record.height(),
                record.width()
            )));
        }
        Ok(())
    }

    /// Writes this reference as a JSON mean file
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = MeanFile {
            channels: self.channels,
            height: self.height,
            width: self.width,
            data: self.data.clone(),
        };
        std::fs::write(path, serde_json::to_vec(&file)?)?;
        Ok(())
    }
}

/// Deserialization collaborator for mean references
pub trait MeanLoader {
    fn load(&self, path: &Path) -> Result<MeanReference>;
}

/// Reads the JSON mean-file format
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMeanLoader;

impl MeanLoader for JsonMeanLoader {
    fn load(&self, path: &Path) -> Result<MeanReference> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::ResourceLoad(format!("cannot read mean file {}: {}", path.display(), e))
        })?;

        let file: MeanFile = serde_json::from_slice(&bytes).map_err(|e| {
            Error::ResourceLoad(format!("malformed mean file {}: {}", path.display(), e))
        })?;

        MeanReference::new(file.channels, file.height, file.width, file.data)
    }
}

/// Uses an ordinary image file as the mean image
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageMeanLoader {
    pub color_mode: ColorMode,
}

impl MeanLoader for ImageMeanLoader {
    fn load(&self, path: &Path) -> Result<MeanReference> {
        let image = image::open(path).map_err(|e| {
            Error::ResourceLoad(format!("cannot decode mean image {}: {}", path.display(), e))
        })?;

        let record = record_from_image(&image, self.color_mode, None)?;
        let [channels, height, width] = record.shape();
        let data = match record.data() {
            PixelData::Bytes(bytes) => bytes.iter().map(|&b| f32::from(b)).collect(),
            PixelData::Floats(floats) => floats.clone(),
        };

        MeanReference::new(channels, height, width, data)
    }
}

/// Picks the loader by extension: `.json` files or images
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMeanLoader;

impl MeanLoader for FileMeanLoader {
    fn load(&self, path: &Path) -> Result<MeanReference> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            JsonMeanLoader.load(path)
        } else {
            ImageMeanLoader::default().load(path)
        }
    }
}

/// Loads a JSON or image mean file
pub fn load_mean_reference(path: &Path) -> Result<MeanReference> {
    FileMeanLoader.load(path)
}

/// Averages same-shaped records into a mean reference
pub fn compute_mean(records: &[Record]) -> Result<MeanReference> {
    let first = records
        .first()
        .ok_or_else(|| Error::Config("cannot compute a mean over zero records".to_string()))?;
    let shape = first.shape();
    let len = shape.iter().product::<usize>();

    let mut sums = vec![0.0f64; len];
    for record in records {
        if record.shape() != shape {
            return Err(Error::Geometry(format!(
                "record shape {:?} differs from {:?}",
                record.shape(),
                shape
            )));
        }
        let data = record.data();
        for (i, sum) in sums.iter_mut().enumerate() {
            *sum += data.get(i);
        }
    }

    let count = records.len() as f64;
    let data = sums.into_iter().map(|s| (s / count) as f32).collect();
    MeanReference::new(shape[0], shape[1], shape[2], data)
}

/// Resolved mean source used by the transformer
#[derive(Debug, Clone, Default)]
pub enum MeanSource {
    /// No mean subtraction
    #[default]
    None,
    /// Per-pixel mean image
    FullReference(Arc<MeanReference>),
    /// Per-channel scalars; a single value broadcasts to every channel
    PerChannel(Arc<[f32]>),
}

impl MeanSource {
    /// Resolves a configured mean, loading a mean file through `loader` if needed
    pub fn resolve(config: &TransformConfig, loader: &dyn MeanLoader) -> Result<Self> {
        match config.mean() {
            MeanSpec::None => Ok(MeanSource::None),
            MeanSpec::Values(values) => Ok(MeanSource::PerChannel(values.as_slice().into())),
            MeanSpec::File(path) => {
                info!("Loading mean file from {}", path.display());
                let reference = loader.load(path)?;
                info!("Loaded mean reference with shape {:?}", reference.shape());
                Ok(MeanSource::FullReference(Arc::new(reference)))
            }
        }
    }

    /// Checks the source against a record's geometry
    pub fn check(&self, record: &Record) -> Result<()> {
        match self {
            MeanSource::None => Ok(()),
            MeanSource::FullReference(reference) => reference.check_covers(record),
            MeanSource::PerChannel(values) => {
                if values.len() == 1 || values.len() == record.channels() {
                    Ok(())
                } else {
                    Err(Error::Geometry(format!(
                        "{} mean values given for a {}-channel record",
                        values.len(),
                        record.channels()
                    )))
                }
            }
        }
    }

    /// Scalar mean for a channel; 0 for no mean and for full references
    #[inline]
    pub(crate) fn channel_scalar(&self, channel: usize) -> f64 {
        match self {
            MeanSource::PerChannel(values) if values.len() == 1 => f64::from(values[0]),
            MeanSource::PerChannel(values) => f64::from(values[channel]),
            _ => 0.0,
        }
    }
}
