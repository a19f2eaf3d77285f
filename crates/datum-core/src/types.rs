//! Core type definitions: records and phases.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Pipeline phase.
///
/// Fixed for the lifetime of a transformer. Only `Train` randomizes
/// crop offsets and mirroring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Training: random crops and mirroring
    Train,
    /// Evaluation: center crops, never mirrored
    Test,
}

impl Phase {
    /// Whether geometry decisions are randomized in this phase
    pub fn is_train(&self) -> bool {
        matches!(self, Phase::Train)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Train => write!(f, "train"),
            Phase::Test => write!(f, "test"),
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "train" | "training" => Ok(Phase::Train),
            "test" | "eval" | "evaluation" => Ok(Phase::Test),
            other => Err(Error::Config(format!("unknown phase '{}'", other))),
        }
    }
}

/// Pixel payload of a record.
///
/// A stored record carries either raw bytes or floats; both are read as
/// `f64` by the transformer.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Raw byte-range pixels
    Bytes(Vec<u8>),
    /// Float pixels (already converted upstream)
    Floats(Vec<f32>),
}

impl PixelData {
    /// Number of stored values
    pub fn len(&self) -> usize {
        match self {
            PixelData::Bytes(b) => b.len(),
            PixelData::Floats(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at a flat index, widened to `f64`
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        match self {
            PixelData::Bytes(b) => f64::from(b[index]),
            PixelData::Floats(f) => f64::from(f[index]),
        }
    }
}

/// One raw sample: a (channel, row, column) pixel grid plus optional label.
///
/// Construction validates that no dimension is zero and that the buffer holds
/// exactly `channels * height * width` values, so downstream code never
/// re-checks the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    channels: usize,
    height: usize,
    width: usize,
    data: PixelData,
    label: Option<i64>,
}

impl Record {
    /// Creates a record from raw bytes in channel-major (CHW) order
    pub fn from_bytes(
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<u8>,
        label: Option<i64>,
    ) -> Result<Self> {
        Self::new(channels, height, width, PixelData::Bytes(data), label)
    }

    /// Creates a record from floats in channel-major (CHW) order
    pub fn from_floats(
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
        label: Option<i64>,
    ) -> Result<Self> {
        Self::new(channels, height, width, PixelData::Floats(data), label)
    }

    /// Creates a record, validating dimensions against the payload length
    pub fn new(
        channels: usize,
        height: usize,
        width: usize,
        data: PixelData,
        label: Option<i64>,
    ) -> Result<Self> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(Error::MalformedRecord(format!(
                "dimensions must be non-zero, got {}x{}x{}",
                channels, height, width
            )));
        }

        let expected = channels * height * width;
        if data.len() != expected {
            return Err(Error::MalformedRecord(format!(
                "expected {} values for {}x{}x{}, got {}",
                expected,
                channels,
                height,
                width,
                data.len()
            )));
        }

        Ok(Self {
            channels,
            height,
            width,
            data,
            label,
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

    pub fn label(&self) -> Option<i64> {
        self.label
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    /// Pixel value at (channel, row, column)
    #[inline]
    pub fn pixel(&self, channel: usize, row: usize, col: usize) -> f64 {
        self.data.get((channel * self.height + row) * self.width + col)
    }
}
