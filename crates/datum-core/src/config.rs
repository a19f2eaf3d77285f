//! Transformation parameters and their validation.
//!
//! [`TransformParams`] is the raw, serde-facing surface read from TOML.
//! [`TransformConfig`] is the validated form every other component trusts.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw transformation parameters as written in a config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransformParams {
    /// Output side length; 0 keeps the full record size
    pub crop_size: i64,
    /// Randomly mirror records horizontally during training
    pub mirror: bool,
    /// Multiplier applied after mean subtraction
    pub scale: f32,
    /// Path to a full-image mean reference
    pub mean_file: Option<PathBuf>,
    /// Per-channel mean values (one per channel, or a single broadcast value)
    pub mean_values: Option<Vec<f32>>,
    /// Decode encoded images as 3-channel color
    pub force_color: bool,
    /// Decode encoded images as 1-channel grayscale
    pub force_gray: bool,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            crop_size: 0,
            mirror: false,
            scale: 1.0,
            mean_file: None,
            mean_values: None,
            force_color: false,
            force_gray: false,
        }
    }
}

/// Where the subtracted mean comes from, before any file is loaded
#[derive(Debug, Clone, PartialEq)]
pub enum MeanSpec {
    /// No mean subtraction
    None,
    /// Full-image mean reference stored at this path
    File(PathBuf),
    /// Per-channel scalar means
    Values(Vec<f32>),
}

/// Color handling when decoding encoded images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Keep the decoded channel count
    #[default]
    Native,
    /// Convert to 3-channel RGB
    Color,
    /// Convert to 1-channel luma
    Gray,
}

/// Validated transformation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    crop_size: usize,
    mirror: bool,
    scale: f32,
    mean: MeanSpec,
    color_mode: ColorMode,
}

impl TransformConfig {
    /// Validates raw parameters
    pub fn from_params(params: &TransformParams) -> Result<Self> {
        if params.crop_size < 0 {
            return Err(Error::Config(format!(
                "crop_size must be non-negative, got {}",
                params.crop_size
            )));
        }

        if !params.scale.is_finite() {
            return Err(Error::Config(format!(
                "scale must be finite, got {}",
                params.scale
            )));
        }

        let values = params.mean_values.as_ref().filter(|v| !v.is_empty());

        let mean = match (&params.mean_file, values) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "cannot specify mean_file and mean_values at the same time".to_string(),
                ));
            }
            (Some(path), None) => MeanSpec::File(path.clone()),
            (None, Some(values)) => {
                if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                    return Err(Error::Config(format!("mean value {} is not finite", bad)));
                }
                MeanSpec::Values(values.clone())
            }
            (None, None) => MeanSpec::None,
        };

        let color_mode = match (params.force_color, params.force_gray) {
            (true, true) => {
                return Err(Error::Config(
                    "cannot set force_color and force_gray at the same time".to_string(),
                ));
            }
            (true, false) => ColorMode::Color,
            (false, true) => ColorMode::Gray,
            (false, false) => ColorMode::Native,
        };

        Ok(Self {
            crop_size: params.crop_size as usize,
            mirror: params.mirror,
            scale: params.scale,
            mean,
            color_mode,
        })
    }

    pub fn crop_size(&self) -> usize {
        self.crop_size
    }

    pub fn mirror(&self) -> bool {
        self.mirror
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn mean(&self) -> &MeanSpec {
        &self.mean
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Output `(height, width)` for a source of the given size
    pub fn crop_dims(&self, height: usize, width: usize) -> (usize, usize) {
        if self.crop_size > 0 {
            (self.crop_size, self.crop_size)
        } else {
            (height, width)
        }
    }
}

impl TryFrom<TransformParams> for TransformConfig {
    type Error = Error;

    fn try_from(params: TransformParams) -> Result<Self> {
        Self::from_params(&params)
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            crop_size: 0,
            mirror: false,
            scale: 1.0,
            mean: MeanSpec::None,
            color_mode: ColorMode::Native,
        }
    }
}
