//! Record transformation for data-loading pipelines.
//!
//! This crate turns raw records into fixed-size, normalized tensors:
//! crop (random in training, centered in evaluation), optional horizontal
//! mirroring, mean subtraction (full mean image or per-channel scalars) and
//! scaling. Output is written into a caller-owned batch buffer.

pub mod batcher;
pub mod decode;
pub mod element;
pub mod mean;
pub mod rng;
pub mod statistics;
pub mod transformer;

pub use batcher::{DatumBatch, TransformedBatch, TransformingBatcher};
pub use decode::{record_from_image, RecordLoader};
pub use element::Element;
pub use mean::{
    compute_mean, load_mean_reference, FileMeanLoader, ImageMeanLoader, JsonMeanLoader, MeanLoader,
    MeanReference, MeanSource,
};
pub use rng::{ChaChaSource, RandomSource};
pub use statistics::TensorStatistics;
pub use transformer::Transformer;
