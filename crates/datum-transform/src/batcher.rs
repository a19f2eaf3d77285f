//! Burn batcher that transforms records on the fly.
//!
//! Each batch gets its own [`Transformer`], seeded from a base seed plus a
//! batch counter, so loader workers never share a random source.
//!
//! The counter advances in the order batches are built. With a single loader
//! worker a fixed base seed replays the same augmentation run after run; with
//! several workers the seed each batch receives follows thread scheduling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use datum_core::{Error, Phase, Record, Result, TransformConfig};

use crate::mean::MeanSource;
use crate::transformer::Transformer;

/// A batch of transformed records
#[derive(Clone, Debug)]
pub struct DatumBatch<B: Backend> {
    /// Images with shape [batch_size, channels, crop_h, crop_w]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size], present when every record is labeled
    pub targets: Option<Tensor<B, 1, Int>>,
}

/// Flat batch data before it is moved onto a device
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedBatch {
    pub data: Vec<f32>,
    pub shape: [usize; 4],
    pub labels: Option<Vec<i64>>,
}

/// Batcher applying a [`Transformer`] to every record
#[derive(Clone, Debug)]
pub struct TransformingBatcher {
    config: TransformConfig,
    phase: Phase,
    mean: MeanSource,
    seed: u64,
    batch_counter: Arc<AtomicU64>,
}

impl TransformingBatcher {
    /// Creates a batcher; the mean source is resolved once and shared by all batches
    pub fn new(config: TransformConfig, phase: Phase, mean: MeanSource, seed: u64) -> Self {
        Self {
            config,
            phase,
            mean,
            seed,
            batch_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Transforms a batch of records into one flat buffer
    pub fn transform_items(&self, items: &[Record]) -> Result<TransformedBatch> {
        let first = items
            .first()
            .ok_or_else(|| Error::Geometry("cannot build an empty batch".to_string()))?;

        let batch_index = self.batch_counter.fetch_add(1, Ordering::Relaxed);
        let mut transformer =
            Transformer::with_mean_source(self.config.clone(), self.phase, self.mean.clone())
                .with_seed(self.seed.wrapping_add(batch_index));

        let [channels, height, width] = transformer.infer_shape(first)?;
        let mut data = vec![0.0f32; items.len() * channels * height * width];
        transformer.transform_batch(items, &mut data)?;

        let labels = items.iter().map(Record::label).collect::<Option<Vec<i64>>>();

        Ok(TransformedBatch {
            data,
            shape: [items.len(), channels, height, width],
            labels,
        })
    }
}

impl<B: Backend> Batcher<B, Record, DatumBatch<B>> for TransformingBatcher {
    fn batch(&self, items: Vec<Record>, device: &B::Device) -> DatumBatch<B> {
        // The batcher trait has no error channel; a failing batch means the
        // pipeline is misconfigured for the whole run.
        let batch = match self.transform_items(&items) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!("Failed to transform batch: {}", e);
                panic!("failed to transform batch: {e}");
            }
        };

        let images = Tensor::<B, 4>::from_floats(TensorData::new(batch.data, batch.shape), device);

        let targets = batch.labels.map(|labels| {
            let batch_size = labels.len();
            Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [batch_size]), device)
        });

        DatumBatch { images, targets }
    }
}
