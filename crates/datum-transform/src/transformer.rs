//! The record transformer: crop, mirror, subtract the mean, scale.
//!
//! # Geometry
//!
//! - **Train**: crop offsets are drawn uniformly over the available slack and
//!   the record is mirrored with probability 1/2 when mirroring is enabled
//! - **Test**: center crop, never mirrored; fully deterministic
//!
//! # Output layout
//!
//! Item `i` of a batch occupies `C * crop_h * crop_w` consecutive values
//! starting at `i * C * crop_h * crop_w`, in (channel, row, column) order.

use datum_core::{Error, Phase, PixelData, Record, Result, TransformConfig};
use tracing::{debug, trace};

use crate::element::Element;
use crate::mean::{FileMeanLoader, MeanLoader, MeanSource};
use crate::rng::{ChaChaSource, RandomSource};

/// Crop window and mirror decision for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CropWindow {
    pub crop_h: usize,
    pub crop_w: usize,
    pub off_h: usize,
    pub off_w: usize,
    pub mirror: bool,
}

/// Applies the configured transformation to records.
///
/// A transformer owns its random source, so it is `Send` but not `Sync`:
/// parallel pipelines build one transformer per worker and share the
/// mean reference through [`MeanSource`].
pub struct Transformer {
    config: TransformConfig,
    phase: Phase,
    mean: MeanSource,
    seed: Option<u64>,
    rng: Option<Box<dyn RandomSource + Send>>,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("mean", &self.mean)
            .field("seed", &self.seed)
            .field("rng_initialized", &self.rng.is_some())
            .finish()
    }
}

impl Transformer {
    /// Creates a transformer, loading a configured mean file (JSON or image)
    pub fn new(config: TransformConfig, phase: Phase) -> Result<Self> {
        Self::with_loader(config, phase, &FileMeanLoader)
    }

    /// Creates a transformer, loading a configured mean file through `loader`
    pub fn with_loader(
        config: TransformConfig,
        phase: Phase,
        loader: &dyn MeanLoader,
    ) -> Result<Self> {
        let mean = MeanSource::resolve(&config, loader)?;
        Ok(Self::with_mean_source(config, phase, mean))
    }

    /// Creates a transformer around an already resolved mean source
    pub fn with_mean_source(config: TransformConfig, phase: Phase, mean: MeanSource) -> Self {
        debug!(
            "Transformer ready: phase={}, crop_size={}, mirror={}, scale={}",
            phase,
            config.crop_size(),
            config.mirror(),
            config.scale()
        );

        Self {
            config,
            phase,
            mean,
            seed: None,
            rng: None,
        }
    }

    /// Fixes the seed used when the random source is created
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.rng = None;
        self
    }

    /// Replaces the random source
    pub fn with_random_source(mut self, source: Box<dyn RandomSource + Send>) -> Self {
        self.rng = Some(source);
        self
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mean_source(&self) -> &MeanSource {
        &self.mean
    }

    /// Creates the random source now instead of on the first draw.
    ///
    /// Only training draws random numbers; in the test phase this does nothing.
    pub fn init_rand(&mut self) {
        if self.phase.is_train() && self.rng.is_none() {
            self.rng = Some(Box::new(ChaChaSource::init(self.seed)));
        }
    }

    fn rand(&mut self, n: usize) -> usize {
        let seed = self.seed;
        self.rng
            .get_or_insert_with(|| Box::new(ChaChaSource::init(seed)))
            .next(n)
    }

    /// Output shape `[channels, crop_h, crop_w]` for a record
    pub fn infer_shape(&self, record: &Record) -> Result<[usize; 3]> {
        let (crop_h, crop_w) = self.crop_dims(record)?;
        Ok([record.channels(), crop_h, crop_w])
    }

    fn crop_dims(&self, record: &Record) -> Result<(usize, usize)> {
        let (height, width) = (record.height(), record.width());
        let (crop_h, crop_w) = self.config.crop_dims(height, width);

        if crop_h > height || crop_w > width {
            return Err(Error::Geometry(format!(
                "crop {}x{} exceeds record {}x{}",
                crop_h, crop_w, height, width
            )));
        }
        Ok((crop_h, crop_w))
    }

    /// Chooses crop offsets and the mirror decision, drawing from the
    /// random source only in the training phase
    fn plan(&mut self, record: &Record, crop_h: usize, crop_w: usize) -> CropWindow {
        let (height, width) = (record.height(), record.width());
        let train = self.phase.is_train();

        let (off_h, off_w) = if train && (height > crop_h || width > crop_w) {
            let off_h = self.rand(height - crop_h + 1);
            let off_w = self.rand(width - crop_w + 1);
            (off_h, off_w)
        } else {
            ((height - crop_h) / 2, (width - crop_w) / 2)
        };

        let mirror = train && self.config.mirror() && self.rand(2) == 1;

        CropWindow {
            crop_h,
            crop_w,
            off_h,
            off_w,
            mirror,
        }
    }

    /// Transforms one record into slot `batch_item_id` of `dest`
    pub fn transform<T: Element>(
        &mut self,
        batch_item_id: usize,
        record: &Record,
        dest: &mut [T],
    ) -> Result<()> {
        self.transform_with_mean(batch_item_id, record, None, dest)
    }

    /// Transforms one record, optionally overriding the configured mean source.
    ///
    /// Every check runs before the first random draw and the first write, so
    /// a failing call leaves `dest` untouched.
    pub fn transform_with_mean<T: Element>(
        &mut self,
        batch_item_id: usize,
        record: &Record,
        mean: Option<&MeanSource>,
        dest: &mut [T],
    ) -> Result<()> {
        let (crop_h, crop_w) = self.crop_dims(record)?;

        let mean = match mean {
            Some(mean) => mean.clone(),
            None => self.mean.clone(),
        };
        mean.check(record)?;

        let slot_len = record.channels() * crop_h * crop_w;
        let base = batch_item_id
            .checked_mul(slot_len)
            .filter(|base| base.checked_add(slot_len).is_some_and(|end| end <= dest.len()))
            .ok_or_else(|| {
                Error::Geometry(format!(
                    "destination of {} values cannot hold item {} of {} values",
                    dest.len(),
                    batch_item_id,
                    slot_len
                ))
            })?;

        let window = self.plan(record, crop_h, crop_w);
        trace!(?window, batch_item_id, "transforming record");

        let scale = f64::from(self.config.scale());
        let out = &mut dest[base..base + slot_len];

        match record.data() {
            PixelData::Bytes(pixels) => write_slot(pixels, record, &window, &mean, scale, out),
            PixelData::Floats(pixels) => write_slot(pixels, record, &window, &mean, scale, out),
        }

        Ok(())
    }

    /// Transforms `records` into consecutive slots of `dest`.
    ///
    /// All records are checked before anything is written.
    pub fn transform_batch<T: Element>(&mut self, records: &[Record], dest: &mut [T]) -> Result<()> {
        let mut needed = 0usize;
        for record in records {
            let [channels, crop_h, crop_w] = self.infer_shape(record)?;
            self.mean.check(record)?;
            needed = needed.saturating_add(channels * crop_h * crop_w);
        }

        if let Some(first) = records.first() {
            let shape = self.infer_shape(first)?;
            for record in &records[1..] {
                let other = self.infer_shape(record)?;
                if other != shape {
                    return Err(Error::Geometry(format!(
                        "batch mixes output shapes {:?} and {:?}",
                        shape, other
                    )));
                }
            }
        }

        if needed > dest.len() {
            return Err(Error::Geometry(format!(
                "destination of {} values cannot hold a batch of {} values",
                dest.len(),
                needed
            )));
        }

        for (item_id, record) in records.iter().enumerate() {
            self.transform(item_id, record, dest)?;
        }
        Ok(())
    }
}

/// The per-element copy/normalize loop
fn write_slot<S, T>(
    pixels: &[S],
    record: &Record,
    window: &CropWindow,
    mean: &MeanSource,
    scale: f64,
    out: &mut [T],
) where
    S: Copy + Into<f64>,
    T: Element,
{
    let (height, width) = (record.height(), record.width());
    let CropWindow {
        crop_h,
        crop_w,
        off_h,
        off_w,
        mirror,
    } = *window;

    for c in 0..record.channels() {
        let channel_mean = mean.channel_scalar(c);

        for h in 0..crop_h {
            let src_row = (c * height + off_h + h) * width + off_w;
            let out_row = (c * crop_h + h) * crop_w;
            let mean_row = match mean {
                MeanSource::FullReference(reference) => Some(&reference.row(c, off_h + h)[off_w..]),
                _ => None,
            };

            for w in 0..crop_w {
                let src_w = if mirror { crop_w - 1 - w } else { w };
                let value: f64 = pixels[src_row + src_w].into();
                let m = mean_row.map_or(channel_mean, |row| f64::from(row[src_w]));
                out[out_row + w] = T::from_f64((value - m) * scale);
            }
        }
    }
}
