//! Summary statistics over transformed tensors.

use datum_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Per-channel statistics of a channel-major tensor batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorStatistics {
    pub num_items: usize,
    pub shape: [usize; 3],
    pub channel_mean: Vec<f64>,
    pub channel_min: Vec<f64>,
    pub channel_max: Vec<f64>,
}

impl TensorStatistics {
    /// Computes statistics over `data`, a batch of items of the given `[C, H, W]` shape
    pub fn from_batch(data: &[f32], shape: [usize; 3]) -> Result<Self> {
        let [channels, height, width] = shape;
        let plane = height * width;
        let item_len = channels * plane;

        if item_len == 0 || data.len() % item_len != 0 {
            return Err(Error::Geometry(format!(
                "{} values do not form whole items of shape {:?}",
                data.len(),
                shape
            )));
        }

        let num_items = data.len() / item_len;
        let mut sum = vec![0.0f64; channels];
        let mut min = vec![f64::INFINITY; channels];
        let mut max = vec![f64::NEG_INFINITY; channels];

        for item in data.chunks(item_len) {
            for (c, values) in item.chunks(plane).enumerate() {
                for &v in values {
                    let v = f64::from(v);
                    sum[c] += v;
                    min[c] = min[c].min(v);
                    max[c] = max[c].max(v);
                }
            }
        }

        let count = (num_items * plane) as f64;
        Ok(Self {
            num_items,
            shape,
            channel_mean: sum.into_iter().map(|s| s / count).collect(),
            channel_min: min,
            channel_max: max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_items() {
        // Two items of shape [2, 1, 2]
        let data = [0.0, 2.0, 10.0, 10.0, 4.0, 6.0, -10.0, 30.0];
        let stats = TensorStatistics::from_batch(&data, [2, 1, 2]).unwrap();

        assert_eq!(stats.num_items, 2);
        assert_eq!(stats.channel_mean, vec![3.0, 10.0]);
        assert_eq!(stats.channel_min, vec![0.0, -10.0]);
        assert_eq!(stats.channel_max, vec![6.0, 30.0]);
    }

    #[test]
    fn test_partial_item_rejected() {
        assert!(TensorStatistics::from_batch(&[0.0; 5], [1, 2, 2]).is_err());
        assert!(TensorStatistics::from_batch(&[], [0, 2, 2]).is_err());
    }
}
