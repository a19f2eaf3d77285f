//! End-to-end properties of the record transformer.

use std::sync::Arc;

use datum_core::{Error, Phase, Record, TransformConfig, TransformParams};
use datum_transform::{MeanReference, MeanSource, RandomSource, Transformer};

/// Replays a fixed list of draws
struct ScriptedSource(Vec<usize>);

impl RandomSource for ScriptedSource {
    fn next(&mut self, n: usize) -> usize {
        let value = self.0.remove(0);
        assert!(value < n, "scripted draw {} out of range {}", value, n);
        value
    }
}

fn config(params: TransformParams) -> TransformConfig {
    TransformConfig::from_params(&params).unwrap()
}

/// A record whose pixel at (c, h, w) encodes its coordinate
fn coded_record(channels: usize, height: usize, width: usize) -> Record {
    let mut data = Vec::with_capacity(channels * height * width);
    for c in 0..channels {
        for h in 0..height {
            for w in 0..width {
                data.push((c * 10_000 + h * 100 + w) as f32);
            }
        }
    }
    Record::from_floats(channels, height, width, data, Some(1)).unwrap()
}

fn byte_record(channels: usize, height: usize, width: usize) -> Record {
    let data = (0..channels * height * width).map(|i| (i * 7 % 256) as u8).collect();
    Record::from_bytes(channels, height, width, data, None).unwrap()
}

#[test]
fn no_crop_keeps_dimensions_and_only_normalizes() {
    let record = byte_record(3, 7, 5);
    let mut transformer = Transformer::with_mean_source(
        config(TransformParams {
            scale: 0.25,
            mean_values: Some(vec![10.0]),
            ..Default::default()
        }),
        Phase::Test,
        MeanSource::PerChannel(Arc::from(vec![10.0f32])),
    );

    assert_eq!(transformer.infer_shape(&record).unwrap(), [3, 7, 5]);

    let mut dest = vec![0.0f64; 3 * 7 * 5];
    transformer.transform(0, &record, &mut dest).unwrap();

    for (i, &out) in dest.iter().enumerate() {
        let expected = (record.data().get(i) - 10.0) * 0.25;
        assert_eq!(out, expected);
    }
}

#[test]
fn crop_produces_c_k_k_values() {
    let record = byte_record(2, 9, 12);
    for k in 1..=9 {
        let mut transformer = Transformer::new(
            config(TransformParams {
                crop_size: k as i64,
                mirror: true,
                ..Default::default()
            }),
            Phase::Train,
        )
        .unwrap()
        .with_seed(k as u64);

        assert_eq!(transformer.infer_shape(&record).unwrap(), [2, k, k]);

        // One spare slot on each side catches writes outside the item
        let slot = 2 * k * k;
        let mut dest = vec![f32::NAN; 3 * slot];
        transformer.transform(1, &record, &mut dest).unwrap();

        assert!(dest[..slot].iter().all(|v| v.is_nan()));
        assert!(dest[slot..2 * slot].iter().all(|v| !v.is_nan()));
        assert!(dest[2 * slot..].iter().all(|v| v.is_nan()));
    }
}

#[test]
fn test_phase_is_deterministic() {
    let record = byte_record(3, 16, 16);
    let params = TransformParams {
        crop_size: 11,
        mirror: true,
        scale: 0.5,
        ..Default::default()
    };

    let mut first = Transformer::new(config(params.clone()), Phase::Test).unwrap();
    let mut second = Transformer::new(config(params), Phase::Test).unwrap();

    let mut a = vec![0.0f32; 3 * 11 * 11];
    let mut b = vec![0.0f32; 3 * 11 * 11];
    for _ in 0..5 {
        first.transform(0, &record, &mut a).unwrap();
        second.transform(0, &record, &mut b).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn fixed_seed_reproduces_train_sequence() {
    let record = coded_record(1, 20, 20);
    let params = TransformParams {
        crop_size: 13,
        mirror: true,
        ..Default::default()
    };

    let run = |seed: u64| {
        let mut transformer = Transformer::new(config(params.clone()), Phase::Train)
            .unwrap()
            .with_seed(seed);
        let mut outputs = Vec::new();
        for _ in 0..8 {
            let mut dest = vec![0.0f32; 13 * 13];
            transformer.transform(0, &record, &mut dest).unwrap();
            outputs.push(dest);
        }
        outputs
    };

    let first = run(1234);
    assert_eq!(first, run(1234));

    // Different draws actually happen across the sequence
    assert!(first.windows(2).any(|pair| pair[0] != pair[1]));
}

#[test]
fn mirrored_column_matches_unmirrored_reverse() {
    let record = coded_record(3, 10, 9);
    let params = TransformParams {
        crop_size: 6,
        mirror: true,
        ..Default::default()
    };

    // Same offsets (2, 1); only the mirror draw differs
    let mut plain = Transformer::new(config(params.clone()), Phase::Train)
        .unwrap()
        .with_random_source(Box::new(ScriptedSource(vec![2, 1, 0])));
    let mut mirrored = Transformer::new(config(params), Phase::Train)
        .unwrap()
        .with_random_source(Box::new(ScriptedSource(vec![2, 1, 1])));

    let mut a = vec![0.0f32; 3 * 36];
    let mut b = vec![0.0f32; 3 * 36];
    plain.transform(0, &record, &mut a).unwrap();
    mirrored.transform(0, &record, &mut b).unwrap();

    for c in 0..3 {
        for h in 0..6 {
            for w in 0..6 {
                let row = (c * 6 + h) * 6;
                assert_eq!(b[row + w], a[row + (6 - 1 - w)]);
            }
        }
    }
}

#[test]
fn full_reference_mean_and_scale_are_exact() {
    let record = byte_record(2, 6, 6);
    let mean_values: Vec<f32> = (0..72).map(|i| (i % 13) as f32 * 1.5).collect();
    let reference = Arc::new(MeanReference::new(2, 6, 6, mean_values).unwrap());

    let mut transformer = Transformer::with_mean_source(
        config(TransformParams {
            crop_size: 4,
            scale: 0.125,
            ..Default::default()
        }),
        Phase::Test,
        MeanSource::FullReference(Arc::clone(&reference)),
    );

    let mut dest = vec![0.0f64; 2 * 16];
    transformer.transform(0, &record, &mut dest).unwrap();

    // Center offset (1, 1)
    for c in 0..2 {
        for h in 0..4 {
            for w in 0..4 {
                let v = record.pixel(c, 1 + h, 1 + w);
                let m = reference.value(c, 1 + h, 1 + w);
                assert_eq!(dest[(c * 4 + h) * 4 + w], (v - m) * 0.125);
            }
        }
    }
}

#[test]
fn per_channel_mean_and_scale_are_exact() {
    let record = byte_record(3, 5, 5);
    let scalars = vec![104.0f32, 117.0, 123.0];

    let mut transformer = Transformer::new(
        config(TransformParams {
            crop_size: 3,
            scale: 0.017,
            mean_values: Some(scalars.clone()),
            ..Default::default()
        }),
        Phase::Test,
    )
    .unwrap();

    let mut dest = vec![0.0f32; 27];
    transformer.transform(0, &record, &mut dest).unwrap();

    for c in 0..3 {
        for h in 0..3 {
            for w in 0..3 {
                let v = record.pixel(c, 1 + h, 1 + w);
                let expected = ((v - f64::from(scalars[c])) * f64::from(0.017f32)) as f32;
                assert_eq!(dest[(c * 3 + h) * 3 + w], expected);
            }
        }
    }
}

#[test]
fn oversized_crop_fails_without_writing() {
    let record = byte_record(3, 8, 10);
    let mut transformer = Transformer::new(
        config(TransformParams {
            crop_size: 9,
            ..Default::default()
        }),
        Phase::Train,
    )
    .unwrap();

    let mut dest = vec![-3.0f32; 3 * 9 * 9];
    let result = transformer.transform(0, &record, &mut dest);

    assert!(matches!(result, Err(Error::Geometry(_))));
    assert!(dest.iter().all(|&v| v == -3.0));
}

#[test]
fn mean_channel_mismatch_is_geometry_error() {
    let record = byte_record(3, 4, 4);
    let reference = MeanReference::new(1, 4, 4, vec![0.0; 16]).unwrap();
    let mut transformer = Transformer::with_mean_source(
        TransformConfig::default(),
        Phase::Test,
        MeanSource::FullReference(Arc::new(reference)),
    );

    let mut dest = vec![0.0f32; 48];
    assert!(matches!(
        transformer.transform(0, &record, &mut dest),
        Err(Error::Geometry(_))
    ));
}

#[test]
fn missing_mean_file_fails_construction() {
    let result = Transformer::new(
        config(TransformParams {
            mean_file: Some("/nonexistent/mean.json".into()),
            ..Default::default()
        }),
        Phase::Test,
    );
    assert!(matches!(result, Err(Error::ResourceLoad(_))));
}

#[test]
fn center_crop_scenario() {
    let record = coded_record(3, 32, 32);
    let mut transformer = Transformer::new(
        config(TransformParams {
            crop_size: 28,
            mirror: false,
            scale: 1.0 / 255.0,
            mean_values: Some(vec![0.0, 0.0, 0.0]),
            ..Default::default()
        }),
        Phase::Test,
    )
    .unwrap();

    let mut dest = vec![0.0f32; 3 * 28 * 28];
    transformer.transform(0, &record, &mut dest).unwrap();

    let scale = f64::from(1.0f32 / 255.0);
    for c in 0..3 {
        for h in 0..28 {
            for w in 0..28 {
                let source = record.pixel(c, 2 + h, 2 + w);
                assert_eq!(dest[(c * 28 + h) * 28 + w], (source * scale) as f32);
            }
        }
    }
}

#[test]
fn train_scenario_with_offset_and_mirror() {
    // 33 rows leave room for a row offset of 5 under a 28 crop
    let record = coded_record(3, 33, 32);
    let mut transformer = Transformer::new(
        config(TransformParams {
            crop_size: 28,
            mirror: true,
            ..Default::default()
        }),
        Phase::Train,
    )
    .unwrap()
    .with_random_source(Box::new(ScriptedSource(vec![5, 3, 1])));

    let mut dest = vec![0.0f32; 3 * 28 * 28];
    transformer.transform(0, &record, &mut dest).unwrap();

    for c in 0..3 {
        for h in 0..28 {
            let row = (c * 28 + h) * 28;
            // Output column 0 reads source column 3 + 27 = 30
            assert_eq!(f64::from(dest[row]), record.pixel(c, 5 + h, 30));
            assert_eq!(f64::from(dest[row + 27]), record.pixel(c, 5 + h, 3));
        }
    }
}

#[test]
fn batch_fills_consecutive_slots() {
    let records: Vec<Record> = (0..4).map(|_| coded_record(1, 3, 3)).collect();
    let mut transformer = Transformer::new(TransformConfig::default(), Phase::Test).unwrap();

    let mut dest = vec![0.0f32; 4 * 9];
    transformer.transform_batch(&records, &mut dest).unwrap();

    for slot in dest.chunks(9) {
        assert_eq!(slot[4], 101.0);
    }
}
