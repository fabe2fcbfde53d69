//! Transfer-to-store pipeline: raw buffers through ingestion into the
//! store, checking the append contract end to end.

use chartgpu_data::{decode_points, DataStore, UploadPlan};
use chartgpu_shared::{ChartError, PointGeometry, SamplingStrategy};

fn xy_f32_bytes(points: &[(f32, f32)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (x, y) in points {
        bytes.extend_from_slice(&x.to_le_bytes());
        bytes.extend_from_slice(&y.to_le_bytes());
    }
    bytes
}

fn store_with_one_series() -> DataStore {
    let mut store = DataStore::new();
    store
        .configure_series(&[(PointGeometry::Xy, SamplingStrategy::None, 0)])
        .unwrap();
    store
}

#[test]
fn decoded_batches_concatenate_in_arrival_order() {
    let mut store = store_with_one_series();

    let batches = [
        vec![(0.0f32, 0.0f32), (1.0, 1.0)],
        vec![(2.0, 4.0)],
        vec![(3.0, 9.0), (4.0, 16.0), (5.0, 25.0)],
    ];
    let mut expected = Vec::new();
    for batch in &batches {
        let bytes = xy_f32_bytes(batch);
        let (geometry, points) = decode_points(&bytes, batch.len(), 8).unwrap();
        assert_eq!(geometry, PointGeometry::Xy);
        store.append(0, &points).unwrap();
        expected.extend(batch.iter().flat_map(|(x, y)| [*x, *y]));
    }

    let series = store.series(0).unwrap();
    assert_eq!(series.points(), expected.as_slice());
    assert_eq!(series.point_count(), 6);
    assert!(series.append_cursor() <= series.point_count());
}

#[test]
fn legacy_f64_transfer_lands_identically_to_f32() {
    let mut f32_store = store_with_one_series();
    let mut f64_store = store_with_one_series();

    let points = [(1.0f64, 2.0f64), (3.0, 4.0)];
    let mut f64_bytes = Vec::new();
    for (x, y) in &points {
        f64_bytes.extend_from_slice(&x.to_le_bytes());
        f64_bytes.extend_from_slice(&y.to_le_bytes());
    }
    let f32_bytes = xy_f32_bytes(&[(1.0, 2.0), (3.0, 4.0)]);

    let (_, legacy) = decode_points(&f64_bytes, 2, 16).unwrap();
    let (_, packed) = decode_points(&f32_bytes, 2, 8).unwrap();
    f64_store.append(0, &legacy).unwrap();
    f32_store.append(0, &packed).unwrap();

    assert_eq!(
        f64_store.series(0).unwrap().points(),
        f32_store.series(0).unwrap().points()
    );
    assert_eq!(
        f64_store.series(0).unwrap().content_hash(),
        f32_store.series(0).unwrap().content_hash()
    );
}

#[test]
fn candles_normalize_before_storage() {
    let mut store = DataStore::new();
    store
        .configure_series(&[(PointGeometry::Ohlc, SamplingStrategy::None, 0)])
        .unwrap();

    // Public f64 tuple order [t, o, c, l, h].
    let mut bytes = Vec::new();
    for v in [1.0f64, 10.0, 12.0, 9.0, 13.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let (geometry, points) = decode_points(&bytes, 1, 40).unwrap();
    assert_eq!(geometry, PointGeometry::Ohlc);
    store.append(0, &points).unwrap();

    let series = store.series(0).unwrap();
    // Internal order [t, o, h, l, c].
    assert_eq!(series.points(), &[1.0, 10.0, 13.0, 9.0, 12.0]);
    // Candle body close is what xy_at reports.
    assert_eq!(series.xy_at(0), Some((1.0, 12.0)));
}

#[test]
fn sized_buffers_always_plan_at_least_the_used_bytes() {
    let mut store = store_with_one_series();
    let points: Vec<f32> = (0..100).flat_map(|i| [i as f32, i as f32]).collect();
    store.append(0, &points).unwrap();

    match store.series(0).unwrap().pending_upload() {
        UploadPlan::Full { byte_len } => assert_eq!(byte_len, 100 * 8),
        other => panic!("expected full first upload, got {other:?}"),
    }
}

#[test]
fn bad_transfers_never_reach_the_store() {
    let mut store = store_with_one_series();

    // Truncated buffer.
    let bytes = xy_f32_bytes(&[(0.0, 0.0)]);
    assert!(matches!(
        decode_points(&bytes[..6], 1, 8),
        Err(ChartError::Data { .. })
    ));

    // NaN payload decodes to an error, so nothing is appended.
    let bad = xy_f32_bytes(&[(f32::NAN, 1.0)]);
    assert!(decode_points(&bad, 1, 8).is_err());
    assert_eq!(store.series(0).unwrap().point_count(), 0);

    // Out-of-range series index at the store boundary.
    assert!(matches!(
        store.append(7, &[0.0, 1.0]),
        Err(ChartError::Data { .. })
    ));
}
