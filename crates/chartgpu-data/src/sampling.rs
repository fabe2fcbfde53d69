//! Series downsampling
//!
//! Applied before upload when a series' logical list exceeds its sampling
//! threshold. LTTB preserves visual shape for line-like series; the bucket
//! strategies keep one representative per bucket; OHLC merges whole candles.

use chartgpu_shared::{PointGeometry, SamplingStrategy};

/// Downsample `points` to roughly `threshold` points. Returns `None` when
/// no sampling applies (strategy none, under threshold, or a strategy that
/// does not fit the geometry).
pub fn downsample(
    points: &[f32],
    geometry: PointGeometry,
    strategy: SamplingStrategy,
    threshold: usize,
) -> Option<Vec<f32>> {
    let lanes = geometry.lanes();
    let count = points.len() / lanes;
    if strategy == SamplingStrategy::None || threshold < 2 || count <= threshold {
        return None;
    }
    match (strategy, geometry) {
        (SamplingStrategy::Lttb, PointGeometry::Xy) => Some(lttb(points, threshold)),
        (SamplingStrategy::Average, PointGeometry::Xy) => {
            Some(bucketed(points, threshold, BucketOp::Average))
        }
        (SamplingStrategy::Min, PointGeometry::Xy) => {
            Some(bucketed(points, threshold, BucketOp::Min))
        }
        (SamplingStrategy::Max, PointGeometry::Xy) => {
            Some(bucketed(points, threshold, BucketOp::Max))
        }
        (SamplingStrategy::Ohlc, PointGeometry::Ohlc) => Some(merge_candles(points, threshold)),
        (strategy, geometry) => {
            log::warn!("sampling strategy {strategy:?} does not apply to {geometry:?} series");
            None
        }
    }
}

/// Largest-Triangle-Three-Buckets over `[x, y]` pairs. Keeps the first and
/// last points and the point of greatest triangle area per bucket.
fn lttb(points: &[f32], threshold: usize) -> Vec<f32> {
    let count = points.len() / 2;
    debug_assert!(threshold >= 2 && count > threshold);

    let point = |i: usize| (points[i * 2] as f64, points[i * 2 + 1] as f64);
    let mut out = Vec::with_capacity(threshold * 2);
    out.extend_from_slice(&points[0..2]);

    let bucket_size = (count - 2) as f64 / (threshold - 2) as f64;
    let mut selected = 0usize;

    for bucket in 0..threshold - 2 {
        let start = (bucket as f64 * bucket_size) as usize + 1;
        let end = (((bucket + 1) as f64) * bucket_size) as usize + 1;
        let end = end.min(count - 1);

        // Average of the next bucket is the third triangle corner.
        let next_start = end;
        let next_end = ((bucket + 2) as f64 * bucket_size) as usize + 1;
        let next_end = next_end.min(count);
        let mut avg_x = 0.0;
        let mut avg_y = 0.0;
        let next_len = (next_end - next_start).max(1);
        for i in next_start..next_end {
            let (x, y) = point(i);
            avg_x += x;
            avg_y += y;
        }
        avg_x /= next_len as f64;
        avg_y /= next_len as f64;

        let (ax, ay) = point(selected);
        let mut best_area = -1.0;
        let mut best = start;
        for i in start..end {
            let (bx, by) = point(i);
            let area = ((ax - avg_x) * (by - ay) - (ax - bx) * (avg_y - ay)).abs();
            if area > best_area {
                best_area = area;
                best = i;
            }
        }

        out.push(points[best * 2]);
        out.push(points[best * 2 + 1]);
        selected = best;
    }

    out.extend_from_slice(&points[(count - 1) * 2..count * 2]);
    out
}

enum BucketOp {
    Average,
    Min,
    Max,
}

fn bucketed(points: &[f32], threshold: usize, op: BucketOp) -> Vec<f32> {
    let count = points.len() / 2;
    let bucket_size = count as f64 / threshold as f64;
    let mut out = Vec::with_capacity(threshold * 2);

    for bucket in 0..threshold {
        let start = (bucket as f64 * bucket_size) as usize;
        let end = (((bucket + 1) as f64) * bucket_size) as usize;
        let end = end.min(count);
        if start >= end {
            continue;
        }

        match op {
            BucketOp::Average => {
                let mut sum_x = 0.0f64;
                let mut sum_y = 0.0f64;
                for i in start..end {
                    sum_x += points[i * 2] as f64;
                    sum_y += points[i * 2 + 1] as f64;
                }
                let n = (end - start) as f64;
                out.push((sum_x / n) as f32);
                out.push((sum_y / n) as f32);
            }
            BucketOp::Min | BucketOp::Max => {
                let mut best = start;
                for i in start + 1..end {
                    let better = match op {
                        BucketOp::Min => points[i * 2 + 1] < points[best * 2 + 1],
                        _ => points[i * 2 + 1] > points[best * 2 + 1],
                    };
                    if better {
                        best = i;
                    }
                }
                out.push(points[best * 2]);
                out.push(points[best * 2 + 1]);
            }
        }
    }
    out
}

/// Merge runs of candles: first open, max high, min low, last close.
fn merge_candles(points: &[f32], threshold: usize) -> Vec<f32> {
    let count = points.len() / 5;
    let bucket_size = count as f64 / threshold as f64;
    let mut out = Vec::with_capacity(threshold * 5);

    for bucket in 0..threshold {
        let start = (bucket as f64 * bucket_size) as usize;
        let end = (((bucket + 1) as f64) * bucket_size) as usize;
        let end = end.min(count);
        if start >= end {
            continue;
        }

        let t = points[start * 5];
        let open = points[start * 5 + 1];
        let mut high = f32::NEG_INFINITY;
        let mut low = f32::INFINITY;
        for i in start..end {
            high = high.max(points[i * 5 + 2]);
            low = low.min(points[i * 5 + 3]);
        }
        let close = points[(end - 1) * 5 + 4];
        out.extend_from_slice(&[t, open, high, low, close]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n)
            .flat_map(|i| [i as f32, (i as f32 * 0.1).sin()])
            .collect()
    }

    #[test]
    fn no_sampling_below_threshold() {
        let points = ramp(100);
        assert!(downsample(&points, PointGeometry::Xy, SamplingStrategy::Lttb, 100).is_none());
        assert!(downsample(&points, PointGeometry::Xy, SamplingStrategy::None, 10).is_none());
    }

    #[test]
    fn lttb_keeps_endpoints_and_count() {
        let points = ramp(1000);
        let sampled =
            downsample(&points, PointGeometry::Xy, SamplingStrategy::Lttb, 100).unwrap();
        assert_eq!(sampled.len(), 200);
        assert_eq!(&sampled[0..2], &points[0..2]);
        assert_eq!(&sampled[198..200], &points[1998..2000]);
        // X stays monotonic.
        for pair in sampled.chunks_exact(2).collect::<Vec<_>>().windows(2) {
            assert!(pair[1][0] > pair[0][0]);
        }
    }

    #[test]
    fn max_sampling_keeps_the_peak() {
        let mut points = ramp(500);
        points[251 * 2 + 1] = 99.0;
        let sampled =
            downsample(&points, PointGeometry::Xy, SamplingStrategy::Max, 50).unwrap();
        assert!(sampled.chunks_exact(2).any(|p| p[1] == 99.0));
    }

    #[test]
    fn min_sampling_keeps_the_trough() {
        let mut points = ramp(500);
        points[333 * 2 + 1] = -99.0;
        let sampled =
            downsample(&points, PointGeometry::Xy, SamplingStrategy::Min, 50).unwrap();
        assert!(sampled.chunks_exact(2).any(|p| p[1] == -99.0));
    }

    #[test]
    fn average_sampling_buckets_values() {
        let points: Vec<f32> = (0..100).flat_map(|i| [i as f32, 10.0]).collect();
        let sampled =
            downsample(&points, PointGeometry::Xy, SamplingStrategy::Average, 10).unwrap();
        assert_eq!(sampled.len(), 20);
        for pair in sampled.chunks_exact(2) {
            assert!((pair[1] - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn ohlc_merge_preserves_extremes() {
        // Four candles, distinctive high/low in the middle.
        let candles: Vec<f32> = vec![
            0.0, 10.0, 11.0, 9.0, 10.5, //
            1.0, 10.5, 20.0, 10.0, 12.0, //
            2.0, 12.0, 13.0, 2.0, 11.0, //
            3.0, 11.0, 12.0, 10.0, 11.5,
        ];
        let sampled =
            downsample(&candles, PointGeometry::Ohlc, SamplingStrategy::Ohlc, 2).unwrap();
        assert_eq!(sampled.len(), 10);
        // First merged candle: open of #0, close of #1, high of both.
        assert_eq!(sampled[1], 10.0);
        assert_eq!(sampled[2], 20.0);
        assert_eq!(sampled[4], 12.0);
        // Second merged candle keeps the low of candle #2.
        assert_eq!(sampled[8], 2.0);
    }

    #[test]
    fn mismatched_strategy_and_geometry_is_a_no_op() {
        let points = ramp(1000);
        assert!(downsample(&points, PointGeometry::Xy, SamplingStrategy::Ohlc, 10).is_none());
    }
}
