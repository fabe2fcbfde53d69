//! Binary point ingestion
//!
//! The store's canonical layouts are packed f32: stride 8 `[x, y]` and
//! stride 20 `[t, o, h, l, c]`. Two legacy f64 transfer encodings are also
//! accepted and re-packed at this boundary: stride 16 `[x, y]` and stride
//! 40 in the public tuple order `[t, o, c, l, h]`. Nothing downstream ever
//! sees the public OHLC order.
//!
//! Buffers must be a whole number of points; a count that disagrees with a
//! stride-aligned length is repaired with a warning, anything else is a
//! `DataError`.

use chartgpu_shared::{ChartError, ChartResult, PointGeometry};

/// Strides accepted at the transfer boundary.
pub const XY_F32_STRIDE: usize = 8;
pub const XY_F64_STRIDE: usize = 16;
pub const OHLC_F32_STRIDE: usize = 20;
pub const OHLC_F64_STRIDE: usize = 40;

/// Decode a transfer buffer into canonical lane-packed f32 points.
///
/// Exactly `count` points are pre-allocated; the returned vector holds
/// `count * lanes` values.
pub fn decode_points(
    bytes: &[u8],
    count: usize,
    stride: usize,
) -> ChartResult<(PointGeometry, Vec<f32>)> {
    if stride == 0 || stride % 4 != 0 {
        return Err(ChartError::data(format!(
            "stride must be a positive multiple of 4, got {stride}"
        )));
    }

    let count = reconcile_count(bytes.len(), count, stride)?;

    match stride {
        XY_F32_STRIDE => {
            let mut values = Vec::with_capacity(count * 2);
            for point in bytes.chunks_exact(XY_F32_STRIDE) {
                values.push(read_f32(point, 0));
                values.push(read_f32(point, 4));
            }
            validate_finite(&values)?;
            Ok((PointGeometry::Xy, values))
        }
        XY_F64_STRIDE => {
            let mut values = Vec::with_capacity(count * 2);
            for point in bytes.chunks_exact(XY_F64_STRIDE) {
                values.push(read_f64(point, 0) as f32);
                values.push(read_f64(point, 8) as f32);
            }
            validate_finite(&values)?;
            Ok((PointGeometry::Xy, values))
        }
        OHLC_F32_STRIDE => {
            // Already in the internal [t, o, h, l, c] order.
            let mut values = Vec::with_capacity(count * 5);
            for point in bytes.chunks_exact(OHLC_F32_STRIDE) {
                for lane in 0..5 {
                    values.push(read_f32(point, lane * 4));
                }
            }
            validate_finite(&values)?;
            Ok((PointGeometry::Ohlc, values))
        }
        OHLC_F64_STRIDE => {
            // Public tuple order [t, o, c, l, h] re-packed to [t, o, h, l, c].
            let mut values = Vec::with_capacity(count * 5);
            for point in bytes.chunks_exact(OHLC_F64_STRIDE) {
                let t = read_f64(point, 0);
                let open = read_f64(point, 8);
                let close = read_f64(point, 16);
                let low = read_f64(point, 24);
                let high = read_f64(point, 32);
                values.push(t as f32);
                values.push(open as f32);
                values.push(high as f32);
                values.push(low as f32);
                values.push(close as f32);
            }
            validate_finite(&values)?;
            Ok((PointGeometry::Ohlc, values))
        }
        other => Err(ChartError::data(format!(
            "unsupported point stride: {other}"
        ))),
    }
}

fn reconcile_count(len: usize, count: usize, stride: usize) -> ChartResult<usize> {
    if len == count * stride {
        return Ok(count);
    }
    if len % stride == 0 {
        let derived = len / stride;
        log::warn!(
            "point count {count} disagrees with buffer length {len} (stride {stride}); using {derived}"
        );
        return Ok(derived);
    }
    Err(ChartError::data(format!(
        "buffer length {len} is not {count} x {stride} bytes"
    )))
}

fn validate_finite(values: &[f32]) -> ChartResult<()> {
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(ChartError::data(format!(
            "non-finite value at lane offset {pos}"
        )));
    }
    Ok(())
}

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    f64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy_f32_bytes(points: &[(f32, f32)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (x, y) in points {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn decodes_packed_f32_points() {
        let bytes = xy_f32_bytes(&[(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)]);
        let (geometry, values) = decode_points(&bytes, 3, XY_F32_STRIDE).unwrap();
        assert_eq!(geometry, PointGeometry::Xy);
        assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn repacks_legacy_f64_points() {
        let mut bytes = Vec::new();
        for (x, y) in [(1.5f64, -2.5f64), (3.0, 9.0)] {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
        }
        let (geometry, values) = decode_points(&bytes, 2, XY_F64_STRIDE).unwrap();
        assert_eq!(geometry, PointGeometry::Xy);
        assert_eq!(values, vec![1.5, -2.5, 3.0, 9.0]);
    }

    #[test]
    fn reorders_public_ohlc_tuples() {
        // Public order: [t, o, c, l, h]
        let mut bytes = Vec::new();
        for v in [100.0f64, 10.0, 12.0, 9.0, 13.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let (geometry, values) = decode_points(&bytes, 1, OHLC_F64_STRIDE).unwrap();
        assert_eq!(geometry, PointGeometry::Ohlc);
        // Internal order: [t, o, h, l, c]
        assert_eq!(values, vec![100.0, 10.0, 13.0, 9.0, 12.0]);
    }

    #[test]
    fn f32_ohlc_is_taken_verbatim() {
        let mut bytes = Vec::new();
        for v in [100.0f32, 10.0, 13.0, 9.0, 12.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let (_, values) = decode_points(&bytes, 1, OHLC_F32_STRIDE).unwrap();
        assert_eq!(values, vec![100.0, 10.0, 13.0, 9.0, 12.0]);
    }

    #[test]
    fn size_mismatch_is_a_data_error() {
        let bytes = xy_f32_bytes(&[(0.0, 0.0)]);
        let result = decode_points(&bytes[..7], 1, XY_F32_STRIDE);
        assert!(matches!(result, Err(ChartError::Data { .. })));
    }

    #[test]
    fn count_mismatch_with_aligned_length_is_repaired() {
        let bytes = xy_f32_bytes(&[(0.0, 0.0), (1.0, 1.0)]);
        let (_, values) = decode_points(&bytes, 5, XY_F32_STRIDE).unwrap();
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn unknown_stride_is_rejected() {
        let result = decode_points(&[0u8; 24], 2, 12);
        assert!(matches!(result, Err(ChartError::Data { .. })));
        let result = decode_points(&[0u8; 6], 1, 6);
        assert!(matches!(result, Err(ChartError::Data { .. })));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let bytes = xy_f32_bytes(&[(0.0, f32::NAN)]);
        let result = decode_points(&bytes, 1, XY_F32_STRIDE);
        assert!(matches!(result, Err(ChartError::Data { .. })));
    }
}
