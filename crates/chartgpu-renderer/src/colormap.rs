//! Colormaps for heatmap and scatter-density rendering
//!
//! Named maps (viridis/plasma/inferno) sample a 256-entry LUT built from the
//! standard anchor colors; user maps interpolate explicit stops. The density
//! renderer uploads the LUT as an rgba8 texture and normalizes counts with a
//! linear, sqrt, or log curve before lookup.

use chartgpu_shared::{Color, ColormapSpec, DensityCurve, NamedColormap};
use once_cell::sync::Lazy;

pub const LUT_SIZE: usize = 256;

const VIRIDIS_ANCHORS: [[f32; 3]; 10] = [
    [0.267, 0.005, 0.329],
    [0.283, 0.141, 0.458],
    [0.243, 0.287, 0.537],
    [0.192, 0.408, 0.556],
    [0.149, 0.510, 0.557],
    [0.122, 0.620, 0.537],
    [0.208, 0.718, 0.473],
    [0.431, 0.808, 0.345],
    [0.710, 0.871, 0.169],
    [0.992, 0.906, 0.145],
];

const PLASMA_ANCHORS: [[f32; 3]; 10] = [
    [0.051, 0.031, 0.529],
    [0.275, 0.012, 0.624],
    [0.447, 0.004, 0.659],
    [0.612, 0.090, 0.620],
    [0.741, 0.216, 0.525],
    [0.847, 0.341, 0.420],
    [0.929, 0.475, 0.326],
    [0.984, 0.624, 0.227],
    [0.992, 0.792, 0.149],
    [0.941, 0.976, 0.643],
];

const INFERNO_ANCHORS: [[f32; 3]; 10] = [
    [0.000, 0.000, 0.016],
    [0.106, 0.047, 0.255],
    [0.290, 0.047, 0.420],
    [0.471, 0.110, 0.427],
    [0.647, 0.173, 0.376],
    [0.812, 0.267, 0.275],
    [0.929, 0.412, 0.145],
    [0.984, 0.608, 0.024],
    [0.969, 0.816, 0.235],
    [0.988, 1.000, 0.643],
];

static VIRIDIS_LUT: Lazy<Vec<Color>> = Lazy::new(|| build_lut(&VIRIDIS_ANCHORS));
static PLASMA_LUT: Lazy<Vec<Color>> = Lazy::new(|| build_lut(&PLASMA_ANCHORS));
static INFERNO_LUT: Lazy<Vec<Color>> = Lazy::new(|| build_lut(&INFERNO_ANCHORS));

fn build_lut(anchors: &[[f32; 3]]) -> Vec<Color> {
    (0..LUT_SIZE)
        .map(|i| {
            let t = i as f32 / (LUT_SIZE - 1) as f32;
            let scaled = t * (anchors.len() - 1) as f32;
            let lo = scaled.floor() as usize;
            let hi = (lo + 1).min(anchors.len() - 1);
            let frac = scaled - lo as f32;
            let a = anchors[lo];
            let b = anchors[hi];
            [
                a[0] + (b[0] - a[0]) * frac,
                a[1] + (b[1] - a[1]) * frac,
                a[2] + (b[2] - a[2]) * frac,
                1.0,
            ]
        })
        .collect()
}

/// A resolved colormap ready for CPU sampling or LUT upload.
#[derive(Debug, Clone)]
pub struct Colormap {
    lut: Vec<Color>,
}

impl Colormap {
    pub fn resolve(spec: &ColormapSpec) -> Self {
        match spec {
            ColormapSpec::Named(named) => {
                let lut = match named {
                    NamedColormap::Viridis => VIRIDIS_LUT.clone(),
                    NamedColormap::Plasma => PLASMA_LUT.clone(),
                    NamedColormap::Inferno => INFERNO_LUT.clone(),
                };
                Self { lut }
            }
            ColormapSpec::Stops(stops) => Self {
                lut: Self::lut_from_stops(stops),
            },
        }
    }

    fn lut_from_stops(stops: &[(f32, Color)]) -> Vec<Color> {
        if stops.is_empty() {
            return vec![[0.0, 0.0, 0.0, 1.0]; LUT_SIZE];
        }
        let mut sorted: Vec<(f32, Color)> = stops.to_vec();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        (0..LUT_SIZE)
            .map(|i| {
                let t = i as f32 / (LUT_SIZE - 1) as f32;
                let after = sorted.iter().position(|(s, _)| *s >= t);
                match after {
                    Some(0) => sorted[0].1,
                    None => sorted.last().unwrap().1,
                    Some(hi) => {
                        let (t0, c0) = sorted[hi - 1];
                        let (t1, c1) = sorted[hi];
                        let frac = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
                        [
                            c0[0] + (c1[0] - c0[0]) * frac,
                            c0[1] + (c1[1] - c0[1]) * frac,
                            c0[2] + (c1[2] - c0[2]) * frac,
                            c0[3] + (c1[3] - c0[3]) * frac,
                        ]
                    }
                }
            })
            .collect()
    }

    /// Sample at `t ∈ [0, 1]`.
    pub fn sample(&self, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let i = (t * (LUT_SIZE - 1) as f32).round() as usize;
        self.lut[i.min(LUT_SIZE - 1)]
    }

    /// The LUT index `t` resolves to; exposed so tests and the density
    /// shader agree on ordering.
    pub fn sample_index(&self, t: f32) -> usize {
        (t.clamp(0.0, 1.0) * (LUT_SIZE - 1) as f32).round() as usize
    }

    /// LUT as tightly packed rgba8 bytes for a `256×1` texture upload.
    pub fn lut_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(LUT_SIZE * 4);
        for color in &self.lut {
            for channel in color {
                bytes.push((channel.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
        bytes
    }
}

/// Count normalization for density rendering.
pub trait DensityCurveExt {
    /// Normalize `count` against `max` into `[0, 1]`.
    fn normalize(&self, count: f64, max: f64) -> f64;
}

impl DensityCurveExt for DensityCurve {
    fn normalize(&self, count: f64, max: f64) -> f64 {
        if max <= 0.0 || count <= 0.0 {
            return 0.0;
        }
        let v = match self {
            DensityCurve::Linear => count / max,
            DensityCurve::Sqrt => (count / max).sqrt(),
            DensityCurve::Log => (1.0 + count).ln() / (1.0 + max).ln(),
        };
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_values_walk_the_lut_in_order() {
        let map = Colormap::resolve(&ColormapSpec::Named(NamedColormap::Viridis));
        // 0..=9 over a 3x3 grid normalized by max=9: the per-cell color
        // order must match the colormap sample order.
        let indices: Vec<usize> = (0..=9)
            .map(|v| map.sample_index(v as f32 / 9.0))
            .collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
        assert_eq!(indices[0], 0);
        assert_eq!(*indices.last().unwrap(), LUT_SIZE - 1);
    }

    #[test]
    fn named_maps_have_distinct_endpoints() {
        for named in [
            NamedColormap::Viridis,
            NamedColormap::Plasma,
            NamedColormap::Inferno,
        ] {
            let map = Colormap::resolve(&ColormapSpec::Named(named));
            let lo = map.sample(0.0);
            let hi = map.sample(1.0);
            assert_ne!(lo, hi);
        }
    }

    #[test]
    fn user_stops_interpolate() {
        let map = Colormap::resolve(&ColormapSpec::Stops(vec![
            (0.0, [0.0, 0.0, 0.0, 1.0]),
            (1.0, [1.0, 1.0, 1.0, 1.0]),
        ]));
        let mid = map.sample(0.5);
        assert!((mid[0] - 0.5).abs() < 0.01);
        assert!((mid[1] - 0.5).abs() < 0.01);
    }

    #[test]
    fn lut_bytes_are_rgba8() {
        let map = Colormap::resolve(&ColormapSpec::Named(NamedColormap::Plasma));
        let bytes = map.lut_rgba8();
        assert_eq!(bytes.len(), LUT_SIZE * 4);
        // Alpha channel fully opaque throughout.
        assert!(bytes.chunks(4).all(|px| px[3] == 255));
    }

    #[test]
    fn density_curves_are_monotonic_and_bounded() {
        for curve in [DensityCurve::Linear, DensityCurve::Sqrt, DensityCurve::Log] {
            let mut last = 0.0;
            for count in 0..=100 {
                let v = curve.normalize(count as f64, 100.0);
                assert!((0.0..=1.0).contains(&v));
                assert!(v >= last);
                last = v;
            }
            assert_eq!(curve.normalize(0.0, 100.0), 0.0);
            assert!((curve.normalize(100.0, 100.0) - 1.0).abs() < 1e-9);
        }
    }
}
