//! Linear and category scales
//!
//! Scales map domain values to device-pixel positions inside the grid area.
//! Hit testing and the GPU transform both derive from the same scale
//! instances, which is what keeps pointer math consistent with what the
//! vertex stage draws.

use chartgpu_shared::{ChartError, ChartResult};
use std::collections::HashMap;

/// Affine domain → range mapping. No clamping: values outside the domain
/// project outside the range (the scissor rect handles visibility).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain_min: f64,
    pub domain_max: f64,
    pub range_min: f64,
    pub range_max: f64,
}

impl LinearScale {
    pub fn new(domain_min: f64, domain_max: f64, range_min: f64, range_max: f64) -> Self {
        Self {
            domain_min,
            domain_max,
            range_min,
            range_max,
        }
    }

    pub fn domain_span(&self) -> f64 {
        self.domain_max - self.domain_min
    }

    pub fn scale(&self, v: f64) -> f64 {
        let spread = self.domain_max - self.domain_min;
        if spread == 0.0 {
            // Zero-width domain collapses to the range midpoint.
            return (self.range_min + self.range_max) * 0.5;
        }
        self.range_min + (v - self.domain_min) / spread * (self.range_max - self.range_min)
    }

    pub fn invert(&self, px: f64) -> f64 {
        let spread = self.range_max - self.range_min;
        if spread == 0.0 {
            // Zero-width range inverts to the domain midpoint.
            return (self.domain_min + self.domain_max) * 0.5;
        }
        self.domain_min + (px - self.range_min) / spread * (self.domain_max - self.domain_min)
    }
}

/// Maps N unique labels to the centers of N equal bands across the range.
#[derive(Debug, Clone)]
pub struct CategoryScale {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    pub range_min: f64,
    pub range_max: f64,
}

impl CategoryScale {
    pub fn new(labels: Vec<String>, range_min: f64, range_max: f64) -> ChartResult<Self> {
        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if index.insert(label.clone(), i).is_some() {
                return Err(ChartError::invalid_argument(format!(
                    "duplicate category label: {label:?}"
                )));
            }
        }
        Ok(Self {
            labels,
            index,
            range_min,
            range_max,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn bandwidth(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        (self.range_max - self.range_min).abs() / self.labels.len() as f64
    }

    /// Center of band `i`; NaN when out of range.
    pub fn scale_index(&self, i: usize) -> f64 {
        if i >= self.labels.len() {
            return f64::NAN;
        }
        let n = self.labels.len() as f64;
        let t = (i as f64 + 0.5) / n;
        self.range_min + t * (self.range_max - self.range_min)
    }

    /// Center of the band for `label`; NaN for an unknown category.
    pub fn scale_label(&self, label: &str) -> f64 {
        match self.index.get(label) {
            Some(&i) => self.scale_index(i),
            None => f64::NAN,
        }
    }

    /// Band index nearest to a range position.
    pub fn invert(&self, px: f64) -> Option<usize> {
        if self.labels.is_empty() {
            return None;
        }
        let spread = self.range_max - self.range_min;
        if spread == 0.0 {
            return Some(0);
        }
        let t = (px - self.range_min) / spread;
        let i = (t * self.labels.len() as f64).floor();
        let i = i.clamp(0.0, self.labels.len() as f64 - 1.0);
        Some(i as usize)
    }
}

/// Either axis scale; data indices stand in for the domain on category axes.
#[derive(Debug, Clone)]
pub enum Scale {
    Linear(LinearScale),
    Category(CategoryScale),
}

impl Scale {
    /// Map a domain value (or category index) to a range position.
    pub fn to_px(&self, v: f64) -> f64 {
        match self {
            Scale::Linear(s) => s.scale(v),
            Scale::Category(s) => {
                if v < 0.0 {
                    f64::NAN
                } else {
                    s.scale_index(v as usize)
                }
            }
        }
    }

    /// Map a range position back to a domain value (or category index).
    pub fn invert_px(&self, px: f64) -> f64 {
        match self {
            Scale::Linear(s) => s.invert(px),
            Scale::Category(s) => s.invert(px).map(|i| i as f64).unwrap_or(f64::NAN),
        }
    }

    pub fn range(&self) -> (f64, f64) {
        match self {
            Scale::Linear(s) => (s.range_min, s.range_max),
            Scale::Category(s) => (s.range_min, s.range_max),
        }
    }
}

/// Generate "nice" tick positions covering `[min, max]`, aiming for
/// `hint` intervals (default 5) on a 1-2-5 ladder.
pub fn nice_ticks(min: f64, max: f64, hint: Option<u32>) -> Vec<f64> {
    if !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    let target = hint.unwrap_or(5).max(1) as f64;
    let spread = max - min;
    if spread == 0.0 {
        return vec![min];
    }

    let raw_step = spread / target;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let residual = raw_step / magnitude;
    let step = if residual < 1.5 {
        magnitude
    } else if residual < 3.0 {
        2.0 * magnitude
    } else if residual < 7.0 {
        5.0 * magnitude
    } else {
        10.0 * magnitude
    };

    let first = (min / step).ceil() * step;
    let mut ticks = Vec::new();
    let mut tick = first;
    // Half-step tolerance picks up the max tick despite rounding.
    while tick <= max + step * 0.5 {
        // Snap near-zero ticks produced by floating error.
        let snapped = if tick.abs() < step * 1e-9 { 0.0 } else { tick };
        ticks.push(snapped);
        tick += step;
    }
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_scale_round_trips() {
        let scale = LinearScale::new(10.0, 110.0, 0.0, 800.0);
        for v in [10.0, 42.5, 110.0, -3.0, 250.0] {
            let round = scale.invert(scale.scale(v));
            // 1 ULP * spread tolerance.
            assert!((round - v).abs() <= f64::EPSILON * 100.0 * v.abs().max(1.0));
        }
    }

    #[test]
    fn linear_scale_does_not_clamp() {
        let scale = LinearScale::new(0.0, 10.0, 0.0, 100.0);
        assert_eq!(scale.scale(20.0), 200.0);
        assert_eq!(scale.scale(-10.0), -100.0);
    }

    #[test]
    fn zero_width_domain_maps_to_range_midpoint() {
        let scale = LinearScale::new(5.0, 5.0, 0.0, 100.0);
        assert_eq!(scale.scale(5.0), 50.0);
        assert_eq!(scale.scale(999.0), 50.0);
    }

    #[test]
    fn zero_width_range_inverts_to_domain_midpoint() {
        let scale = LinearScale::new(0.0, 10.0, 50.0, 50.0);
        assert_eq!(scale.invert(50.0), 5.0);
    }

    #[test]
    fn category_scale_band_centers() {
        let scale = CategoryScale::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            0.0,
            400.0,
        )
        .unwrap();
        assert_eq!(scale.bandwidth(), 100.0);
        assert_eq!(scale.scale_index(0), 50.0);
        assert_eq!(scale.scale_index(3), 350.0);
        assert_eq!(scale.scale_label("b"), 150.0);
    }

    #[test]
    fn category_scale_rejects_duplicates() {
        let result = CategoryScale::new(vec!["a".into(), "a".into()], 0.0, 100.0);
        assert!(matches!(
            result,
            Err(ChartError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn unknown_category_maps_to_nan() {
        let scale = CategoryScale::new(vec!["a".into()], 0.0, 100.0).unwrap();
        assert!(scale.scale_label("missing").is_nan());
    }

    #[test]
    fn category_invert_finds_nearest_band() {
        let scale =
            CategoryScale::new(vec!["a".into(), "b".into(), "c".into()], 0.0, 300.0).unwrap();
        assert_eq!(scale.invert(10.0), Some(0));
        assert_eq!(scale.invert(150.0), Some(1));
        assert_eq!(scale.invert(299.0), Some(2));
        assert_eq!(scale.invert(-50.0), Some(0));
        assert_eq!(scale.invert(500.0), Some(2));
    }

    #[test]
    fn nice_ticks_cover_the_domain() {
        let ticks = nice_ticks(0.0, 4.2, None);
        assert!(!ticks.is_empty());
        assert!(ticks[0] >= 0.0);
        assert!(*ticks.last().unwrap() >= 4.0);
        // Steps on the 1-2-5 ladder.
        let step = ticks[1] - ticks[0];
        let normalized = step / 10f64.powf(step.log10().floor());
        assert!(
            (normalized - 1.0).abs() < 1e-9
                || (normalized - 2.0).abs() < 1e-9
                || (normalized - 5.0).abs() < 1e-9
        );
    }

    #[test]
    fn nice_ticks_honor_split_hint() {
        let coarse = nice_ticks(0.0, 100.0, Some(2));
        let fine = nice_ticks(0.0, 100.0, Some(10));
        assert!(fine.len() > coarse.len());
    }

    #[test]
    fn nice_ticks_degenerate_domain() {
        assert_eq!(nice_ticks(3.0, 3.0, None), vec![3.0]);
        assert!(nice_ticks(f64::NAN, 1.0, None).is_empty());
    }
}
