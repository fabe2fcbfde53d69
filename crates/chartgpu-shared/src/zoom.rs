//! Zoom window state in percent space
//!
//! The data-zoom window lives in `[0, 100]` percent space over the x domain.
//! Every mutation clamps back into range and honors the configured span
//! limits; `start < end` holds at all times.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomState {
    pub start: f64,
    pub end: f64,
    pub min_span: Option<f64>,
    pub max_span: Option<f64>,
}

/// Smallest window the state will clamp to when no `min_span` is set.
const EPSILON_SPAN: f64 = 1e-3;

impl ZoomState {
    pub fn new(start: f64, end: f64) -> Self {
        let mut state = Self {
            start,
            end,
            min_span: None,
            max_span: None,
        };
        state.clamp();
        state
    }

    pub fn full() -> Self {
        Self::new(0.0, 100.0)
    }

    pub fn with_span_limits(mut self, min_span: Option<f64>, max_span: Option<f64>) -> Self {
        self.min_span = min_span;
        self.max_span = max_span;
        self.clamp();
        self
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Set the window. Returns `false` when the clamped result equals the
    /// current state, so callers can skip echoing unchanged values.
    pub fn set(&mut self, start: f64, end: f64) -> bool {
        let previous = (self.start, self.end);
        self.start = start;
        self.end = end;
        self.clamp();
        (self.start, self.end) != previous
    }

    /// Translate the window by `delta` percent, preserving the span where
    /// the bounds allow.
    pub fn translate(&mut self, delta: f64) -> bool {
        let span = self.span();
        let mut start = self.start + delta;
        let mut end = self.end + delta;
        if start < 0.0 {
            start = 0.0;
            end = span;
        }
        if end > 100.0 {
            end = 100.0;
            start = 100.0 - span;
        }
        self.set(start, end)
    }

    /// Scale the span by `factor` about `anchor` (percent space), keeping
    /// the anchor's relative position inside the window.
    pub fn zoom_about(&mut self, anchor: f64, factor: f64) -> bool {
        let anchor = anchor.clamp(0.0, 100.0);
        let factor = if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            1.0
        };
        let start = anchor - (anchor - self.start) * factor;
        let end = anchor + (self.end - anchor) * factor;
        self.set(start, end)
    }

    fn clamp(&mut self) {
        if !self.start.is_finite() {
            self.start = 0.0;
        }
        if !self.end.is_finite() {
            self.end = 100.0;
        }
        if self.start > self.end {
            std::mem::swap(&mut self.start, &mut self.end);
        }
        self.start = self.start.clamp(0.0, 100.0);
        self.end = self.end.clamp(0.0, 100.0);

        let min_span = self.min_span.unwrap_or(EPSILON_SPAN).max(EPSILON_SPAN);
        let max_span = self.max_span.unwrap_or(100.0).clamp(min_span, 100.0);

        let span = self.span();
        let target = span.clamp(min_span, max_span);
        if (target - span).abs() > f64::EPSILON {
            // Re-center the corrected span on the window midpoint.
            let mid = (self.start + self.end) * 0.5;
            self.start = mid - target * 0.5;
            self.end = mid + target * 0.5;
            if self.start < 0.0 {
                self.end -= self.start;
                self.start = 0.0;
            }
            if self.end > 100.0 {
                self.start -= self.end - 100.0;
                self.end = 100.0;
            }
            self.start = self.start.clamp(0.0, 100.0);
            self.end = self.end.clamp(0.0, 100.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_to_percent_space() {
        let mut zoom = ZoomState::full();
        zoom.set(-20.0, 140.0);
        assert_eq!((zoom.start, zoom.end), (0.0, 100.0));
    }

    #[test]
    fn set_repairs_inverted_window() {
        let mut zoom = ZoomState::full();
        zoom.set(80.0, 20.0);
        assert!(zoom.start < zoom.end);
        assert_eq!((zoom.start, zoom.end), (20.0, 80.0));
    }

    #[test]
    fn set_reports_no_change_for_identical_window() {
        let mut zoom = ZoomState::new(25.0, 75.0);
        assert!(!zoom.set(25.0, 75.0));
        assert!(zoom.set(30.0, 75.0));
    }

    #[test]
    fn translate_preserves_span_at_bounds() {
        let mut zoom = ZoomState::new(10.0, 30.0);
        zoom.translate(-50.0);
        assert_eq!((zoom.start, zoom.end), (0.0, 20.0));
        zoom.translate(500.0);
        assert_eq!((zoom.start, zoom.end), (80.0, 100.0));
        assert!((zoom.span() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_about_center_is_symmetric() {
        let mut zoom = ZoomState::full();
        zoom.zoom_about(50.0, 0.5);
        assert!((zoom.start + zoom.end - 100.0).abs() < 1e-9);
        assert!(zoom.span() < 100.0);
    }

    #[test]
    fn zoom_about_keeps_anchor_ratio() {
        let mut zoom = ZoomState::full();
        zoom.zoom_about(25.0, 0.5);
        // The anchor sat at 25% of the window; it still does.
        let ratio = (25.0 - zoom.start) / zoom.span();
        assert!((ratio - 0.25).abs() < 1e-9);
    }

    #[test]
    fn min_span_is_respected() {
        let mut zoom = ZoomState::full().with_span_limits(Some(10.0), None);
        zoom.zoom_about(50.0, 0.001);
        assert!(zoom.span() >= 10.0 - 1e-9);
        assert!(zoom.start >= 0.0 && zoom.end <= 100.0);
    }

    #[test]
    fn max_span_is_respected() {
        let mut zoom = ZoomState::new(40.0, 60.0).with_span_limits(None, Some(30.0));
        zoom.zoom_about(50.0, 10.0);
        assert!(zoom.span() <= 30.0 + 1e-9);
    }

    #[test]
    fn non_finite_input_falls_back_to_full_window() {
        let mut zoom = ZoomState::full();
        zoom.set(f64::NAN, f64::INFINITY);
        assert_eq!((zoom.start, zoom.end), (0.0, 100.0));
    }
}
