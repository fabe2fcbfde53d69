//! Normalized pointer events and outbound chart events
//!
//! Pointer events arrive from the host already normalized (CSS pixels,
//! monotonic timestamps); chart events flow back out through callbacks or
//! the worker bridge.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
    Leave,
    Wheel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// A pointer event in CSS pixel space relative to the chart surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub css_x: f64,
    pub css_y: f64,
    /// Bitmask of pressed buttons, bit 0 = primary.
    pub buttons: u32,
    pub modifiers: Modifiers,
    /// Vertical wheel delta; only meaningful for `Wheel`.
    pub wheel_delta: f64,
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: f64,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, css_x: f64, css_y: f64, timestamp_ms: f64) -> Self {
        Self {
            kind,
            css_x,
            css_y,
            buttons: 0,
            modifiers: Modifiers::default(),
            wheel_delta: 0.0,
            timestamp_ms,
        }
    }

    pub fn with_buttons(mut self, buttons: u32) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_wheel_delta(mut self, delta: f64) -> Self {
        self.wheel_delta = delta;
        self
    }
}

/// Opaque identifier carried with state-change notifications to prevent
/// echo loops between the chart and external drivers (sliders, synced
/// charts). The emitter that matches the current source suppresses
/// re-emission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionSource(pub String);

impl InteractionSource {
    pub const API: &'static str = "api";
    pub const WHEEL: &'static str = "wheel";
    pub const PAN: &'static str = "pan";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InteractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a hit test against the rendered series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    pub series_index: usize,
    pub data_index: usize,
    /// Hit location in domain coordinates.
    pub x_domain: f64,
    pub y_domain: f64,
    /// Screen-space distance from the pointer, device-independent pixels.
    pub distance: f64,
}

/// Events published by the coordinator in embedded mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ChartEvent {
    HoverChange {
        hit: Option<HitResult>,
    },
    Click {
        hit: HitResult,
    },
    CrosshairMove {
        x_domain: Option<f64>,
        x_css: Option<f64>,
        source: Option<InteractionSource>,
    },
    ZoomChange {
        start: f64,
        end: f64,
        source: Option<InteractionSource>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_event_builder() {
        let event = PointerEvent::new(PointerEventKind::Wheel, 120.0, 80.0, 16.7)
            .with_wheel_delta(-120.0)
            .with_buttons(1);
        assert_eq!(event.kind, PointerEventKind::Wheel);
        assert_eq!(event.wheel_delta, -120.0);
        assert_eq!(event.buttons, 1);
    }

    #[test]
    fn chart_event_serialization_is_tagged() {
        let event = ChartEvent::ZoomChange {
            start: 25.0,
            end: 75.0,
            source: Some(InteractionSource::new(InteractionSource::WHEEL)),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"zoomChange\""));
        assert!(json.contains("wheel"));
    }
}
