//! Shared types for the ChartGPU architecture
//!
//! This crate contains the types that cross crate boundaries: the error
//! taxonomy, resolved chart options, normalized pointer/chart events, zoom
//! state, overlay payloads, and the worker-bridge message protocol.

pub mod errors;
pub mod events;
pub mod geometry;
pub mod options;
pub mod overlay;
pub mod protocol;
pub mod zoom;

pub use errors::{ChartError, ChartResult, DeviceLostKind, ErrorEvent, GpuErrorClass};
pub use events::{
    ChartEvent, HitResult, InteractionSource, Modifiers, PointerEvent, PointerEventKind,
};
pub use geometry::PointGeometry;
pub use options::*;
pub use overlay::{AxisLabel, AxisLabelsPayload, LegendItem, TooltipParam, TooltipPayload};
pub use protocol::{
    AppendItem, Capabilities, InboundMessage, OutboundMessage, SurfaceSource,
};
pub use zoom::ZoomState;

/// An RGBA color with components in `[0, 1]`.
pub type Color = [f32; 4];

/// Format a color as a CSS `rgba()` string for overlay payloads.
pub fn color_to_css(color: Color) -> String {
    format!(
        "rgba({}, {}, {}, {})",
        (color[0].clamp(0.0, 1.0) * 255.0).round() as u8,
        (color[1].clamp(0.0, 1.0) * 255.0).round() as u8,
        (color[2].clamp(0.0, 1.0) * 255.0).round() as u8,
        color[3].clamp(0.0, 1.0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_color_formatting() {
        assert_eq!(color_to_css([1.0, 0.0, 0.0, 1.0]), "rgba(255, 0, 0, 1)");
        assert_eq!(color_to_css([0.0, 0.5, 1.0, 0.5]), "rgba(0, 128, 255, 0.5)");
    }

    #[test]
    fn css_color_clamps_out_of_range() {
        assert_eq!(color_to_css([2.0, -1.0, 0.0, 3.0]), "rgba(255, 0, 0, 1)");
    }
}
