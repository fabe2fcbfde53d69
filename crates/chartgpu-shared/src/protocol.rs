//! Worker bridge wire protocol
//!
//! Messages are plain records. Binary point payloads move by ownership
//! transfer (never cloned), and the surface handle travels inside `Init`,
//! which is why the inbound set is not serializable as a whole: everything
//! else is, and the outbound set always is.

use crate::{
    errors::{ChartError, DeviceLostKind},
    events::{HitResult, InteractionSource, PointerEvent},
    options::{AnimationOptions, ResolvedOptions},
    overlay::{AxisLabelsPayload, LegendItem, TooltipPayload},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the graphics context renders.
///
/// A window target moves into the renderer thread exactly once (zero-copy
/// ownership transfer); the offscreen variant configures a texture target
/// of the given device-pixel size.
pub enum SurfaceSource {
    Window(wgpu::SurfaceTarget<'static>),
    Offscreen { width: u32, height: u32 },
}

impl std::fmt::Debug for SurfaceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceSource::Window(_) => f.write_str("SurfaceSource::Window"),
            SurfaceSource::Offscreen { width, height } => f
                .debug_struct("SurfaceSource::Offscreen")
                .field("width", width)
                .field("height", height)
                .finish(),
        }
    }
}

/// One series append inside a batch.
#[derive(Debug)]
pub struct AppendItem {
    pub series_index: usize,
    /// Raw little-endian point data, `count * stride` bytes.
    pub bytes: Vec<u8>,
    pub count: usize,
    pub stride: usize,
}

/// Host → controller messages. Applied in arrival order per chart.
#[derive(Debug)]
pub enum InboundMessage {
    Init {
        chart_id: Uuid,
        surface: SurfaceSource,
        /// Surface size in device pixels.
        width: u32,
        height: u32,
        dpr: f64,
        options: Box<ResolvedOptions>,
        message_id: u64,
    },
    SetOptions {
        chart_id: Uuid,
        options: Box<ResolvedOptions>,
    },
    AppendData {
        chart_id: Uuid,
        item: AppendItem,
    },
    AppendDataBatch {
        chart_id: Uuid,
        items: Vec<AppendItem>,
    },
    Resize {
        chart_id: Uuid,
        css_width: f64,
        css_height: f64,
        dpr: f64,
        request_render: bool,
    },
    ForwardPointerEvent {
        chart_id: Uuid,
        event: PointerEvent,
    },
    SetZoomRange {
        chart_id: Uuid,
        start: f64,
        end: f64,
    },
    SetInteractionX {
        chart_id: Uuid,
        x: Option<f64>,
        source: Option<InteractionSource>,
    },
    SetAnimation {
        chart_id: Uuid,
        enabled: bool,
        config: Option<AnimationOptions>,
    },
    Dispose {
        chart_id: Uuid,
    },
}

impl InboundMessage {
    pub fn chart_id(&self) -> Uuid {
        match self {
            InboundMessage::Init { chart_id, .. }
            | InboundMessage::SetOptions { chart_id, .. }
            | InboundMessage::AppendData { chart_id, .. }
            | InboundMessage::AppendDataBatch { chart_id, .. }
            | InboundMessage::Resize { chart_id, .. }
            | InboundMessage::ForwardPointerEvent { chart_id, .. }
            | InboundMessage::SetZoomRange { chart_id, .. }
            | InboundMessage::SetInteractionX { chart_id, .. }
            | InboundMessage::SetAnimation { chart_id, .. }
            | InboundMessage::Dispose { chart_id } => *chart_id,
        }
    }
}

/// Capabilities reported in the `ready` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub adapter_name: String,
    pub backend: String,
    pub timestamp_query: bool,
    pub preferred_format: String,
}

/// Controller → host messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Ready {
        chart_id: Uuid,
        message_id: u64,
        capabilities: Capabilities,
    },
    Rendered {
        chart_id: Uuid,
        frame_time_ms: f64,
    },
    TooltipUpdate {
        chart_id: Uuid,
        payload: Option<TooltipPayload>,
    },
    LegendUpdate {
        chart_id: Uuid,
        items: Vec<LegendItem>,
    },
    AxisLabelsUpdate {
        chart_id: Uuid,
        labels: AxisLabelsPayload,
    },
    HoverChange {
        chart_id: Uuid,
        hit: Option<HitResult>,
    },
    Click {
        chart_id: Uuid,
        hit: HitResult,
    },
    CrosshairMove {
        chart_id: Uuid,
        x_domain: Option<f64>,
        x_css: Option<f64>,
        source: Option<InteractionSource>,
    },
    ZoomChange {
        chart_id: Uuid,
        start: f64,
        end: f64,
        source: Option<InteractionSource>,
    },
    DeviceLost {
        chart_id: Uuid,
        reason: DeviceLostKind,
        message: String,
    },
    Disposed {
        chart_id: Uuid,
        cleanup_errors: Vec<String>,
    },
    Error {
        chart_id: Uuid,
        error: ChartError,
        operation: String,
        message_id: Option<u64>,
    },
}

impl OutboundMessage {
    pub fn chart_id(&self) -> Uuid {
        match self {
            OutboundMessage::Ready { chart_id, .. }
            | OutboundMessage::Rendered { chart_id, .. }
            | OutboundMessage::TooltipUpdate { chart_id, .. }
            | OutboundMessage::LegendUpdate { chart_id, .. }
            | OutboundMessage::AxisLabelsUpdate { chart_id, .. }
            | OutboundMessage::HoverChange { chart_id, .. }
            | OutboundMessage::Click { chart_id, .. }
            | OutboundMessage::CrosshairMove { chart_id, .. }
            | OutboundMessage::ZoomChange { chart_id, .. }
            | OutboundMessage::DeviceLost { chart_id, .. }
            | OutboundMessage::Disposed { chart_id, .. }
            | OutboundMessage::Error { chart_id, .. } => *chart_id,
        }
    }

    /// The correlation id this message answers, when it answers one.
    pub fn message_id(&self) -> Option<u64> {
        match self {
            OutboundMessage::Ready { message_id, .. } => Some(*message_id),
            OutboundMessage::Error { message_id, .. } => *message_id,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_round_trips_through_json() {
        let message = OutboundMessage::ZoomChange {
            chart_id: Uuid::new_v4(),
            start: 10.0,
            end: 90.0,
            source: Some(InteractionSource::new("slider")),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"type\":\"zoomChange\""));
        let back: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn capabilities_round_trip_through_bincode() {
        let caps = Capabilities {
            adapter_name: "llvmpipe".into(),
            backend: "vulkan".into(),
            timestamp_query: false,
            preferred_format: "Bgra8UnormSrgb".into(),
        };
        let bytes = bincode::serialize(&caps).unwrap();
        let back: Capabilities = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, caps);
    }

    #[test]
    fn ready_exposes_its_message_id() {
        let ready = OutboundMessage::Ready {
            chart_id: Uuid::new_v4(),
            message_id: 42,
            capabilities: Capabilities {
                adapter_name: "test".into(),
                backend: "vulkan".into(),
                timestamp_query: true,
                preferred_format: "Bgra8UnormSrgb".into(),
            },
        };
        assert_eq!(ready.message_id(), Some(42));
        assert_eq!(
            OutboundMessage::Rendered {
                chart_id: Uuid::new_v4(),
                frame_time_ms: 16.6,
            }
            .message_id(),
            None
        );
    }

    #[test]
    fn inbound_exposes_its_chart_id() {
        let id = Uuid::new_v4();
        let message = InboundMessage::SetZoomRange {
            chart_id: id,
            start: 0.0,
            end: 50.0,
        };
        assert_eq!(message.chart_id(), id);
    }
}
