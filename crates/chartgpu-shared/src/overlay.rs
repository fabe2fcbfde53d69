//! Overlay payloads
//!
//! Plain records computed by the overlay broker and handed to the host:
//! either through an `OverlaySink` (host mode) or serialized over the
//! worker bridge (embedded mode).

use serde::{Deserialize, Serialize};

/// One series' contribution to a tooltip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooltipParam {
    pub series_index: usize,
    pub series_name: String,
    pub color_css: String,
    /// Domain x of the referenced point.
    pub x: f64,
    /// Value lanes of the referenced point: `[y]` or `[o, h, l, c]`.
    pub values: Vec<f64>,
    pub data_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooltipPayload {
    /// Preformatted text content; hosts may rebuild from `params` instead.
    pub content: String,
    pub params: Vec<TooltipParam>,
    /// Anchor position in CSS pixels.
    pub x_css: f64,
    pub y_css: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendItem {
    pub name: String,
    pub color_css: String,
    pub series_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisLabel {
    pub text: String,
    /// Label anchor in CSS pixels.
    pub x_css: f64,
    pub y_css: f64,
    pub rotation_deg: f32,
    pub is_title: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisLabelsPayload {
    pub x_labels: Vec<AxisLabel>,
    pub y_labels: Vec<AxisLabel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tooltip_payload_round_trips() {
        let payload = TooltipPayload {
            content: "x=1\nprice: 4".to_string(),
            params: vec![TooltipParam {
                series_index: 0,
                series_name: "price".to_string(),
                color_css: "rgba(84, 143, 242, 1)".to_string(),
                x: 1.0,
                values: vec![4.0],
                data_index: 2,
            }],
            x_css: 200.0,
            y_css: 120.0,
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: TooltipPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
