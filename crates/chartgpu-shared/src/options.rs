//! Resolved chart options
//!
//! The coordinator consumes a fully defaulted option tree produced by an
//! external resolver. Everything here is an immutable snapshot: a new tree
//! replaces the old one on every `set_options`.

use crate::Color;
use serde::{Deserialize, Serialize};

/// Fully defaulted chart configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    pub grid: GridOptions,
    pub x_axis: AxisOptions,
    pub y_axis: AxisOptions,
    pub palette: Vec<Color>,
    pub theme: Theme,
    pub series: Vec<SeriesOptions>,
    pub data_zoom: Option<DataZoomOptions>,
    pub tooltip: TooltipOptions,
    pub legend: Option<LegendOptions>,
    pub animation: Option<AnimationOptions>,
    pub facet: Option<FacetOptions>,
    /// Keep the visible window pinned to incoming data while zoomed to the end.
    pub auto_scroll: bool,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            grid: GridOptions::default(),
            x_axis: AxisOptions::default(),
            y_axis: AxisOptions::default(),
            palette: default_palette(),
            theme: Theme::default(),
            series: Vec::new(),
            data_zoom: None,
            tooltip: TooltipOptions::default(),
            legend: None,
            animation: None,
            facet: None,
            auto_scroll: false,
        }
    }
}

impl ResolvedOptions {
    /// Resolved color for a series: explicit color, else palette by index.
    pub fn series_color(&self, index: usize) -> Color {
        self.series
            .get(index)
            .and_then(|s| s.color)
            .unwrap_or_else(|| {
                if self.palette.is_empty() {
                    [0.5, 0.5, 0.5, 1.0]
                } else {
                    self.palette[index % self.palette.len()]
                }
            })
    }
}

/// Grid insets in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridOptions {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            left: 48.0,
            right: 16.0,
            top: 16.0,
            bottom: 32.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Value,
    Time,
    Category,
}

/// How unbounded axes derive their extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoBounds {
    /// Extent of all data, regardless of zoom.
    Global,
    /// Extent of the data inside the visible window.
    Visible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisOptions {
    pub kind: AxisKind,
    /// Explicit bounds override auto-bounds when present.
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Tick-split hint: preferred number of intervals.
    pub split_hint: Option<u32>,
    pub label_rotation_deg: f32,
    pub auto_bounds: AutoBounds,
    pub title: Option<String>,
    /// Labels for `AxisKind::Category`; ignored otherwise.
    pub categories: Vec<String>,
}

impl Default for AxisOptions {
    fn default() -> Self {
        Self {
            kind: AxisKind::Value,
            min: None,
            max: None,
            split_hint: None,
            label_rotation_deg: 0.0,
            auto_bounds: AutoBounds::Global,
            title: None,
            categories: Vec::new(),
        }
    }
}

/// Renderer variant tags. The coordinator dispatches on these rather than on
/// a polymorphic base; the renderer set is exactly `{(kind, index)}` over the
/// current series list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesKind {
    Line,
    Area,
    Bar,
    Scatter,
    ScatterDensity,
    Heatmap,
    Pie,
    Candlestick,
    Histogram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesOptions {
    pub name: String,
    /// Explicit color; palette assigns one when absent.
    pub color: Option<Color>,
    /// Facet cell this series renders into, row-major.
    pub facet: Option<usize>,
    pub sampling: SamplingStrategy,
    /// Point count above which the sampling strategy kicks in.
    pub sampling_threshold: usize,
    pub kind: SeriesTypeOptions,
}

impl SeriesOptions {
    pub fn new(name: impl Into<String>, kind: SeriesTypeOptions) -> Self {
        Self {
            name: name.into(),
            color: None,
            facet: None,
            sampling: SamplingStrategy::None,
            sampling_threshold: 0,
            kind,
        }
    }

    /// The renderer variant this series resolves to. A line series with an
    /// area style renders through the area pipeline.
    pub fn series_kind(&self) -> SeriesKind {
        match &self.kind {
            SeriesTypeOptions::Line(opts) => {
                if opts.area_style.is_some() {
                    SeriesKind::Area
                } else {
                    SeriesKind::Line
                }
            }
            SeriesTypeOptions::Bar(_) => SeriesKind::Bar,
            SeriesTypeOptions::Scatter(_) => SeriesKind::Scatter,
            SeriesTypeOptions::ScatterDensity(_) => SeriesKind::ScatterDensity,
            SeriesTypeOptions::Heatmap(_) => SeriesKind::Heatmap,
            SeriesTypeOptions::Pie(_) => SeriesKind::Pie,
            SeriesTypeOptions::Candlestick(_) => SeriesKind::Candlestick,
            SeriesTypeOptions::Histogram(_) => SeriesKind::Histogram,
        }
    }
}

/// Per-type series configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SeriesTypeOptions {
    Line(LineSeriesOptions),
    Bar(BarSeriesOptions),
    Scatter(ScatterSeriesOptions),
    ScatterDensity(ScatterDensityOptions),
    Heatmap(HeatmapSeriesOptions),
    Pie(PieSeriesOptions),
    Candlestick(CandlestickSeriesOptions),
    Histogram(HistogramSeriesOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSeriesOptions {
    /// Stroke width in device pixels.
    pub width: f32,
    pub area_style: Option<AreaStyle>,
}

impl Default for LineSeriesOptions {
    fn default() -> Self {
        Self {
            width: 2.0,
            area_style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaStyle {
    /// Fill opacity applied to the series color.
    pub opacity: f32,
    /// Domain-y the fill drops to.
    pub baseline: f64,
}

impl Default for AreaStyle {
    fn default() -> Self {
        Self {
            opacity: 0.25,
            baseline: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeriesOptions {
    /// Fraction of the category band occupied by bars, `(0, 1]`.
    pub band_ratio: f32,
    /// Bars sharing a stack id accumulate on top of each other.
    pub stack: Option<String>,
    /// Corner radius in device pixels.
    pub corner_radius: f32,
}

impl Default for BarSeriesOptions {
    fn default() -> Self {
        Self {
            band_ratio: 0.8,
            stack: None,
            corner_radius: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    Disk,
    Square,
    Triangle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterSeriesOptions {
    /// Marker size in device pixels.
    pub size: f32,
    pub marker: MarkerShape,
}

impl Default for ScatterSeriesOptions {
    fn default() -> Self {
        Self {
            size: 6.0,
            marker: MarkerShape::Disk,
        }
    }
}

/// Normalization curve applied before colormap lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityCurve {
    Linear,
    Sqrt,
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterDensityOptions {
    /// Bin size in device pixels.
    pub cell_size: f32,
    pub curve: DensityCurve,
    pub colormap: ColormapSpec,
}

impl Default for ScatterDensityOptions {
    fn default() -> Self {
        Self {
            cell_size: 4.0,
            curve: DensityCurve::Linear,
            colormap: ColormapSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedColormap {
    Viridis,
    Plasma,
    Inferno,
}

/// A named colormap or explicit user stops `(t, rgba)` with `t` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColormapSpec {
    Named(NamedColormap),
    Stops(Vec<(f32, Color)>),
}

impl Default for ColormapSpec {
    fn default() -> Self {
        ColormapSpec::Named(NamedColormap::Viridis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSeriesOptions {
    pub colormap: ColormapSpec,
    /// Explicit value range; derived from the data when absent.
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Default for HeatmapSeriesOptions {
    fn default() -> Self {
        Self {
            colormap: ColormapSpec::default(),
            min: None,
            max: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSeriesOptions {
    /// Center as a fraction of the grid area, `(0.5, 0.5)` is centered.
    pub center: (f32, f32),
    /// Radius in device pixels.
    pub radius: f32,
    /// Slice labels, config order; slice values come from the data.
    pub labels: Vec<String>,
    /// Start angle of the first slice in degrees, clockwise from 12 o'clock.
    pub start_angle_deg: f32,
}

impl Default for PieSeriesOptions {
    fn default() -> Self {
        Self {
            center: (0.5, 0.5),
            radius: 120.0,
            labels: Vec::new(),
            start_angle_deg: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleStyle {
    Classic,
    Hollow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlestickSeriesOptions {
    pub style: CandleStyle,
    pub up_color: Color,
    pub down_color: Color,
    /// Fraction of the candle slot occupied by the body, `(0, 1]`.
    pub body_ratio: f32,
}

impl Default for CandlestickSeriesOptions {
    fn default() -> Self {
        Self {
            style: CandleStyle::Classic,
            up_color: [0.18, 0.70, 0.42, 1.0],
            down_color: [0.86, 0.27, 0.27, 1.0],
            body_ratio: 0.7,
        }
    }
}

/// Histogram renders through the bar pipeline; binning happens outside the
/// core, so the data arriving here is already `[bin_center, count]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSeriesOptions {
    pub bar: BarSeriesOptions,
    /// Width of one bin in domain units.
    pub bin_width: f64,
}

impl Default for HistogramSeriesOptions {
    fn default() -> Self {
        Self {
            bar: BarSeriesOptions {
                band_ratio: 1.0,
                stack: None,
                corner_radius: 0.0,
            },
            bin_width: 1.0,
        }
    }
}

/// Downsampling strategy applied above the per-series threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingStrategy {
    None,
    Lttb,
    Average,
    Min,
    Max,
    Ohlc,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataZoomOptions {
    /// Initial window in percent space `[0, 100]`.
    pub start: f64,
    pub end: f64,
    pub min_span: Option<f64>,
    pub max_span: Option<f64>,
    /// Span factor per wheel-delta unit; see the interaction engine.
    pub wheel_sensitivity: f64,
}

impl Default for DataZoomOptions {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 100.0,
            min_span: None,
            max_span: None,
            wheel_sensitivity: 1.0 / 1200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipTrigger {
    /// Tooltip for the hovered item only.
    Item,
    /// Tooltip for all series at the crosshair x.
    Axis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipOptions {
    pub enabled: bool,
    pub trigger: TooltipTrigger,
}

impl Default for TooltipOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: TooltipTrigger::Axis,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendPosition {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendOptions {
    pub position: LegendPosition,
    /// Measured size of the legend widget along its edge, CSS pixels.
    /// Supplied by the host; the layout insets the grid by this much.
    pub measured_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationOptions {
    pub enabled: bool,
    pub duration_ms: f32,
    pub easing: String,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: 250.0,
            easing: "cubic-out".to_string(),
        }
    }
}

/// Facet tiling of the inner grid area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetOptions {
    pub rows: u32,
    pub cols: u32,
    /// Gap between cells in CSS pixels.
    pub gap: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub background: Color,
    pub grid_line: Color,
    pub axis_label: Color,
    pub crosshair: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: [0.07, 0.07, 0.09, 1.0],
            grid_line: [0.2, 0.2, 0.24, 1.0],
            axis_label: [0.8, 0.8, 0.85, 1.0],
            crosshair: [0.6, 0.6, 0.65, 0.8],
        }
    }
}

fn default_palette() -> Vec<Color> {
    vec![
        [0.33, 0.56, 0.95, 1.0],
        [0.96, 0.65, 0.26, 1.0],
        [0.30, 0.78, 0.52, 1.0],
        [0.90, 0.32, 0.40, 1.0],
        [0.62, 0.47, 0.90, 1.0],
        [0.35, 0.80, 0.85, 1.0],
        [0.95, 0.82, 0.32, 1.0],
        [0.75, 0.75, 0.78, 1.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_assigns_colors_round_robin() {
        let mut options = ResolvedOptions::default();
        options.series = (0..10)
            .map(|i| {
                SeriesOptions::new(
                    format!("s{i}"),
                    SeriesTypeOptions::Line(LineSeriesOptions::default()),
                )
            })
            .collect();
        let n = options.palette.len();
        assert_eq!(options.series_color(0), options.palette[0]);
        assert_eq!(options.series_color(n), options.palette[0]);
    }

    #[test]
    fn explicit_color_wins_over_palette() {
        let mut options = ResolvedOptions::default();
        let mut series = SeriesOptions::new(
            "custom",
            SeriesTypeOptions::Line(LineSeriesOptions::default()),
        );
        series.color = Some([1.0, 0.0, 1.0, 1.0]);
        options.series.push(series);
        assert_eq!(options.series_color(0), [1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn line_with_area_style_is_an_area_series() {
        let line = SeriesOptions::new(
            "plain",
            SeriesTypeOptions::Line(LineSeriesOptions::default()),
        );
        assert_eq!(line.series_kind(), SeriesKind::Line);

        let area = SeriesOptions::new(
            "filled",
            SeriesTypeOptions::Line(LineSeriesOptions {
                width: 1.5,
                area_style: Some(AreaStyle::default()),
            }),
        );
        assert_eq!(area.series_kind(), SeriesKind::Area);
    }

    #[test]
    fn options_round_trip_through_json() {
        let mut options = ResolvedOptions::default();
        options.series.push(SeriesOptions::new(
            "candles",
            SeriesTypeOptions::Candlestick(CandlestickSeriesOptions::default()),
        ));
        options.data_zoom = Some(DataZoomOptions::default());

        let json = serde_json::to_string(&options).unwrap();
        let back: ResolvedOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
