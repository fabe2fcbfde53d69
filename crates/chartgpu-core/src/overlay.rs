//! Overlay broker
//!
//! Computes tooltip, legend, and axis-label payloads from the current
//! options, scales, and data. In host mode the payloads drive a
//! host-supplied widget sink directly; in embedded mode the coordinator
//! forwards them through callbacks (and the worker bridge serializes them
//! to the host).

use chartgpu_data::DataStore;
use chartgpu_renderer::{nice_ticks, GridArea, Scale};
use chartgpu_shared::{
    color_to_css, AxisLabel, AxisLabelsPayload, AxisOptions, HitResult, LegendItem,
    ResolvedOptions, TooltipParam, TooltipPayload, TooltipTrigger,
};

/// Host-provided overlay widgets, driven directly in host mode.
pub trait OverlaySink: Send {
    fn tooltip(&self, payload: Option<&TooltipPayload>);
    fn legend(&self, items: &[LegendItem]);
    fn axis_labels(&self, labels: &AxisLabelsPayload);
}

pub enum OverlayMode {
    /// Drive host widgets through the sink.
    Host(Box<dyn OverlaySink>),
    /// Emit payloads as callback events.
    Embedded,
}

impl OverlayMode {
    pub fn is_embedded(&self) -> bool {
        matches!(self, OverlayMode::Embedded)
    }
}

pub struct OverlayBroker {
    mode: OverlayMode,
}

impl OverlayBroker {
    pub fn new(mode: OverlayMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &OverlayMode {
        &self.mode
    }

    pub fn is_embedded(&self) -> bool {
        self.mode.is_embedded()
    }

    /// Route a tooltip payload: host sink in host mode, `false` return
    /// tells the coordinator to emit it instead.
    pub fn sink_tooltip(&self, payload: Option<&TooltipPayload>) -> bool {
        match &self.mode {
            OverlayMode::Host(sink) => {
                sink.tooltip(payload);
                true
            }
            OverlayMode::Embedded => false,
        }
    }

    pub fn sink_legend(&self, items: &[LegendItem]) -> bool {
        match &self.mode {
            OverlayMode::Host(sink) => {
                sink.legend(items);
                true
            }
            OverlayMode::Embedded => false,
        }
    }

    pub fn sink_axis_labels(&self, labels: &AxisLabelsPayload) -> bool {
        match &self.mode {
            OverlayMode::Host(sink) => {
                sink.axis_labels(labels);
                true
            }
            OverlayMode::Embedded => false,
        }
    }

    /// Legend items from the series config and palette.
    pub fn compute_legend(&self, options: &ResolvedOptions) -> Vec<LegendItem> {
        options
            .series
            .iter()
            .enumerate()
            .map(|(i, series)| LegendItem {
                name: series.name.clone(),
                color_css: color_to_css(options.series_color(i)),
                series_index: i,
            })
            .collect()
    }

    /// Axis labels from the tick generator, in CSS pixels.
    pub fn compute_axis_labels(
        &self,
        options: &ResolvedOptions,
        x_scale: &Scale,
        y_scale: &Scale,
        grid: &GridArea,
    ) -> AxisLabelsPayload {
        let mut payload = AxisLabelsPayload::default();

        let x_base_css = grid.plot_bottom_px() / grid.dpr + 4.0;
        payload.x_labels = axis_labels_for(
            &options.x_axis,
            x_scale,
            grid,
            |px_pos, label, rotation, is_title| AxisLabel {
                text: label,
                x_css: px_pos / grid.dpr,
                y_css: x_base_css,
                rotation_deg: rotation,
                is_title,
            },
        );
        if let Some(title) = &options.x_axis.title {
            payload.x_labels.push(AxisLabel {
                text: title.clone(),
                x_css: (grid.plot_left_px() + grid.plot_width_px() * 0.5) / grid.dpr,
                y_css: x_base_css + 16.0,
                rotation_deg: 0.0,
                is_title: true,
            });
        }

        let y_base_css = grid.plot_left_px() / grid.dpr - 4.0;
        payload.y_labels = axis_labels_for(
            &options.y_axis,
            y_scale,
            grid,
            |px_pos, label, rotation, is_title| AxisLabel {
                text: label,
                x_css: y_base_css,
                y_css: px_pos / grid.dpr,
                rotation_deg: rotation,
                is_title,
            },
        );
        if let Some(title) = &options.y_axis.title {
            payload.y_labels.push(AxisLabel {
                text: title.clone(),
                x_css: y_base_css - 16.0,
                y_css: (grid.plot_top_px() + grid.plot_height_px() * 0.5) / grid.dpr,
                rotation_deg: -90.0,
                is_title: true,
            });
        }

        payload
    }

    /// Tooltip payload for the current trigger mode. Item trigger needs a
    /// hit; axis trigger needs a visible crosshair and reports all series
    /// at that x.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_tooltip(
        &self,
        options: &ResolvedOptions,
        store: &DataStore,
        x_scale: &Scale,
        grid: &GridArea,
        hit: Option<&HitResult>,
        crosshair_x: Option<f64>,
        pointer_css: (f64, f64),
    ) -> Option<TooltipPayload> {
        if !options.tooltip.enabled {
            return None;
        }
        match options.tooltip.trigger {
            TooltipTrigger::Item => {
                let hit = hit?;
                let series = options.series.get(hit.series_index)?;
                let values = store
                    .series(hit.series_index)
                    .and_then(|s| s.value_lanes_at(hit.data_index))
                    .map(|lanes| lanes.iter().map(|v| *v as f64).collect::<Vec<_>>())?;
                let param = TooltipParam {
                    series_index: hit.series_index,
                    series_name: series.name.clone(),
                    color_css: color_to_css(options.series_color(hit.series_index)),
                    x: hit.x_domain,
                    values,
                    data_index: hit.data_index,
                };
                Some(TooltipPayload {
                    content: format_params(&[param.clone()]),
                    params: vec![param],
                    x_css: pointer_css.0,
                    y_css: pointer_css.1,
                })
            }
            TooltipTrigger::Axis => {
                let x = crosshair_x?;
                let mut params = Vec::new();
                for (i, series) in options.series.iter().enumerate() {
                    let Some(data) = store.series(i) else {
                        continue;
                    };
                    let Some(index) = data.nearest_index_by_x(x) else {
                        continue;
                    };
                    let Some(lanes) = data.value_lanes_at(index) else {
                        continue;
                    };
                    params.push(TooltipParam {
                        series_index: i,
                        series_name: series.name.clone(),
                        color_css: color_to_css(options.series_color(i)),
                        x: data.x_at(index).unwrap_or(x),
                        values: lanes.iter().map(|v| *v as f64).collect(),
                        data_index: index,
                    });
                }
                if params.is_empty() {
                    return None;
                }
                let anchor_css = x_scale.to_px(x) / grid.dpr;
                Some(TooltipPayload {
                    content: format_params(&params),
                    params,
                    x_css: anchor_css,
                    y_css: pointer_css.1,
                })
            }
        }
    }
}

fn axis_labels_for(
    axis: &AxisOptions,
    scale: &Scale,
    _grid: &GridArea,
    make: impl Fn(f64, String, f32, bool) -> AxisLabel,
) -> Vec<AxisLabel> {
    match scale {
        Scale::Linear(linear) => {
            nice_ticks(linear.domain_min, linear.domain_max, axis.split_hint)
                .into_iter()
                .map(|tick| {
                    make(
                        linear.scale(tick),
                        format_tick(tick),
                        axis.label_rotation_deg,
                        false,
                    )
                })
                .collect()
        }
        Scale::Category(category) => category
            .labels()
            .iter()
            .enumerate()
            .map(|(i, label)| {
                make(
                    category.scale_index(i),
                    label.clone(),
                    axis.label_rotation_deg,
                    false,
                )
            })
            .collect(),
    }
}

fn format_tick(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let abs = value.abs();
    if abs >= 1e6 || abs < 1e-3 {
        format!("{value:e}")
    } else if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        let formatted = format!("{value:.3}");
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn format_params(params: &[TooltipParam]) -> String {
    let mut out = String::new();
    if let Some(first) = params.first() {
        out.push_str(&format!("x = {}\n", format_tick(first.x)));
    }
    for param in params {
        let values = param
            .values
            .iter()
            .map(|v| format_tick(*v))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("{}: {}\n", param.series_name, values));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartgpu_renderer::LinearScale;
    use chartgpu_shared::{
        GridOptions, LineSeriesOptions, PointGeometry, SamplingStrategy, SeriesOptions,
        SeriesTypeOptions, TooltipOptions,
    };

    fn fixture() -> (ResolvedOptions, DataStore, Scale, Scale, GridArea) {
        let grid = GridArea::compute(&GridOptions::default(), None, 800, 600, 1.0);
        let (xl, xr) = grid.x_range_px();
        let (yb, yt) = grid.y_range_px();
        let mut options = ResolvedOptions::default();
        for name in ["alpha", "beta"] {
            options.series.push(SeriesOptions::new(
                name,
                SeriesTypeOptions::Line(LineSeriesOptions::default()),
            ));
        }
        let mut store = DataStore::new();
        store
            .configure_series(&[
                (PointGeometry::Xy, SamplingStrategy::None, 0),
                (PointGeometry::Xy, SamplingStrategy::None, 0),
            ])
            .unwrap();
        store.append(0, &[0.0, 0.0, 1.0, 1.0, 2.0, 4.0]).unwrap();
        store.append(1, &[0.0, 1.0, 1.0, 2.0, 2.0, 3.0]).unwrap();
        (
            options,
            store,
            Scale::Linear(LinearScale::new(0.0, 2.0, xl, xr)),
            Scale::Linear(LinearScale::new(0.0, 4.0, yb, yt)),
            grid,
        )
    }

    #[test]
    fn legend_items_follow_series_and_palette() {
        let (options, _, _, _, _) = fixture();
        let broker = OverlayBroker::new(OverlayMode::Embedded);
        let items = broker.compute_legend(&options);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "alpha");
        assert_eq!(items[0].series_index, 0);
        assert_eq!(items[0].color_css, color_to_css(options.palette[0]));
        assert_ne!(items[0].color_css, items[1].color_css);
    }

    #[test]
    fn axis_labels_cover_the_y_extent() {
        let (options, _, x_scale, y_scale, grid) = fixture();
        let broker = OverlayBroker::new(OverlayMode::Embedded);
        let labels = broker.compute_axis_labels(&options, &x_scale, &y_scale, &grid);
        assert!(!labels.x_labels.is_empty());
        assert!(!labels.y_labels.is_empty());
        // The y axis reaches the data max of 4.
        let max_label = labels
            .y_labels
            .iter()
            .filter(|l| !l.is_title)
            .filter_map(|l| l.text.parse::<f64>().ok())
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(max_label >= 4.0);
    }

    #[test]
    fn axis_trigger_reports_all_series_at_the_crosshair() {
        let (options, store, x_scale, _, grid) = fixture();
        let broker = OverlayBroker::new(OverlayMode::Embedded);
        let payload = broker
            .compute_tooltip(
                &options,
                &store,
                &x_scale,
                &grid,
                None,
                Some(1.1),
                (300.0, 200.0),
            )
            .expect("axis tooltip");
        assert_eq!(payload.params.len(), 2);
        assert!(payload.params.iter().all(|p| p.data_index == 1));
        assert!(payload.params.iter().all(|p| p.series_index < 2));
        assert!(payload.x_css.is_finite());
        assert!(payload.content.contains("alpha"));
        assert!(payload.content.contains("beta"));
    }

    #[test]
    fn item_trigger_needs_a_hit() {
        let (mut options, store, x_scale, _, grid) = fixture();
        options.tooltip = TooltipOptions {
            enabled: true,
            trigger: TooltipTrigger::Item,
        };
        let broker = OverlayBroker::new(OverlayMode::Embedded);
        assert!(broker
            .compute_tooltip(&options, &store, &x_scale, &grid, None, Some(1.0), (0.0, 0.0))
            .is_none());

        let hit = HitResult {
            series_index: 1,
            data_index: 2,
            x_domain: 2.0,
            y_domain: 3.0,
            distance: 1.0,
        };
        let payload = broker
            .compute_tooltip(
                &options,
                &store,
                &x_scale,
                &grid,
                Some(&hit),
                None,
                (120.0, 80.0),
            )
            .unwrap();
        assert_eq!(payload.params.len(), 1);
        assert_eq!(payload.params[0].series_name, "beta");
        assert_eq!(payload.params[0].values, vec![3.0]);
        assert_eq!((payload.x_css, payload.y_css), (120.0, 80.0));
    }

    #[test]
    fn disabled_tooltip_yields_nothing() {
        let (mut options, store, x_scale, _, grid) = fixture();
        options.tooltip.enabled = false;
        let broker = OverlayBroker::new(OverlayMode::Embedded);
        assert!(broker
            .compute_tooltip(&options, &store, &x_scale, &grid, None, Some(1.0), (0.0, 0.0))
            .is_none());
    }

    #[test]
    fn host_mode_sinks_instead_of_emitting() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct CountingSink(Arc<AtomicUsize>);
        impl OverlaySink for CountingSink {
            fn tooltip(&self, _: Option<&TooltipPayload>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn legend(&self, _: &[LegendItem]) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn axis_labels(&self, _: &AxisLabelsPayload) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let broker = OverlayBroker::new(OverlayMode::Host(Box::new(CountingSink(calls.clone()))));
        assert!(broker.sink_tooltip(None));
        assert!(broker.sink_legend(&[]));
        assert!(broker.sink_axis_labels(&AxisLabelsPayload::default()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let embedded = OverlayBroker::new(OverlayMode::Embedded);
        assert!(!embedded.sink_tooltip(None));
    }
}
