//! Interaction engine
//!
//! Converts normalized pointer events into state transitions, crosshair
//! movement, hit results, and zoom mutations. The engine is the sole
//! writer of the crosshair, the zoom window, and the pointer state; it
//! publishes changes as effects the coordinator maps onto callbacks.

use crate::hit_test::hit_test;
use chartgpu_data::DataStore;
use chartgpu_renderer::{GridArea, Scale};
use chartgpu_shared::{
    HitResult, InteractionSource, PointerEvent, PointerEventKind, ResolvedOptions, ZoomState,
};

/// Pointer movement below this is still a click, CSS pixels.
const DRAG_SLOP_CSS: f64 = 3.0;
/// Press-to-release time above this is no longer a click.
const CLICK_MAX_MS: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionState {
    Idle,
    Hovering {
        x_domain: f64,
        y_domain: f64,
    },
    Pressing {
        origin_css: (f64, f64),
        since_ms: f64,
    },
    Panning {
        origin_zoom: (f64, f64),
        origin_css: (f64, f64),
    },
    Wheeling {
        anchor_x_domain: f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct InteractionConfig {
    pub drag_slop_css: f64,
    pub click_max_ms: f64,
    pub wheel_sensitivity: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_slop_css: DRAG_SLOP_CSS,
            click_max_ms: CLICK_MAX_MS,
            wheel_sensitivity: 1.0 / 1200.0,
        }
    }
}

/// Read-only view the engine resolves pointer events against.
pub struct InteractionContext<'a> {
    pub store: &'a DataStore,
    pub options: &'a ResolvedOptions,
    pub x_scale: &'a Scale,
    pub y_scale: &'a Scale,
    pub grid: &'a GridArea,
}

/// State changes the coordinator turns into callbacks and renders.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEffect {
    CrosshairMoved {
        x_domain: Option<f64>,
        x_css: Option<f64>,
    },
    ZoomChanged {
        start: f64,
        end: f64,
        source: InteractionSource,
    },
    HoverChanged {
        hit: Option<HitResult>,
    },
    Clicked {
        hit: HitResult,
    },
    TooltipDismissed,
    RequestRender,
}

/// Compare-and-skip gate for externally sourced updates: an update carrying
/// a foreign tag is applied but not re-emitted, which breaks slider/chart
/// and chart/chart echo cycles.
#[derive(Debug, Clone)]
pub struct SourceGate {
    own: InteractionSource,
}

impl SourceGate {
    pub fn new(own: InteractionSource) -> Self {
        Self { own }
    }

    pub fn own(&self) -> &InteractionSource {
        &self.own
    }

    /// Whether a change carrying `incoming` should be re-emitted.
    pub fn should_emit(&self, incoming: Option<&InteractionSource>) -> bool {
        match incoming {
            None => true,
            Some(source) => source == &self.own,
        }
    }
}

pub struct InteractionEngine {
    state: InteractionState,
    crosshair_x: Option<f64>,
    zoom: Option<ZoomState>,
    config: InteractionConfig,
}

impl InteractionEngine {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            state: InteractionState::Idle,
            crosshair_x: None,
            zoom: None,
            config,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn crosshair_x(&self) -> Option<f64> {
        self.crosshair_x
    }

    pub fn zoom(&self) -> Option<ZoomState> {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: Option<ZoomState>) {
        self.zoom = zoom;
    }

    pub fn set_config(&mut self, config: InteractionConfig) {
        self.config = config;
    }

    /// Mutate the zoom window. Returns the new window when it changed.
    pub fn set_zoom_range(&mut self, start: f64, end: f64) -> Option<(f64, f64)> {
        let zoom = self.zoom.as_mut()?;
        zoom.set(start, end).then_some((zoom.start, zoom.end))
    }

    /// Drive the crosshair from a domain x. Returns `true` on change.
    pub fn set_crosshair(&mut self, x: Option<f64>) -> bool {
        if self.crosshair_x == x {
            return false;
        }
        self.crosshair_x = x;
        true
    }

    /// Run the pointer state machine over one event.
    pub fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        ctx: &InteractionContext<'_>,
    ) -> Vec<InteractionEffect> {
        match event.kind {
            PointerEventKind::Down => self.on_down(event, ctx),
            PointerEventKind::Move => self.on_move(event, ctx),
            PointerEventKind::Up => self.on_up(event, ctx),
            PointerEventKind::Leave => self.on_leave(),
            PointerEventKind::Wheel => self.on_wheel(event, ctx),
        }
    }

    fn domain_at(&self, event: &PointerEvent, ctx: &InteractionContext<'_>) -> (f64, f64) {
        let px = event.css_x * ctx.grid.dpr;
        let py = event.css_y * ctx.grid.dpr;
        (ctx.x_scale.invert_px(px), ctx.y_scale.invert_px(py))
    }

    fn on_down(
        &mut self,
        event: &PointerEvent,
        ctx: &InteractionContext<'_>,
    ) -> Vec<InteractionEffect> {
        if !ctx.grid.contains_css(event.css_x, event.css_y) {
            return Vec::new();
        }
        self.state = InteractionState::Pressing {
            origin_css: (event.css_x, event.css_y),
            since_ms: event.timestamp_ms,
        };
        Vec::new()
    }

    fn on_move(
        &mut self,
        event: &PointerEvent,
        ctx: &InteractionContext<'_>,
    ) -> Vec<InteractionEffect> {
        match self.state {
            InteractionState::Pressing { origin_css, .. } => {
                let moved = distance(origin_css, (event.css_x, event.css_y));
                if moved >= self.config.drag_slop_css {
                    if let Some(zoom) = self.zoom {
                        self.state = InteractionState::Panning {
                            origin_zoom: (zoom.start, zoom.end),
                            origin_css,
                        };
                        return self.on_move(event, ctx);
                    }
                }
                Vec::new()
            }
            InteractionState::Panning {
                origin_zoom,
                origin_css,
            } => {
                let Some(zoom) = self.zoom.as_mut() else {
                    return Vec::new();
                };
                // Dragging right moves the window left, proportionally to
                // the plot width.
                let plot_css_width = ctx.grid.plot_width_px() / ctx.grid.dpr;
                if plot_css_width <= 0.0 {
                    return Vec::new();
                }
                let span = origin_zoom.1 - origin_zoom.0;
                let dx = event.css_x - origin_css.0;
                let delta = -dx / plot_css_width * span;

                let mut target = ZoomState {
                    start: origin_zoom.0,
                    end: origin_zoom.1,
                    min_span: zoom.min_span,
                    max_span: zoom.max_span,
                };
                target.translate(delta);
                if zoom.set(target.start, target.end) {
                    vec![
                        InteractionEffect::ZoomChanged {
                            start: zoom.start,
                            end: zoom.end,
                            source: InteractionSource::new(InteractionSource::PAN),
                        },
                        InteractionEffect::RequestRender,
                    ]
                } else {
                    Vec::new()
                }
            }
            _ => {
                if !ctx.grid.contains_css(event.css_x, event.css_y) {
                    return self.on_leave();
                }
                let (x_domain, y_domain) = self.domain_at(event, ctx);
                self.state = InteractionState::Hovering { x_domain, y_domain };
                let mut effects = Vec::new();
                if self.set_crosshair(Some(x_domain)) {
                    effects.push(InteractionEffect::CrosshairMoved {
                        x_domain: Some(x_domain),
                        x_css: Some(event.css_x),
                    });
                }
                let hit = hit_test(
                    ctx.store,
                    ctx.options,
                    ctx.x_scale,
                    ctx.y_scale,
                    ctx.grid,
                    event.css_x,
                    event.css_y,
                );
                effects.push(InteractionEffect::HoverChanged { hit });
                effects.push(InteractionEffect::RequestRender);
                effects
            }
        }
    }

    fn on_up(
        &mut self,
        event: &PointerEvent,
        ctx: &InteractionContext<'_>,
    ) -> Vec<InteractionEffect> {
        let previous = self.state;
        let (x_domain, y_domain) = self.domain_at(event, ctx);
        self.state = if ctx.grid.contains_css(event.css_x, event.css_y) {
            InteractionState::Hovering { x_domain, y_domain }
        } else {
            InteractionState::Idle
        };

        match previous {
            InteractionState::Pressing {
                origin_css,
                since_ms,
            } => {
                let quick = event.timestamp_ms - since_ms < self.config.click_max_ms;
                let still = distance(origin_css, (event.css_x, event.css_y))
                    < self.config.drag_slop_css;
                if quick && still {
                    if let Some(hit) = hit_test(
                        ctx.store,
                        ctx.options,
                        ctx.x_scale,
                        ctx.y_scale,
                        ctx.grid,
                        event.css_x,
                        event.css_y,
                    ) {
                        return vec![InteractionEffect::Clicked { hit }];
                    }
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_leave(&mut self) -> Vec<InteractionEffect> {
        self.state = InteractionState::Idle;
        let mut effects = vec![InteractionEffect::TooltipDismissed];
        if self.set_crosshair(None) {
            effects.push(InteractionEffect::CrosshairMoved {
                x_domain: None,
                x_css: None,
            });
        }
        effects.push(InteractionEffect::HoverChanged { hit: None });
        effects.push(InteractionEffect::RequestRender);
        effects
    }

    fn on_wheel(
        &mut self,
        event: &PointerEvent,
        ctx: &InteractionContext<'_>,
    ) -> Vec<InteractionEffect> {
        if !ctx.grid.contains_css(event.css_x, event.css_y) {
            return Vec::new();
        }
        let (anchor_x_domain, _) = self.domain_at(event, ctx);
        let Some(zoom) = self.zoom.as_mut() else {
            return Vec::new();
        };

        // The visible window [start, end] maps linearly onto the plot; the
        // anchor keeps the domain x under the cursor fixed.
        let plot_left = ctx.grid.plot_left_px();
        let plot_width = ctx.grid.plot_width_px();
        if plot_width <= 0.0 {
            return Vec::new();
        }
        let frac = ((event.css_x * ctx.grid.dpr - plot_left) / plot_width).clamp(0.0, 1.0);
        let anchor = zoom.start + frac * zoom.span();

        let factor = (event.wheel_delta * self.config.wheel_sensitivity).exp();
        self.state = InteractionState::Wheeling { anchor_x_domain };

        if zoom.zoom_about(anchor, factor) {
            vec![
                InteractionEffect::ZoomChanged {
                    start: zoom.start,
                    end: zoom.end,
                    source: InteractionSource::new(InteractionSource::WHEEL),
                },
                InteractionEffect::RequestRender,
            ]
        } else {
            Vec::new()
        }
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartgpu_renderer::LinearScale;
    use chartgpu_shared::{
        GridOptions, LineSeriesOptions, SeriesOptions, SeriesTypeOptions,
    };

    struct Fixture {
        store: DataStore,
        options: ResolvedOptions,
        x_scale: Scale,
        y_scale: Scale,
        grid: GridArea,
    }

    impl Fixture {
        fn new() -> Self {
            let grid = GridArea::compute(&GridOptions::default(), None, 800, 600, 1.0);
            let (xl, xr) = grid.x_range_px();
            let (yb, yt) = grid.y_range_px();
            let mut options = ResolvedOptions::default();
            options.series.push(SeriesOptions::new(
                "s0",
                SeriesTypeOptions::Line(LineSeriesOptions::default()),
            ));
            let mut store = DataStore::new();
            store
                .configure_series(&[(
                    chartgpu_shared::PointGeometry::Xy,
                    chartgpu_shared::SamplingStrategy::None,
                    0,
                )])
                .unwrap();
            store.append(0, &[0.0, 0.0, 5.0, 5.0, 10.0, 10.0]).unwrap();
            Self {
                store,
                options,
                x_scale: Scale::Linear(LinearScale::new(0.0, 10.0, xl, xr)),
                y_scale: Scale::Linear(LinearScale::new(0.0, 10.0, yb, yt)),
                grid,
            }
        }

        fn ctx(&self) -> InteractionContext<'_> {
            InteractionContext {
                store: &self.store,
                options: &self.options,
                x_scale: &self.x_scale,
                y_scale: &self.y_scale,
                grid: &self.grid,
            }
        }

        fn center_css(&self) -> (f64, f64) {
            (
                (self.grid.plot_left_px() + self.grid.plot_width_px() * 0.5) / self.grid.dpr,
                (self.grid.plot_top_px() + self.grid.plot_height_px() * 0.5) / self.grid.dpr,
            )
        }
    }

    fn engine_with_zoom() -> InteractionEngine {
        let mut engine = InteractionEngine::new(InteractionConfig::default());
        engine.set_zoom(Some(ZoomState::full()));
        engine
    }

    #[test]
    fn hover_emits_crosshair_hover_and_render() {
        let fixture = Fixture::new();
        let mut engine = InteractionEngine::new(InteractionConfig::default());
        let (cx, cy) = fixture.center_css();
        let event = PointerEvent::new(PointerEventKind::Move, cx, cy, 0.0);
        let effects = engine.handle_pointer(&event, &fixture.ctx());

        assert!(matches!(
            effects[0],
            InteractionEffect::CrosshairMoved {
                x_domain: Some(_),
                x_css: Some(_)
            }
        ));
        assert!(effects
            .iter()
            .any(|e| matches!(e, InteractionEffect::HoverChanged { hit: Some(h) } if h.series_index == 0)));
        assert!(effects.contains(&InteractionEffect::RequestRender));
        assert!(matches!(engine.state(), InteractionState::Hovering { .. }));
        assert!(engine.crosshair_x().is_some());
    }

    #[test]
    fn quick_still_release_is_a_click() {
        let fixture = Fixture::new();
        let mut engine = InteractionEngine::new(InteractionConfig::default());
        let (cx, cy) = fixture.center_css();
        engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Down, cx, cy, 0.0).with_buttons(1),
            &fixture.ctx(),
        );
        assert!(matches!(engine.state(), InteractionState::Pressing { .. }));
        let effects = engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Up, cx + 1.0, cy, 100.0),
            &fixture.ctx(),
        );
        assert!(effects
            .iter()
            .any(|e| matches!(e, InteractionEffect::Clicked { .. })));
        assert!(matches!(engine.state(), InteractionState::Hovering { .. }));
    }

    #[test]
    fn slow_release_is_not_a_click() {
        let fixture = Fixture::new();
        let mut engine = InteractionEngine::new(InteractionConfig::default());
        let (cx, cy) = fixture.center_css();
        engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Down, cx, cy, 0.0),
            &fixture.ctx(),
        );
        let effects = engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Up, cx, cy, 400.0),
            &fixture.ctx(),
        );
        assert!(!effects
            .iter()
            .any(|e| matches!(e, InteractionEffect::Clicked { .. })));
    }

    #[test]
    fn drag_past_slop_pans_the_zoom_window() {
        let fixture = Fixture::new();
        let mut engine = engine_with_zoom();
        engine.set_zoom(Some(ZoomState::new(40.0, 60.0)));
        let (cx, cy) = fixture.center_css();
        engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Down, cx, cy, 0.0).with_buttons(1),
            &fixture.ctx(),
        );
        let effects = engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Move, cx - 100.0, cy, 50.0).with_buttons(1),
            &fixture.ctx(),
        );
        assert!(matches!(engine.state(), InteractionState::Panning { .. }));
        let zoom = engine.zoom().unwrap();
        // Dragging left moves the window right.
        assert!(zoom.start > 40.0);
        assert!((zoom.span() - 20.0).abs() < 1e-9);
        assert!(effects.iter().any(|e| matches!(
            e,
            InteractionEffect::ZoomChanged { source, .. } if source.as_str() == InteractionSource::PAN
        )));
    }

    #[test]
    fn wheel_zoom_about_center_is_symmetric() {
        let fixture = Fixture::new();
        let mut engine = engine_with_zoom();
        let (cx, cy) = fixture.center_css();
        let effects = engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Wheel, cx, cy, 0.0).with_wheel_delta(-120.0),
            &fixture.ctx(),
        );
        let zoom = engine.zoom().unwrap();
        assert!((zoom.start + zoom.end - 100.0).abs() < 1e-6);
        assert!(zoom.span() < 100.0);
        let zoom_events: Vec<_> = effects
            .iter()
            .filter(|e| matches!(e, InteractionEffect::ZoomChanged { .. }))
            .collect();
        assert_eq!(zoom_events.len(), 1);
    }

    #[test]
    fn wheel_without_zoom_config_is_inert() {
        let fixture = Fixture::new();
        let mut engine = InteractionEngine::new(InteractionConfig::default());
        let (cx, cy) = fixture.center_css();
        let effects = engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Wheel, cx, cy, 0.0).with_wheel_delta(-120.0),
            &fixture.ctx(),
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn leave_clears_crosshair_and_dismisses_tooltip() {
        let fixture = Fixture::new();
        let mut engine = InteractionEngine::new(InteractionConfig::default());
        let (cx, cy) = fixture.center_css();
        engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Move, cx, cy, 0.0),
            &fixture.ctx(),
        );
        assert!(engine.crosshair_x().is_some());
        let effects = engine.handle_pointer(
            &PointerEvent::new(PointerEventKind::Leave, -1.0, -1.0, 10.0),
            &fixture.ctx(),
        );
        assert!(effects.contains(&InteractionEffect::TooltipDismissed));
        assert!(effects
            .iter()
            .any(|e| matches!(e, InteractionEffect::CrosshairMoved { x_domain: None, .. })));
        assert_eq!(engine.state(), InteractionState::Idle);
        assert!(engine.crosshair_x().is_none());
    }

    #[test]
    fn source_gate_suppresses_foreign_tags() {
        let gate = SourceGate::new(InteractionSource::new("chart-a"));
        assert!(gate.should_emit(None));
        assert!(gate.should_emit(Some(&InteractionSource::new("chart-a"))));
        assert!(!gate.should_emit(Some(&InteractionSource::new("chart-b"))));
        assert!(!gate.should_emit(Some(&InteractionSource::new("slider"))));
    }

    #[test]
    fn programmatic_zoom_of_same_window_reports_no_change() {
        let mut engine = engine_with_zoom();
        engine.set_zoom(Some(ZoomState::new(20.0, 80.0)));
        assert_eq!(engine.set_zoom_range(20.0, 80.0), None);
        assert_eq!(engine.set_zoom_range(10.0, 80.0), Some((10.0, 80.0)));
    }
}
