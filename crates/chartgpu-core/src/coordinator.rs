//! Render coordinator
//!
//! The integrator: owns the graphics context, data store, renderer set,
//! interaction engine, overlay broker, and scheduler. Applies resolved
//! options, routes pointer events, coalesces dirty state into at most one
//! render per notifier pulse, and surfaces every overlay payload and event
//! through the registered callbacks. Errors never cross a frame boundary:
//! a failed render drops the frame and reports through the error callback.

use crate::{
    interaction::{
        InteractionConfig, InteractionContext, InteractionEffect, InteractionEngine, SourceGate,
    },
    overlay::{OverlayBroker, OverlayMode},
    scheduler::{FrameTiming, RenderScheduler},
};
use chartgpu_data::{decode_points, DataStore};
use chartgpu_renderer::{
    create_renderer, CategoryScale, GpuContext, GridArea, LinearScale, PrepareInput, Scale,
    SeriesRenderer, Timer,
};
use chartgpu_shared::{
    AxisKind, AxisLabelsPayload, AutoBounds, ChartError, ChartEvent, ChartResult, DeviceLostKind,
    ErrorEvent, InteractionSource, LegendItem, PointGeometry, PointerEvent, ResolvedOptions,
    SeriesKind, SeriesTypeOptions, TooltipPayload, TooltipTrigger, ZoomState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use uuid::Uuid;

/// Pending work, flushed in a fixed order by the next render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderDirty {
    pub options: bool,
    pub data: bool,
    pub layout: bool,
    pub interaction: bool,
    pub theme: bool,
}

impl RenderDirty {
    pub fn any(&self) -> bool {
        self.options || self.data || self.layout || self.interaction || self.theme
    }

    pub fn all() -> Self {
        Self {
            options: true,
            data: true,
            layout: true,
            interaction: true,
            theme: true,
        }
    }
}

/// Handle returned by subscriptions; pass back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listeners<T> {
    next_id: u64,
    items: Vec<(u64, Box<dyn Fn(&T) + Send + Sync>)>,
}

impl<T> Listeners<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            items: Vec::new(),
        }
    }

    fn subscribe(&mut self, callback: Box<dyn Fn(&T) + Send + Sync>) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push((id, callback));
        ListenerId(id)
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.items.len();
        self.items.retain(|(item_id, _)| *item_id != id.0);
        self.items.len() != before
    }

    fn emit(&self, value: &T) {
        for (_, callback) in &self.items {
            callback(value);
        }
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

/// Callbacks the coordinator publishes through. All optional.
#[derive(Default)]
pub struct ChartCallbacks {
    /// Single-shot render notifier; the scheduler guarantees at most one
    /// frame per pulse.
    pub on_request_render: Option<Box<dyn Fn() + Send + Sync>>,
    pub on_error: Option<Box<dyn Fn(&ErrorEvent) + Send + Sync>>,
    pub on_event: Option<Box<dyn Fn(&ChartEvent) + Send + Sync>>,
    pub on_tooltip: Option<Box<dyn Fn(Option<&TooltipPayload>) + Send + Sync>>,
    pub on_legend: Option<Box<dyn Fn(&[LegendItem]) + Send + Sync>>,
    pub on_axis_labels: Option<Box<dyn Fn(&AxisLabelsPayload) + Send + Sync>>,
    pub on_rendered: Option<Box<dyn Fn(f64) + Send + Sync>>,
}

pub struct ChartCoordinator {
    chart_id: Uuid,
    gate: SourceGate,
    ctx: GpuContext,
    options: ResolvedOptions,
    store: DataStore,
    renderers: HashMap<(SeriesKind, usize), Box<dyn SeriesRenderer + Send>>,
    interaction: InteractionEngine,
    overlay: OverlayBroker,
    scheduler: RenderScheduler,
    dirty: RenderDirty,
    grid: GridArea,
    x_scale: Scale,
    y_scale: Scale,
    facet_cells: Vec<GridArea>,
    callbacks: ChartCallbacks,
    zoom_listeners: Listeners<(f64, f64)>,
    crosshair_listeners: Listeners<Option<f64>>,
    disposed: bool,
    device_lost: Arc<AtomicBool>,
    gpu_time_slot: Arc<Mutex<Option<f64>>>,
    last_pointer_css: (f64, f64),
    last_legend: Vec<LegendItem>,
    last_axis_labels: AxisLabelsPayload,
    prev_x_extent: Option<(f64, f64)>,
}

impl ChartCoordinator {
    pub fn new(
        ctx: GpuContext,
        options: ResolvedOptions,
        overlay_mode: OverlayMode,
        callbacks: ChartCallbacks,
        device_lost: Arc<AtomicBool>,
    ) -> ChartResult<Self> {
        let chart_id = Uuid::new_v4();
        let (width, height) = ctx.size();
        let grid = GridArea::compute(
            &options.grid,
            options.legend.as_ref(),
            width,
            height,
            ctx.dpr(),
        );
        let (range_left, range_right) = grid.x_range_px();
        let (range_bottom, range_top) = grid.y_range_px();

        let mut coordinator = Self {
            chart_id,
            gate: SourceGate::new(InteractionSource::new(chart_id.to_string())),
            ctx,
            options: ResolvedOptions::default(),
            store: DataStore::new(),
            renderers: HashMap::new(),
            interaction: InteractionEngine::new(InteractionConfig::default()),
            overlay: OverlayBroker::new(overlay_mode),
            scheduler: RenderScheduler::new(60.0),
            dirty: RenderDirty::all(),
            grid,
            x_scale: Scale::Linear(LinearScale::new(0.0, 1.0, range_left, range_right)),
            y_scale: Scale::Linear(LinearScale::new(0.0, 1.0, range_bottom, range_top)),
            facet_cells: Vec::new(),
            callbacks,
            zoom_listeners: Listeners::new(),
            crosshair_listeners: Listeners::new(),
            disposed: false,
            device_lost,
            gpu_time_slot: Arc::new(Mutex::new(None)),
            last_pointer_css: (0.0, 0.0),
            last_legend: Vec::new(),
            last_axis_labels: AxisLabelsPayload::default(),
            prev_x_extent: None,
        };
        coordinator.apply_options(options)?;
        coordinator.scheduler.start();
        coordinator.request_render();
        Ok(coordinator)
    }

    pub fn chart_id(&self) -> Uuid {
        self.chart_id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    pub fn capabilities(&self) -> chartgpu_shared::Capabilities {
        self.ctx.capabilities()
    }

    pub fn metrics(&mut self) -> crate::scheduler::FrameMetrics {
        if let Some(gpu_ms) = self.gpu_time_slot.lock().take() {
            self.scheduler.record_gpu_time(gpu_ms);
        }
        self.scheduler.metrics()
    }

    fn guard(&self) -> ChartResult<()> {
        if self.disposed {
            return Err(ChartError::Disposed);
        }
        if self.is_device_lost() {
            return Err(ChartError::DeviceLost {
                reason: DeviceLostKind::Unknown,
                message: "device lost".to_string(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Public contract
    // ------------------------------------------------------------------

    /// Replace the options snapshot, reconcile the renderer set, and
    /// schedule a render.
    pub fn set_options(&mut self, options: ResolvedOptions) -> ChartResult<()> {
        self.guard()?;
        self.apply_options(options)?;
        self.dirty.options = true;
        self.dirty.layout = true;
        self.dirty.data = true;
        self.dirty.theme = true;
        self.request_render();
        Ok(())
    }

    /// Append lane-packed points to a series and schedule a render.
    /// Appends within one tick coalesce into a single frame.
    pub fn append_data(&mut self, series_index: usize, points: &[f32]) -> ChartResult<()> {
        self.guard()?;
        self.store.append(series_index, points)?;
        self.dirty.data = true;
        self.dirty.layout = true;
        self.request_render();
        Ok(())
    }

    /// Append a raw transfer buffer (worker path): validates alignment and
    /// size, normalizes the encoding, then appends.
    pub fn append_bytes(
        &mut self,
        series_index: usize,
        bytes: &[u8],
        count: usize,
        stride: usize,
    ) -> ChartResult<()> {
        self.guard()?;
        let (geometry, points) = decode_points(bytes, count, stride)?;
        let expected = self
            .store
            .series(series_index)
            .map(|s| s.geometry())
            .ok_or_else(|| ChartError::data(format!("invalid series index {series_index}")))?;
        if geometry != expected {
            return Err(ChartError::data(format!(
                "stride {stride} decodes to {geometry:?} but series {series_index} is {expected:?}"
            )));
        }
        self.append_data(series_index, &points)
    }

    /// Resize the drawing surface. CSS dimensions; device pixels derive
    /// through the DPR.
    pub fn resize(&mut self, css_width: f64, css_height: f64, dpr: f64) -> ChartResult<()> {
        self.guard()?;
        self.ctx.resize(css_width, css_height, dpr);
        self.dirty.layout = true;
        self.request_render();
        Ok(())
    }

    /// Manual frame: flush all dirty state and render now.
    pub fn render(&mut self) -> ChartResult<()> {
        self.guard()?;
        let timing = self.scheduler.tick_once();
        match self.render_frame(timing) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.emit_error(error.clone(), "render");
                Err(error)
            }
        }
    }

    /// Loop tick: renders only when dirty. Returns whether a frame ran.
    /// Render errors drop the frame and report through the error callback.
    pub fn tick(&mut self) -> bool {
        if self.disposed || self.is_device_lost() {
            return false;
        }
        let Some(timing) = self.scheduler.tick() else {
            return false;
        };
        match self.render_frame(timing) {
            Ok(()) => true,
            Err(error) => {
                self.emit_error(error, "render");
                false
            }
        }
    }

    /// Clamp and apply a zoom window. No-op when zoom is disabled; an
    /// unchanged window emits nothing (programmatic parity).
    pub fn set_zoom_range(&mut self, start: f64, end: f64) -> ChartResult<()> {
        self.guard()?;
        if !start.is_finite() || !end.is_finite() {
            return Err(ChartError::invalid_argument(format!(
                "zoom range must be finite, got {start}..{end}"
            )));
        }
        let Some((new_start, new_end)) = self.interaction.set_zoom_range(start, end) else {
            return Ok(());
        };
        self.zoom_listeners.emit(&(new_start, new_end));
        self.emit_event(ChartEvent::ZoomChange {
            start: new_start,
            end: new_end,
            source: Some(InteractionSource::new(InteractionSource::API)),
        });
        self.dirty.layout = true;
        self.request_render();
        Ok(())
    }

    /// Drive the crosshair from a domain x (or clear it with `None`). A
    /// foreign source tag applies the change without re-emitting it.
    pub fn set_interaction_x(
        &mut self,
        x: Option<f64>,
        source: Option<InteractionSource>,
    ) -> ChartResult<()> {
        self.guard()?;
        if let Some(value) = x {
            if !value.is_finite() {
                return Err(ChartError::invalid_argument("interaction x must be finite"));
            }
        }
        if !self.interaction.set_crosshair(x) {
            return Ok(());
        }
        self.crosshair_listeners.emit(&x);
        if self.gate.should_emit(source.as_ref()) {
            let x_css = x.map(|v| self.x_scale.to_px(v) / self.grid.dpr);
            let source = source.or_else(|| Some(self.gate.own().clone()));
            self.emit_event(ChartEvent::CrosshairMove {
                x_domain: x,
                x_css,
                source,
            });
        }
        self.dirty.interaction = true;
        self.request_render();
        Ok(())
    }

    /// Route a pointer event through the interaction engine. Only valid in
    /// embedded mode; host mode feeds the engine through its own widgets.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent) -> ChartResult<()> {
        self.guard()?;
        if !self.overlay.is_embedded() {
            return Err(ChartError::invalid_argument(
                "pointer forwarding requires embedded overlay mode",
            ));
        }
        self.last_pointer_css = (event.css_x, event.css_y);
        let effects = {
            let ctx = InteractionContext {
                store: &self.store,
                options: &self.options,
                x_scale: &self.x_scale,
                y_scale: &self.y_scale,
                grid: &self.grid,
            };
            self.interaction.handle_pointer(event, &ctx)
        };
        self.apply_effects(effects);
        Ok(())
    }

    pub fn zoom_range(&self) -> Option<(f64, f64)> {
        self.interaction.zoom().map(|z| (z.start, z.end))
    }

    pub fn interaction_x(&self) -> Option<f64> {
        self.interaction.crosshair_x()
    }

    pub fn on_zoom_range_change(
        &mut self,
        callback: Box<dyn Fn(&(f64, f64)) + Send + Sync>,
    ) -> ListenerId {
        self.zoom_listeners.subscribe(callback)
    }

    pub fn off_zoom_range_change(&mut self, id: ListenerId) -> bool {
        self.zoom_listeners.unsubscribe(id)
    }

    pub fn on_interaction_x_change(
        &mut self,
        callback: Box<dyn Fn(&Option<f64>) + Send + Sync>,
    ) -> ListenerId {
        self.crosshair_listeners.subscribe(callback)
    }

    pub fn off_interaction_x_change(&mut self, id: ListenerId) -> bool {
        self.crosshair_listeners.unsubscribe(id)
    }

    /// Placeholder semantics: enabling schedules a render; the animation
    /// config itself only changes through `set_options`.
    pub fn set_animation(&mut self, enabled: bool) -> ChartResult<()> {
        self.guard()?;
        if enabled {
            self.dirty.interaction = true;
            self.request_render();
        }
        Ok(())
    }

    /// Dispose everything, best effort. Never fails; cleanup errors are
    /// collected and returned. Idempotent.
    pub fn dispose(&mut self) -> Vec<ChartError> {
        if self.disposed {
            return Vec::new();
        }
        self.disposed = true;
        self.scheduler.stop();
        let mut errors = Vec::new();
        for (_, mut renderer) in self.renderers.drain() {
            renderer.dispose();
        }
        errors.extend(self.store.dispose());
        self.ctx.destroy();
        self.zoom_listeners.clear();
        self.crosshair_listeners.clear();
        errors
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn request_render(&mut self) {
        // A render is scheduled iff dirty and neither disposed nor lost.
        if !self.dirty.any() || self.disposed || self.is_device_lost() {
            return;
        }
        self.scheduler.mark_dirty();
        if let Some(notify) = &self.callbacks.on_request_render {
            notify();
        }
    }

    fn emit_event(&self, event: ChartEvent) {
        if let Some(callback) = &self.callbacks.on_event {
            callback(&event);
        }
    }

    fn emit_error(&self, error: ChartError, operation: &str) {
        log::warn!("{operation} failed: {error}");
        if let Some(callback) = &self.callbacks.on_error {
            callback(&ErrorEvent::new(error, operation));
        }
    }

    fn apply_options(&mut self, options: ResolvedOptions) -> ChartResult<()> {
        // Series storage follows the configured types.
        let specs: Vec<_> = options
            .series
            .iter()
            .map(|series| {
                let geometry = match series.series_kind() {
                    SeriesKind::Candlestick => PointGeometry::Ohlc,
                    _ => PointGeometry::Xy,
                };
                (geometry, series.sampling, series.sampling_threshold)
            })
            .collect();
        self.store.configure_series(&specs)?;

        // Renderer set becomes exactly {(kind, index)}.
        let desired: Vec<(SeriesKind, usize)> = options
            .series
            .iter()
            .enumerate()
            .map(|(i, s)| (s.series_kind(), i))
            .collect();
        self.renderers.retain(|key, renderer| {
            let keep = desired.contains(key);
            if !keep {
                renderer.dispose();
            }
            keep
        });
        for key in &desired {
            if !self.renderers.contains_key(key) {
                self.renderers.insert(
                    *key,
                    create_renderer(key.0, &self.ctx.device, self.ctx.format()),
                );
            }
        }

        // Zoom state exists iff a data-zoom config is present; the current
        // window survives option changes.
        match (&options.data_zoom, self.interaction.zoom()) {
            (Some(config), Some(current)) => {
                self.interaction.set_zoom(Some(
                    ZoomState::new(current.start, current.end)
                        .with_span_limits(config.min_span, config.max_span),
                ));
            }
            (Some(config), None) => {
                self.interaction.set_zoom(Some(
                    ZoomState::new(config.start, config.end)
                        .with_span_limits(config.min_span, config.max_span),
                ));
            }
            (None, _) => self.interaction.set_zoom(None),
        }
        if let Some(config) = &options.data_zoom {
            self.interaction.set_config(InteractionConfig {
                wheel_sensitivity: config.wheel_sensitivity,
                ..InteractionConfig::default()
            });
        }

        self.options = options;
        Ok(())
    }

    /// The visible x window in domain units, after zoom.
    fn visible_x_window(&self) -> Option<(f64, f64)> {
        let (lo, hi) = self.explicit_or_data_x_extent()?;
        match self.interaction.zoom() {
            Some(zoom) => {
                let spread = hi - lo;
                Some((
                    lo + spread * zoom.start / 100.0,
                    lo + spread * zoom.end / 100.0,
                ))
            }
            None => Some((lo, hi)),
        }
    }

    fn explicit_or_data_x_extent(&self) -> Option<(f64, f64)> {
        let axis = &self.options.x_axis;
        let data = self.store.x_extent();
        let lo = axis.min.or(data.map(|d| d.0))?;
        let hi = axis.max.or(data.map(|d| d.1))?;
        (lo < hi).then_some((lo, hi)).or(Some((lo, lo + 1.0)))
    }

    fn compute_layout(&mut self) {
        let (width, height) = self.ctx.size();
        self.grid = GridArea::compute(
            &self.options.grid,
            self.options.legend.as_ref(),
            width,
            height,
            self.ctx.dpr(),
        );
        self.facet_cells = match &self.options.facet {
            Some(facet) => self.grid.facet_cells(facet),
            None => Vec::new(),
        };

        // Auto-scroll off: keep the same domain window when appended data
        // extended the extent, by re-deriving the percent window.
        let extent = self.store.x_extent();
        if !self.options.auto_scroll {
            if let (Some(prev), Some(new), Some(zoom)) =
                (self.prev_x_extent, extent, self.interaction.zoom())
            {
                if prev != new && new.1 > new.0 {
                    let old_lo = prev.0 + (prev.1 - prev.0) * zoom.start / 100.0;
                    let old_hi = prev.0 + (prev.1 - prev.0) * zoom.end / 100.0;
                    let start = (old_lo - new.0) / (new.1 - new.0) * 100.0;
                    let end = (old_hi - new.0) / (new.1 - new.0) * 100.0;
                    let mut adjusted = zoom;
                    adjusted.set(start, end);
                    self.interaction.set_zoom(Some(adjusted));
                }
            }
        }
        self.prev_x_extent = extent;

        let (range_left, range_right) = self.grid.x_range_px();
        let (range_bottom, range_top) = self.grid.y_range_px();

        self.x_scale = match self.options.x_axis.kind {
            AxisKind::Category => {
                match CategoryScale::new(
                    self.options.x_axis.categories.clone(),
                    range_left,
                    range_right,
                ) {
                    Ok(scale) => Scale::Category(scale),
                    Err(error) => {
                        self.emit_error(error, "layout");
                        Scale::Linear(LinearScale::new(0.0, 1.0, range_left, range_right))
                    }
                }
            }
            _ => {
                let (lo, hi) = self.visible_x_window().unwrap_or((0.0, 1.0));
                Scale::Linear(LinearScale::new(lo, hi, range_left, range_right))
            }
        };

        self.y_scale = match self.options.y_axis.kind {
            AxisKind::Category => {
                match CategoryScale::new(
                    self.options.y_axis.categories.clone(),
                    range_bottom,
                    range_top,
                ) {
                    Ok(scale) => Scale::Category(scale),
                    Err(error) => {
                        self.emit_error(error, "layout");
                        Scale::Linear(LinearScale::new(0.0, 1.0, range_bottom, range_top))
                    }
                }
            }
            _ => {
                let axis = &self.options.y_axis;
                let window = match axis.auto_bounds {
                    AutoBounds::Visible => self.visible_x_window(),
                    AutoBounds::Global => None,
                };
                let data = self.store.y_extent(window);
                let lo = axis.min.or(data.map(|d| d.0)).unwrap_or(0.0);
                let hi = axis.max.or(data.map(|d| d.1)).unwrap_or(1.0);
                let (lo, hi) = if lo < hi { (lo, hi) } else { (lo, lo + 1.0) };
                Scale::Linear(LinearScale::new(lo, hi, range_bottom, range_top))
            }
        };
    }

    fn publish_legend(&mut self) {
        let items = self.overlay.compute_legend(&self.options);
        if items == self.last_legend {
            return;
        }
        self.last_legend = items.clone();
        if !self.overlay.sink_legend(&items) {
            if let Some(callback) = &self.callbacks.on_legend {
                callback(&items);
            }
        }
    }

    fn publish_axis_labels(&mut self) {
        let labels = self
            .overlay
            .compute_axis_labels(&self.options, &self.x_scale, &self.y_scale, &self.grid);
        if labels == self.last_axis_labels {
            return;
        }
        self.last_axis_labels = labels.clone();
        if !self.overlay.sink_axis_labels(&labels) {
            if let Some(callback) = &self.callbacks.on_axis_labels {
                callback(&labels);
            }
        }
    }

    fn publish_tooltip(&self, payload: Option<&TooltipPayload>) {
        if !self.overlay.sink_tooltip(payload) {
            if let Some(callback) = &self.callbacks.on_tooltip {
                callback(payload);
            }
        }
    }

    fn update_tooltip(&mut self, hit: Option<&chartgpu_shared::HitResult>) {
        let payload = self.overlay.compute_tooltip(
            &self.options,
            &self.store,
            &self.x_scale,
            &self.grid,
            hit,
            self.interaction.crosshair_x(),
            self.last_pointer_css,
        );
        self.publish_tooltip(payload.as_ref());
    }

    fn apply_effects(&mut self, effects: Vec<InteractionEffect>) {
        let mut wants_render = false;
        for effect in effects {
            match effect {
                InteractionEffect::CrosshairMoved { x_domain, x_css } => {
                    self.crosshair_listeners.emit(&x_domain);
                    self.emit_event(ChartEvent::CrosshairMove {
                        x_domain,
                        x_css,
                        source: Some(self.gate.own().clone()),
                    });
                    self.dirty.interaction = true;
                    if self.options.tooltip.trigger == TooltipTrigger::Axis {
                        self.update_tooltip(None);
                    }
                }
                InteractionEffect::HoverChanged { hit } => {
                    self.emit_event(ChartEvent::HoverChange { hit });
                    if self.options.tooltip.trigger == TooltipTrigger::Item {
                        self.update_tooltip(hit.as_ref());
                    }
                }
                InteractionEffect::ZoomChanged { start, end, source } => {
                    self.zoom_listeners.emit(&(start, end));
                    self.emit_event(ChartEvent::ZoomChange {
                        start,
                        end,
                        source: Some(source),
                    });
                    self.dirty.layout = true;
                }
                InteractionEffect::Clicked { hit } => {
                    self.emit_event(ChartEvent::Click { hit });
                }
                InteractionEffect::TooltipDismissed => {
                    self.publish_tooltip(None);
                }
                InteractionEffect::RequestRender => {
                    wants_render = true;
                }
            }
        }
        if wants_render {
            self.dirty.interaction = true;
            self.request_render();
        }
    }

    /// Flush dirty flags in order: options, layout, data, interaction,
    /// theme. Layout reruns whenever data moved so auto bounds track
    /// appends.
    fn flush_dirty(&mut self) -> ChartResult<()> {
        let dirty = self.dirty;
        self.dirty = RenderDirty::default();

        if dirty.options {
            self.publish_legend();
        }
        if dirty.options || dirty.layout || dirty.data {
            self.compute_layout();
            self.publish_axis_labels();
        }
        if dirty.data {
            self.store
                .upload_all(&self.ctx.device, &self.ctx.queue)?;
        }
        // Interaction and theme state are read directly at pass time.
        Ok(())
    }

    /// Accumulated stack baselines per bar series, by series index.
    fn stack_bases(&self) -> HashMap<usize, Vec<f64>> {
        let mut accumulators: HashMap<String, Vec<f64>> = HashMap::new();
        let mut bases = HashMap::new();
        for (i, series) in self.options.series.iter().enumerate() {
            let stack = match &series.kind {
                SeriesTypeOptions::Bar(bar) => bar.stack.clone(),
                SeriesTypeOptions::Histogram(h) => h.bar.stack.clone(),
                _ => None,
            };
            let Some(stack) = stack else {
                continue;
            };
            let Some(data) = self.store.series(i) else {
                continue;
            };
            let accumulator = accumulators.entry(stack).or_default();
            let count = data.point_count();
            if accumulator.len() < count {
                accumulator.resize(count, 0.0);
            }
            bases.insert(i, accumulator[..count].to_vec());
            for (j, base) in accumulator.iter_mut().enumerate().take(count) {
                if let Some((_, y)) = data.xy_at(j) {
                    *base += y;
                }
            }
        }
        bases
    }

    fn render_frame(&mut self, timing: FrameTiming) -> ChartResult<()> {
        self.flush_dirty()?;

        let stack_bases = self.stack_bases();

        // Prepare every visible renderer before recording the pass.
        for (index, series) in self.options.series.iter().enumerate() {
            let key = (series.series_kind(), index);
            let Some(renderer) = self.renderers.get_mut(&key) else {
                continue;
            };
            let Some(data) = self.store.series(index) else {
                continue;
            };
            let cell = series
                .facet
                .and_then(|f| self.facet_cells.get(f))
                .unwrap_or(&self.grid);
            let (x_scale, y_scale) = scales_for_cell(&self.x_scale, &self.y_scale, cell);
            let input = PrepareInput {
                device: &self.ctx.device,
                queue: &self.ctx.queue,
                format: self.ctx.format(),
                series_index: index,
                series,
                color: self.options.series_color(index),
                theme: &self.options.theme,
                points: data.points(),
                geometry: data.geometry(),
                vertex_buffer: data.vertex_buffer(),
                vertex_count: data.uploaded_points(),
                x_scale: &x_scale,
                y_scale: &y_scale,
                grid: cell,
                stack_base: stack_bases.get(&index).map(|v| v.as_slice()),
            };
            renderer.prepare(&input)?;
        }

        let frame = self.ctx.current_frame()?;
        let mut encoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("ChartGPU Frame Encoder"),
                });

        // Compute passes run before the render pass.
        for (index, series) in self.options.series.iter().enumerate() {
            let key = (series.series_kind(), index);
            if let Some(renderer) = self.renderers.get_mut(&key) {
                if renderer.has_compute() {
                    renderer.compute(&mut encoder);
                }
            }
        }

        {
            let background = self.options.theme.background;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ChartGPU Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background[0] as f64,
                            g: background[1] as f64,
                            b: background[2] as f64,
                            a: background[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let (clip_x, clip_y, clip_w, clip_h) = self.grid.clip_rect_px();
            if clip_w > 0 && clip_h > 0 {
                pass.set_scissor_rect(clip_x, clip_y, clip_w, clip_h);
            }

            for (index, series) in self.options.series.iter().enumerate() {
                let key = (series.series_kind(), index);
                if let Some(renderer) = self.renderers.get(&key) {
                    renderer.render(&mut pass);
                }
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        // Sample GPU completion for the metrics; the result lands on a
        // later frame's metrics() call.
        let slot = Arc::clone(&self.gpu_time_slot);
        let gpu_timer = Timer::now();
        self.ctx.queue.on_submitted_work_done(move || {
            *slot.lock() = Some(gpu_timer.elapsed_millis());
        });

        frame.present();

        if let Some(callback) = &self.callbacks.on_rendered {
            callback(timing.delta_ms);
        }
        Ok(())
    }
}

/// Rebase the domain scales onto a facet cell's pixel ranges.
fn scales_for_cell(x_scale: &Scale, y_scale: &Scale, cell: &GridArea) -> (Scale, Scale) {
    let (left, right) = cell.x_range_px();
    let (bottom, top) = cell.y_range_px();
    let x = match x_scale {
        Scale::Linear(s) => Scale::Linear(LinearScale::new(s.domain_min, s.domain_max, left, right)),
        Scale::Category(s) => {
            // Labels were already validated unique.
            match CategoryScale::new(s.labels().to_vec(), left, right) {
                Ok(scale) => Scale::Category(scale),
                Err(_) => Scale::Linear(LinearScale::new(0.0, 1.0, left, right)),
            }
        }
    };
    let y = match y_scale {
        Scale::Linear(s) => Scale::Linear(LinearScale::new(s.domain_min, s.domain_max, bottom, top)),
        Scale::Category(s) => match CategoryScale::new(s.labels().to_vec(), bottom, top) {
            Ok(scale) => Scale::Category(scale),
            Err(_) => Scale::Linear(LinearScale::new(0.0, 1.0, bottom, top)),
        },
    };
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_set_reports_any() {
        let mut dirty = RenderDirty::default();
        assert!(!dirty.any());
        dirty.data = true;
        assert!(dirty.any());
        assert!(RenderDirty::all().any());
    }

    #[test]
    fn listeners_subscribe_emit_unsubscribe() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut listeners: Listeners<u32> = Listeners::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_a = Arc::clone(&count);
        let a = listeners.subscribe(Box::new(move |_| {
            count_a.fetch_add(1, Ordering::SeqCst);
        }));
        let count_b = Arc::clone(&count);
        let _b = listeners.subscribe(Box::new(move |_| {
            count_b.fetch_add(10, Ordering::SeqCst);
        }));

        listeners.emit(&7);
        assert_eq!(count.load(Ordering::SeqCst), 11);

        assert!(listeners.unsubscribe(a));
        assert!(!listeners.unsubscribe(a));
        listeners.emit(&7);
        assert_eq!(count.load(Ordering::SeqCst), 21);
    }
}
