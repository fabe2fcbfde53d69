//! Worker-side controller
//!
//! Owns the chart instance map. Runs a select loop over the inbound port,
//! the device-lost channel, and a frame ticker; messages apply in arrival
//! order per chart, and renders coalesce to at most one frame per chart
//! per tick.

use crate::instance::ChartInstance;
use chartgpu_core::{ChartCallbacks, ChartCoordinator, OverlayMode};
use chartgpu_renderer::{GpuContext, GpuContextOptions};
use chartgpu_shared::{
    AppendItem, ChartError, ChartEvent, DeviceLostKind, InboundMessage, OutboundMessage,
    ResolvedOptions, SurfaceSource,
};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Frame interval for the render ticker (60 Hz).
const TICK_INTERVAL: Duration = Duration::from_micros(16_667);

type LostSignal = (Uuid, DeviceLostKind, String);

pub struct ChartController {
    instances: HashMap<Uuid, ChartInstance>,
    outbound: UnboundedSender<OutboundMessage>,
    lost_tx: UnboundedSender<LostSignal>,
    lost_rx: UnboundedReceiver<LostSignal>,
}

impl ChartController {
    pub fn new(outbound: UnboundedSender<OutboundMessage>) -> Self {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        Self {
            instances: HashMap::new(),
            outbound,
            lost_tx,
            lost_rx,
        }
    }

    pub fn chart_count(&self) -> usize {
        self.instances.len()
    }

    /// Controller task body. Exits when the inbound port closes, disposing
    /// every remaining chart first.
    pub async fn run(mut self, mut inbound: UnboundedReceiver<InboundMessage>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
                lost = self.lost_rx.recv() => {
                    if let Some((chart_id, reason, message)) = lost {
                        self.handle_device_lost(chart_id, reason, message);
                    }
                },
                _ = ticker.tick() => self.render_pending_charts(),
            }
        }

        let ids: Vec<Uuid> = self.instances.keys().copied().collect();
        for chart_id in ids {
            self.dispose_chart(chart_id);
        }
    }

    fn send(&self, message: OutboundMessage) {
        if self.outbound.send(message).is_err() {
            log::warn!("outbound port closed; dropping message");
        }
    }

    fn send_error(
        &self,
        chart_id: Uuid,
        error: ChartError,
        operation: &str,
        message_id: Option<u64>,
    ) {
        self.send(OutboundMessage::Error {
            chart_id,
            error,
            operation: operation.to_string(),
            message_id,
        });
    }

    async fn handle_message(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Init {
                chart_id,
                surface,
                width,
                height,
                dpr,
                options,
                message_id,
            } => {
                self.init_chart(chart_id, surface, width, height, dpr, *options, message_id)
                    .await;
            }
            InboundMessage::SetOptions { chart_id, options } => {
                self.with_chart(chart_id, "set_options", |instance| {
                    instance.coordinator.set_options(*options)
                });
            }
            InboundMessage::AppendData { chart_id, item } => {
                self.with_chart(chart_id, "append_data", |instance| {
                    apply_append(instance, &item)
                });
            }
            InboundMessage::AppendDataBatch { chart_id, items } => {
                self.with_chart(chart_id, "append_data_batch", |instance| {
                    for item in &items {
                        apply_append(instance, item)?;
                    }
                    Ok(())
                });
            }
            InboundMessage::Resize {
                chart_id,
                css_width,
                css_height,
                dpr,
                request_render,
            } => {
                self.with_chart(chart_id, "resize", |instance| {
                    instance.coordinator.resize(css_width, css_height, dpr)?;
                    if request_render {
                        instance.coordinator.render()?;
                    }
                    Ok(())
                });
            }
            InboundMessage::ForwardPointerEvent { chart_id, event } => {
                self.with_chart(chart_id, "pointer_event", |instance| {
                    instance.coordinator.handle_pointer_event(&event)
                });
            }
            InboundMessage::SetZoomRange {
                chart_id,
                start,
                end,
            } => {
                self.with_chart(chart_id, "set_zoom_range", |instance| {
                    instance.coordinator.set_zoom_range(start, end)
                });
            }
            InboundMessage::SetInteractionX {
                chart_id,
                x,
                source,
            } => {
                self.with_chart(chart_id, "set_interaction_x", |instance| {
                    instance.coordinator.set_interaction_x(x, source)
                });
            }
            InboundMessage::SetAnimation {
                chart_id, enabled, ..
            } => {
                self.with_chart(chart_id, "set_animation", |instance| {
                    instance.coordinator.set_animation(enabled)
                });
            }
            InboundMessage::Dispose { chart_id } => {
                self.dispose_chart(chart_id);
            }
        }
    }

    fn with_chart(
        &mut self,
        chart_id: Uuid,
        operation: &str,
        apply: impl FnOnce(&mut ChartInstance) -> Result<(), ChartError>,
    ) {
        let Some(instance) = self.instances.get_mut(&chart_id) else {
            self.send_error(
                chart_id,
                ChartError::invalid_argument(format!("unknown chart id {chart_id}")),
                operation,
                None,
            );
            return;
        };
        if let Err(error) = apply(instance) {
            self.send_error(chart_id, error, operation, None);
        }
    }

    async fn init_chart(
        &mut self,
        chart_id: Uuid,
        surface: SurfaceSource,
        width: u32,
        height: u32,
        dpr: f64,
        options: ResolvedOptions,
        message_id: u64,
    ) {
        if self.instances.contains_key(&chart_id) {
            self.send_error(
                chart_id,
                ChartError::invalid_argument(format!("chart {chart_id} already initialized")),
                "init",
                Some(message_id),
            );
            return;
        }

        let device_lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&device_lost);
        let lost_tx = self.lost_tx.clone();
        let error_port = self.outbound.clone();

        let ctx = GpuContext::new(
            surface,
            width,
            height,
            dpr,
            GpuContextOptions::default(),
            move |reason, message| {
                lost_flag.store(true, Ordering::Release);
                let _ = lost_tx.send((chart_id, reason, message));
            },
            move |class, message| {
                let _ = error_port.send(OutboundMessage::Error {
                    chart_id,
                    error: ChartError::render(format!("uncaptured {class:?}: {message}")),
                    operation: "device".to_string(),
                    message_id: None,
                });
            },
        )
        .await;

        let ctx = match ctx {
            Ok(ctx) => ctx,
            Err(error) => {
                self.send_error(chart_id, error, "init", Some(message_id));
                return;
            }
        };

        let capabilities = ctx.capabilities();
        let render_pending = Arc::new(AtomicBool::new(false));
        let callbacks = self.wire_callbacks(chart_id, Arc::clone(&render_pending));

        let coordinator = match ChartCoordinator::new(
            ctx,
            options,
            OverlayMode::Embedded,
            callbacks,
            Arc::clone(&device_lost),
        ) {
            Ok(coordinator) => coordinator,
            Err(error) => {
                self.send_error(chart_id, error, "init", Some(message_id));
                return;
            }
        };

        self.instances.insert(
            chart_id,
            ChartInstance {
                chart_id,
                coordinator,
                render_pending,
                device_lost,
            },
        );
        self.send(OutboundMessage::Ready {
            chart_id,
            message_id,
            capabilities,
        });
    }

    fn wire_callbacks(&self, chart_id: Uuid, render_pending: Arc<AtomicBool>) -> ChartCallbacks {
        let event_port = self.outbound.clone();
        let tooltip_port = self.outbound.clone();
        let legend_port = self.outbound.clone();
        let axis_port = self.outbound.clone();
        let rendered_port = self.outbound.clone();
        let error_port = self.outbound.clone();

        ChartCallbacks {
            on_request_render: Some(Box::new(move || {
                render_pending.store(true, Ordering::Release);
            })),
            on_error: Some(Box::new(move |event| {
                let _ = error_port.send(OutboundMessage::Error {
                    chart_id,
                    error: event.error.clone(),
                    operation: event.operation.clone(),
                    message_id: event.message_id,
                });
            })),
            on_event: Some(Box::new(move |event| {
                let message = match event.clone() {
                    ChartEvent::HoverChange { hit } => {
                        OutboundMessage::HoverChange { chart_id, hit }
                    }
                    ChartEvent::Click { hit } => OutboundMessage::Click { chart_id, hit },
                    ChartEvent::CrosshairMove {
                        x_domain,
                        x_css,
                        source,
                    } => OutboundMessage::CrosshairMove {
                        chart_id,
                        x_domain,
                        x_css,
                        source,
                    },
                    ChartEvent::ZoomChange { start, end, source } => {
                        OutboundMessage::ZoomChange {
                            chart_id,
                            start,
                            end,
                            source,
                        }
                    }
                };
                let _ = event_port.send(message);
            })),
            on_tooltip: Some(Box::new(move |payload| {
                let _ = tooltip_port.send(OutboundMessage::TooltipUpdate {
                    chart_id,
                    payload: payload.cloned(),
                });
            })),
            on_legend: Some(Box::new(move |items| {
                let _ = legend_port.send(OutboundMessage::LegendUpdate {
                    chart_id,
                    items: items.to_vec(),
                });
            })),
            on_axis_labels: Some(Box::new(move |labels| {
                let _ = axis_port.send(OutboundMessage::AxisLabelsUpdate {
                    chart_id,
                    labels: labels.clone(),
                });
            })),
            on_rendered: Some(Box::new(move |frame_time_ms| {
                let _ = rendered_port.send(OutboundMessage::Rendered {
                    chart_id,
                    frame_time_ms,
                });
            })),
        }
    }

    fn handle_device_lost(&mut self, chart_id: Uuid, reason: DeviceLostKind, message: String) {
        // Destruction through dispose also fires the callback; only a real
        // loss is surfaced.
        if reason == DeviceLostKind::Destroyed && !self.instances.contains_key(&chart_id) {
            return;
        }
        log::warn!("chart {chart_id}: device lost ({reason}): {message}");
        self.send(OutboundMessage::DeviceLost {
            chart_id,
            reason,
            message,
        });
    }

    fn render_pending_charts(&mut self) {
        for instance in self.instances.values_mut() {
            if instance.is_lost() {
                continue;
            }
            if instance.take_render_pending() {
                instance.coordinator.tick();
            }
        }
    }

    fn dispose_chart(&mut self, chart_id: Uuid) {
        let Some(mut instance) = self.instances.remove(&chart_id) else {
            self.send_error(
                chart_id,
                ChartError::invalid_argument(format!("unknown chart id {chart_id}")),
                "dispose",
                None,
            );
            return;
        };
        let cleanup_errors = instance
            .coordinator
            .dispose()
            .into_iter()
            .map(|e| e.to_string())
            .collect();
        self.send(OutboundMessage::Disposed {
            chart_id,
            cleanup_errors,
        });
    }
}

fn apply_append(instance: &mut ChartInstance, item: &AppendItem) -> Result<(), ChartError> {
    instance
        .coordinator
        .append_bytes(item.series_index, &item.bytes, item.count, item.stride)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn unknown_chart_operations_report_errors() {
        let (out_tx, mut out_rx) = unbounded_channel();
        let (in_tx, in_rx) = unbounded_channel();
        let controller = ChartController::new(out_tx);
        let task = tokio::spawn(controller.run(in_rx));

        let ghost = Uuid::new_v4();
        in_tx
            .send(InboundMessage::SetZoomRange {
                chart_id: ghost,
                start: 0.0,
                end: 50.0,
            })
            .unwrap();

        let message = out_rx.recv().await.expect("error message");
        match message {
            OutboundMessage::Error {
                chart_id,
                error,
                operation,
                ..
            } => {
                assert_eq!(chart_id, ghost);
                assert_eq!(operation, "set_zoom_range");
                assert!(matches!(error, ChartError::InvalidArgument { .. }));
            }
            other => panic!("expected error, got {other:?}"),
        }

        drop(in_tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn dispose_of_unknown_chart_reports_an_error() {
        let (out_tx, mut out_rx) = unbounded_channel();
        let (in_tx, in_rx) = unbounded_channel();
        let task = tokio::spawn(ChartController::new(out_tx).run(in_rx));

        in_tx
            .send(InboundMessage::Dispose {
                chart_id: Uuid::new_v4(),
            })
            .unwrap();
        let message = out_rx.recv().await.unwrap();
        assert!(matches!(message, OutboundMessage::Error { operation, .. } if operation == "dispose"));

        drop(in_tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn controller_exits_when_the_port_closes() {
        let (out_tx, _out_rx) = unbounded_channel();
        let (in_tx, in_rx) = unbounded_channel();
        let task = tokio::spawn(ChartController::new(out_tx).run(in_rx));
        drop(in_tx);
        task.await.unwrap();
    }
}
