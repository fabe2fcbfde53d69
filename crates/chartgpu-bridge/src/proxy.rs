//! Host-side proxy
//!
//! Correlated requests are keyed by message id and resolved by a oneshot
//! with a 30 second deadline; forwarded pointer events are dropped until
//! the first `ready` arrives; container size and DPR changes coalesce into
//! at most one `resize` per frame interval.

use chartgpu_shared::{
    AnimationOptions, AppendItem, Capabilities, ChartError, ChartResult, InboundMessage,
    InteractionSource, OutboundMessage, PointerEvent, ResolvedOptions, SurfaceSource,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Deadline for correlated requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Resize coalescing interval (one frame at 60 Hz).
const RESIZE_FLUSH_INTERVAL: Duration = Duration::from_micros(16_667);

#[derive(Debug, Clone, Copy)]
pub struct ProxyOptions {
    pub request_timeout: Duration,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingResize {
    css_width: f64,
    css_height: f64,
    dpr: f64,
    request_render: bool,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<ChartResult<Capabilities>>>>>;
type MessageHandlers = Arc<Mutex<Vec<Box<dyn Fn(&OutboundMessage) + Send + Sync>>>>;

/// Everything needed to run a bridge: spawns the controller task and a
/// dispatch task, returns the inbound port for proxies.
pub struct BridgeHandle {
    pub inbound: UnboundedSender<InboundMessage>,
    pub controller_task: JoinHandle<()>,
    pub dispatch_task: JoinHandle<()>,
    pending: Pending,
    handlers: MessageHandlers,
}

impl BridgeHandle {
    /// Observe every outbound message (events, overlay payloads, errors).
    pub fn on_message(&self, handler: Box<dyn Fn(&OutboundMessage) + Send + Sync>) {
        self.handlers.lock().push(handler);
    }

    /// Create a proxy for one chart on this bridge.
    pub fn proxy(&self, options: ProxyOptions) -> ChartProxy {
        ChartProxy {
            chart_id: Uuid::new_v4(),
            to_controller: self.inbound.clone(),
            pending: Arc::clone(&self.pending),
            handlers: Arc::clone(&self.handlers),
            next_message_id: Arc::new(AtomicU64::new(1)),
            initialized: Arc::new(AtomicBool::new(false)),
            pending_resize: Arc::new(Mutex::new(None)),
            resize_task: Mutex::new(None),
            request_timeout: options.request_timeout,
        }
    }
}

/// Spawn the controller and its outbound dispatcher on the current tokio
/// runtime.
pub fn spawn_bridge() -> BridgeHandle {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let handlers: MessageHandlers = Arc::new(Mutex::new(Vec::new()));

    let controller = crate::controller::ChartController::new(out_tx);
    let controller_task = tokio::spawn(controller.run(in_rx));

    let dispatch_pending = Arc::clone(&pending);
    let dispatch_handlers = Arc::clone(&handlers);
    let dispatch_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            dispatch(&message, &dispatch_pending, &dispatch_handlers);
        }
    });

    BridgeHandle {
        inbound: in_tx,
        controller_task,
        dispatch_task,
        pending,
        handlers,
    }
}

fn dispatch(message: &OutboundMessage, pending: &Pending, handlers: &MessageHandlers) {
    if let Some(message_id) = message.message_id() {
        if let Some(slot) = pending.lock().remove(&message_id) {
            let result = match message {
                OutboundMessage::Ready { capabilities, .. } => Ok(capabilities.clone()),
                OutboundMessage::Error { error, .. } => Err(error.clone()),
                _ => Err(ChartError::Communication {
                    message: "unexpected correlated reply".to_string(),
                }),
            };
            let _ = slot.send(result);
        }
    }
    for handler in handlers.lock().iter() {
        handler(message);
    }
}

/// Host-side handle for one chart.
pub struct ChartProxy {
    chart_id: Uuid,
    to_controller: UnboundedSender<InboundMessage>,
    pending: Pending,
    handlers: MessageHandlers,
    next_message_id: Arc<AtomicU64>,
    initialized: Arc<AtomicBool>,
    pending_resize: Arc<Mutex<Option<PendingResize>>>,
    resize_task: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl ChartProxy {
    pub fn chart_id(&self) -> Uuid {
        self.chart_id
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Observe every outbound message on this proxy's bridge.
    pub fn on_message(&self, handler: Box<dyn Fn(&OutboundMessage) + Send + Sync>) {
        self.handlers.lock().push(handler);
    }

    fn send(&self, message: InboundMessage) -> ChartResult<()> {
        self.to_controller
            .send(message)
            .map_err(|_| ChartError::Communication {
                message: "controller port closed".to_string(),
            })
    }

    /// Initialize the chart: transfers the surface to the controller and
    /// awaits `ready` under the request deadline.
    pub async fn init(
        &self,
        surface: SurfaceSource,
        width: u32,
        height: u32,
        dpr: f64,
        options: ResolvedOptions,
    ) -> ChartResult<Capabilities> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(message_id, tx);

        if let Err(error) = self.send(InboundMessage::Init {
            chart_id: self.chart_id,
            surface,
            width,
            height,
            dpr,
            options: Box::new(options),
            message_id,
        }) {
            self.pending.lock().remove(&message_id);
            return Err(error);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => {
                if result.is_ok() {
                    self.initialized.store(true, Ordering::Release);
                }
                result
            }
            Ok(Err(_)) => Err(ChartError::Disposed),
            Err(_) => {
                self.pending.lock().remove(&message_id);
                Err(ChartError::Timeout {
                    timeout_ms: self.request_timeout.as_millis() as u64,
                })
            }
        }
    }

    pub fn set_options(&self, options: ResolvedOptions) -> ChartResult<()> {
        self.send(InboundMessage::SetOptions {
            chart_id: self.chart_id,
            options: Box::new(options),
        })
    }

    /// Append binary point data. The buffer moves to the controller task;
    /// it is never cloned.
    pub fn append_data(
        &self,
        series_index: usize,
        bytes: Vec<u8>,
        count: usize,
        stride: usize,
    ) -> ChartResult<()> {
        self.send(InboundMessage::AppendData {
            chart_id: self.chart_id,
            item: AppendItem {
                series_index,
                bytes,
                count,
                stride,
            },
        })
    }

    pub fn append_data_batch(&self, items: Vec<AppendItem>) -> ChartResult<()> {
        self.send(InboundMessage::AppendDataBatch {
            chart_id: self.chart_id,
            items,
        })
    }

    /// Record a container size / DPR change. Updates coalesce; at most one
    /// `resize` reaches the controller per frame interval.
    pub fn notify_container_size(
        &self,
        css_width: f64,
        css_height: f64,
        dpr: f64,
        request_render: bool,
    ) {
        *self.pending_resize.lock() = Some(PendingResize {
            css_width,
            css_height,
            dpr,
            request_render,
        });
        self.ensure_resize_flusher();
    }

    fn ensure_resize_flusher(&self) {
        let mut task = self.resize_task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }
        let slot = Arc::clone(&self.pending_resize);
        let port = self.to_controller.clone();
        let chart_id = self.chart_id;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RESIZE_FLUSH_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick is immediate; consume it so updates can coalesce
            // for one interval before flushing.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let update = slot.lock().take();
                match update {
                    Some(resize) => {
                        if port
                            .send(InboundMessage::Resize {
                                chart_id,
                                css_width: resize.css_width,
                                css_height: resize.css_height,
                                dpr: resize.dpr,
                                request_render: resize.request_render,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                    // Nothing accumulated for a whole interval; park.
                    None => break,
                }
            }
        }));
    }

    /// Flush any pending resize immediately (tests and teardown).
    pub fn flush_resize(&self) -> ChartResult<()> {
        let update = self.pending_resize.lock().take();
        if let Some(resize) = update {
            self.send(InboundMessage::Resize {
                chart_id: self.chart_id,
                css_width: resize.css_width,
                css_height: resize.css_height,
                dpr: resize.dpr,
                request_render: resize.request_render,
            })?;
        }
        Ok(())
    }

    /// Forward a pointer event. Silently dropped until `ready` arrives.
    pub fn forward_pointer_event(&self, event: PointerEvent) -> ChartResult<()> {
        if !self.is_initialized() {
            return Ok(());
        }
        self.send(InboundMessage::ForwardPointerEvent {
            chart_id: self.chart_id,
            event,
        })
    }

    pub fn set_zoom_range(&self, start: f64, end: f64) -> ChartResult<()> {
        self.send(InboundMessage::SetZoomRange {
            chart_id: self.chart_id,
            start,
            end,
        })
    }

    pub fn set_interaction_x(
        &self,
        x: Option<f64>,
        source: Option<InteractionSource>,
    ) -> ChartResult<()> {
        self.send(InboundMessage::SetInteractionX {
            chart_id: self.chart_id,
            x,
            source,
        })
    }

    pub fn set_animation(
        &self,
        enabled: bool,
        config: Option<AnimationOptions>,
    ) -> ChartResult<()> {
        self.send(InboundMessage::SetAnimation {
            chart_id: self.chart_id,
            enabled,
            config,
        })
    }

    /// Dispose the chart. Cancels all pending correlated requests with
    /// `Disposed` before the message is sent.
    pub fn dispose(&self) -> ChartResult<()> {
        let cancelled: Vec<_> = self.pending.lock().drain().collect();
        for (_, slot) in cancelled {
            let _ = slot.send(Err(ChartError::Disposed));
        }
        if let Some(task) = self.resize_task.lock().take() {
            task.abort();
        }
        self.send(InboundMessage::Dispose {
            chart_id: self.chart_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    /// A proxy wired to raw channels with no controller behind them.
    fn detached_proxy(
        timeout: Duration,
    ) -> (
        ChartProxy,
        tokio::sync::mpsc::UnboundedReceiver<InboundMessage>,
        Pending,
    ) {
        let (in_tx, in_rx) = unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let proxy = ChartProxy {
            chart_id: Uuid::new_v4(),
            to_controller: in_tx,
            pending: Arc::clone(&pending),
            handlers: Arc::new(Mutex::new(Vec::new())),
            next_message_id: Arc::new(AtomicU64::new(1)),
            initialized: Arc::new(AtomicBool::new(false)),
            pending_resize: Arc::new(Mutex::new(None)),
            resize_task: Mutex::new(None),
            request_timeout: timeout,
        };
        (proxy, in_rx, pending)
    }

    fn offscreen() -> SurfaceSource {
        SurfaceSource::Offscreen {
            width: 64,
            height: 64,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn init_times_out_when_unanswered() {
        let (proxy, _in_rx, pending) = detached_proxy(Duration::from_secs(30));
        let result = proxy
            .init(offscreen(), 64, 64, 1.0, ResolvedOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(ChartError::Timeout { timeout_ms: 30_000 })
        ));
        // The abandoned request was cleaned out of the map.
        assert!(pending.lock().is_empty());
        assert!(!proxy.is_initialized());
    }

    #[tokio::test]
    async fn init_resolves_through_the_ready_message() {
        let (proxy, mut in_rx, pending) = detached_proxy(Duration::from_secs(5));
        let handlers: MessageHandlers = Arc::new(Mutex::new(Vec::new()));

        let init = proxy.init(offscreen(), 64, 64, 2.0, ResolvedOptions::default());
        let responder = async {
            let message = in_rx.recv().await.unwrap();
            let (chart_id, message_id) = match message {
                InboundMessage::Init {
                    chart_id,
                    message_id,
                    dpr,
                    ..
                } => {
                    assert_eq!(dpr, 2.0);
                    (chart_id, message_id)
                }
                other => panic!("expected init, got {other:?}"),
            };
            dispatch(
                &OutboundMessage::Ready {
                    chart_id,
                    message_id,
                    capabilities: Capabilities {
                        adapter_name: "fake".into(),
                        backend: "noop".into(),
                        timestamp_query: false,
                        preferred_format: "Bgra8UnormSrgb".into(),
                    },
                },
                &pending,
                &handlers,
            );
        };

        let (result, ()) = tokio::join!(init, responder);
        let capabilities = result.unwrap();
        assert_eq!(capabilities.adapter_name, "fake");
        assert!(proxy.is_initialized());
    }

    #[tokio::test]
    async fn init_surfaces_correlated_errors() {
        let (proxy, mut in_rx, pending) = detached_proxy(Duration::from_secs(5));
        let handlers: MessageHandlers = Arc::new(Mutex::new(Vec::new()));

        let init = proxy.init(offscreen(), 64, 64, 1.0, ResolvedOptions::default());
        let responder = async {
            let message = in_rx.recv().await.unwrap();
            let (chart_id, message_id) = match message {
                InboundMessage::Init {
                    chart_id,
                    message_id,
                    ..
                } => (chart_id, message_id),
                other => panic!("expected init, got {other:?}"),
            };
            dispatch(
                &OutboundMessage::Error {
                    chart_id,
                    error: ChartError::GraphicsInitFailed {
                        message: "no adapter".into(),
                    },
                    operation: "init".into(),
                    message_id: Some(message_id),
                },
                &pending,
                &handlers,
            );
        };

        let (result, ()) = tokio::join!(init, responder);
        assert!(matches!(result, Err(ChartError::GraphicsInitFailed { .. })));
        assert!(!proxy.is_initialized());
    }

    #[tokio::test]
    async fn pointer_events_are_dropped_until_ready() {
        let (proxy, mut in_rx, _pending) = detached_proxy(Duration::from_secs(5));
        let event = PointerEvent::new(chartgpu_shared::PointerEventKind::Move, 10.0, 10.0, 0.0);
        proxy.forward_pointer_event(event).unwrap();
        assert!(in_rx.try_recv().is_err());

        // After ready, events flow.
        proxy.initialized.store(true, Ordering::Release);
        proxy.forward_pointer_event(event).unwrap();
        assert!(matches!(
            in_rx.try_recv(),
            Ok(InboundMessage::ForwardPointerEvent { .. })
        ));
    }

    #[tokio::test]
    async fn dispose_cancels_pending_requests() {
        let (proxy, mut in_rx, _pending) = detached_proxy(Duration::from_secs(30));
        let init = proxy.init(offscreen(), 64, 64, 1.0, ResolvedOptions::default());
        let disposer = async {
            // Let init register its pending slot first.
            let _ = in_rx.recv().await;
            proxy.dispose().unwrap();
        };
        let (result, ()) = tokio::join!(init, disposer);
        assert!(matches!(result, Err(ChartError::Disposed)));
        assert!(matches!(
            in_rx.try_recv(),
            Ok(InboundMessage::Dispose { .. })
        ));
    }

    #[tokio::test]
    async fn resize_updates_coalesce_to_the_latest() {
        let (proxy, mut in_rx, _pending) = detached_proxy(Duration::from_secs(5));
        proxy.notify_container_size(100.0, 100.0, 1.0, false);
        proxy.notify_container_size(200.0, 150.0, 1.0, false);
        proxy.notify_container_size(800.0, 600.0, 2.0, true);
        proxy.flush_resize().unwrap();

        let message = in_rx.recv().await.unwrap();
        match message {
            InboundMessage::Resize {
                css_width,
                css_height,
                dpr,
                request_render,
                ..
            } => {
                assert_eq!((css_width, css_height), (800.0, 600.0));
                assert_eq!(dpr, 2.0);
                assert!(request_render);
            }
            other => panic!("expected resize, got {other:?}"),
        }
        // Nothing else was queued by the earlier notifications.
        let follow_up = tokio::time::timeout(Duration::from_millis(80), in_rx.recv()).await;
        match follow_up {
            Err(_) => {}
            Ok(Some(InboundMessage::Resize { .. })) => {
                panic!("resize updates must coalesce to one message")
            }
            Ok(other) => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_after_controller_shutdown_is_a_communication_error() {
        let (proxy, in_rx, _pending) = detached_proxy(Duration::from_secs(5));
        drop(in_rx);
        let result = proxy.set_zoom_range(0.0, 50.0);
        assert!(matches!(result, Err(ChartError::Communication { .. })));
    }
}
