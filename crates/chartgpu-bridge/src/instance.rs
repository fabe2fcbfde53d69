//! Per-chart worker state

use chartgpu_core::ChartCoordinator;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use uuid::Uuid;

/// One chart on the controller task.
///
/// Lifecycle: `Init → Running → {Disposed, Lost}`; `Lost` is terminal and
/// rejects all further operations.
pub struct ChartInstance {
    pub chart_id: Uuid,
    pub coordinator: ChartCoordinator,
    /// Render notifier: set by the coordinator's request-render callback,
    /// drained once per controller tick.
    pub render_pending: Arc<AtomicBool>,
    pub device_lost: Arc<AtomicBool>,
}

impl ChartInstance {
    pub fn is_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    /// Take the render-pending flag for this tick.
    pub fn take_render_pending(&self) -> bool {
        self.render_pending.swap(false, Ordering::AcqRel)
    }
}
