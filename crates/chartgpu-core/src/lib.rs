//! The ChartGPU render coordinator and its supporting engines
//!
//! The coordinator integrates the graphics context, data store, renderer
//! set, interaction engine, overlay broker, and render scheduler behind the
//! public chart contract: resolved options in, coalesced frames and overlay
//! payloads out. Everything here is single-threaded on the owning task;
//! cross-thread signals (device loss) arrive through shared flags.

pub mod coordinator;
pub mod interaction;
pub mod overlay;
pub mod scheduler;

pub use coordinator::{ChartCallbacks, ChartCoordinator, ListenerId, RenderDirty};
pub use hit_test::{hit_test, MAX_HIT_DISTANCE_CSS};
pub use interaction::{
    InteractionConfig, InteractionContext, InteractionEffect, InteractionEngine, InteractionState,
    SourceGate,
};
pub use overlay::{OverlayBroker, OverlayMode, OverlaySink};
pub use scheduler::{FrameClock, FrameMetrics, FrameTiming, MonotonicClock, RenderScheduler};
