//! GPU rendering for ChartGPU
//!
//! Owns the graphics context (adapter/device/queue/surface), the scale and
//! grid-layout math that keeps CPU hit testing consistent with on-GPU
//! transforms, growable GPU buffers, colormaps, and one renderer per series
//! type. Renderers follow a prepare/render split: `prepare` computes
//! per-instance data and writes staging buffers, `render` records draws
//! into the frame's single render pass.

pub mod buffer;
pub mod colormap;
pub mod context;
pub mod layout;
pub mod scale;
pub mod series;
pub mod timing;

pub use buffer::GrowableBuffer;
pub use colormap::{Colormap, DensityCurveExt};
pub use context::{FrameTarget, GpuContext, GpuContextOptions};
pub use layout::GridArea;
pub use scale::{nice_ticks, CategoryScale, LinearScale, Scale};
pub use series::{create_renderer, PrepareInput, SeriesRenderer};
pub use timing::Timer;
