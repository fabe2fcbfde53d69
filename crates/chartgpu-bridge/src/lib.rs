//! Worker bridge
//!
//! Hosts the render coordinator on a dedicated task behind a message
//! protocol: a controller task owns the chart instances and their GPU
//! devices, a proxy hands the host a correlated-request API. Binary point
//! payloads and the surface handle move across the channel by ownership
//! transfer; nothing is cloned.

pub mod controller;
pub mod instance;
pub mod proxy;

pub use controller::ChartController;
pub use instance::ChartInstance;
pub use proxy::{spawn_bridge, BridgeHandle, ChartProxy, ProxyOptions};
