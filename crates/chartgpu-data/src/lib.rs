//! Data management for ChartGPU
//!
//! Owns the per-series logical point lists and their GPU vertex buffers.
//! Appends are incremental: only the bytes past the append cursor are
//! written unless a growth or replace forces a full re-upload. Binary
//! ingestion normalizes the accepted transfer encodings into the canonical
//! packed-f32 layouts, and sampling strategies thin oversized series before
//! upload.

pub mod ingest;
pub mod sampling;
pub mod store;

pub use ingest::decode_points;
pub use sampling::downsample;
pub use store::{DataStore, SeriesStore, UploadPlan};
