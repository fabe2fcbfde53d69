//! GPU-resident series data store
//!
//! Each series owns a logical append list of lane-packed f32 points, a
//! vertex buffer with geometric growth, an append cursor counting points
//! already uploaded, and a rolling content hash. Appends within capacity
//! issue one incremental write from the cursor; growth and replacement
//! force a full re-upload. When a sampling strategy is active above its
//! threshold, the buffer holds the sampled snapshot instead and the
//! incremental contract is suspended for that series.

use crate::sampling::downsample;
use chartgpu_renderer::GrowableBuffer;
use chartgpu_shared::{ChartError, ChartResult, PointGeometry, SamplingStrategy};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// What the next `upload` will do; derived without touching the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPlan {
    None,
    /// Write only the bytes past the append cursor.
    Incremental { byte_offset: usize, byte_len: usize },
    /// Re-upload the whole effective range (growth, replace, or sampling).
    Full { byte_len: usize },
}

pub struct SeriesStore {
    geometry: PointGeometry,
    values: Vec<f32>,
    hash: u64,
    /// Points whose bytes are resident in the vertex buffer, unsampled path.
    append_cursor: usize,
    buffer: GrowableBuffer,
    /// Mirror of the GPU buffer capacity for CPU-side planning.
    capacity_bytes: u64,
    sampling: SamplingStrategy,
    sampling_threshold: usize,
    needs_full: bool,
    /// Points currently drawable from the vertex buffer.
    uploaded_points: u32,
}

impl SeriesStore {
    pub fn new(geometry: PointGeometry, label: impl Into<String>) -> Self {
        Self {
            geometry,
            values: Vec::new(),
            hash: FNV_OFFSET,
            append_cursor: 0,
            buffer: GrowableBuffer::new(
                wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
                label,
            ),
            capacity_bytes: 0,
            sampling: SamplingStrategy::None,
            sampling_threshold: 0,
            needs_full: false,
            uploaded_points: 0,
        }
    }

    pub fn geometry(&self) -> PointGeometry {
        self.geometry
    }

    pub fn point_count(&self) -> usize {
        self.values.len() / self.geometry.lanes()
    }

    pub fn points(&self) -> &[f32] {
        &self.values
    }

    pub fn content_hash(&self) -> u64 {
        self.hash
    }

    pub fn append_cursor(&self) -> usize {
        self.append_cursor
    }

    pub fn uploaded_points(&self) -> u32 {
        self.uploaded_points
    }

    pub fn vertex_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.buffer()
    }

    pub fn set_sampling(&mut self, strategy: SamplingStrategy, threshold: usize) {
        if self.sampling != strategy || self.sampling_threshold != threshold {
            self.sampling = strategy;
            self.sampling_threshold = threshold;
            self.needs_full = true;
        }
    }

    fn sampling_active(&self) -> bool {
        self.sampling != SamplingStrategy::None
            && self.sampling_threshold >= 2
            && self.point_count() > self.sampling_threshold
    }

    fn validate(&self, points: &[f32]) -> ChartResult<()> {
        let lanes = self.geometry.lanes();
        if points.len() % lanes != 0 {
            return Err(ChartError::data(format!(
                "point data length {} is not a multiple of {lanes} lanes",
                points.len()
            )));
        }
        if let Some(pos) = points.iter().position(|v| !v.is_finite()) {
            return Err(ChartError::data(format!(
                "non-finite value at lane offset {pos}"
            )));
        }
        Ok(())
    }

    /// Append lane-packed points, updating the rolling content hash.
    pub fn append(&mut self, points: &[f32]) -> ChartResult<()> {
        self.validate(points)?;
        self.hash = fnv1a(self.hash, bytemuck::cast_slice(points));
        self.values.extend_from_slice(points);
        Ok(())
    }

    /// Replace the series: zero the cursor, recompute the hash, and force a
    /// full upload.
    pub fn replace(&mut self, points: Vec<f32>) -> ChartResult<()> {
        self.validate(&points)?;
        self.hash = fnv1a(FNV_OFFSET, bytemuck::cast_slice(&points));
        self.values = points;
        self.append_cursor = 0;
        self.uploaded_points = 0;
        self.needs_full = true;
        Ok(())
    }

    /// Plan the next upload without touching the GPU.
    pub fn pending_upload(&self) -> UploadPlan {
        let stride = self.geometry.stride();
        if self.sampling_active() {
            // Sampled snapshots are always rewritten whole.
            let sampled = downsample(
                &self.values,
                self.geometry,
                self.sampling,
                self.sampling_threshold,
            );
            let len = sampled.map(|s| s.len() * 4).unwrap_or(self.values.len() * 4);
            return UploadPlan::Full { byte_len: len };
        }

        let total_bytes = self.values.len() * 4;
        if total_bytes == 0 {
            return UploadPlan::None;
        }
        if self.needs_full || total_bytes as u64 > self.capacity_bytes {
            return UploadPlan::Full {
                byte_len: total_bytes,
            };
        }
        let cursor_bytes = self.append_cursor * stride;
        if cursor_bytes < total_bytes {
            return UploadPlan::Incremental {
                byte_offset: cursor_bytes,
                byte_len: total_bytes - cursor_bytes,
            };
        }
        UploadPlan::None
    }

    /// Execute the pending plan against the GPU and advance the cursor.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> ChartResult<()> {
        match self.pending_upload() {
            UploadPlan::None => Ok(()),
            UploadPlan::Incremental {
                byte_offset,
                byte_len,
            } => {
                let end = (byte_offset + byte_len) / 4;
                let start = byte_offset / 4;
                let grew = self.buffer.write(
                    device,
                    queue,
                    byte_offset as u64,
                    bytemuck::cast_slice(&self.values[start..end]),
                )?;
                if grew {
                    // Growth dropped the prefix; rewrite everything.
                    self.buffer
                        .upload(device, queue, bytemuck::cast_slice(&self.values))?;
                }
                self.finish_upload(self.point_count());
                Ok(())
            }
            UploadPlan::Full { .. } => {
                if self.sampling_active() {
                    let sampled = downsample(
                        &self.values,
                        self.geometry,
                        self.sampling,
                        self.sampling_threshold,
                    );
                    let effective = sampled.as_deref().unwrap_or(&self.values);
                    let points = effective.len() / self.geometry.lanes();
                    self.buffer
                        .upload(device, queue, bytemuck::cast_slice(effective))?;
                    self.capacity_bytes = self.buffer.capacity_bytes();
                    self.uploaded_points = points as u32;
                    // The incremental contract is suspended while sampling.
                    self.append_cursor = 0;
                    self.needs_full = true;
                    Ok(())
                } else {
                    self.buffer
                        .upload(device, queue, bytemuck::cast_slice(&self.values))?;
                    self.finish_upload(self.point_count());
                    Ok(())
                }
            }
        }
    }

    fn finish_upload(&mut self, points: usize) {
        self.capacity_bytes = self.buffer.capacity_bytes();
        self.append_cursor = points;
        self.uploaded_points = points as u32;
        self.needs_full = false;
    }

    /// Apply the state effects of the pending plan without a device;
    /// capacity advances exactly as `GrowableBuffer` would.
    #[cfg(test)]
    fn simulate_upload(&mut self) {
        match self.pending_upload() {
            UploadPlan::None => {}
            UploadPlan::Incremental { .. } | UploadPlan::Full { .. } => {
                let required = (self.values.len() * 4) as u64;
                if required > self.capacity_bytes {
                    self.capacity_bytes = chartgpu_renderer::buffer::next_capacity(required);
                }
                self.append_cursor = self.point_count();
                self.uploaded_points = self.point_count() as u32;
                self.needs_full = false;
            }
        }
    }

    /// Domain x of point `i`.
    pub fn x_at(&self, i: usize) -> Option<f64> {
        let lanes = self.geometry.lanes();
        self.values.get(i * lanes).map(|v| *v as f64)
    }

    /// Value lanes of point `i` (everything after x).
    pub fn value_lanes_at(&self, i: usize) -> Option<&[f32]> {
        let lanes = self.geometry.lanes();
        let start = i * lanes;
        self.values.get(start + 1..start + lanes)
    }

    /// `(x, y)` of point `i`; candlesticks report the close.
    pub fn xy_at(&self, i: usize) -> Option<(f64, f64)> {
        let lanes = self.geometry.lanes();
        let start = i * lanes;
        let x = *self.values.get(start)? as f64;
        let y = match self.geometry {
            PointGeometry::Xy => *self.values.get(start + 1)? as f64,
            PointGeometry::Ohlc => *self.values.get(start + 4)? as f64,
        };
        Some((x, y))
    }

    /// Index of the data point nearest to domain `x`, by x distance.
    pub fn nearest_index_by_x(&self, x: f64) -> Option<usize> {
        let count = self.point_count();
        if count == 0 {
            return None;
        }
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for i in 0..count {
            let xi = self.x_at(i)?;
            let d = (xi - x).abs();
            if d < best_distance {
                best_distance = d;
                best = i;
            }
        }
        Some(best)
    }

    fn dispose(&mut self) {
        self.buffer.destroy();
        self.capacity_bytes = 0;
        self.append_cursor = 0;
        self.uploaded_points = 0;
        self.values = Vec::new();
    }
}

/// All series of one chart.
pub struct DataStore {
    series: Vec<SeriesStore>,
    disposed: bool,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    pub fn new() -> Self {
        Self {
            series: Vec::new(),
            disposed: false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn series(&self, index: usize) -> Option<&SeriesStore> {
        self.series.get(index)
    }

    pub fn series_mut(&mut self, index: usize) -> Option<&mut SeriesStore> {
        self.series.get_mut(index)
    }

    /// Reconcile the series list with the options. Existing data survives
    /// when the geometry matches; a geometry change resets that series.
    pub fn configure_series(
        &mut self,
        specs: &[(PointGeometry, SamplingStrategy, usize)],
    ) -> ChartResult<()> {
        if self.disposed {
            return Err(ChartError::Disposed);
        }
        for (i, (geometry, strategy, threshold)) in specs.iter().enumerate() {
            match self.series.get_mut(i) {
                Some(existing) if existing.geometry == *geometry => {
                    existing.set_sampling(*strategy, *threshold);
                }
                Some(existing) => {
                    let mut fresh = SeriesStore::new(*geometry, format!("Series {i} Vertices"));
                    fresh.set_sampling(*strategy, *threshold);
                    existing.dispose();
                    *existing = fresh;
                }
                None => {
                    let mut fresh = SeriesStore::new(*geometry, format!("Series {i} Vertices"));
                    fresh.set_sampling(*strategy, *threshold);
                    self.series.push(fresh);
                }
            }
        }
        while self.series.len() > specs.len() {
            if let Some(mut dropped) = self.series.pop() {
                dropped.dispose();
            }
        }
        Ok(())
    }

    pub fn append(&mut self, series_index: usize, points: &[f32]) -> ChartResult<()> {
        if self.disposed {
            return Err(ChartError::Disposed);
        }
        let series = self.series.get_mut(series_index).ok_or_else(|| {
            ChartError::data(format!("invalid series index {series_index}"))
        })?;
        series.append(points)
    }

    pub fn replace(&mut self, series_index: usize, points: Vec<f32>) -> ChartResult<()> {
        if self.disposed {
            return Err(ChartError::Disposed);
        }
        let series = self.series.get_mut(series_index).ok_or_else(|| {
            ChartError::data(format!("invalid series index {series_index}"))
        })?;
        series.replace(points)
    }

    /// Flush all pending uploads.
    pub fn upload_all(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> ChartResult<()> {
        if self.disposed {
            return Err(ChartError::Disposed);
        }
        for series in &mut self.series {
            series.upload(device, queue)?;
        }
        Ok(())
    }

    /// X extent across all series.
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for series in &self.series {
            for i in 0..series.point_count() {
                if let Some(x) = series.x_at(i) {
                    lo = lo.min(x);
                    hi = hi.max(x);
                }
            }
        }
        (lo <= hi).then_some((lo, hi))
    }

    /// Y extent, optionally restricted to an x window. Candlesticks span
    /// low to high.
    pub fn y_extent(&self, x_window: Option<(f64, f64)>) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for series in &self.series {
            let lanes = series.geometry().lanes();
            for point in series.points().chunks_exact(lanes) {
                let x = point[0] as f64;
                if let Some((start, end)) = x_window {
                    if x < start || x > end {
                        continue;
                    }
                }
                match series.geometry() {
                    PointGeometry::Xy => {
                        lo = lo.min(point[1] as f64);
                        hi = hi.max(point[1] as f64);
                    }
                    PointGeometry::Ohlc => {
                        hi = hi.max(point[2] as f64);
                        lo = lo.min(point[3] as f64);
                    }
                }
            }
        }
        (lo <= hi).then_some((lo, hi))
    }

    /// Destroy all owned buffers, best effort. Idempotent; errors are
    /// collected rather than raised.
    pub fn dispose(&mut self) -> Vec<ChartError> {
        if self.disposed {
            return Vec::new();
        }
        self.disposed = true;
        for series in &mut self.series {
            series.dispose();
        }
        Vec::new()
    }
}
