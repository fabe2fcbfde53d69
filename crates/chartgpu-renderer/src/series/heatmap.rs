//! Heatmap series renderer
//!
//! One rectangle per `(x category, y category)` cell, colored by value
//! through the resolved colormap. Points arrive as `[cell_index, value]`
//! pairs, row-major over the category grid; cell dimensions derive from
//! the grid extent so every cell occupies equal clip space.

use super::bar::rect_instance_layout;
use super::{create_pipeline, create_uniforms, PrepareInput, SeriesRenderer, SeriesUniforms};
use crate::{buffer::GrowableBuffer, colormap::Colormap, scale::Scale};
use chartgpu_shared::{ChartResult, SeriesKind, SeriesTypeOptions};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CellInstance {
    rect: [f32; 4],
    color: [f32; 4],
    extra: [f32; 4],
}

pub struct HeatmapRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instances: GrowableBuffer,
    instance_count: u32,
}

impl HeatmapRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Heatmap Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/rect.wgsl").into()),
        });
        let (uniform_buffer, layout, bind_group) = create_uniforms(
            device,
            "Heatmap Uniforms",
            std::mem::size_of::<SeriesUniforms>() as u64,
        );
        let pipeline = create_pipeline(
            device,
            "Heatmap Pipeline",
            &shader,
            "vs_main",
            "fs_main",
            &[rect_instance_layout()],
            &[&layout],
            format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );
        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            instances: GrowableBuffer::new(wgpu::BufferUsages::VERTEX, "Heatmap Instances"),
            instance_count: 0,
        }
    }
}

/// Grid columns: x-axis category count when configured, else the smallest
/// square that fits the data.
fn grid_cols(input: &PrepareInput<'_>, cell_count: usize) -> usize {
    if let Scale::Category(cat) = input.x_scale {
        if !cat.is_empty() {
            return cat.len();
        }
    }
    (cell_count as f64).sqrt().ceil().max(1.0) as usize
}

impl SeriesRenderer for HeatmapRenderer {
    fn kind(&self) -> SeriesKind {
        SeriesKind::Heatmap
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let opts = match &input.series.kind {
            SeriesTypeOptions::Heatmap(opts) => opts.clone(),
            _ => Default::default(),
        };
        let colormap = Colormap::resolve(&opts.colormap);

        let uniforms = SeriesUniforms::new(input, [0.0; 4]);
        input
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let lanes = input.geometry.lanes();
        let cell_count = input.point_count();
        if cell_count == 0 {
            self.instance_count = 0;
            return Ok(());
        }

        let cols = grid_cols(input, cell_count);
        let rows = cell_count.div_ceil(cols);

        // Value range for color normalization.
        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for point in input.points.chunks_exact(lanes) {
            lo = lo.min(point[1] as f64);
            hi = hi.max(point[1] as f64);
        }
        let lo = opts.min.unwrap_or(lo);
        let hi = opts.max.unwrap_or(hi);
        let spread = (hi - lo).max(f64::EPSILON);

        let left = input.grid.plot_left_px();
        let top = input.grid.plot_top_px();
        let cell_w = input.grid.plot_width_px() / cols as f64;
        let cell_h = input.grid.plot_height_px() / rows as f64;

        let mut instances = Vec::with_capacity(cell_count);
        for point in input.points.chunks_exact(lanes) {
            let index = point[0] as usize;
            let value = point[1] as f64;
            let col = index % cols;
            let row = index / cols;
            if row >= rows {
                continue;
            }
            let t = ((value - lo) / spread) as f32;
            instances.push(CellInstance {
                rect: [
                    (left + col as f64 * cell_w) as f32,
                    (top + row as f64 * cell_h) as f32,
                    cell_w as f32,
                    cell_h as f32,
                ],
                color: colormap.sample(t),
                extra: [0.0; 4],
            });
        }

        self.instance_count = instances.len() as u32;
        if !instances.is_empty() {
            self.instances
                .upload(input.device, input.queue, bytemuck::cast_slice(&instances))?;
        }
        Ok(())
    }

    fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(buffer) = self.instances.buffer() else {
            return;
        };
        if self.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, buffer.slice(..));
        pass.draw(0..4, 0..self.instance_count);
    }

    fn dispose(&mut self) {
        self.instances.destroy();
        self.uniform_buffer.destroy();
    }
}
