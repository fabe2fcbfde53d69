//! Bar (and histogram) series renderer
//!
//! Instanced rounded rectangles built CPU-side from the logical points.
//! On a category axis, bars occupy `band_ratio` of each band; on a value
//! axis the slot comes from the histogram bin width or the smallest gap
//! between consecutive x values. Stacked bars rest on the accumulated
//! baseline the coordinator supplies.

use super::{create_pipeline, create_uniforms, PrepareInput, SeriesRenderer, SeriesUniforms};
use crate::buffer::GrowableBuffer;
use chartgpu_shared::{ChartResult, PointGeometry, SeriesKind, SeriesTypeOptions};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BarInstance {
    /// x, y, w, h in device pixels.
    rect: [f32; 4],
    color: [f32; 4],
    /// x: corner radius px.
    extra: [f32; 4],
}

pub struct BarRenderer {
    kind: SeriesKind,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instances: GrowableBuffer,
    instance_count: u32,
}

pub(crate) fn rect_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4, 2 => Float32x4];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<BarInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRS,
    }
}

impl BarRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, kind: SeriesKind) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bar Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/rect.wgsl").into()),
        });
        let (uniform_buffer, layout, bind_group) = create_uniforms(
            device,
            "Bar Uniforms",
            std::mem::size_of::<SeriesUniforms>() as u64,
        );
        let pipeline = create_pipeline(
            device,
            "Bar Pipeline",
            &shader,
            "vs_main",
            "fs_main",
            &[rect_instance_layout()],
            &[&layout],
            format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );
        Self {
            kind,
            pipeline,
            uniform_buffer,
            bind_group,
            instances: GrowableBuffer::new(wgpu::BufferUsages::VERTEX, "Bar Instances"),
            instance_count: 0,
        }
    }

    /// Slot width in device pixels for one bar.
    fn slot_px(&self, input: &PrepareInput<'_>) -> f64 {
        if let crate::scale::Scale::Category(cat) = input.x_scale {
            return cat.bandwidth();
        }
        if let SeriesTypeOptions::Histogram(h) = &input.series.kind {
            let linear = super::as_linear(input.x_scale);
            return (linear.scale(h.bin_width) - linear.scale(0.0)).abs();
        }
        // Smallest positive gap between consecutive x values, in pixels.
        let lanes = input.geometry.lanes();
        let mut min_gap = f64::INFINITY;
        let mut prev = None;
        for point in input.points.chunks_exact(lanes) {
            let px = input.x_scale.to_px(point[0] as f64);
            if let Some(last) = prev {
                let gap: f64 = px - last;
                if gap.abs() > 1e-9 {
                    min_gap = min_gap.min(gap.abs());
                }
            }
            prev = Some(px);
        }
        if min_gap.is_finite() {
            min_gap
        } else {
            input.grid.plot_width_px().max(1.0)
        }
    }
}

impl SeriesRenderer for BarRenderer {
    fn kind(&self) -> SeriesKind {
        self.kind
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let bar_opts = match &input.series.kind {
            SeriesTypeOptions::Bar(opts) => opts.clone(),
            SeriesTypeOptions::Histogram(opts) => opts.bar.clone(),
            _ => Default::default(),
        };
        debug_assert_eq!(input.geometry, PointGeometry::Xy);

        let uniforms = SeriesUniforms::new(input, [0.0; 4]);
        input
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let slot = self.slot_px(input);
        let width = (slot * bar_opts.band_ratio.clamp(0.01, 1.0) as f64).max(1.0);
        let zero_px = input.y_scale.to_px(0.0);

        let lanes = input.geometry.lanes();
        let mut instances = Vec::with_capacity(input.point_count());
        for (i, point) in input.points.chunks_exact(lanes).enumerate() {
            let x = point[0] as f64;
            let value = point[1] as f64;
            let base = input
                .stack_base
                .and_then(|bases| bases.get(i).copied())
                .unwrap_or(0.0);

            let center_px = input.x_scale.to_px(x);
            if !center_px.is_finite() {
                continue;
            }
            let y_base_px = if base == 0.0 {
                zero_px
            } else {
                input.y_scale.to_px(base)
            };
            let y_value_px = input.y_scale.to_px(base + value);
            let top = y_base_px.min(y_value_px);
            let height = (y_base_px - y_value_px).abs().max(1.0);

            instances.push(BarInstance {
                rect: [
                    (center_px - width * 0.5) as f32,
                    top as f32,
                    width as f32,
                    height as f32,
                ],
                color: input.color,
                extra: [bar_opts.corner_radius * input.grid.dpr as f32, 0.0, 0.0, 0.0],
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
