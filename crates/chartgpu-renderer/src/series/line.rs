//! Line series renderer
//!
//! Draws an anti-aliased polyline as instanced segment quads directly from
//! the store's vertex buffer. The buffer is bound twice with the second
//! slot offset by one point, so each instance sees consecutive endpoints;
//! appended points become new instances without any CPU re-tessellation.

use super::{create_pipeline, create_uniforms, PrepareInput, SeriesRenderer, SeriesUniforms};
use chartgpu_shared::{ChartResult, LineSeriesOptions, SeriesKind, SeriesTypeOptions};

pub struct LineRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: Option<wgpu::Buffer>,
    segment_count: u32,
}

pub(crate) const POINT_STRIDE: u64 = 8;

pub(crate) fn segment_vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    const P0: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
    const P1: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
    [
        wgpu::VertexBufferLayout {
            array_stride: POINT_STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &P0,
        },
        wgpu::VertexBufferLayout {
            array_stride: POINT_STRIDE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &P1,
        },
    ]
}

impl LineRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Line Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/line.wgsl").into()),
        });
        let (uniform_buffer, layout, bind_group) = create_uniforms(
            device,
            "Line Uniforms",
            std::mem::size_of::<SeriesUniforms>() as u64,
        );
        let pipeline = create_pipeline(
            device,
            "Line Pipeline",
            &shader,
            "vs_main",
            "fs_main",
            &segment_vertex_layouts(),
            &[&layout],
            format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );
        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            vertex_buffer: None,
            segment_count: 0,
        }
    }
}

impl SeriesRenderer for LineRenderer {
    fn kind(&self) -> SeriesKind {
        SeriesKind::Line
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let width = match &input.series.kind {
            SeriesTypeOptions::Line(LineSeriesOptions { width, .. }) => *width,
            _ => 2.0,
        };
        let uniforms = SeriesUniforms::new(input, [width * 0.5, 1.0, 0.0, 0.0]);
        input
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        self.segment_count = input.vertex_count.saturating_sub(1);
        self.vertex_buffer = input.vertex_buffer.cloned();
        Ok(())
    }

    fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(buffer) = &self.vertex_buffer else {
            return;
        };
        if self.segment_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, buffer.slice(..));
        pass.set_vertex_buffer(1, buffer.slice(POINT_STRIDE..));
        pass.draw(0..4, 0..self.segment_count);
    }

    fn dispose(&mut self) {
        self.vertex_buffer = None;
        self.uniform_buffer.destroy();
    }
}
