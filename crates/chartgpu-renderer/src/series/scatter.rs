//! Scatter series renderer
//!
//! Instanced screen-aligned quads over the store's vertex buffer, masked by
//! a marker SDF (disk, square, or triangle) in the fragment stage.

use super::{create_pipeline, create_uniforms, PrepareInput, SeriesRenderer, SeriesUniforms};
use chartgpu_shared::{ChartResult, MarkerShape, SeriesKind, SeriesTypeOptions};

pub struct ScatterRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: Option<wgpu::Buffer>,
    instance_count: u32,
}

impl ScatterRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scatter Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scatter.wgsl").into()),
        });
        let (uniform_buffer, layout, bind_group) = create_uniforms(
            device,
            "Scatter Uniforms",
            std::mem::size_of::<SeriesUniforms>() as u64,
        );
        const POINT: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
        let pipeline = create_pipeline(
            device,
            "Scatter Pipeline",
            &shader,
            "vs_main",
            "fs_main",
            &[wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &POINT,
            }],
            &[&layout],
            format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );
        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            vertex_buffer: None,
            instance_count: 0,
        }
    }
}

impl SeriesRenderer for ScatterRenderer {
    fn kind(&self) -> SeriesKind {
        SeriesKind::Scatter
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let (size, marker) = match &input.series.kind {
            SeriesTypeOptions::Scatter(opts) => (opts.size, opts.marker),
            _ => (6.0, MarkerShape::Disk),
        };
        let marker_id = match marker {
            MarkerShape::Disk => 0.0,
            MarkerShape::Square => 1.0,
            MarkerShape::Triangle => 2.0,
        };
        let uniforms = SeriesUniforms::new(input, [size * 0.5, marker_id, 1.0, 0.0]);
        input
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        self.instance_count = input.vertex_count;
        self.vertex_buffer = input.vertex_buffer.cloned();
        Ok(())
    }

    fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(buffer) = &self.vertex_buffer else {
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
        self.vertex_buffer = None;
        self.uniform_buffer.destroy();
    }
}
