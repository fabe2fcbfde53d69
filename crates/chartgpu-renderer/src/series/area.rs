//! Area series renderer
//!
//! A fill pass drops each segment to the baseline row, then the line
//! pipeline strokes the crest on top.

use super::line::{segment_vertex_layouts, POINT_STRIDE};
use super::{create_pipeline, create_uniforms, PrepareInput, SeriesRenderer, SeriesUniforms};
use chartgpu_shared::{AreaStyle, ChartResult, SeriesKind, SeriesTypeOptions};

pub struct AreaRenderer {
    fill_pipeline: wgpu::RenderPipeline,
    fill_uniforms: wgpu::Buffer,
    fill_bind_group: wgpu::BindGroup,
    line_pipeline: wgpu::RenderPipeline,
    line_uniforms: wgpu::Buffer,
    line_bind_group: wgpu::BindGroup,
    vertex_buffer: Option<wgpu::Buffer>,
    segment_count: u32,
}

impl AreaRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let fill_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Area Fill Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/area.wgsl").into()),
        });
        let line_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Area Crest Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/line.wgsl").into()),
        });

        let uniform_size = std::mem::size_of::<SeriesUniforms>() as u64;
        let (fill_uniforms, fill_layout, fill_bind_group) =
            create_uniforms(device, "Area Fill Uniforms", uniform_size);
        let (line_uniforms, line_layout, line_bind_group) =
            create_uniforms(device, "Area Crest Uniforms", uniform_size);

        let fill_pipeline = create_pipeline(
            device,
            "Area Fill Pipeline",
            &fill_shader,
            "vs_main",
            "fs_main",
            &segment_vertex_layouts(),
            &[&fill_layout],
            format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );
        let line_pipeline = create_pipeline(
            device,
            "Area Crest Pipeline",
            &line_shader,
            "vs_main",
            "fs_main",
            &segment_vertex_layouts(),
            &[&line_layout],
            format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );

        Self {
            fill_pipeline,
            fill_uniforms,
            fill_bind_group,
            line_pipeline,
            line_uniforms,
            line_bind_group,
            vertex_buffer: None,
            segment_count: 0,
        }
    }
}

impl SeriesRenderer for AreaRenderer {
    fn kind(&self) -> SeriesKind {
        SeriesKind::Area
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let (width, style) = match &input.series.kind {
            SeriesTypeOptions::Line(opts) => (
                opts.width,
                opts.area_style.clone().unwrap_or_default(),
            ),
            _ => (2.0, AreaStyle::default()),
        };

        let fill = SeriesUniforms::new(
            input,
            [style.baseline as f32, style.opacity, 0.0, 0.0],
        );
        input
            .queue
            .write_buffer(&self.fill_uniforms, 0, bytemuck::cast_slice(&[fill]));

        let crest = SeriesUniforms::new(input, [width * 0.5, 1.0, 0.0, 0.0]);
        input
            .queue
            .write_buffer(&self.line_uniforms, 0, bytemuck::cast_slice(&[crest]));

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
        pass.set_vertex_buffer(0, buffer.slice(..));
        pass.set_vertex_buffer(1, buffer.slice(POINT_STRIDE..));

        pass.set_pipeline(&self.fill_pipeline);
        pass.set_bind_group(0, &self.fill_bind_group, &[]);
        pass.draw(0..4, 0..self.segment_count);

        pass.set_pipeline(&self.line_pipeline);
        pass.set_bind_group(0, &self.line_bind_group, &[]);
        pass.draw(0..4, 0..self.segment_count);
    }

    fn dispose(&mut self) {
        self.vertex_buffer = None;
        self.fill_uniforms.destroy();
        self.line_uniforms.destroy();
    }
}
