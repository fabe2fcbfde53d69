//! Candlestick series renderer
//!
//! One body quad plus one wick quad per candle, drawn as 12 vertices per
//! instance straight from the store's `[t, o, h, l, c]` vertex buffer.
//! Body color follows sign(close − open); the hollow style draws up-candle
//! bodies as outlines.

use super::{create_pipeline, create_uniforms, domain_to_clip, viewport_vec, PrepareInput,
    SeriesRenderer};
use chartgpu_shared::{
    CandleStyle, CandlestickSeriesOptions, ChartResult, PointGeometry, SeriesKind,
    SeriesTypeOptions,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CandleUniforms {
    transform: [[f32; 4]; 4],
    up_color: [f32; 4],
    down_color: [f32; 4],
    viewport: [f32; 4],
    /// x: body half width px, y: wick half width px, z: style, w: border px
    params: [f32; 4],
}

pub struct CandlestickRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: Option<wgpu::Buffer>,
    instance_count: u32,
}

impl CandlestickRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Candlestick Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/candlestick.wgsl").into()),
        });
        let (uniform_buffer, layout, bind_group) = create_uniforms(
            device,
            "Candlestick Uniforms",
            std::mem::size_of::<CandleUniforms>() as u64,
        );
        const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            0 => Float32, 1 => Float32, 2 => Float32, 3 => Float32, 4 => Float32
        ];
        let pipeline = create_pipeline(
            device,
            "Candlestick Pipeline",
            &shader,
            "vs_main",
            "fs_main",
            &[wgpu::VertexBufferLayout {
                array_stride: PointGeometry::Ohlc.stride() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &ATTRS,
            }],
            &[&layout],
            format,
            wgpu::PrimitiveTopology::TriangleList,
        );
        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            vertex_buffer: None,
            instance_count: 0,
        }
    }

    /// Device pixels between consecutive candles.
    fn slot_px(&self, input: &PrepareInput<'_>) -> f64 {
        let lanes = input.geometry.lanes();
        let mut min_gap = f64::INFINITY;
        let mut prev = None;
        for candle in input.points.chunks_exact(lanes) {
            let px = input.x_scale.to_px(candle[0] as f64);
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
            10.0 * input.grid.dpr
        }
    }
}

impl SeriesRenderer for CandlestickRenderer {
    fn kind(&self) -> SeriesKind {
        SeriesKind::Candlestick
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let opts = match &input.series.kind {
            SeriesTypeOptions::Candlestick(opts) => opts.clone(),
            _ => CandlestickSeriesOptions::default(),
        };
        debug_assert_eq!(input.geometry, PointGeometry::Ohlc);

        let slot = self.slot_px(input);
        let body_half = (slot * opts.body_ratio.clamp(0.05, 1.0) as f64 * 0.5).max(0.5);
        let wick_half = (input.grid.dpr * 0.5).max(0.5);
        let style = match opts.style {
            CandleStyle::Classic => 0.0,
            CandleStyle::Hollow => 1.0,
        };

        let uniforms = CandleUniforms {
            transform: domain_to_clip(input.x_scale, input.y_scale, input.grid),
            up_color: opts.up_color,
            down_color: opts.down_color,
            viewport: viewport_vec(input.grid),
            params: [
                body_half as f32,
                wick_half as f32,
                style,
                (1.5 * input.grid.dpr) as f32,
            ],
        };
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
        pass.draw(0..12, 0..self.instance_count);
    }

    fn dispose(&mut self) {
        self.vertex_buffer = None;
        self.uniform_buffer.destroy();
    }
}
