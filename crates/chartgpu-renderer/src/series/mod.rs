//! Per-series renderers
//!
//! One renderer per series type. Each owns its pipelines, bind groups, and
//! instance staging buffers; none mutates shared GPU state other than its
//! own bind groups. `prepare` computes per-instance data from
//! `{series, x_scale, y_scale, grid_area}` and writes staging buffers;
//! `render` records draws into the frame's render pass. Density rendering
//! additionally records compute passes through `compute`.

mod area;
mod bar;
mod candlestick;
mod density;
mod heatmap;
mod line;
mod pie;
mod scatter;

pub use area::AreaRenderer;
pub use bar::BarRenderer;
pub use candlestick::CandlestickRenderer;
pub use density::ScatterDensityRenderer;
pub use heatmap::HeatmapRenderer;
pub use line::LineRenderer;
pub use pie::{slice_angles, PieRenderer};
pub use scatter::ScatterRenderer;

use crate::{layout::GridArea, scale::Scale};
use chartgpu_shared::{
    ChartResult, Color, PointGeometry, SeriesKind, SeriesOptions, Theme,
};
use nalgebra_glm as glm;

/// Everything a renderer needs to build its per-instance data for a frame.
pub struct PrepareInput<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    /// Target color format of the render pass.
    pub format: wgpu::TextureFormat,
    pub series_index: usize,
    pub series: &'a SeriesOptions,
    /// Resolved series color (explicit or palette).
    pub color: Color,
    pub theme: &'a Theme,
    /// Lane-packed logical points in the canonical f32 layout.
    pub points: &'a [f32],
    pub geometry: PointGeometry,
    /// The series' domain-valued GPU vertex buffer, when uploaded.
    pub vertex_buffer: Option<&'a wgpu::Buffer>,
    /// Points currently resident in `vertex_buffer`.
    pub vertex_count: u32,
    pub x_scale: &'a Scale,
    pub y_scale: &'a Scale,
    pub grid: &'a GridArea,
    /// Per-point stack baselines for stacked bars: the accumulated value of
    /// earlier series sharing this series' stack id, by data index.
    pub stack_base: Option<&'a [f64]>,
}

impl PrepareInput<'_> {
    pub fn point_count(&self) -> usize {
        self.points.len() / self.geometry.lanes()
    }
}

/// A renderer for one series. Created when its `(kind, index)` appears in
/// the options and disposed when it leaves.
pub trait SeriesRenderer {
    fn kind(&self) -> SeriesKind;

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()>;

    /// Whether `compute` must run before the render pass.
    fn has_compute(&self) -> bool {
        false
    }

    fn compute(&mut self, _encoder: &mut wgpu::CommandEncoder) {}

    fn render(&self, pass: &mut wgpu::RenderPass<'_>);

    fn dispose(&mut self);
}

/// Uniform block shared by most series pipelines.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct SeriesUniforms {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// `[width_px, height_px, dpr, 0]`
    pub viewport: [f32; 4],
    /// Renderer-specific scalars.
    pub params: [f32; 4],
}

impl SeriesUniforms {
    pub fn new(input: &PrepareInput<'_>, params: [f32; 4]) -> Self {
        Self {
            transform: domain_to_clip(input.x_scale, input.y_scale, input.grid),
            color: input.color,
            viewport: viewport_vec(input.grid),
            params,
        }
    }
}

pub(crate) fn viewport_vec(grid: &GridArea) -> [f32; 4] {
    [
        grid.canvas_width as f32,
        grid.canvas_height as f32,
        grid.dpr as f32,
        0.0,
    ]
}

/// Clip-space transform for domain-valued vertices. The scales already map
/// domain → device pixels inside the grid; extending the domain to the
/// canvas edges lets one orthographic matrix express both the scale and the
/// grid placement.
pub(crate) fn domain_to_clip(x_scale: &Scale, y_scale: &Scale, grid: &GridArea) -> [[f32; 4]; 4] {
    let x = as_linear(x_scale);
    let y = as_linear(y_scale);
    let width = grid.canvas_width as f64;
    let height = grid.canvas_height as f64;
    let matrix = glm::ortho_rh_zo(
        x.invert(0.0) as f32,
        x.invert(width) as f32,
        y.invert(height) as f32,
        y.invert(0.0) as f32,
        -1.0,
        1.0,
    );
    matrix.into()
}

/// View a scale as linear for transform purposes: category bands become the
/// index domain `[-0.5, n - 0.5]` over the same pixel range.
pub(crate) fn as_linear(scale: &Scale) -> crate::scale::LinearScale {
    match scale {
        Scale::Linear(s) => *s,
        Scale::Category(s) => crate::scale::LinearScale::new(
            -0.5,
            s.len() as f64 - 0.5,
            s.range_min,
            s.range_max,
        ),
    }
}

/// Uniform buffer + bind group pair used by every series pipeline.
pub(crate) fn create_uniforms(
    device: &wgpu::Device,
    label: &str,
    size: u64,
) -> (wgpu::Buffer, wgpu::BindGroupLayout, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    });
    (buffer, layout, bind_group)
}

/// Alpha-blended render pipeline over the given vertex layouts.
pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    vs_entry: &str,
    fs_entry: &str,
    buffers: &[wgpu::VertexBufferLayout],
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(vs_entry),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fs_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

/// Build the renderer for a series kind. Histogram degenerates to the bar
/// pipeline; binning happens outside the core.
pub fn create_renderer(
    kind: SeriesKind,
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> Box<dyn SeriesRenderer + Send> {
    match kind {
        SeriesKind::Line => Box::new(LineRenderer::new(device, format)),
        SeriesKind::Area => Box::new(AreaRenderer::new(device, format)),
        SeriesKind::Bar | SeriesKind::Histogram => Box::new(BarRenderer::new(device, format, kind)),
        SeriesKind::Scatter => Box::new(ScatterRenderer::new(device, format)),
        SeriesKind::ScatterDensity => Box::new(ScatterDensityRenderer::new(device, format)),
        SeriesKind::Heatmap => Box::new(HeatmapRenderer::new(device, format)),
        SeriesKind::Pie => Box::new(PieRenderer::new(device, format)),
        SeriesKind::Candlestick => Box::new(CandlestickRenderer::new(device, format)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{CategoryScale, LinearScale};
    use chartgpu_shared::GridOptions;

    #[test]
    fn category_scales_view_as_index_domains() {
        let scale = Scale::Category(
            CategoryScale::new(vec!["a".into(), "b".into()], 0.0, 200.0).unwrap(),
        );
        let linear = as_linear(&scale);
        assert_eq!(linear.domain_min, -0.5);
        assert_eq!(linear.domain_max, 1.5);
        // Band centers land where the category scale puts them.
        assert!((linear.scale(0.0) - 50.0).abs() < 1e-9);
        assert!((linear.scale(1.0) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn transform_maps_domain_to_clip_inside_grid() {
        let grid = GridArea::compute(&GridOptions::default(), None, 800, 600, 1.0);
        let (px_left, px_right) = grid.x_range_px();
        let (px_bottom, px_top) = grid.y_range_px();
        let x = Scale::Linear(LinearScale::new(0.0, 10.0, px_left, px_right));
        let y = Scale::Linear(LinearScale::new(0.0, 4.0, px_bottom, px_top));
        let m = domain_to_clip(&x, &y, &grid);

        // Domain origin maps to the grid's bottom-left corner.
        let clip_x = m[0][0] * 0.0 + m[3][0];
        let clip_y = m[1][1] * 0.0 + m[3][1];
        let px_x = (clip_x as f64 + 1.0) * 0.5 * 800.0;
        let px_y = (1.0 - clip_y as f64) * 0.5 * 600.0;
        assert!((px_x - px_left).abs() < 1e-3);
        assert!((px_y - px_bottom).abs() < 1e-3);
    }
}
