//! Scatter-density series renderer
//!
//! A compute pass bins visible points into a pixel-space grid with atomic
//! counters, a parallel reduction finds the maximum bin, and a fullscreen
//! fragment pass maps normalized counts through a colormap LUT with a
//! linear, sqrt, or log curve.

use super::{domain_to_clip, viewport_vec, PrepareInput, SeriesRenderer};
use crate::{buffer::GrowableBuffer, colormap::Colormap};
use chartgpu_shared::{
    ChartResult, ColormapSpec, DensityCurve, ScatterDensityOptions, SeriesKind, SeriesTypeOptions,
};

const BIN_WORKGROUP: u32 = 64;
const REDUCE_WORKGROUP: u32 = 256;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DensityParams {
    transform: [[f32; 4]; 4],
    viewport: [f32; 4],
    grid_rect: [f32; 4],
    /// x: cell size px, y: cols, z: rows, w: point count
    cells: [f32; 4],
    /// x: curve id, y: opacity
    shading: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BlitParams {
    viewport: [f32; 4],
    grid_rect: [f32; 4],
    cells: [f32; 4],
    shading: [f32; 4],
}

pub struct ScatterDensityRenderer {
    bin_pipeline: wgpu::ComputePipeline,
    reduce_pipeline: wgpu::ComputePipeline,
    blit_pipeline: wgpu::RenderPipeline,
    compute_layout: wgpu::BindGroupLayout,
    blit_layout: wgpu::BindGroupLayout,
    compute_params: wgpu::Buffer,
    blit_params: wgpu::Buffer,
    bins: GrowableBuffer,
    max_bin: wgpu::Buffer,
    lut_texture: wgpu::Texture,
    lut_view: wgpu::TextureView,
    lut_sampler: wgpu::Sampler,
    lut_spec: Option<ColormapSpec>,
    compute_bind_group: Option<wgpu::BindGroup>,
    blit_bind_group: Option<wgpu::BindGroup>,
    point_count: u32,
    bin_count: u32,
}

impl ScatterDensityRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Density Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/density.wgsl").into()),
        });
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Density Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/density_blit.wgsl").into()),
        });

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Density Compute Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_entry(1, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(2, wgpu::ShaderStages::COMPUTE, false),
                storage_entry(3, wgpu::ShaderStages::COMPUTE, false),
            ],
        });
        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Density Blit Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                storage_entry(1, wgpu::ShaderStages::FRAGMENT, true),
                storage_entry(2, wgpu::ShaderStages::FRAGMENT, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let compute_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Density Compute Pipeline Layout"),
                bind_group_layouts: &[&compute_layout],
                push_constant_ranges: &[],
            });
        let bin_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Density Bin Pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &shader,
            entry_point: Some("cs_bin"),
            compilation_options: Default::default(),
            cache: None,
        });
        let reduce_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Density Reduce Pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &shader,
            entry_point: Some("cs_reduce"),
            compilation_options: Default::default(),
            cache: None,
        });

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Density Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });
        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Density Blit Pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_blit"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_blit"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let compute_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Density Compute Params"),
            size: std::mem::size_of::<DensityParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let blit_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Density Blit Params"),
            size: std::mem::size_of::<BlitParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let max_bin = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Density Max Bin"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let lut_texture = create_lut_texture(device);
        let lut_view = lut_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let lut_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Density LUT Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            bin_pipeline,
            reduce_pipeline,
            blit_pipeline,
            compute_layout,
            blit_layout,
            compute_params,
            blit_params,
            bins: GrowableBuffer::new(wgpu::BufferUsages::STORAGE, "Density Bins"),
            max_bin,
            lut_texture,
            lut_view,
            lut_sampler,
            lut_spec: None,
            compute_bind_group: None,
            blit_bind_group: None,
            point_count: 0,
            bin_count: 0,
        }
    }

    fn upload_lut(&mut self, queue: &wgpu::Queue, spec: &ColormapSpec) {
        if self.lut_spec.as_ref() == Some(spec) {
            return;
        }
        let colormap = Colormap::resolve(spec);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.lut_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &colormap.lut_rgba8(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(crate::colormap::LUT_SIZE as u32 * 4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: crate::colormap::LUT_SIZE as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.lut_spec = Some(spec.clone());
    }
}

impl SeriesRenderer for ScatterDensityRenderer {
    fn kind(&self) -> SeriesKind {
        SeriesKind::ScatterDensity
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let opts = match &input.series.kind {
            SeriesTypeOptions::ScatterDensity(opts) => opts.clone(),
            _ => ScatterDensityOptions::default(),
        };
        self.upload_lut(input.queue, &opts.colormap);

        let cell = (opts.cell_size as f64 * input.grid.dpr).max(1.0);
        let cols = (input.grid.plot_width_px() / cell).ceil().max(1.0) as u32;
        let rows = (input.grid.plot_height_px() / cell).ceil().max(1.0) as u32;
        self.bin_count = cols * rows;
        self.point_count = input.vertex_count;

        let curve = match opts.curve {
            DensityCurve::Linear => 0.0,
            DensityCurve::Sqrt => 1.0,
            DensityCurve::Log => 2.0,
        };
        let grid_rect = [
            input.grid.plot_left_px() as f32,
            input.grid.plot_top_px() as f32,
            input.grid.plot_right_px() as f32,
            input.grid.plot_bottom_px() as f32,
        ];
        let cells = [cell as f32, cols as f32, rows as f32, self.point_count as f32];
        let shading = [curve, input.color[3], 0.0, 0.0];

        let compute = DensityParams {
            transform: domain_to_clip(input.x_scale, input.y_scale, input.grid),
            viewport: viewport_vec(input.grid),
            grid_rect,
            cells,
            shading,
        };
        input
            .queue
            .write_buffer(&self.compute_params, 0, bytemuck::cast_slice(&[compute]));
        let blit = BlitParams {
            viewport: viewport_vec(input.grid),
            grid_rect,
            cells,
            shading,
        };
        input
            .queue
            .write_buffer(&self.blit_params, 0, bytemuck::cast_slice(&[blit]));

        self.bins
            .ensure_capacity(input.device, self.bin_count as u64 * 4);

        // Bind groups reference the store's vertex buffer, which can be
        // replaced on growth, so they are rebuilt each prepare.
        let Some(points) = input.vertex_buffer else {
            self.compute_bind_group = None;
            self.blit_bind_group = None;
            return Ok(());
        };
        let Some(bins) = self.bins.buffer() else {
            return Ok(());
        };

        self.compute_bind_group = Some(input.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Density Compute Bind Group"),
            layout: &self.compute_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.compute_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: points.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: bins.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.max_bin.as_entire_binding(),
                },
            ],
        }));
        self.blit_bind_group = Some(input.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Density Blit Bind Group"),
            layout: &self.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.blit_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: bins.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.max_bin.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&self.lut_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.lut_sampler),
                },
            ],
        }));
        Ok(())
    }

    fn has_compute(&self) -> bool {
        true
    }

    fn compute(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let Some(bind_group) = &self.compute_bind_group else {
            return;
        };
        let Some(bins) = self.bins.buffer() else {
            return;
        };
        if self.point_count == 0 || self.bin_count == 0 {
            return;
        }

        encoder.clear_buffer(bins, 0, None);
        encoder.clear_buffer(&self.max_bin, 0, None);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Density Compute Pass"),
            timestamp_writes: None,
        });
        pass.set_bind_group(0, bind_group, &[]);

        pass.set_pipeline(&self.bin_pipeline);
        pass.dispatch_workgroups(self.point_count.div_ceil(BIN_WORKGROUP), 1, 1);

        pass.set_pipeline(&self.reduce_pipeline);
        pass.dispatch_workgroups(self.bin_count.div_ceil(REDUCE_WORKGROUP), 1, 1);
    }

    fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(bind_group) = &self.blit_bind_group else {
            return;
        };
        if self.point_count == 0 {
            return;
        }
        pass.set_pipeline(&self.blit_pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn dispose(&mut self) {
        self.compute_bind_group = None;
        self.blit_bind_group = None;
        self.bins.destroy();
        self.max_bin.destroy();
        self.lut_texture.destroy();
        self.compute_params.destroy();
        self.blit_params.destroy();
    }
}

fn create_lut_texture(device: &wgpu::Device) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Density LUT"),
        size: wgpu::Extent3d {
            width: crate::colormap::LUT_SIZE as u32,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
