//! Pie series renderer
//!
//! One quad per slice centered on the pie, evaluated in the fragment stage
//! as a signed circle SDF plus an angular wedge with wrap-around support.
//! Points arrive as `[slice_index, value]`; slice order is config order.

use super::{create_pipeline, create_uniforms, PrepareInput, SeriesRenderer, SeriesUniforms};
use crate::buffer::GrowableBuffer;
use chartgpu_shared::{ChartResult, PieSeriesOptions, SeriesKind, SeriesTypeOptions};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SliceInstance {
    center: [f32; 2],
    /// Start / end angle in radians, clockwise from 12 o'clock.
    angles: [f32; 2],
    /// x: radius px.
    extra: [f32; 2],
    color: [f32; 4],
}

pub struct PieRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instances: GrowableBuffer,
    instance_count: u32,
}

/// Slice geometry shared with pie hit testing: `(start, end)` angles in
/// radians for each positive-valued slice, config order, starting at
/// `start_angle_deg` and proceeding clockwise.
pub fn slice_angles(values: &[f64], start_angle_deg: f32) -> Vec<(f64, f64)> {
    let total: f64 = values.iter().filter(|v| **v > 0.0).sum();
    let mut angles = Vec::with_capacity(values.len());
    let mut cursor = (start_angle_deg as f64).to_radians().rem_euclid(std::f64::consts::TAU);
    if total <= 0.0 {
        return values.iter().map(|_| (cursor, cursor)).collect();
    }
    for value in values {
        let sweep = if *value > 0.0 {
            value / total * std::f64::consts::TAU
        } else {
            0.0
        };
        angles.push((cursor, cursor + sweep));
        cursor += sweep;
    }
    angles
}

impl PieRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Pie Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/pie.wgsl").into()),
        });
        let (uniform_buffer, layout, bind_group) = create_uniforms(
            device,
            "Pie Uniforms",
            std::mem::size_of::<SeriesUniforms>() as u64,
        );
        const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            0 => Float32x2, 1 => Float32x2, 2 => Float32x2, 3 => Float32x4
        ];
        let pipeline = create_pipeline(
            device,
            "Pie Pipeline",
            &shader,
            "vs_main",
            "fs_main",
            &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SliceInstance>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &ATTRS,
            }],
            &[&layout],
            format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );
        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            instances: GrowableBuffer::new(wgpu::BufferUsages::VERTEX, "Pie Instances"),
            instance_count: 0,
        }
    }
}

impl SeriesRenderer for PieRenderer {
    fn kind(&self) -> SeriesKind {
        SeriesKind::Pie
    }

    fn prepare(&mut self, input: &PrepareInput<'_>) -> ChartResult<()> {
        let opts = match &input.series.kind {
            SeriesTypeOptions::Pie(opts) => opts.clone(),
            _ => PieSeriesOptions::default(),
        };

        let uniforms = SeriesUniforms::new(input, [1.0, 0.0, 0.0, 0.0]);
        input
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let lanes = input.geometry.lanes();
        let values: Vec<f64> = input
            .points
            .chunks_exact(lanes)
            .map(|p| p[1] as f64)
            .collect();
        let angles = slice_angles(&values, opts.start_angle_deg);

        let center_x =
            input.grid.plot_left_px() + input.grid.plot_width_px() * opts.center.0 as f64;
        let center_y =
            input.grid.plot_top_px() + input.grid.plot_height_px() * opts.center.1 as f64;
        let radius = opts.radius * input.grid.dpr as f32;

        let palette_len = values.len().max(1);
        let mut instances = Vec::with_capacity(values.len());
        for (i, (start, end)) in angles.iter().enumerate() {
            if end <= start {
                continue;
            }
            // Slices rotate through the base color by shading toward white.
            let shade = 1.0 - (i % palette_len) as f32 / palette_len as f32 * 0.6;
            let color = [
                input.color[0] * shade + (1.0 - shade) * 0.9,
                input.color[1] * shade + (1.0 - shade) * 0.9,
                input.color[2] * shade + (1.0 - shade) * 0.9,
                input.color[3],
            ];
            instances.push(SliceInstance {
                center: [center_x as f32, center_y as f32],
                angles: [*start as f32, *end as f32],
                extra: [radius, 0.0],
                color,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_angles_partition_the_circle() {
        let angles = slice_angles(&[1.0, 1.0, 2.0], 0.0);
        assert_eq!(angles.len(), 3);
        assert!((angles[0].0 - 0.0).abs() < 1e-9);
        // Adjacent slices share edges.
        assert!((angles[0].1 - angles[1].0).abs() < 1e-9);
        assert!((angles[1].1 - angles[2].0).abs() < 1e-9);
        // Sweeps are proportional to values.
        let tau = std::f64::consts::TAU;
        assert!((angles[2].1 - angles[2].0 - tau / 2.0).abs() < 1e-9);
        assert!((angles[2].1 - tau).abs() < 1e-9);
    }

    #[test]
    fn non_positive_values_collapse_to_empty_slices() {
        let angles = slice_angles(&[2.0, 0.0, -5.0, 2.0], 0.0);
        assert_eq!(angles[1].0, angles[1].1);
        assert_eq!(angles[2].0, angles[2].1);
        assert!(angles[3].1 > angles[3].0);
    }

    #[test]
    fn start_angle_rotates_the_first_slice() {
        let angles = slice_angles(&[1.0], 90.0);
        assert!((angles[0].0 - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }
}
