//! Graphics context
//!
//! Acquires the adapter/device/queue, binds them to a window surface or an
//! offscreen color target, and owns the device lifecycle: the device-lost
//! signal is forwarded upward with a classified reason, uncaptured errors
//! are classified into validation / out-of-memory / other, and `destroy`
//! calls `device.destroy()` exactly once.

use crate::timing::Timer;
use chartgpu_shared::{
    protocol::SurfaceSource, Capabilities, ChartError, ChartResult, DeviceLostKind, GpuErrorClass,
};
use std::sync::Arc;

/// Context creation knobs.
#[derive(Debug, Clone, Copy)]
pub struct GpuContextOptions {
    /// Prefer the high-performance adapter.
    pub high_performance: bool,
    /// Opt into `TIMESTAMP_QUERY` when the adapter has it.
    pub enable_timestamp_query: bool,
}

impl Default for GpuContextOptions {
    fn default() -> Self {
        Self {
            high_performance: true,
            enable_timestamp_query: true,
        }
    }
}

enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
    },
}

/// The per-frame color target acquired from the context.
pub struct FrameTarget {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl FrameTarget {
    /// Present the frame; a no-op for offscreen targets.
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: Arc<wgpu::Adapter>,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub features: wgpu::Features,
    format: wgpu::TextureFormat,
    target: RenderTarget,
    width: u32,
    height: u32,
    dpr: f64,
    destroyed: bool,
}

impl GpuContext {
    /// Acquire adapter/device and bind the drawing target.
    ///
    /// `width`/`height` are device pixels. Fails with `GraphicsInitFailed`
    /// when no adapter or device can be obtained.
    pub async fn new(
        source: SurfaceSource,
        width: u32,
        height: u32,
        dpr: f64,
        options: GpuContextOptions,
        on_device_lost: impl FnOnce(DeviceLostKind, String) + Send + 'static,
        on_uncaptured_error: impl Fn(GpuErrorClass, String) + Send + Sync + 'static,
    ) -> ChartResult<Self> {
        let start = Timer::now();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // The surface must exist before adapter selection so the adapter is
        // compatible with it.
        let surface = match source {
            SurfaceSource::Window(target) => Some(instance.create_surface(target).map_err(|e| {
                ChartError::GraphicsInitFailed {
                    message: format!("failed to create surface: {e:?}"),
                }
            })?),
            SurfaceSource::Offscreen { .. } => None,
        };

        let power_preference = if options.high_performance {
            wgpu::PowerPreference::HighPerformance
        } else {
            wgpu::PowerPreference::default()
        };
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| ChartError::GraphicsInitFailed {
                message: format!("no suitable GPU adapter: {e:?}"),
            })?;

        let mut features = wgpu::Features::empty();
        if options.enable_timestamp_query
            && adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY)
        {
            features |= wgpu::Features::TIMESTAMP_QUERY;
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ChartGPU Device"),
                required_features: features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| ChartError::GraphicsInitFailed {
                message: format!("failed to create GPU device: {e:?}"),
            })?;

        let on_device_lost = std::sync::Mutex::new(Some(on_device_lost));
        device.set_device_lost_callback(move |reason, message| {
            let kind = match reason {
                wgpu::DeviceLostReason::Destroyed => DeviceLostKind::Destroyed,
                _ => DeviceLostKind::Unknown,
            };
            if let Some(on_device_lost) = on_device_lost.lock().unwrap().take() {
                on_device_lost(kind, message);
            }
        });

        device.on_uncaptured_error(Box::new(move |error| {
            let (class, message) = match &error {
                wgpu::Error::Validation { description, .. } => {
                    (GpuErrorClass::Validation, description.clone())
                }
                wgpu::Error::OutOfMemory { .. } => {
                    (GpuErrorClass::OutOfMemory, "out of memory".to_string())
                }
                other => (GpuErrorClass::Other, format!("{other}")),
            };
            on_uncaptured_error(class, message);
        }));

        let device = Arc::new(device);
        let queue = Arc::new(queue);
        let adapter = Arc::new(adapter);

        let (format, target) = match surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = caps
                    .formats
                    .iter()
                    .copied()
                    .find(|f| f.is_srgb())
                    .unwrap_or(caps.formats[0]);
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: width.max(1),
                    height: height.max(1),
                    present_mode: wgpu::PresentMode::Fifo,
                    desired_maximum_frame_latency: 2,
                    alpha_mode: caps.alpha_modes[0],
                    view_formats: vec![],
                };
                surface.configure(&device, &config);
                (format, RenderTarget::Surface { surface, config })
            }
            None => {
                let format = wgpu::TextureFormat::Bgra8UnormSrgb;
                let texture = create_offscreen_texture(&device, format, width, height);
                (format, RenderTarget::Offscreen { texture })
            }
        };

        log::info!(
            "graphics context ready in {:.1}ms ({}, {:?})",
            start.elapsed_millis(),
            adapter.get_info().name,
            adapter.get_info().backend,
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            features,
            format,
            target,
            width: width.max(1),
            height: height.max(1),
            dpr: if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 },
            destroyed: false,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Target size in device pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn dpr(&self) -> f64 {
        self.dpr
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn supports_gpu_timing(&self) -> bool {
        self.features.contains(wgpu::Features::TIMESTAMP_QUERY)
    }

    pub fn capabilities(&self) -> Capabilities {
        let info = self.adapter.get_info();
        Capabilities {
            adapter_name: info.name,
            backend: format!("{:?}", info.backend),
            timestamp_query: self.supports_gpu_timing(),
            preferred_format: format!("{:?}", self.format),
        }
    }

    /// Resize the drawing target. CSS dimensions; device pixels derived
    /// through the new DPR.
    pub fn resize(&mut self, css_width: f64, css_height: f64, dpr: f64) {
        if dpr.is_finite() && dpr > 0.0 {
            self.dpr = dpr;
        }
        let width = ((css_width * self.dpr).round() as u32).max(1);
        let height = ((css_height * self.dpr).round() as u32).max(1);
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        match &mut self.target {
            RenderTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture } => {
                texture.destroy();
                *texture = create_offscreen_texture(&self.device, self.format, width, height);
            }
        }
    }

    /// Acquire the frame's color target. Lost or outdated surfaces are
    /// reconfigured and retried once before failing with `Render`.
    pub fn current_frame(&mut self) -> ChartResult<FrameTarget> {
        if self.destroyed {
            return Err(ChartError::Disposed);
        }
        match &mut self.target {
            RenderTarget::Offscreen { texture } => Ok(FrameTarget {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: None,
            }),
            RenderTarget::Surface { surface, config } => {
                let texture = match surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                        surface.configure(&self.device, config);
                        surface.get_current_texture().map_err(|e| {
                            ChartError::render(format!("surface acquire failed: {e}"))
                        })?
                    }
                    Err(e) => {
                        return Err(ChartError::render(format!("surface acquire failed: {e}")))
                    }
                };
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(FrameTarget {
                    view,
                    surface_texture: Some(texture),
                })
            }
        }
    }

    /// Destroy the device. Idempotent; later calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let RenderTarget::Offscreen { texture } = &self.target {
            texture.destroy();
        }
        self.device.destroy();
    }
}

fn create_offscreen_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("ChartGPU Offscreen Target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}
