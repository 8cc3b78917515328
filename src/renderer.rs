// SPDX-License-Identifier: MPL-2.0

//! GPU setup and presentation.
//!
//! [`Renderer`] owns the window surface and a [`Pipeline`]; it acquires a surface frame, has the
//! pipeline render into it, and presents it. The pipeline itself only needs a [`Gpu`], so it can
//! also render offscreen.

mod noise;
pub mod passes;
mod pipeline;
pub mod programs;
mod targets;
pub mod uniforms;

use std::path::PathBuf;

use raw_window_handle::HasRawWindowHandle;
use wgpu::*;

pub use noise::{NoiseTexture, NOISE_SIZE};
pub use pipeline::Pipeline;
pub use targets::{RenderTargets, DEPTH_FORMAT, GBUFFER_FORMAT, PING_PONG_FORMAT};

use crate::config::PipelineConfig;

/// Surface formats the renderer presents to, by preference.
const PREFERRED_SURFACE_FORMATS: [TextureFormat; 2] =
    [TextureFormat::Bgra8UnormSrgb, TextureFormat::Rgba8UnormSrgb];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no compatible graphics adapter found")]
    NoCompatibleAdapterFound,
    #[error("no compatible graphics device found")]
    NoCompatibleDeviceFound,
    #[error("the surface supports no texture formats")]
    UnsupportedSurfaceFormat,
    #[error("failed to read shader {}: {source}", path.display())]
    ShaderIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("program '{program}' failed to build: {message}")]
    Program {
        program: &'static str,
        message: String,
    },
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// A logical device and its command queue.
#[derive(Debug)]
pub struct Gpu {
    pub device: Device,
    pub queue: Queue,
}

impl Gpu {
    /// Requests an adapter from `instance`, and a device from that adapter.
    pub async fn request(
        instance: &Instance,
        compatible_surface: Option<&Surface>,
    ) -> Result<(Adapter, Self), Error> {
        Self::request_with(
            instance,
            &RequestAdapterOptions {
                compatible_surface,
                ..Default::default()
            },
        )
        .await
    }

    /// Like [`request`](Self::request), with full control over adapter selection.
    pub async fn request_with(
        instance: &Instance,
        options: &RequestAdapterOptions<'_>,
    ) -> Result<(Adapter, Self), Error> {
        let adapter = instance
            .request_adapter(options)
            .await
            .ok_or(Error::NoCompatibleAdapterFound)?;
        tracing::info!("Using adapter {:?}", adapter.get_info());

        let (device, queue) = Self::create_device_and_queue(&adapter).await?;

        Ok((adapter, Self { device, queue }))
    }

    /// Creates handles to the logical graphics device as well as the command buffer queue.
    async fn create_device_and_queue(adapter: &Adapter) -> Result<(Device, Queue), Error> {
        adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("Umbra device"),
                    limits: adapter.limits(),
                    features: Features::empty(),
                },
                None,
            )
            .await
            .map_err(|_| Error::NoCompatibleDeviceFound)
    }
}

/// The on-screen renderer.
#[derive(Debug)]
pub struct Renderer {
    surface: Surface,
    surface_config: SurfaceConfiguration,
    pipeline: Pipeline,
}

impl Renderer {
    /// Creates a new `Renderer`.
    ///
    /// # Safety
    ///
    /// `window` must live for as long as the returned renderer.
    pub async unsafe fn new(
        window: &impl HasRawWindowHandle,
        backends: Backends,
        config: PipelineConfig,
        surface_width: u32,
        surface_height: u32,
    ) -> Result<Self, Error> {
        let instance = Instance::new(backends);
        // SAFETY: the caller guarantees that `window` is valid and outlives the renderer, which
        // owns the surface.
        let surface = instance.create_surface(window);

        let (adapter, gpu) = Gpu::request(&instance, Some(&surface)).await?;
        let format = Self::choose_surface_format(&surface.get_supported_formats(&adapter))?;
        tracing::info!("Presenting to a {:?} surface", format);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: surface_width.max(1),
            height: surface_height.max(1),
            present_mode: PresentMode::Fifo,
        };
        surface.configure(&gpu.device, &surface_config);

        let pipeline = Pipeline::new(gpu, config, format, surface_width, surface_height)?;

        Ok(Self {
            surface,
            surface_config,
            pipeline,
        })
    }

    fn choose_surface_format(formats: &[TextureFormat]) -> Result<TextureFormat, Error> {
        PREFERRED_SURFACE_FORMATS
            .into_iter()
            .find(|format| formats.contains(format))
            .or_else(|| formats.first().copied())
            .ok_or(Error::UnsupportedSurfaceFormat)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// Reconfigures the surface and the pipeline for a new window size.
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.configure_surface();
        self.pipeline.resize(width, height);
    }

    fn configure_surface(&self) {
        self.surface.configure(&self.pipeline.gpu().device, &self.surface_config);
    }

    /// Renders and presents one frame.
    ///
    /// A lost or outdated surface is reconfigured and the frame is skipped.
    pub fn render(&mut self) -> Result<(), Error> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                tracing::warn!("Surface lost; reconfiguring");
                self.configure_surface();
                return Ok(());
            }
            Err(SurfaceError::Timeout) => {
                tracing::warn!("Timed out waiting for a surface frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let frame_view = targets::create_texture_view(
            &frame.texture,
            "Umbra frame view",
            TextureAspect::All,
        );

        self.pipeline.render_frame(&frame_view);
        frame.present();

        Ok(())
    }
}
