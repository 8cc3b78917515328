// SPDX-License-Identifier: MPL-2.0

//! The render targets whose size follows the surface.

use wgpu::*;

/// Normal (RGB) and linear depth (A) per pixel.
pub const GBUFFER_FORMAT: TextureFormat = TextureFormat::Rgba32Float;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;
pub const PING_PONG_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Every size-dependent texture of the pipeline.
///
/// The group is created and dropped as a whole. Resizing builds a new group before the previous
/// one is released.
#[derive(Debug)]
pub struct RenderTargets {
    width: u32,
    height: u32,
    // Textures are kept alongside their views so that ownership is explicit.
    _gbuffer: Texture,
    gbuffer_view: TextureView,
    _depth: Texture,
    depth_view: TextureView,
    _ping_pong: [Texture; 2],
    ping_pong_views: [TextureView; 2],
}

impl RenderTargets {
    /// Zero dimensions are raised to 1.
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        tracing::debug!("Creating {}x{} render targets", width, height);

        let color_usage = TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING;
        let gbuffer = create_texture(
            device,
            "Umbra G-buffer",
            width,
            height,
            GBUFFER_FORMAT,
            color_usage,
        );
        let depth = create_texture(
            device,
            "Umbra G-buffer depth",
            width,
            height,
            DEPTH_FORMAT,
            TextureUsages::RENDER_ATTACHMENT,
        );
        let ping_pong = ["Umbra ping-pong 0", "Umbra ping-pong 1"].map(|label| {
            create_texture(device, label, width, height, PING_PONG_FORMAT, color_usage)
        });

        Self {
            width,
            height,
            gbuffer_view: create_texture_view(&gbuffer, "Umbra G-buffer view", TextureAspect::All),
            _gbuffer: gbuffer,
            depth_view: create_texture_view(&depth, "Umbra depth view", TextureAspect::All),
            _depth: depth,
            ping_pong_views: [
                create_texture_view(&ping_pong[0], "Umbra ping-pong 0 view", TextureAspect::All),
                create_texture_view(&ping_pong[1], "Umbra ping-pong 1 view", TextureAspect::All),
            ],
            _ping_pong: ping_pong,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn gbuffer_view(&self) -> &TextureView {
        &self.gbuffer_view
    }

    pub fn depth_view(&self) -> &TextureView {
        &self.depth_view
    }

    pub fn ping_pong_view(&self, index: usize) -> &TextureView {
        &self.ping_pong_views[index % 2]
    }
}

fn create_texture(
    device: &Device,
    label: &str,
    width: u32,
    height: u32,
    format: TextureFormat,
    usage: TextureUsages,
) -> Texture {
    device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format,
        usage,
    })
}

pub(super) fn create_texture_view(
    texture: &Texture,
    label: &str,
    aspect: TextureAspect,
) -> TextureView {
    texture.create_view(&TextureViewDescriptor {
        label: Some(label),
        format: None,
        dimension: None,
        aspect,
        base_mip_level: 0,
        mip_level_count: None,
        base_array_layer: 0,
        array_layer_count: None,
    })
}
