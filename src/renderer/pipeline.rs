// SPDX-License-Identifier: MPL-2.0

//! The deferred HBAO pipeline.

use std::{num::NonZeroU32, path::Path};

use wgpu::{util::DeviceExt as _, *};

use super::{
    noise::NoiseTexture,
    passes::{FramePlan, Pass, Target, EMPTY_CLEAR, GBUFFER_CLEAR, OCCLUSION_CLEAR},
    programs::{Layouts, ProgramSet},
    targets::{create_texture_view, RenderTargets},
    uniforms::{AoUniforms, BlurUniforms, GeometryUniforms},
    Error, Gpu,
};
use crate::{
    camera::{Camera, NormalMatrixMode},
    config::{AoMode, AoSettings, PipelineConfig},
    mesh::{LoadError, Mesh, MeshStats},
};

/// Two triangles covering the screen, in clip space.
const QUAD_VERTICES: [[f32; 3]; 6] = [
    [-1.0, 1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
];

/// A mesh uploaded to the GPU.
#[derive(Debug)]
struct GpuMesh {
    positions: Buffer,
    normals: Buffer,
    indices: Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn new(device: &Device, mesh: &Mesh) -> Self {
        Self {
            positions: create_buffer(
                device,
                "Umbra mesh positions",
                mesh.positions(),
                BufferUsages::VERTEX,
            ),
            normals: create_buffer(
                device,
                "Umbra mesh normals",
                mesh.normals(),
                BufferUsages::VERTEX,
            ),
            indices: create_buffer(
                device,
                "Umbra mesh indices",
                mesh.indices(),
                BufferUsages::INDEX,
            ),
            index_count: mesh.indices().len() as u32,
        }
    }
}

/// Render targets together with the bind groups that read them.
#[derive(Debug)]
struct SizedResources {
    targets: RenderTargets,
    occlusion_bind_group: BindGroup,
    /// Indexed by `[source][horizontal as usize]`.
    blur_bind_groups: [[BindGroup; 2]; 2],
}

/// Size-independent GPU objects.
#[derive(Debug)]
struct StaticResources {
    quad: Buffer,
    _noise: Texture,
    noise_view: TextureView,
    noise_size: u32,
    clamp_sampler: Sampler,
    repeat_sampler: Sampler,
    geometry_uniforms: Buffer,
    geometry_bind_group: BindGroup,
    ao_uniforms: Buffer,
    /// Vertical axis first, then horizontal.
    blur_uniforms: [Buffer; 2],
}

/// Owns every GPU resource and renders frames.
///
/// Dropping the pipeline releases everything it created.
#[derive(Debug)]
pub struct Pipeline {
    gpu: Gpu,
    config: PipelineConfig,
    output_format: TextureFormat,
    camera: Camera,
    layouts: Layouts,
    programs: ProgramSet,
    statics: StaticResources,
    sized: SizedResources,
    mesh: Option<GpuMesh>,
    needs_redraw: bool,
}

impl Pipeline {
    /// Compiles every program and allocates the GPU resources for a `width`×`height` target.
    ///
    /// `output_format` is the format of the views later passed to
    /// [`render_frame`](Self::render_frame).
    pub fn new(
        gpu: Gpu,
        config: PipelineConfig,
        output_format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, Error> {
        let config = PipelineConfig {
            ao: config.ao.sanitized(),
            ..config
        };

        let layouts = Layouts::new(&gpu.device);
        let programs = ProgramSet::build(&gpu.device, &layouts, &config.shaders, output_format)?;
        let statics = StaticResources::new(&gpu, &layouts);
        let sized = SizedResources::new(&gpu.device, &layouts, &statics, width, height);

        let mut this = Self {
            gpu,
            config,
            output_format,
            camera: Camera::new(),
            layouts,
            programs,
            statics,
            sized,
            mesh: None,
            needs_redraw: true,
        };
        this.apply_size(width, height);

        Ok(this)
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// Uploads `mesh`, replacing the one displayed, and fits the camera to its bounds.
    pub fn load_mesh(&mut self, mesh: &Mesh) -> MeshStats {
        let stats = mesh.stats();
        tracing::info!("Uploading mesh: {} faces, {} vertices", stats.faces, stats.vertices);

        self.mesh = Some(GpuMesh::new(&self.gpu.device, mesh));
        self.camera.update_model(mesh.bounds());
        self.needs_redraw = true;

        stats
    }

    /// Reads and uploads a mesh file. On failure the current mesh is kept.
    pub fn load_mesh_file(&mut self, path: impl AsRef<Path>) -> Result<MeshStats, LoadError> {
        let path = path.as_ref();
        match Mesh::load(path) {
            Ok(mesh) => Ok(self.load_mesh(&mesh)),
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Rebuilds the render targets for a new size. Zero dimensions are raised to 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        tracing::info!("Resizing pipeline to {}x{}", width, height);

        // The new group exists before the old one is dropped.
        let sized =
            SizedResources::new(&self.gpu.device, &self.layouts, &self.statics, width, height);
        self.sized = sized;
        self.apply_size(width, height);
    }

    fn apply_size(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        let projection = self.config.projection;

        self.camera.set_viewport(0, 0, width, height);
        self.camera
            .set_projection(projection.field_of_view, projection.z_near, projection.z_far);

        for (buffer, horizontal) in self.statics.blur_uniforms.iter().zip([false, true]) {
            self.gpu.queue.write_buffer(
                buffer,
                0,
                bytemuck::bytes_of(&BlurUniforms::new(width, height, horizontal)),
            );
        }
        self.needs_redraw = true;
    }

    /// Recompiles every program from the configured sources.
    ///
    /// On failure the previous programs stay in use.
    pub fn reload_programs(&mut self) -> Result<(), Error> {
        let programs = ProgramSet::build(
            &self.gpu.device,
            &self.layouts,
            &self.config.shaders,
            self.output_format,
        );
        match programs {
            Ok(programs) => {
                self.programs = programs;
                self.needs_redraw = true;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Keeping the previous programs: {}", e);
                Err(e)
            }
        }
    }

    pub fn set_ao_mode(&mut self, mode: AoMode) {
        self.config.ao.mode = mode;
        self.needs_redraw = true;
    }

    /// Values above [`AoSettings::MAX_BLUR_PASSES`] are lowered to it.
    pub fn set_blur_passes(&mut self, passes: u32) {
        self.config.ao.blur_passes = passes.min(AoSettings::MAX_BLUR_PASSES);
        self.needs_redraw = true;
    }

    /// Values below 1 are raised to 1.
    pub fn set_hbao_directions(&mut self, directions: i32) {
        self.config.ao.directions = directions.max(1);
        self.needs_redraw = true;
    }

    /// Values below 1 are raised to 1.
    pub fn set_hbao_steps(&mut self, steps: i32) {
        self.config.ao.steps = steps.max(1);
        self.needs_redraw = true;
    }

    pub fn set_hbao_radius(&mut self, radius: f32) {
        self.config.ao.radius = radius;
        self.needs_redraw = true;
    }

    /// `degrees` is converted to radians.
    pub fn set_hbao_t_bias(&mut self, degrees: f32) {
        self.config.ao.t_bias = degrees.to_radians();
        self.needs_redraw = true;
    }

    pub fn set_hbao_strength(&mut self, strength: f32) {
        self.config.ao.strength = strength;
        self.needs_redraw = true;
    }

    pub fn set_normal_matrix_mode(&mut self, mode: NormalMatrixMode) {
        self.config.normal_matrix = mode;
        self.needs_redraw = true;
    }

    /// Returns whether a parameter changed since the last call, and clears the flag.
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// The passes the next frame will run.
    pub fn frame_plan(&self) -> FramePlan {
        FramePlan::new(self.mesh.is_some(), self.config.ao.mode, self.config.ao.blur_passes)
    }

    /// Renders one frame into `frame`, which must have the output format given to
    /// [`new`](Self::new) and the size given to the last resize.
    pub fn render_frame(&self, frame: &TextureView) {
        let plan = self.frame_plan();
        self.write_frame_uniforms();

        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("Umbra command encoder"),
        });
        for pass in plan.passes() {
            tracing::debug!("Encoding {:?}", pass);

            match *pass {
                Pass::Clear(target) => {
                    let view = self.target_view(target, frame);
                    encoder.begin_render_pass(&RenderPassDescriptor {
                        label: Some("Umbra clear pass"),
                        color_attachments: &[Some(color_attachment(view, EMPTY_CLEAR))],
                        depth_stencil_attachment: None,
                    });
                }
                Pass::Geometry => self.encode_geometry(&mut encoder),
                Pass::Occlusion { mode, target } => self.encode_screen_pass(
                    &mut encoder,
                    "Umbra occlusion pass",
                    self.programs.occlusion(mode).get(target),
                    &self.sized.occlusion_bind_group,
                    self.target_view(target, frame),
                    OCCLUSION_CLEAR,
                ),
                Pass::Blur { source, target, horizontal } => self.encode_screen_pass(
                    &mut encoder,
                    "Umbra blur pass",
                    self.programs.blur.get(target),
                    &self.sized.blur_bind_groups[source % 2][horizontal as usize],
                    self.target_view(target, frame),
                    OCCLUSION_CLEAR,
                ),
            }
        }
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    fn write_frame_uniforms(&self) {
        let camera = &self.camera;
        let geometry = GeometryUniforms::new(
            camera.projection(),
            camera.view(),
            camera.model(),
            camera.normal_matrix(self.config.normal_matrix),
        );
        let ao = AoUniforms::new(camera, &self.config.ao, self.statics.noise_size);

        let queue = &self.gpu.queue;
        queue.write_buffer(&self.statics.geometry_uniforms, 0, bytemuck::bytes_of(&geometry));
        queue.write_buffer(&self.statics.ao_uniforms, 0, bytemuck::bytes_of(&ao));
    }

    fn target_view<'a>(&'a self, target: Target, frame: &'a TextureView) -> &'a TextureView {
        match target {
            Target::PingPong(index) => self.sized.targets.ping_pong_view(index),
            Target::Frame => frame,
        }
    }

    fn encode_geometry(&self, encoder: &mut CommandEncoder) {
        let mesh = match &self.mesh {
            Some(mesh) => mesh,
            None => return,
        };

        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Umbra geometry pass"),
            color_attachments: &[Some(color_attachment(
                self.sized.targets.gbuffer_view(),
                GBUFFER_CLEAR,
            ))],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: self.sized.targets.depth_view(),
                depth_ops: Some(Operations {
                    // In clip space, 1.0 is the maximum depth.
                    load: LoadOp::Clear(1.0),
                    store: true,
                }),
                // Unused, but treated like depth so both aspects share load and store ops.
                stencil_ops: Some(Operations {
                    load: LoadOp::Clear(0),
                    store: true,
                }),
            }),
        });

        let viewport = self.camera.viewport();
        let targets = &self.sized.targets;
        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width.min(targets.width().saturating_sub(viewport.x)).max(1) as f32,
            viewport.height.min(targets.height().saturating_sub(viewport.y)).max(1) as f32,
            0.0,
            1.0,
        );

        if mesh.index_count == 0 {
            return;
        }

        pass.set_pipeline(&self.programs.geometry);
        pass.set_bind_group(0, &self.statics.geometry_bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.positions.slice(..));
        pass.set_vertex_buffer(1, mesh.normals.slice(..));
        pass.set_index_buffer(mesh.indices.slice(..), IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }

    fn encode_screen_pass(
        &self,
        encoder: &mut CommandEncoder,
        label: &str,
        pipeline: &RenderPipeline,
        bind_group: &BindGroup,
        target: &TextureView,
        clear: Color,
    ) {
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(color_attachment(target, clear))],
            depth_stencil_attachment: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, self.statics.quad.slice(..));
        pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }
}

fn color_attachment(view: &TextureView, clear: Color) -> RenderPassColorAttachment<'_> {
    RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: Operations {
            load: LoadOp::Clear(clear),
            store: true,
        },
    }
}

impl StaticResources {
    fn new(gpu: &Gpu, layouts: &Layouts) -> Self {
        let device = &gpu.device;

        let noise = NoiseTexture::default();
        let noise_texture = create_noise_texture(gpu, &noise);
        let geometry_uniforms =
            create_uniform_buffer::<GeometryUniforms>(device, "Umbra geometry uniforms");

        Self {
            quad: create_buffer(device, "Umbra screen quad", &QUAD_VERTICES, BufferUsages::VERTEX),
            noise_view: create_texture_view(&noise_texture, "Umbra noise view", TextureAspect::All),
            _noise: noise_texture,
            noise_size: noise.size(),
            clamp_sampler: create_sampler(device, "Umbra clamp sampler", AddressMode::ClampToEdge),
            repeat_sampler: create_sampler(device, "Umbra repeat sampler", AddressMode::Repeat),
            geometry_bind_group: device.create_bind_group(&BindGroupDescriptor {
                label: Some("Umbra geometry bind group"),
                layout: &layouts.geometry,
                entries: &[BindGroupEntry {
                    binding: 0,
                    resource: geometry_uniforms.as_entire_binding(),
                }],
            }),
            geometry_uniforms,
            ao_uniforms: create_uniform_buffer::<AoUniforms>(device, "Umbra AO uniforms"),
            blur_uniforms: [
                create_uniform_buffer::<BlurUniforms>(device, "Umbra vertical blur uniforms"),
                create_uniform_buffer::<BlurUniforms>(device, "Umbra horizontal blur uniforms"),
            ],
        }
    }
}

impl SizedResources {
    fn new(
        device: &Device,
        layouts: &Layouts,
        statics: &StaticResources,
        width: u32,
        height: u32,
    ) -> Self {
        let targets = RenderTargets::new(device, width, height);

        let occlusion_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Umbra occlusion bind group"),
            layout: &layouts.occlusion,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: statics.ao_uniforms.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(targets.gbuffer_view()),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(&statics.clamp_sampler),
                },
                BindGroupEntry {
                    binding: 3,
                    resource: BindingResource::TextureView(&statics.noise_view),
                },
                BindGroupEntry {
                    binding: 4,
                    resource: BindingResource::Sampler(&statics.repeat_sampler),
                },
            ],
        });

        let blur_bind_group = |source: usize, horizontal: usize| {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("Umbra blur bind group"),
                layout: &layouts.blur,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: statics.blur_uniforms[horizontal].as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::TextureView(targets.ping_pong_view(source)),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: BindingResource::Sampler(&statics.clamp_sampler),
                    },
                ],
            })
        };
        let blur_bind_groups = [
            [blur_bind_group(0, 0), blur_bind_group(0, 1)],
            [blur_bind_group(1, 0), blur_bind_group(1, 1)],
        ];

        Self {
            targets,
            occlusion_bind_group,
            blur_bind_groups,
        }
    }
}

fn create_buffer<T: bytemuck::Pod>(
    device: &Device,
    label: &str,
    slice: &[T],
    usage: BufferUsages,
) -> Buffer {
    device.create_buffer_init(&util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(slice),
        usage,
    })
}

fn create_uniform_buffer<T>(device: &Device, label: &str) -> Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as BufferAddress,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_sampler(device: &Device, label: &str, address_mode: AddressMode) -> Sampler {
    device.create_sampler(&SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: FilterMode::Nearest,
        min_filter: FilterMode::Nearest,
        mipmap_filter: FilterMode::Nearest,
        ..Default::default()
    })
}

fn create_noise_texture(gpu: &Gpu, noise: &NoiseTexture) -> Texture {
    let size = Extent3d {
        width: noise.size(),
        height: noise.size(),
        depth_or_array_layers: 1,
    };
    let texture = gpu.device.create_texture(&TextureDescriptor {
        label: Some("Umbra noise"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba32Float,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
    });

    gpu.queue.write_texture(
        ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        noise.as_bytes(),
        ImageDataLayout {
            offset: 0,
            bytes_per_row: NonZeroU32::new(noise.size() * 16),
            rows_per_image: None,
        },
        size,
    );

    texture
}
