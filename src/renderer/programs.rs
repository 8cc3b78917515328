// SPDX-License-Identifier: MPL-2.0

//! Shader programs and the render pipelines built from them.
//!
//! A program is one vertex source and one fragment source compiled together as a single WGSL
//! module; the fragment source may use types the vertex source declares.

use std::{fs, path::Path};

use wgpu::*;

use super::{
    passes::Target,
    targets::{DEPTH_FORMAT, GBUFFER_FORMAT, PING_PONG_FORMAT},
    Error,
};
use crate::config::{AoMode, ShaderSource};

const VERTEX_ENTRY_POINT: &str = "vs_main";
const FRAGMENT_ENTRY_POINT: &str = "fs_main";

/// Shader files, by name.
pub mod files {
    pub const GEOMETRY_VERTEX: &str = "g.vert.wgsl";
    pub const GEOMETRY_FRAGMENT: &str = "g.frag.wgsl";
    pub const QUAD_VERTEX: &str = "quad.vert.wgsl";
    pub const HBAO_FRAGMENT: &str = "hbao.frag.wgsl";
    pub const DEPTH_FRAGMENT: &str = "depth.frag.wgsl";
    pub const NORMAL_FRAGMENT: &str = "normal.frag.wgsl";
    pub const BLUR_FRAGMENT: &str = "blur.frag.wgsl";

    pub const ALL: [&str; 7] = [
        GEOMETRY_VERTEX,
        GEOMETRY_FRAGMENT,
        QUAD_VERTEX,
        HBAO_FRAGMENT,
        DEPTH_FRAGMENT,
        NORMAL_FRAGMENT,
        BLUR_FRAGMENT,
    ];
}

/// Name, vertex file and fragment file of every program.
const PROGRAMS: [(&str, &str, &str); 5] = [
    ("geometry", files::GEOMETRY_VERTEX, files::GEOMETRY_FRAGMENT),
    ("hbao", files::QUAD_VERTEX, files::HBAO_FRAGMENT),
    ("depth", files::QUAD_VERTEX, files::DEPTH_FRAGMENT),
    ("normal", files::QUAD_VERTEX, files::NORMAL_FRAGMENT),
    ("blur", files::QUAD_VERTEX, files::BLUR_FRAGMENT),
];

macro_rules! embedded_shader {
    ($name:literal) => {
        ($name, include_str!(concat!("shaders/", $name)))
    };
}

const EMBEDDED: [(&str, &str); 7] = [
    embedded_shader!("g.vert.wgsl"),
    embedded_shader!("g.frag.wgsl"),
    embedded_shader!("quad.vert.wgsl"),
    embedded_shader!("hbao.frag.wgsl"),
    embedded_shader!("depth.frag.wgsl"),
    embedded_shader!("normal.frag.wgsl"),
    embedded_shader!("blur.frag.wgsl"),
];

/// The text of every shader file.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    sources: Vec<(&'static str, String)>,
}

impl ShaderSources {
    pub fn load(source: &ShaderSource) -> Result<Self, Error> {
        let sources = match source {
            ShaderSource::Embedded => EMBEDDED
                .iter()
                .map(|(name, text)| (*name, (*text).to_owned()))
                .collect(),
            ShaderSource::Directory(dir) => files::ALL
                .iter()
                .map(|name| Ok((*name, read_shader(&dir.join(name))?)))
                .collect::<Result<_, Error>>()?,
        };

        Ok(Self { sources })
    }

    /// The text of the file called `name`, or an empty string for an unknown name.
    pub fn get(&self, name: &str) -> &str {
        self.sources
            .iter()
            .find(|(file, _)| *file == name)
            .map_or("", |(_, text)| text)
    }
}

fn read_shader(path: &Path) -> Result<String, Error> {
    tracing::debug!("Reading {}", path.display());

    fs::read_to_string(path).map_err(|source| Error::ShaderIo {
        path: path.to_owned(),
        source,
    })
}

/// A compiled vertex+fragment shader module.
#[derive(Debug)]
pub struct Program {
    name: &'static str,
    module: ShaderModule,
}

impl Program {
    /// Compiles `vertex` and `fragment` into one module.
    ///
    /// Compilation runs inside a validation error scope so that a bad source is reported as
    /// [`Error::Program`] instead of aborting the device.
    pub fn compile(
        device: &Device,
        name: &'static str,
        vertex: &str,
        fragment: &str,
    ) -> Result<Self, Error> {
        let source = program_source(vertex, fragment);

        let module = within_error_scope(device, name, || {
            device.create_shader_module(ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        Ok(Self { name, module })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn module(&self) -> &ShaderModule {
        &self.module
    }
}

fn program_source(vertex: &str, fragment: &str) -> String {
    format!("{}\n{}", vertex, fragment)
}

/// Runs `f`, turning any validation error it raises into [`Error::Program`].
fn within_error_scope<T>(
    device: &Device,
    name: &'static str,
    f: impl FnOnce() -> T,
) -> Result<T, Error> {
    device.push_error_scope(ErrorFilter::Validation);
    let value = f();

    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(value),
        Some(error) => Err(Error::Program {
            program: name,
            message: error.to_string(),
        }),
    }
}

/// The bind group layouts shared by every program generation.
#[derive(Debug)]
pub struct Layouts {
    /// Geometry uniforms.
    pub geometry: BindGroupLayout,
    /// AO uniforms, G-buffer, G-buffer sampler, noise, noise sampler.
    pub occlusion: BindGroupLayout,
    /// Blur uniforms, source texture, source sampler.
    pub blur: BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &Device) -> Self {
        Self {
            geometry: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Umbra geometry bind group layout"),
                entries: &[uniform_entry(0, ShaderStages::VERTEX)],
            }),
            occlusion: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Umbra occlusion bind group layout"),
                entries: &[
                    uniform_entry(0, ShaderStages::FRAGMENT),
                    texture_entry(1),
                    sampler_entry(2),
                    texture_entry(3),
                    sampler_entry(4),
                ],
            }),
            blur: device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("Umbra blur bind group layout"),
                entries: &[
                    uniform_entry(0, ShaderStages::FRAGMENT),
                    texture_entry(1),
                    sampler_entry(2),
                ],
            }),
        }
    }
}

fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        // The G-buffer is 32-bit float, which cannot be filtered.
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: false },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
        count: None,
    }
}

/// One screen-quad program built for both kinds of color target.
#[derive(Debug)]
pub struct ScreenPipelines {
    ping_pong: RenderPipeline,
    frame: RenderPipeline,
}

impl ScreenPipelines {
    pub fn get(&self, target: Target) -> &RenderPipeline {
        match target {
            Target::PingPong(_) => &self.ping_pong,
            Target::Frame => &self.frame,
        }
    }
}

/// Every render pipeline of one program generation.
#[derive(Debug)]
pub struct ProgramSet {
    pub geometry: RenderPipeline,
    hbao: ScreenPipelines,
    depth: ScreenPipelines,
    normal: ScreenPipelines,
    pub blur: ScreenPipelines,
}

impl ProgramSet {
    /// Compiles every program and builds its pipelines.
    ///
    /// Nothing is returned unless all of them succeed.
    pub fn build(
        device: &Device,
        layouts: &Layouts,
        source: &ShaderSource,
        output_format: TextureFormat,
    ) -> Result<Self, Error> {
        let sources = ShaderSources::load(source)?;
        let compile = |(name, vertex, fragment): (&'static str, &str, &str)| {
            Program::compile(device, name, sources.get(vertex), sources.get(fragment))
        };

        let [geometry, hbao, depth, normal, blur] = PROGRAMS;
        let geometry = compile(geometry)?;
        let hbao = compile(hbao)?;
        let depth = compile(depth)?;
        let normal = compile(normal)?;
        let blur = compile(blur)?;

        let set = Self {
            geometry: create_geometry_pipeline(device, layouts, &geometry)?,
            hbao: create_screen_pipelines(device, &layouts.occlusion, &hbao, output_format)?,
            depth: create_screen_pipelines(device, &layouts.occlusion, &depth, output_format)?,
            normal: create_screen_pipelines(device, &layouts.occlusion, &normal, output_format)?,
            blur: create_screen_pipelines(device, &layouts.blur, &blur, output_format)?,
        };
        tracing::info!("Built shader programs from {:?}", source);

        Ok(set)
    }

    pub fn occlusion(&self, mode: AoMode) -> &ScreenPipelines {
        match mode {
            AoMode::Hbao => &self.hbao,
            AoMode::DepthDebug => &self.depth,
            AoMode::NormalDebug => &self.normal,
        }
    }
}

/// Mesh positions and normals live in separate buffers.
const POSITION_ATTRIBUTES: [VertexAttribute; 1] = vertex_attr_array![0 => Float32x3];
const NORMAL_ATTRIBUTES: [VertexAttribute; 1] = vertex_attr_array![1 => Float32x3];
const QUAD_ATTRIBUTES: [VertexAttribute; 1] = vertex_attr_array![0 => Float32x3];

const VEC3_STRIDE: BufferAddress = (3 * std::mem::size_of::<f32>()) as BufferAddress;

fn create_geometry_pipeline(
    device: &Device,
    layouts: &Layouts,
    program: &Program,
) -> Result<RenderPipeline, Error> {
    within_error_scope(device, program.name(), || {
        device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Umbra geometry pipeline"),
            layout: Some(&device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&layouts.geometry],
                push_constant_ranges: &[],
            })),
            vertex: VertexState {
                module: program.module(),
                entry_point: VERTEX_ENTRY_POINT,
                buffers: &[
                    VertexBufferLayout {
                        array_stride: VEC3_STRIDE,
                        step_mode: VertexStepMode::Vertex,
                        attributes: &POSITION_ATTRIBUTES,
                    },
                    VertexBufferLayout {
                        array_stride: VEC3_STRIDE,
                        step_mode: VertexStepMode::Vertex,
                        attributes: &NORMAL_ATTRIBUTES,
                    },
                ],
            },
            fragment: Some(FragmentState {
                module: program.module(),
                entry_point: FRAGMENT_ENTRY_POINT,
                targets: &[Some(ColorTargetState {
                    format: GBUFFER_FORMAT,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                front_face: FrontFace::Ccw,
                cull_mode: Some(Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState::default(),
            multiview: None,
        })
    })
}

fn create_screen_pipelines(
    device: &Device,
    layout: &BindGroupLayout,
    program: &Program,
    output_format: TextureFormat,
) -> Result<ScreenPipelines, Error> {
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    let create = |format: TextureFormat| {
        within_error_scope(device, program.name(), || {
            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(program.name()),
                layout: Some(&pipeline_layout),
                vertex: VertexState {
                    module: program.module(),
                    entry_point: VERTEX_ENTRY_POINT,
                    buffers: &[VertexBufferLayout {
                        array_stride: VEC3_STRIDE,
                        step_mode: VertexStepMode::Vertex,
                        attributes: &QUAD_ATTRIBUTES,
                    }],
                },
                fragment: Some(FragmentState {
                    module: program.module(),
                    entry_point: FRAGMENT_ENTRY_POINT,
                    targets: &[Some(ColorTargetState {
                        format,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    })],
                }),
                // The quad is drawn without depth testing or culling.
                primitive: PrimitiveState {
                    topology: PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: MultisampleState::default(),
                multiview: None,
            })
        })
    };

    Ok(ScreenPipelines {
        ping_pong: create(PING_PONG_FORMAT)?,
        frame: create(output_format)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_embedded_shader_is_listed() {
        let sources = ShaderSources::load(&ShaderSource::Embedded).unwrap();

        for name in files::ALL {
            assert!(sources.get(name).contains("SPDX-License-Identifier"), "{}", name);
        }
        assert_eq!(sources.get("missing.wgsl"), "");
    }

    #[test]
    fn fragment_sources_have_an_entry_point() {
        let sources = ShaderSources::load(&ShaderSource::Embedded).unwrap();

        for name in files::ALL.iter().filter(|name| name.contains(".frag.")) {
            assert!(sources.get(name).contains("fn fs_main"), "{}", name);
        }
    }

    #[test]
    fn embedded_programs_parse_and_validate() {
        let sources = ShaderSources::load(&ShaderSource::Embedded).unwrap();

        for (name, vertex, fragment) in PROGRAMS {
            let source = program_source(sources.get(vertex), sources.get(fragment));
            let module = ::naga::front::wgsl::parse_str(&source)
                .unwrap_or_else(|e| panic!("{}: {}", name, e.emit_to_string(&source)));

            ::naga::valid::Validator::new(
                ::naga::valid::ValidationFlags::all(),
                ::naga::valid::Capabilities::empty(),
            )
            .validate(&module)
            .unwrap_or_else(|e| panic!("{}: {:?}", name, e));

            for entry_point in [VERTEX_ENTRY_POINT, FRAGMENT_ENTRY_POINT] {
                assert!(
                    module.entry_points.iter().any(|ep| ep.name == entry_point),
                    "{} has no {}",
                    name,
                    entry_point,
                );
            }
        }
    }

    #[test]
    fn missing_directory_is_a_shader_io_error() {
        let source = ShaderSource::Directory("/nonexistent/umbra-shaders".into());

        assert!(matches!(
            ShaderSources::load(&source),
            Err(Error::ShaderIo { .. }),
        ));
    }
}
