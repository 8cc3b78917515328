// SPDX-License-Identifier: MPL-2.0

//! Renders offscreen on a hardware adapter, or on the software fallback adapter when there is none.
//! Without either, every test returns early.

use std::fs;

use umbra::{
    renderer::programs::{files, Program, ShaderSources},
    AoMode, AoSettings, Gpu, Mesh, MeshStats, Pipeline, PipelineConfig, ShaderSource,
};

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn gpu() -> Option<Gpu> {
    let instance = wgpu::Instance::new(wgpu::Backends::all());
    let fallback = wgpu::RequestAdapterOptions {
        force_fallback_adapter: true,
        ..Default::default()
    };
    let gpu = pollster::block_on(Gpu::request(&instance, None))
        .or_else(|_| pollster::block_on(Gpu::request_with(&instance, &fallback)));

    match gpu {
        Ok((_, gpu)) => Some(gpu),
        Err(e) => {
            eprintln!("skipping: {}", e);
            None
        }
    }
}

fn output(gpu: &Gpu, width: u32, height: u32) -> wgpu::TextureView {
    gpu.device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("test output"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn tetrahedron() -> Mesh {
    Mesh::new(
        vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ],
        vec![0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3],
    )
    .unwrap()
}

fn wait(pipeline: &Pipeline) {
    pipeline.gpu().device.poll(wgpu::Maintain::Wait);
}

#[test]
fn renders_through_resizes_and_modes() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline =
        Pipeline::new(gpu, PipelineConfig::default(), OUTPUT_FORMAT, 100, 100).unwrap();

    // Nothing loaded: a plain clear.
    pipeline.render_frame(&output(pipeline.gpu(), 100, 100));

    assert_eq!(pipeline.load_mesh(&tetrahedron()), MeshStats { faces: 4, vertices: 4 });
    assert!((pipeline.camera().scaling() - 1.0).abs() < 1e-6);

    for (width, height) in [(1, 1), (800, 600), (0, 0), (64, 48)] {
        pipeline.resize(width, height);
        let view = output(pipeline.gpu(), width.max(1), height.max(1));

        for mode in AoMode::ALL {
            pipeline.set_ao_mode(mode);
            for blur in [0, 1, 3] {
                pipeline.set_blur_passes(blur);
                pipeline.render_frame(&view);
            }
        }
        wait(&pipeline);

        assert_eq!(pipeline.camera().viewport().width, width.max(1));
        assert_eq!(pipeline.camera().viewport().height, height.max(1));
    }
}

#[test]
fn setters_request_redraws() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline =
        Pipeline::new(gpu, PipelineConfig::default(), OUTPUT_FORMAT, 32, 32).unwrap();

    assert!(pipeline.take_redraw_request());
    assert!(!pipeline.take_redraw_request());

    pipeline.set_hbao_directions(0);
    assert!(pipeline.take_redraw_request());
    assert_eq!(pipeline.config().ao.directions, 1);

    pipeline.set_hbao_t_bias(90.0);
    assert!((pipeline.config().ao.t_bias - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

    pipeline.set_blur_passes(u32::MAX);
    assert_eq!(pipeline.config().ao.blur_passes, AoSettings::MAX_BLUR_PASSES);
}

#[test]
fn resizes_to_a_single_pixel_and_back() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline =
        Pipeline::new(gpu, PipelineConfig::default(), OUTPUT_FORMAT, 100, 100).unwrap();
    pipeline.load_mesh(&tetrahedron());
    pipeline.set_blur_passes(1);

    for (width, height) in [(100, 100), (1, 1), (800, 600)] {
        pipeline.resize(width, height);
        pipeline.render_frame(&output(pipeline.gpu(), width, height));
        wait(&pipeline);

        assert!((pipeline.camera().aspect_ratio() - width as f32 / height as f32).abs() < 1e-6);
    }
}

#[test]
fn invalid_shaders_are_rejected() {
    let Some(gpu) = gpu() else { return };

    let error = Program::compile(&gpu.device, "broken", "fn vs_main( {", "").unwrap_err();
    assert!(matches!(error, umbra::Error::Program { program: "broken", .. }));
}

#[test]
fn failed_reload_keeps_the_previous_programs() {
    let Some(gpu) = gpu() else { return };

    let dir = std::env::temp_dir().join(format!("umbra-shaders-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let embedded = ShaderSources::load(&ShaderSource::Embedded).unwrap();
    for name in files::ALL {
        fs::write(dir.join(name), embedded.get(name)).unwrap();
    }

    let config = PipelineConfig {
        shaders: ShaderSource::Directory(dir.clone()),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(gpu, config, OUTPUT_FORMAT, 16, 16).unwrap();
    pipeline.load_mesh(&tetrahedron());
    assert!(pipeline.reload_programs().is_ok());

    fs::write(dir.join(files::HBAO_FRAGMENT), "this is not WGSL").unwrap();
    assert!(matches!(
        pipeline.reload_programs(),
        Err(umbra::Error::Program { program: "hbao", .. }),
    ));

    fs::remove_file(dir.join(files::BLUR_FRAGMENT)).unwrap();
    assert!(matches!(pipeline.reload_programs(), Err(umbra::Error::ShaderIo { .. })));

    pipeline.render_frame(&output(pipeline.gpu(), 16, 16));
    wait(&pipeline);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn failed_load_keeps_the_current_mesh() {
    let Some(gpu) = gpu() else { return };
    let mut pipeline =
        Pipeline::new(gpu, PipelineConfig::default(), OUTPUT_FORMAT, 16, 16).unwrap();
    pipeline.load_mesh(&tetrahedron());

    assert!(pipeline.load_mesh_file("/nonexistent/model.ply").is_err());
    assert!(pipeline.has_mesh());
}
