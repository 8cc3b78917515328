// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use umbra::{
    input::{self, Controls, KeyAction},
    AoMode, AoSettings, NormalMatrixMode, PipelineConfig, Renderer, ShaderSource,
};
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Window, WindowBuilder},
};

/// View a triangle mesh with horizon-based ambient occlusion.
///
/// Drag with the left button to rotate and with the right button to zoom. The arrow keys and WASD
/// also rotate and zoom; R reloads the shaders. Mesh files may be dropped onto the window.
#[derive(Debug, Parser)]
#[command(name = "umbra", version, about)]
struct Args {
    /// Mesh to open (.ply or .obj)
    mesh: Option<PathBuf>,

    /// Read shaders from this directory instead of the built-in ones
    #[arg(long)]
    shaders: Option<PathBuf>,

    /// Shading: hbao, depth or normal
    #[arg(long, default_value_t = AoMode::Hbao)]
    ao_mode: AoMode,

    /// Number of horizontal+vertical blur pairs
    #[arg(long, default_value_t = AoSettings::default().blur_passes)]
    blur: u32,

    /// HBAO sampling directions
    #[arg(long, default_value_t = AoSettings::default().directions)]
    directions: i32,

    /// HBAO steps per direction
    #[arg(long, default_value_t = AoSettings::default().steps)]
    steps: i32,

    /// HBAO radius in view-space units
    #[arg(long, default_value_t = AoSettings::default().radius)]
    radius: f32,

    /// HBAO tangent bias in degrees
    #[arg(long, default_value_t = AoSettings::DEFAULT_T_BIAS_DEGREES)]
    t_bias: f32,

    /// HBAO strength
    #[arg(long, default_value_t = AoSettings::default().strength)]
    strength: f32,

    /// Transform normals by the model-view matrix instead of its inverse transpose
    #[arg(long)]
    no_normal_matrix: bool,

    /// Pan by dragging with the middle button
    #[arg(long)]
    middle_pan: bool,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Log every pass of every frame
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            shaders: match &self.shaders {
                Some(dir) => ShaderSource::Directory(dir.clone()),
                None => ShaderSource::Embedded,
            },
            ao: AoSettings {
                mode: self.ao_mode,
                blur_passes: self.blur,
                directions: self.directions,
                steps: self.steps,
                radius: self.radius,
                t_bias: self.t_bias.to_radians(),
                strength: self.strength,
            },
            normal_matrix: if self.no_normal_matrix {
                NormalMatrixMode::Plain
            } else {
                NormalMatrixMode::InverseTranspose
            },
            ..Default::default()
        }
    }

    fn controls(&self) -> Controls {
        Controls {
            pan_button: self.middle_pan.then(|| input::MouseButton::Middle),
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("Umbra")
        .with_inner_size(PhysicalSize::new(args.width, args.height))
        .build(&event_loop)
        .context("failed to create a window")?;

    let mut renderer = create_renderer(&window, args.pipeline_config())?;
    if let Some(path) = &args.mesh {
        // A failure is logged and leaves the viewer empty.
        let _ = renderer.pipeline_mut().load_mesh_file(path);
    }

    let controls = args.controls();
    let mut cursor = PhysicalPosition::new(0.0, 0.0);
    let mut exit_code = 0;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::WindowEvent { event, window_id } if window_id == window.id() => {
                let camera_moved = match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                        false
                    }
                    WindowEvent::Resized(size) => {
                        renderer.resize_surface(size.width, size.height);
                        false
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize_surface(new_inner_size.width, new_inner_size.height);
                        false
                    }
                    WindowEvent::DroppedFile(path) => {
                        let _ = renderer.pipeline_mut().load_mesh_file(path);
                        false
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = position;
                        let camera = renderer.pipeline_mut().camera_mut();
                        controls.mouse_move(camera, cursor.x as f32, cursor.y as f32)
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        let camera = renderer.pipeline_mut().camera_mut();
                        let (x, y) = (cursor.x as f32, cursor.y as f32);
                        let button = map_mouse_button(button);
                        match state {
                            ElementState::Pressed => controls.mouse_down(camera, button, x, y),
                            ElementState::Released => controls.mouse_up(camera, button, x, y),
                        }
                    }
                    WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(key),
                                ..
                            },
                        ..
                    } => match map_key(key) {
                        Some(key) => {
                            let pipeline = renderer.pipeline_mut();
                            match controls.key(pipeline.camera_mut(), key) {
                                KeyAction::Camera => true,
                                KeyAction::ReloadPrograms => {
                                    // A failure is logged and the previous programs are kept.
                                    let _ = pipeline.reload_programs();
                                    false
                                }
                            }
                        }
                        None => false,
                    },
                    _ => false,
                };

                if camera_moved {
                    window.request_redraw();
                }
            }
            Event::MainEventsCleared => {
                if renderer.pipeline_mut().take_redraw_request() {
                    window.request_redraw();
                }
            }
            Event::RedrawRequested(window_id) if window_id == window.id() => {
                if let Err(e) = renderer.render() {
                    tracing::error!("Rendering failed: {}", e);
                    exit_code = 1;
                    *control_flow = ControlFlow::Exit;
                }
            }
            // The event loop exits the process with status 0 once this returns.
            Event::LoopDestroyed if exit_code != 0 => std::process::exit(exit_code),
            _ => {}
        }
    })
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();
}

fn create_renderer(window: &Window, config: PipelineConfig) -> Result<Renderer> {
    let size = window.inner_size();

    // SAFETY: the window is moved into the event loop together with the renderer and lives until
    // the process exits.
    pollster::block_on(unsafe {
        Renderer::new(window, wgpu::Backends::PRIMARY, config, size.width, size.height)
    })
    .context("failed to initialize the renderer")
}

fn map_mouse_button(button: winit::event::MouseButton) -> input::MouseButton {
    match button {
        winit::event::MouseButton::Left => input::MouseButton::Left,
        winit::event::MouseButton::Right => input::MouseButton::Right,
        winit::event::MouseButton::Middle => input::MouseButton::Middle,
        winit::event::MouseButton::Other(other) => input::MouseButton::Other(other),
    }
}

fn map_key(key: VirtualKeyCode) -> Option<input::Key> {
    Some(match key {
        VirtualKeyCode::Up => input::Key::Up,
        VirtualKeyCode::Down => input::Key::Down,
        VirtualKeyCode::Left => input::Key::Left,
        VirtualKeyCode::Right => input::Key::Right,
        VirtualKeyCode::W => input::Key::W,
        VirtualKeyCode::A => input::Key::A,
        VirtualKeyCode::S => input::Key::S,
        VirtualKeyCode::D => input::Key::D,
        VirtualKeyCode::R => input::Key::R,
        _ => return None,
    })
}
