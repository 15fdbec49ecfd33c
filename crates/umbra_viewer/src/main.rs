use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use umbra_core::{import_meshes, Scene, ViewerConfig};
use umbra_render::Renderer;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

/// Command line: `umbra_viewer [model.obj] [--config viewer.json]`
#[derive(Debug, Default, PartialEq)]
struct Args {
    model: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            } else if parsed.model.is_none() {
                parsed.model = Some(PathBuf::from(arg));
            } else {
                anyhow::bail!("unexpected argument '{}'", arg);
            }
        }
        Ok(parsed)
    }
}

/// Model from the command line wins over the config file; no model means
/// the primitives scene.
fn build_scene(model: Option<&PathBuf>) -> Result<Scene> {
    match model {
        Some(path) => {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model".to_string());
            let meshes = import_meshes(path);
            log::info!("Imported {} meshes from {}", meshes.len(), path.display());
            Ok(Scene::with_model(name, meshes)?)
        }
        None => Ok(Scene::primitives()?),
    }
}

/// Window, renderer and mouse drag state for one viewer session.
struct App {
    config: ViewerConfig,
    scene: Option<Scene>,
    window: Option<std::sync::Arc<Window>>,
    renderer: Option<Renderer>,

    // Drag orbit
    left_mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    last_frame_time: Instant,
}

impl App {
    fn new(config: ViewerConfig, scene: Scene) -> Self {
        Self {
            config,
            scene: Some(scene),
            window: None,
            renderer: None,
            left_mouse_pressed: false,
            last_mouse_pos: None,
            last_frame_time: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = std::sync::Arc::new(event_loop.create_window(window_attrs)?);

        let scene = self.scene.take().context("scene already handed to the renderer")?;
        let renderer = pollster::block_on(Renderer::new(window.clone(), &self.config, scene))?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            match self.init(event_loop) {
                Ok(()) => log::info!("Window and renderer initialized"),
                Err(e) => {
                    log::error!("Failed to initialize: {:#}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        // Clicks and keys over the panel stay with the panel
        if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
            if renderer.on_window_event(window, &event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize((physical_size.width, physical_size.height));
                    log::info!("Resized to {}x{}", physical_size.width, physical_size.height);
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                self.left_mouse_pressed = state == ElementState::Pressed;
                if !self.left_mouse_pressed {
                    self.last_mouse_pos = None;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.left_mouse_pressed {
                    if let (Some(last_pos), Some(renderer)) = (self.last_mouse_pos, &mut self.renderer) {
                        let delta_x = position.x - last_pos.0;
                        let delta_y = position.y - last_pos.1;
                        let sensitivity = 0.005;
                        renderer
                            .camera
                            .orbit(-delta_x as f32 * sensitivity, -delta_y as f32 * sensitivity);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(renderer) = &mut self.renderer {
                    let scroll_amount = match delta {
                        winit::event::MouseScrollDelta::LineDelta(_, y) => y * 100.0,
                        winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                    };
                    renderer.camera.dolly(-scroll_amount);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(keycode),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(renderer) = &mut self.renderer {
                    match keycode {
                        KeyCode::KeyF => renderer.frame_scene(),
                        KeyCode::Tab => renderer.show_ui = !renderer.show_ui,
                        KeyCode::Escape => event_loop.exit(),
                        _ => {}
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let delta_time = (now - self.last_frame_time).as_secs_f32();
                self.last_frame_time = now;

                if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
                    renderer.tick_fps(delta_time);

                    let clear_color = wgpu::Color {
                        r: 0.1,
                        g: 0.2,
                        b: 0.3,
                        a: 1.0,
                    };

                    if let Err(e) = renderer.render(clear_color, window) {
                        match e.downcast_ref::<wgpu::SurfaceError>() {
                            Some(wgpu::SurfaceError::Lost) => {
                                let size = renderer.size;
                                renderer.resize(size);
                            }
                            Some(wgpu::SurfaceError::OutOfMemory) => {
                                log::error!("Out of memory!");
                                event_loop.exit();
                            }
                            Some(surface_err) => log::error!("Surface error: {:?}", surface_err),
                            None => log::error!("Render error: {:#}", e),
                        }
                    }
                }

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Umbra Viewer");

    let args = Args::parse(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    let model = args.model.as_ref().or(config.scene.model.as_ref());
    let scene = build_scene(model)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, scene);

    log::info!("Running event loop");
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        Args::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_args_empty() {
        assert_eq!(args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_args_model_and_config() {
        let parsed = args(&["bunny.obj", "--config", "viewer.json"]).unwrap();
        assert_eq!(parsed.model, Some(PathBuf::from("bunny.obj")));
        assert_eq!(parsed.config, Some(PathBuf::from("viewer.json")));
    }

    #[test]
    fn test_args_errors() {
        assert!(args(&["--config"]).is_err());
        assert!(args(&["a.obj", "b.obj"]).is_err());
    }

    #[test]
    fn test_default_scene_is_primitives() {
        let scene = build_scene(None).unwrap();
        assert!(scene.object_count() > 0);
        assert!(!scene.bounds().is_empty());
    }
}
