//! Frame orchestration: owns the device, surface, passes and UI, and runs
//! the passes in order every frame.

use std::sync::Arc;

use anyhow::Result;
use wgpu::{Device, Instance, Queue, Surface, SurfaceConfiguration};

use umbra_core::{Scene, SceneParams, ViewerConfig};
use umbra_math::OrbitCamera;

use crate::ao::{AmbientOcclusionPass, AO_ATTACHMENT, NORMALS_ATTACHMENT};
use crate::frame::FrameContext;
use crate::geometry::{GeometryPass, GpuScene, LitInputs};
use crate::render_target::{Blitter, CopyRegion, CopyTarget};
use crate::shader::{FragmentLibrary, ShaderKind, ShaderTable};
use crate::shadow::ShadowPass;
use crate::skybox::Skybox;
use crate::ui::{self, PanelStats};

/// Which optional passes produced output last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStatus {
    pub shadows_active: bool,
    pub ao_active: bool,
}

/// Frames per second averaged over a fixed window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsCounter {
    window: f32,
    frames: u32,
    elapsed: f32,
    fps: f32,
}

impl FpsCounter {
    pub fn new(window: f32) -> Self {
        Self {
            window,
            frames: 0,
            elapsed: 0.0,
            fps: 0.0,
        }
    }

    /// Count one frame; the rate is republished once per window.
    pub fn tick(&mut self, delta_time: f32) -> f32 {
        self.frames += 1;
        self.elapsed += delta_time;
        if self.elapsed >= self.window {
            self.fps = self.frames as f32 / self.elapsed;
            self.frames = 0;
            self.elapsed = 0.0;
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// An sRGB format when the surface offers one, else its first; plus its
/// first alpha mode. Errors when the adapter cannot present to the surface.
pub fn pick_surface_format(caps: &wgpu::SurfaceCapabilities) -> Result<(wgpu::TextureFormat, wgpu::CompositeAlphaMode)> {
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| anyhow::anyhow!("Surface reports no texture formats for this adapter"))?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Surface reports no alpha modes for this adapter"))?;
    Ok((format, alpha_mode))
}

/// Device, surface, passes and UI for one window.
pub struct Renderer {
    pub surface: Surface<'static>,
    pub device: Device,
    pub queue: Queue,
    pub config: SurfaceConfiguration,
    pub size: (u32, u32),
    pub camera: OrbitCamera,
    pub params: SceneParams,

    scene: Scene,
    gpu_scene: GpuScene,
    shaders: ShaderTable,
    geometry: GeometryPass,
    shadow: ShadowPass,
    ao: AmbientOcclusionPass,
    skybox: Skybox,
    blitter: Blitter,

    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    pub show_ui: bool,
    fps: FpsCounter,
    status: FrameStatus,
}

impl Renderer {
    /// Create a renderer for the window and upload the scene.
    pub async fn new(window: Arc<winit::window::Window>, viewer_config: &ViewerConfig, scene: Scene) -> Result<Self> {
        let size = window.inner_size();
        let size = (size.width.max(1), size.height.max(1));

        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable GPU adapter"))?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Umbra Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;
        device.on_uncaptured_error(Box::new(|e| log::error!("wgpu error: {}", e)));

        let surface_caps = surface.get_capabilities(&adapter);
        let (surface_format, alpha_mode) = pick_surface_format(&surface_caps)?;

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.0,
            height: size.1,
            present_mode: wgpu::PresentMode::Mailbox,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let params = viewer_config.scene_params(|name| ShaderKind::from_name(name).and_then(ShaderKind::ao_algorithm));

        let mut camera = OrbitCamera::new(scene.bounds().center(), 10.0, size.0 as f32 / size.1 as f32);
        camera.frame(scene.bounds());
        log::info!(
            "Camera target {:?}, distance {:.2}, far {:.2}",
            camera.target,
            camera.distance,
            camera.far
        );

        let shaders = ShaderTable::build(&device, &FragmentLibrary::standard());
        let gpu_scene = GpuScene::upload(&device, &shaders, &scene)?;
        let mut geometry = GeometryPass::new(&device, &shaders, surface_format, size.0, size.1)?;
        geometry.set_scene_bounds(&device, &shaders, scene.bounds())?;
        let shadow = ShadowPass::new(&device, &shaders, viewer_config.shadow_map_resolution());
        let ao = AmbientOcclusionPass::new(&device, &queue, &shaders, size.0, size.1);
        let skybox = Skybox::new(&device, &queue, surface_format, viewer_config.skybox.faces.as_ref());
        let blitter = Blitter::new(&device, surface_format);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        log::info!(
            "Scene '{}': {} objects, {} triangles",
            scene.name,
            scene.object_count(),
            scene.total_triangle_count()
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            camera,
            params,
            scene,
            gpu_scene,
            shaders,
            geometry,
            shadow,
            ao,
            skybox,
            blitter,
            egui_ctx,
            egui_state,
            egui_renderer,
            show_ui: true,
            fps: FpsCounter::new(0.5),
            status: FrameStatus::default(),
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// Replace the scene and frame the camera on it.
    pub fn set_scene(&mut self, scene: Scene) -> Result<()> {
        self.gpu_scene = GpuScene::upload(&self.device, &self.shaders, &scene)?;
        self.geometry.set_scene_bounds(&self.device, &self.shaders, scene.bounds())?;
        self.scene = scene;
        self.frame_scene();
        Ok(())
    }

    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 > 0 && new_size.1 > 0 {
            self.size = new_size;
            self.config.width = new_size.0;
            self.config.height = new_size.1;
            self.surface.configure(&self.device, &self.config);

            // Offscreen targets follow on the next frame
            let aspect = new_size.0 as f32 / new_size.1 as f32;
            self.camera.set_aspect(aspect);
        }
    }

    /// Frame the camera on the scene bounds
    pub fn frame_scene(&mut self) {
        self.camera.frame(self.scene.bounds());
        log::info!(
            "Framed scene at center {:?}, distance {:.2}",
            self.camera.target,
            self.camera.distance
        );
    }

    /// Feed a window event to the panel. True when the panel used it and
    /// camera input should ignore it.
    pub fn on_window_event(&mut self, window: &winit::window::Window, event: &winit::event::WindowEvent) -> bool {
        self.egui_state.on_window_event(window, event).consumed
    }

    pub fn tick_fps(&mut self, delta_time: f32) -> f32 {
        self.fps.tick(delta_time)
    }

    /// Render a frame. Surface errors are returned for the caller to handle.
    pub fn render(&mut self, clear_color: wgpu::Color, window: &winit::window::Window) -> Result<()> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (width, height) = (self.config.width, self.config.height);

        // UI edits land before the frame snapshot
        let raw_input = self.egui_state.take_egui_input(window);
        let stats = PanelStats {
            fps: self.fps.fps(),
            objects: self.scene.object_count(),
            triangles: self.scene.total_triangle_count(),
            width,
            height,
            shadows_active: self.status.shadows_active,
            ao_active: self.status.ao_active,
        };
        let show_ui = self.show_ui;
        let mut panel = ui::PanelResponse::default();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if show_ui {
                panel = ui::scene_panel(ctx, &stats, &mut self.camera, &mut self.params);
            }
        });
        if panel.frame_scene {
            self.frame_scene();
        }
        self.egui_state.handle_platform_output(window, full_output.platform_output);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: window.scale_factor() as f32,
        };
        let paint_jobs = self.egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        // Offscreen targets track the surface size
        self.geometry.resize_if_needed(&self.device, width, height);
        self.ao.resize_if_needed(&self.device, width, height);

        // Orbit and dolly move the eye, so the clip planes follow every frame
        self.camera.fit_planes(self.scene.bounds());
        let frame = FrameContext::new(&self.scene, &self.params, &self.camera, width, height);
        self.geometry.prepare(&self.queue, &frame);
        self.skybox.prepare(&self.queue, &frame);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        self.egui_renderer
            .update_buffers(&self.device, &self.queue, &mut encoder, &paint_jobs, &screen_descriptor);

        let shadows_active = frame.shadows_active()
            && self
                .shadow
                .render(&self.device, &self.queue, &mut encoder, &self.shaders, &frame, &self.gpu_scene)
                .unwrap_or_else(|e| {
                    log::error!("Shadow pass failed: {:#}", e);
                    false
                });

        let debug = frame.params.debug;
        let ao_active = (frame.params.draw.ssao || debug.ao_pass) && self.render_ao(&mut encoder, &frame);

        if debug.ao_pass && ao_active {
            self.ao.working().copy_region(
                &self.device,
                &mut encoder,
                CopyTarget::Surface {
                    view: &view,
                    width,
                    height,
                    blitter: &self.blitter,
                },
                CopyRegion::color(AO_ATTACHMENT, 0, width, height),
            )?;
        } else {
            let shadow_map = if shadows_active { self.shadow.shadow_map().ok() } else { None };
            let ao_map = if frame.params.draw.ssao && ao_active {
                self.ao.working().color_view(AO_ATTACHMENT).ok()
            } else {
                None
            };
            self.geometry.render_lit(
                &self.device,
                &mut encoder,
                &self.shaders,
                &frame,
                &self.gpu_scene,
                &view,
                LitInputs { shadow_map, ao_map },
                &self.skybox,
                clear_color,
            )?;
        }

        // Panel over whatever the passes left on the surface
        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.egui_renderer.render(&mut egui_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.status = FrameStatus {
            shadows_active,
            ao_active,
        };
        Ok(())
    }

    /// Normals pre-pass plus the AO chain. Failures are logged and disable AO for the frame.
    fn render_ao(&self, encoder: &mut wgpu::CommandEncoder, frame: &FrameContext) -> bool {
        let result = self
            .geometry
            .render_view_normals(
                &self.device,
                encoder,
                &self.shaders,
                &self.gpu_scene,
                self.ao.working(),
                NORMALS_ATTACHMENT,
            )
            .and_then(|prepass| {
                if !prepass {
                    return Ok(false);
                }
                self.ao.render(&self.device, &self.queue, encoder, &self.shaders, frame)
            });

        result.unwrap_or_else(|e| {
            log::error!("AO pass failed: {:#}", e);
            false
        })
    }
}
