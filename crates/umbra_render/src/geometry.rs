//! Mesh draws: the normals pre-pass, the lit composite and debug overlays.

use std::collections::HashMap;

use anyhow::Result;
use wgpu::util::DeviceExt;

use umbra_core::{Geometry, Material, Mesh, Scene, Wire};
use umbra_math::{DrawableTransform, SceneBounds, Vec2, Vec3, Vec4};

use crate::frame::{CameraUniform, FrameContext, LightsUniform, MaterialUniform, ModelUniform, ShadowUniform};
use crate::render_target::{RenderTarget, TargetDesc, COLOR_FORMAT, DEPTH_FORMAT};
use crate::shader::{LinkOptions, ShaderKind, ShaderTable};
use crate::skybox::Skybox;
use crate::vertex::{GpuGeometry, Vertex};

/// Kinds a drawable can be rendered with; their per-object bind groups are
/// created once at upload.
const OBJECT_KINDS: [ShaderKind; 6] = [
    ShaderKind::Lit,
    ShaderKind::LitShadows,
    ShaderKind::LitSsao,
    ShaderKind::LitShadowsSsao,
    ShaderKind::Unlit,
    ShaderKind::ViewNormals,
];

const ARROW_SCALE: f32 = 0.3;
const GRID_COLOR: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.0);
const BOUNDS_COLOR: Vec4 = Vec4::new(1.0, 0.0, 1.0, 1.0);

/// One drawable on the GPU: geometry, model and material uniforms and a
/// group 1 bind group for every object kind.
pub struct GpuObject {
    pub name: String,
    geometry: GpuGeometry,
    model_buffer: wgpu::Buffer,
    _material_buffer: wgpu::Buffer,
    bind_groups: HashMap<ShaderKind, wgpu::BindGroup>,
}

impl GpuObject {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderTable,
        name: &str,
        geometry: &Geometry,
        transform: &DrawableTransform,
        material: &Material,
    ) -> Result<Self> {
        let model = ModelUniform::new(transform.model_matrix(), transform.normal_matrix());
        let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(name),
            contents: bytemuck::bytes_of(&model),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(name),
            contents: bytemuck::bytes_of(&MaterialUniform::from(material)),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut bind_groups = HashMap::new();
        for kind in OBJECT_KINDS {
            let variant = shaders.get(kind);
            if !variant.is_usable() {
                continue;
            }
            let bind_group = variant.create_bind_group(
                device,
                1,
                &[
                    ("model_data", model_buffer.as_entire_binding()),
                    ("material", material_buffer.as_entire_binding()),
                ],
            )?;
            bind_groups.insert(kind, bind_group);
        }

        Ok(Self {
            name: name.to_string(),
            geometry: GpuGeometry::upload(device, name, geometry),
            model_buffer,
            _material_buffer: material_buffer,
            bind_groups,
        })
    }

    pub fn set_transform(&self, queue: &wgpu::Queue, transform: &DrawableTransform) {
        let model = ModelUniform::new(transform.model_matrix(), transform.normal_matrix());
        queue.write_buffer(&self.model_buffer, 0, bytemuck::bytes_of(&model));
    }

    pub fn topology(&self) -> wgpu::PrimitiveTopology {
        self.geometry.topology()
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>, kind: ShaderKind) {
        if let Some(bind_group) = self.bind_groups.get(&kind) {
            pass.set_bind_group(1, bind_group, &[]);
            self.geometry.draw(pass);
        }
    }
}

/// Every drawable of a scene, uploaded.
pub struct GpuScene {
    objects: Vec<GpuObject>,
}

impl GpuScene {
    pub fn upload(device: &wgpu::Device, shaders: &ShaderTable, scene: &Scene) -> Result<Self> {
        let objects = scene
            .objects()
            .iter()
            .map(|o| GpuObject::new(device, shaders, &o.name, &o.geometry, &o.transform, &o.material))
            .collect::<Result<Vec<_>>>()?;
        log::info!("Uploaded scene '{}' ({} objects)", scene.name, objects.len());
        Ok(Self { objects })
    }

    pub fn objects(&self) -> &[GpuObject] {
        &self.objects
    }

    pub(crate) fn triangles(&self) -> impl Iterator<Item = &GpuObject> {
        self.objects
            .iter()
            .filter(|o| o.topology() == wgpu::PrimitiveTopology::TriangleList)
    }

    fn lines(&self) -> impl Iterator<Item = &GpuObject> {
        self.objects
            .iter()
            .filter(|o| o.topology() == wgpu::PrimitiveTopology::LineList)
    }
}

/// Light arrow, ground grid and scene bounding box.
struct Overlays {
    arrow: GpuObject,
    grid: GpuObject,
    bounding_box: Option<GpuObject>,
}

impl Overlays {
    fn new(device: &wgpu::Device, shaders: &ShaderTable) -> Result<Self> {
        let arrow = Mesh::arrow(0.3, 1.0, 0.5, 0.5, 16)?;
        let grid = Wire::grid(Vec2::splat(-5.0), Vec2::splat(5.0), 1.0);

        Ok(Self {
            arrow: GpuObject::new(
                device,
                shaders,
                "Light Arrow",
                &Geometry::Triangles(arrow.into()),
                &DrawableTransform::default(),
                &Material::PURE_WHITE,
            )?,
            grid: GpuObject::new(
                device,
                shaders,
                "Grid",
                &Geometry::Lines(grid.into()),
                &DrawableTransform::default(),
                &Material::flat(GRID_COLOR),
            )?,
            bounding_box: None,
        })
    }

    fn set_bounds(&mut self, device: &wgpu::Device, shaders: &ShaderTable, bounds: &SceneBounds) -> Result<()> {
        self.bounding_box = if bounds.is_empty() {
            None
        } else {
            let wire = Wire::new(bounds.edges().to_vec());
            Some(GpuObject::new(
                device,
                shaders,
                "Bounding Box",
                &Geometry::Lines(wire.into()),
                &DrawableTransform::default(),
                &Material::flat(BOUNDS_COLOR),
            )?)
        };
        Ok(())
    }
}

/// Arrow placement: at the light, pointing along its direction.
pub fn light_arrow_transform(position: Vec3, direction: Vec3) -> DrawableTransform {
    let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Z);
    let angle = Vec3::Z.dot(direction).clamp(-1.0, 1.0).acos();
    let axis = Vec3::Z.cross(direction);
    let axis = if axis.length_squared() < 1e-8 { Vec3::X } else { axis };
    DrawableTransform::new(position, angle, axis, Vec3::splat(ARROW_SCALE))
}

/// Textures the lit pass may read. `None` selects the variant without them.
#[derive(Default, Clone, Copy)]
pub struct LitInputs<'a> {
    pub shadow_map: Option<&'a wgpu::TextureView>,
    pub ao_map: Option<&'a wgpu::TextureView>,
}

pub struct GeometryPass {
    depth: RenderTarget,
    pipelines: HashMap<(ShaderKind, wgpu::PrimitiveTopology), wgpu::RenderPipeline>,
    camera_buffer: wgpu::Buffer,
    lights_buffer: wgpu::Buffer,
    shadow_buffer: wgpu::Buffer,
    overlays: Overlays,
}

impl GeometryPass {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderTable,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let depth_state = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };
        let vertex_buffers = [Vertex::desc()];

        let mut pipelines = HashMap::new();
        let mut link = |kind: ShaderKind, topology: wgpu::PrimitiveTopology, format: wgpu::TextureFormat, blend| {
            let options = LinkOptions {
                label: kind.name(),
                color_formats: &[format],
                blend,
                depth: Some(depth_state.clone()),
                topology,
                cull_mode: None,
                use_fragment: true,
                vertex_buffers: &vertex_buffers,
            };
            if let Some(pipeline) = shaders.get(kind).link(device, &options) {
                pipelines.insert((kind, topology), pipeline);
            }
        };

        let triangles = wgpu::PrimitiveTopology::TriangleList;
        let lines = wgpu::PrimitiveTopology::LineList;
        let replace = Some(wgpu::BlendState::REPLACE);
        for kind in [
            ShaderKind::Lit,
            ShaderKind::LitShadows,
            ShaderKind::LitSsao,
            ShaderKind::LitShadowsSsao,
        ] {
            link(kind, triangles, surface_format, replace);
        }
        link(ShaderKind::Unlit, triangles, surface_format, replace);
        link(ShaderKind::Unlit, lines, surface_format, replace);
        // Float targets are not blendable
        link(ShaderKind::ViewNormals, triangles, COLOR_FORMAT, None);

        let uniform = |label: &str, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Ok(Self {
            depth: RenderTarget::new(device, "Main Depth", TargetDesc::depth_only(width, height)),
            pipelines,
            camera_buffer: uniform("Camera Buffer", std::mem::size_of::<CameraUniform>()),
            lights_buffer: uniform("Lights Buffer", std::mem::size_of::<LightsUniform>()),
            shadow_buffer: uniform("Shadow Buffer", std::mem::size_of::<ShadowUniform>()),
            overlays: Overlays::new(device, shaders)?,
        })
    }

    pub fn resize_if_needed(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        if self.depth.matches(width, height) {
            return false;
        }
        self.depth.release();
        self.depth = RenderTarget::new(device, "Main Depth", TargetDesc::depth_only(width, height));
        true
    }

    /// Rebuild overlays that depend on the scene.
    pub fn set_scene_bounds(&mut self, device: &wgpu::Device, shaders: &ShaderTable, bounds: &SceneBounds) -> Result<()> {
        self.overlays.set_bounds(device, shaders, bounds)
    }

    /// Upload this frame's camera, light and shadow blocks.
    pub fn prepare(&self, queue: &wgpu::Queue, frame: &FrameContext) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&frame.camera_uniform()));
        queue.write_buffer(&self.lights_buffer, 0, bytemuck::bytes_of(&frame.lights_uniform()));
        queue.write_buffer(&self.shadow_buffer, 0, bytemuck::bytes_of(&frame.shadow_uniform()));

        let directional = &frame.params.lights.directional;
        let position = match &frame.light {
            Some(light) => light.position,
            None => {
                let bounds = frame.scene.bounds();
                let center = if bounds.is_empty() { Vec3::ZERO } else { bounds.center() };
                center - directional.direction.normalize_or_zero() * bounds.size() * 0.5
            }
        };
        self.overlays
            .arrow
            .set_transform(queue, &light_arrow_transform(position, directional.direction));
    }

    /// View-space normals into the working target's normals attachment, plus depth.
    pub fn render_view_normals(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        shaders: &ShaderTable,
        scene: &GpuScene,
        target: &RenderTarget,
        normals_attachment: usize,
    ) -> Result<bool> {
        let kind = ShaderKind::ViewNormals;
        let Some(pipeline) = self.pipelines.get(&(kind, wgpu::PrimitiveTopology::TriangleList)) else {
            return Ok(false);
        };
        let output = target.bind_for_write(&[normals_attachment], true)?;
        let camera = shaders
            .get(kind)
            .create_bind_group(device, 0, &[("camera", self.camera_buffer.as_entire_binding())])?;

        let mut pass = output.begin(encoder, "View Normals Pass");
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &camera, &[]);
        for object in scene.triangles() {
            object.draw(&mut pass, kind);
        }
        Ok(true)
    }

    /// Lit scene, skybox and overlays onto the surface.
    #[allow(clippy::too_many_arguments)]
    pub fn render_lit(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        shaders: &ShaderTable,
        frame: &FrameContext,
        scene: &GpuScene,
        surface_view: &wgpu::TextureView,
        inputs: LitInputs<'_>,
        skybox: &Skybox,
        clear_color: wgpu::Color,
    ) -> Result<()> {
        let lit_kind = ShaderKind::lit(inputs.shadow_map.is_some(), inputs.ao_map.is_some());
        let lit_variant = shaders.get(lit_kind);
        let unlit_variant = shaders.get(ShaderKind::Unlit);

        let frame_resources = [
            ("camera", self.camera_buffer.as_entire_binding()),
            ("lights", self.lights_buffer.as_entire_binding()),
            ("shadow_data", self.shadow_buffer.as_entire_binding()),
        ];
        let mut texture_resources = Vec::new();
        if let Some(view) = inputs.shadow_map {
            texture_resources.push(("shadow_map", wgpu::BindingResource::TextureView(view)));
        }
        if let Some(view) = inputs.ao_map {
            texture_resources.push(("ao_map", wgpu::BindingResource::TextureView(view)));
        }

        let lit_frame = lit_variant.create_bind_group(device, 0, &frame_resources)?;
        let lit_textures = if lit_variant.bind_group_layout(2).is_some() {
            Some(lit_variant.create_bind_group(device, 2, &texture_resources)?)
        } else {
            None
        };
        let unlit_frame = unlit_variant.create_bind_group(device, 0, &frame_resources)?;

        let depth_view = self.depth.depth_view()?;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Lit Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(pipeline) = self.pipelines.get(&(lit_kind, wgpu::PrimitiveTopology::TriangleList)) {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &lit_frame, &[]);
            if let Some(textures) = &lit_textures {
                pass.set_bind_group(2, textures, &[]);
            }
            for object in scene.triangles() {
                object.draw(&mut pass, lit_kind);
            }
        }

        let unlit_lines = self.pipelines.get(&(ShaderKind::Unlit, wgpu::PrimitiveTopology::LineList));
        if let Some(pipeline) = unlit_lines {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &unlit_frame, &[]);
            for object in scene.lines() {
                object.draw(&mut pass, ShaderKind::Unlit);
            }
        }

        skybox.draw(&mut pass);

        let debug = &frame.params.debug;
        if debug.lights {
            if let Some(pipeline) = self.pipelines.get(&(ShaderKind::Unlit, wgpu::PrimitiveTopology::TriangleList)) {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &unlit_frame, &[]);
                self.overlays.arrow.draw(&mut pass, ShaderKind::Unlit);
            }
        }
        if let Some(pipeline) = unlit_lines {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &unlit_frame, &[]);
            if debug.grid {
                self.overlays.grid.draw(&mut pass, ShaderKind::Unlit);
            }
            if debug.bounding_box {
                if let Some(bounding_box) = &self.overlays.bounding_box {
                    bounding_box.draw(&mut pass, ShaderKind::Unlit);
                }
            }
        }

        Ok(())
    }
}
