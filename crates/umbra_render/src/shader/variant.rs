//! Assembled, validated and linked shader variants.
//!
//! A variant that fails anywhere between assembly and module creation is
//! kept in the table but marked unusable; passes check [`ShaderVariant::is_usable`]
//! before drawing with it and skip the draw otherwise.

use thiserror::Error;

use super::assemble::{assemble, AssemblyError};
use super::library::{FragmentLibrary, Stage};
use super::reflect::{merge, reflect, ReflectedBinding, ReflectionError};
use super::ShaderKind;

#[derive(Error, Debug)]
pub enum VariantError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("{stage} stage failed to compile:\n{diagnostics}")]
    Compile { stage: &'static str, diagnostics: String },

    #[error(transparent)]
    Reflection(#[from] ReflectionError),
}

#[derive(Error, Debug)]
pub enum BindError {
    #[error("shader variant {0} is not usable")]
    Unusable(&'static str),

    #[error("shader variant {kind} has no bind group {group}")]
    NoSuchGroup { kind: &'static str, group: u32 },

    #[error("shader variant {kind} needs a resource named '{name}'")]
    MissingResource { kind: &'static str, name: String },
}

/// Assembled WGSL of both stages, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSources {
    pub vertex: String,
    pub fragment: String,
}

/// Assembles and checks variant sources without touching the GPU.
pub struct ShaderVariantBuilder<'a> {
    library: &'a FragmentLibrary,
}

impl<'a> ShaderVariantBuilder<'a> {
    pub fn new(library: &'a FragmentLibrary) -> Self {
        Self { library }
    }

    /// Splice the kind's fragments into its family templates.
    pub fn assemble(&self, kind: ShaderKind) -> Result<VariantSources, AssemblyError> {
        let family = kind.family();
        let vertex = assemble(
            FragmentLibrary::template(family, Stage::Vertex),
            kind.vertex_fragments(),
            &self.library.set(family, Stage::Vertex),
        )?;
        let fragment = assemble(
            FragmentLibrary::template(family, Stage::Fragment),
            kind.fragment_fragments(),
            &self.library.set(family, Stage::Fragment),
        )?;
        Ok(VariantSources { vertex, fragment })
    }

    /// Assemble, validate both stages with naga and reflect their resources.
    pub fn check(&self, kind: ShaderKind) -> Result<(VariantSources, Vec<ReflectedBinding>), VariantError> {
        let sources = self.assemble(kind)?;
        let vertex = compile_stage("vertex", &sources.vertex)?;
        let fragment = compile_stage("fragment", &sources.fragment)?;
        let bindings = merge(
            reflect(&vertex, wgpu::ShaderStages::VERTEX)?,
            reflect(&fragment, wgpu::ShaderStages::FRAGMENT)?,
        )?;
        Ok((sources, bindings))
    }
}

fn compile_stage(stage: &'static str, source: &str) -> Result<naga::Module, VariantError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| VariantError::Compile {
        stage,
        diagnostics: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::empty())
        .validate(&module)
        .map_err(|e| VariantError::Compile {
            stage,
            diagnostics: e.emit_to_string(source),
        })?;

    Ok(module)
}

/// Pipeline state a pass supplies when linking a variant.
pub struct LinkOptions<'a> {
    pub label: &'a str,
    pub color_formats: &'a [wgpu::TextureFormat],
    pub blend: Option<wgpu::BlendState>,
    pub depth: Option<wgpu::DepthStencilState>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    /// Depth-only draws run the vertex stage alone
    pub use_fragment: bool,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
}

struct Linked {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
}

/// One shader program with its reflected resource slots.
pub struct ShaderVariant {
    kind: ShaderKind,
    sources: Option<VariantSources>,
    bindings: Vec<ReflectedBinding>,
    linked: Option<Linked>,
}

impl ShaderVariant {
    /// Build a variant. Failures are logged and leave the variant unusable.
    pub fn build(device: &wgpu::Device, library: &FragmentLibrary, kind: ShaderKind) -> Self {
        let (sources, bindings) = match ShaderVariantBuilder::new(library).check(kind) {
            Ok(checked) => checked,
            Err(e) => {
                log::error!("Shader {}: {}", kind.name(), e);
                return Self {
                    kind,
                    sources: None,
                    bindings: Vec::new(),
                    linked: None,
                };
            }
        };

        let linked = create_modules(device, kind, &sources, &bindings);
        if linked.is_some() {
            log::debug!("Shader {} ready ({} bindings)", kind.name(), bindings.len());
        }

        Self {
            kind,
            sources: Some(sources),
            bindings,
            linked,
        }
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn is_usable(&self) -> bool {
        self.linked.is_some()
    }

    pub fn sources(&self) -> Option<&VariantSources> {
        self.sources.as_ref()
    }

    pub fn bindings(&self) -> &[ReflectedBinding] {
        &self.bindings
    }

    /// Resolve a resource slot by the name used in the shader source.
    pub fn binding(&self, name: &str) -> Option<&ReflectedBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn bind_group_layout(&self, group: u32) -> Option<&wgpu::BindGroupLayout> {
        self.linked.as_ref()?.layouts.get(group as usize)
    }

    /// Bind group for `group`, taking each declared slot from `resources` by name.
    ///
    /// Resources the variant does not declare are ignored, so one resource
    /// list can serve every variant of a family.
    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        group: u32,
        resources: &[(&str, wgpu::BindingResource<'_>)],
    ) -> Result<wgpu::BindGroup, BindError> {
        let layout = match &self.linked {
            Some(linked) => linked.layouts.get(group as usize).ok_or(BindError::NoSuchGroup {
                kind: self.kind.name(),
                group,
            })?,
            None => return Err(BindError::Unusable(self.kind.name())),
        };

        let entries = self
            .bindings
            .iter()
            .filter(|b| b.group == group)
            .map(|b| {
                resources
                    .iter()
                    .find(|(name, _)| *name == b.name)
                    .map(|(_, resource)| wgpu::BindGroupEntry {
                        binding: b.binding,
                        resource: resource.clone(),
                    })
                    .ok_or_else(|| BindError::MissingResource {
                        kind: self.kind.name(),
                        name: b.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.kind.name()),
            layout,
            entries: &entries,
        }))
    }

    /// Create a render pipeline for this variant. Returns `None` (after
    /// logging) when the variant is unusable or wgpu rejects the pipeline.
    pub fn link(&self, device: &wgpu::Device, options: &LinkOptions) -> Option<wgpu::RenderPipeline> {
        let linked = self.linked.as_ref()?;

        let targets: Vec<Option<wgpu::ColorTargetState>> = options
            .color_formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: options.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(options.label),
            layout: Some(&linked.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &linked.vertex,
                entry_point: "vs_main",
                buffers: options.vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: options.use_fragment.then(|| wgpu::FragmentState {
                module: &linked.fragment,
                entry_point: "fs_main",
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: options.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: options.cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: options.depth.clone(),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(e) => {
                log::error!("Failed to link {} for {}: {}", self.kind.name(), options.label, e);
                None
            }
            None => Some(pipeline),
        }
    }
}

fn create_modules(
    device: &wgpu::Device,
    kind: ShaderKind,
    sources: &VariantSources,
    bindings: &[ReflectedBinding],
) -> Option<Linked> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(kind.name()),
        source: wgpu::ShaderSource::Wgsl(sources.vertex.as_str().into()),
    });
    let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(kind.name()),
        source: wgpu::ShaderSource::Wgsl(sources.fragment.as_str().into()),
    });

    // Unused group indices below the highest one still need a layout
    let group_count = bindings.iter().map(|b| b.group + 1).max().unwrap_or(0);
    let layouts: Vec<wgpu::BindGroupLayout> = (0..group_count)
        .map(|group| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
                .iter()
                .filter(|b| b.group == group)
                .map(ReflectedBinding::layout_entry)
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(kind.name()),
                entries: &entries,
            })
        })
        .collect();

    let layout_refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(kind.name()),
        bind_group_layouts: &layout_refs,
        push_constant_ranges: &[],
    });

    if let Some(e) = pollster::block_on(device.pop_error_scope()) {
        log::error!("Shader {} was rejected by the device: {}", kind.name(), e);
        return None;
    }

    Some(Linked {
        vertex,
        fragment,
        layouts,
        pipeline_layout,
    })
}

/// Every shader kind, indexed by the kind itself.
pub struct ShaderTable {
    variants: [ShaderVariant; ShaderKind::COUNT],
}

impl ShaderTable {
    pub fn build(device: &wgpu::Device, library: &FragmentLibrary) -> Self {
        let variants = ShaderKind::ALL.map(|kind| ShaderVariant::build(device, library, kind));
        let usable = variants.iter().filter(|v| v.is_usable()).count();
        log::info!("Built {}/{} shader variants", usable, ShaderKind::COUNT);
        Self { variants }
    }

    pub fn get(&self, kind: ShaderKind) -> &ShaderVariant {
        &self.variants[kind as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::library::{Fragment, ShaderFamily};
    use crate::shader::BindingKind;

    #[test]
    fn test_every_kind_validates() {
        let library = FragmentLibrary::standard();
        let builder = ShaderVariantBuilder::new(&library);
        for kind in ShaderKind::ALL {
            if let Err(e) = builder.check(kind) {
                panic!("{} failed: {}", kind.name(), e);
            }
        }
    }

    #[test]
    fn test_lit_shadows_bindings() {
        let library = FragmentLibrary::standard();
        let (_, bindings) = ShaderVariantBuilder::new(&library).check(ShaderKind::LitShadowsSsao).unwrap();
        let find = |name: &str| bindings.iter().find(|b| b.name == name).unwrap();

        let shadow_data = find("shadow_data");
        assert_eq!((shadow_data.group, shadow_data.binding), (0, 2));
        assert_eq!(shadow_data.visibility, wgpu::ShaderStages::VERTEX_FRAGMENT);

        assert!(matches!(
            find("shadow_map").kind,
            BindingKind::Texture { sample_type: wgpu::TextureSampleType::Depth, .. }
        ));
        assert_eq!(find("ao_map").binding, 1);
        assert_eq!(find("material").group, 1);
    }

    #[test]
    fn test_unlit_has_no_lights() {
        let library = FragmentLibrary::standard();
        let (sources, bindings) = ShaderVariantBuilder::new(&library).check(ShaderKind::Unlit).unwrap();

        assert!(bindings.iter().all(|b| b.name != "lights"));
        assert!(!sources.fragment.contains("pcss"));
    }

    #[test]
    fn test_gaussian_blur_bindings() {
        let library = FragmentLibrary::standard();
        let (_, bindings) = ShaderVariantBuilder::new(&library).check(ShaderKind::GaussianBlur).unwrap();
        let names: Vec<&str> = bindings.iter().map(|b| b.name.as_str()).collect();

        assert_eq!(names, vec!["ao_params", "source_texture", "blur_weights", "blur_pass"]);
    }

    #[test]
    fn test_broken_fragment_reports_compile_error() {
        let mut library = FragmentLibrary::standard();
        library.insert(
            ShaderFamily::Geometry,
            Stage::Fragment,
            "UNLIT_MAT",
            Fragment::new("", "final_color = not_a_variable;"),
        );
        let result = ShaderVariantBuilder::new(&library).check(ShaderKind::Unlit);

        assert!(matches!(result, Err(VariantError::Compile { stage: "fragment", .. })));
    }

    #[test]
    fn test_missing_fragment_reports_assembly_error() {
        let library = FragmentLibrary::new();
        let result = ShaderVariantBuilder::new(&library).check(ShaderKind::Lit);

        assert!(matches!(
            result,
            Err(VariantError::Assembly(AssemblyError::UnknownFragment(_)))
        ));
    }
}
