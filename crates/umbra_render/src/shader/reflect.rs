//! Resource reflection over validated naga modules.
//!
//! Every global with a `@group/@binding` becomes a [`ReflectedBinding`].
//! The two stages of a variant are merged by slot, so a uniform declared in
//! both stages gets one layout entry visible to both.

use naga::{AddressSpace, ImageClass, ImageDimension, ScalarKind, TypeInner};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReflectionError {
    #[error("binding @group({group}) @binding({binding}) has no name")]
    Unnamed { group: u32, binding: u32 },

    #[error("'{name}' at @group({group}) @binding({binding}) has an unsupported type")]
    Unsupported { name: String, group: u32, binding: u32 },

    #[error("stages disagree on @group({group}) @binding({binding}): '{first}' vs '{second}'")]
    Conflict {
        group: u32,
        binding: u32,
        first: String,
        second: String,
    },
}

/// The resource type behind a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Uniform,
    Storage { read_only: bool },
    Texture {
        sample_type: wgpu::TextureSampleType,
        view_dimension: wgpu::TextureViewDimension,
        multisampled: bool,
    },
    Sampler { comparison: bool },
}

impl BindingKind {
    pub fn binding_type(self) -> wgpu::BindingType {
        match self {
            BindingKind::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::Storage { read_only } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BindingKind::Texture {
                sample_type,
                view_dimension,
                multisampled,
            } => wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled,
            },
            BindingKind::Sampler { comparison: true } => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
            }
            BindingKind::Sampler { comparison: false } => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
            }
        }
    }
}

/// A named resource slot of an assembled shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
    pub visibility: wgpu::ShaderStages,
}

impl ReflectedBinding {
    pub fn layout_entry(&self) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding: self.binding,
            visibility: self.visibility,
            ty: self.kind.binding_type(),
            count: None,
        }
    }
}

/// Bound globals of one stage module, sorted by slot.
pub fn reflect(module: &naga::Module, stage: wgpu::ShaderStages) -> Result<Vec<ReflectedBinding>, ReflectionError> {
    let mut bindings = Vec::new();

    for (_, global) in module.global_variables.iter() {
        let Some(slot) = &global.binding else {
            continue;
        };
        let (group, binding) = (slot.group, slot.binding);
        let name = global
            .name
            .clone()
            .ok_or(ReflectionError::Unnamed { group, binding })?;

        let kind = match (global.space, &module.types[global.ty].inner) {
            (AddressSpace::Uniform, _) => Some(BindingKind::Uniform),
            (AddressSpace::Storage { access }, _) => Some(BindingKind::Storage {
                read_only: !access.contains(naga::StorageAccess::STORE),
            }),
            (AddressSpace::Handle, TypeInner::Image { dim, arrayed, class }) => texture_kind(*dim, *arrayed, *class),
            (AddressSpace::Handle, TypeInner::Sampler { comparison }) => Some(BindingKind::Sampler {
                comparison: *comparison,
            }),
            _ => None,
        }
        .ok_or_else(|| ReflectionError::Unsupported {
            name: name.clone(),
            group,
            binding,
        })?;

        bindings.push(ReflectedBinding {
            name,
            group,
            binding,
            kind,
            visibility: stage,
        });
    }

    bindings.sort_by_key(|b| (b.group, b.binding));
    Ok(bindings)
}

fn texture_kind(dim: ImageDimension, arrayed: bool, class: ImageClass) -> Option<BindingKind> {
    let view_dimension = match (dim, arrayed) {
        (ImageDimension::D1, false) => wgpu::TextureViewDimension::D1,
        (ImageDimension::D2, false) => wgpu::TextureViewDimension::D2,
        (ImageDimension::D2, true) => wgpu::TextureViewDimension::D2Array,
        (ImageDimension::D3, false) => wgpu::TextureViewDimension::D3,
        (ImageDimension::Cube, false) => wgpu::TextureViewDimension::Cube,
        (ImageDimension::Cube, true) => wgpu::TextureViewDimension::CubeArray,
        _ => return None,
    };

    let (sample_type, multisampled) = match class {
        ImageClass::Sampled { kind, multi } => {
            let sample_type = match kind {
                // Float textures are read with textureLoad, so unfilterable
                // formats like Rgba32Float can be bound
                ScalarKind::Float => wgpu::TextureSampleType::Float { filterable: false },
                ScalarKind::Uint => wgpu::TextureSampleType::Uint,
                ScalarKind::Sint => wgpu::TextureSampleType::Sint,
                _ => return None,
            };
            (sample_type, multi)
        }
        ImageClass::Depth { multi } => (wgpu::TextureSampleType::Depth, multi),
        ImageClass::Storage { .. } => return None,
    };

    Some(BindingKind::Texture {
        sample_type,
        view_dimension,
        multisampled,
    })
}

/// Merge the vertex and fragment bindings of one variant.
///
/// Slots present in both stages must name the same resource of the same kind.
pub fn merge(vertex: Vec<ReflectedBinding>, fragment: Vec<ReflectedBinding>) -> Result<Vec<ReflectedBinding>, ReflectionError> {
    let mut merged = vertex;

    for incoming in fragment {
        let existing = merged
            .iter_mut()
            .find(|b| b.group == incoming.group && b.binding == incoming.binding);
        match existing {
            Some(existing) if existing.name == incoming.name && existing.kind == incoming.kind => {
                existing.visibility |= incoming.visibility;
            }
            Some(existing) => {
                return Err(ReflectionError::Conflict {
                    group: incoming.group,
                    binding: incoming.binding,
                    first: existing.name.clone(),
                    second: incoming.name,
                });
            }
            None => merged.push(incoming),
        }
    }

    merged.sort_by_key(|b| (b.group, b.binding));
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> naga::Module {
        naga::front::wgsl::parse_str(source).unwrap()
    }

    #[test]
    fn test_reflects_uniform_and_textures() {
        let module = parse(
            "
            struct Params { value: vec4<f32> }
            @group(0) @binding(0) var<uniform> params: Params;
            @group(0) @binding(1) var depth_texture: texture_depth_2d;
            @group(1) @binding(0) var weights: texture_2d<u32>;
            @group(1) @binding(1) var sky: texture_cube<f32>;
            @group(1) @binding(2) var sky_sampler: sampler;
            ",
        );
        let bindings = reflect(&module, wgpu::ShaderStages::FRAGMENT).unwrap();

        assert_eq!(bindings.len(), 5);
        assert_eq!(bindings[0].name, "params");
        assert_eq!(bindings[0].kind, BindingKind::Uniform);
        assert!(matches!(
            bindings[1].kind,
            BindingKind::Texture { sample_type: wgpu::TextureSampleType::Depth, .. }
        ));
        assert!(matches!(
            bindings[2].kind,
            BindingKind::Texture { sample_type: wgpu::TextureSampleType::Uint, .. }
        ));
        assert!(matches!(
            bindings[3].kind,
            BindingKind::Texture { view_dimension: wgpu::TextureViewDimension::Cube, .. }
        ));
        assert_eq!(bindings[4].kind, BindingKind::Sampler { comparison: false });
    }

    #[test]
    fn test_merge_ors_visibility() {
        let source = "
            struct Params { value: vec4<f32> }
            @group(0) @binding(2) var<uniform> shadow_data: Params;
        ";
        let vertex = reflect(&parse(source), wgpu::ShaderStages::VERTEX).unwrap();
        let fragment = reflect(&parse(source), wgpu::ShaderStages::FRAGMENT).unwrap();
        let merged = merge(vertex, fragment).unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].visibility, wgpu::ShaderStages::VERTEX_FRAGMENT);
    }

    #[test]
    fn test_merge_conflict() {
        let vertex = reflect(
            &parse("struct A { v: vec4<f32> }\n@group(0) @binding(0) var<uniform> camera: A;"),
            wgpu::ShaderStages::VERTEX,
        )
        .unwrap();
        let fragment = reflect(
            &parse("struct B { v: vec4<f32> }\n@group(0) @binding(0) var<uniform> lights: B;"),
            wgpu::ShaderStages::FRAGMENT,
        )
        .unwrap();

        assert!(matches!(merge(vertex, fragment), Err(ReflectionError::Conflict { .. })));
    }
}
