//! Fragment library: the WGSL pieces spliced into the stage templates.
//!
//! Each fragment has a declaration part (replaces `//[DEFS_NAME]`) and a
//! computation part (replaces `//[CALC_NAME]`). Either part may be empty.

use std::collections::HashMap;

/// Template family a shader kind is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderFamily {
    /// Mesh draws: lit, unlit, normals pre-pass
    Geometry,
    /// Fullscreen passes of the AO pipeline
    PostProcessing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

/// One named piece of shader source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fragment {
    pub declarations: &'static str,
    pub computation: &'static str,
}

impl Fragment {
    pub const fn new(declarations: &'static str, computation: &'static str) -> Self {
        Self {
            declarations,
            computation,
        }
    }
}

/// Fragments available to one stage of one family.
pub type FragmentSet = HashMap<&'static str, Fragment>;

#[derive(Debug, Clone, Default)]
pub struct FragmentLibrary {
    sets: HashMap<(ShaderFamily, Stage), FragmentSet>,
}

impl FragmentLibrary {
    /// Empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fragment the renderer's shader kinds reference.
    pub fn standard() -> Self {
        let mut library = Self::new();

        library.insert(ShaderFamily::Geometry, Stage::Vertex, "SHADOWS", Fragment::new(SHADOW_UNIFORM, VERT_CALC_SHADOWS));

        library.insert(ShaderFamily::Geometry, Stage::Fragment, "MATERIAL", Fragment::new(DEFS_MATERIAL, ""));
        library.insert(ShaderFamily::Geometry, Stage::Fragment, "LIGHTS", Fragment::new(DEFS_LIGHTS, ""));
        library.insert(ShaderFamily::Geometry, Stage::Fragment, "SHADOWS", Fragment::new(DEFS_SHADOWS, CALC_SHADOWS));
        library.insert(ShaderFamily::Geometry, Stage::Fragment, "LIT_MAT", Fragment::new("", CALC_LIT_MAT));
        library.insert(ShaderFamily::Geometry, Stage::Fragment, "SSAO", Fragment::new(DEFS_AO_MAP, CALC_AO_MAP));
        library.insert(ShaderFamily::Geometry, Stage::Fragment, "UNLIT_MAT", Fragment::new("", CALC_UNLIT_MAT));
        library.insert(ShaderFamily::Geometry, Stage::Fragment, "NORMALS", Fragment::new("", CALC_VIEW_NORMALS));

        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "DEPTH", Fragment::new(DEFS_DEPTH, ""));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "POSITIONS", Fragment::new("", CALC_POSITIONS));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "SOURCE", Fragment::new(DEFS_SOURCE, ""));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "NORMALS", Fragment::new(DEFS_NORMALS, ""));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "NOISE", Fragment::new(DEFS_NOISE, ""));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "WEIGHTS", Fragment::new(DEFS_WEIGHTS, ""));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "SSAO", Fragment::new("", CALC_SSAO));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "HBAO", Fragment::new(DEFS_HBAO, CALC_HBAO));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "BLUR", Fragment::new("", CALC_BLUR));
        library.insert(ShaderFamily::PostProcessing, Stage::Fragment, "GAUSSIAN_BLUR", Fragment::new("", CALC_GAUSSIAN_BLUR));

        library
    }

    pub fn insert(&mut self, family: ShaderFamily, stage: Stage, name: &'static str, fragment: Fragment) {
        self.sets.entry((family, stage)).or_default().insert(name, fragment);
    }

    pub fn get(&self, family: ShaderFamily, stage: Stage, name: &str) -> Option<&Fragment> {
        self.sets.get(&(family, stage)).and_then(|set| set.get(name))
    }

    /// Fragments of one stage; empty when none were registered.
    pub fn set(&self, family: ShaderFamily, stage: Stage) -> FragmentSet {
        self.sets.get(&(family, stage)).cloned().unwrap_or_default()
    }

    /// Stage template for a family.
    pub fn template(family: ShaderFamily, stage: Stage) -> &'static str {
        match (family, stage) {
            (ShaderFamily::Geometry, Stage::Vertex) => include_str!("../shaders/geometry.vert.wgsl"),
            (ShaderFamily::Geometry, Stage::Fragment) => include_str!("../shaders/geometry.frag.wgsl"),
            (ShaderFamily::PostProcessing, Stage::Vertex) => include_str!("../shaders/post.vert.wgsl"),
            (ShaderFamily::PostProcessing, Stage::Fragment) => include_str!("../shaders/post.frag.wgsl"),
        }
    }
}

// Geometry family

const SHADOW_UNIFORM: &str = r#"
struct ShadowUniform {
    light_space: mat4x4<f32>,
    // bias, slope bias, softness, camera near
    params: vec4<f32>,
}

@group(0) @binding(2) var<uniform> shadow_data: ShadowUniform;
"#;

const VERT_CALC_SHADOWS: &str = r#"
    out.light_space_pos = shadow_data.light_space * world;
"#;

const DEFS_MATERIAL: &str = r#"
struct MaterialUniform {
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    // shininess
    params: vec4<f32>,
}

@group(1) @binding(1) var<uniform> material: MaterialUniform;
"#;

const DEFS_LIGHTS: &str = r#"
struct LightsUniform {
    ambient: vec4<f32>,
    light_direction: vec4<f32>,
    light_diffuse: vec4<f32>,
    light_specular: vec4<f32>,
    eye_world_pos: vec4<f32>,
    // strength
    ao: vec4<f32>,
}

@group(0) @binding(1) var<uniform> lights: LightsUniform;
"#;

const DEFS_SHADOWS: &str = r#"
struct ShadowUniform {
    light_space: mat4x4<f32>,
    // bias, slope bias, softness, camera near
    params: vec4<f32>,
}

@group(0) @binding(2) var<uniform> shadow_data: ShadowUniform;
@group(2) @binding(0) var shadow_map: texture_depth_2d;

var<private> poisson_disk: array<vec2<f32>, 16> = array<vec2<f32>, 16>(
    vec2<f32>(-0.94201624, -0.39906216),
    vec2<f32>(0.94558609, -0.76890725),
    vec2<f32>(-0.09418410, -0.92938870),
    vec2<f32>(0.34495938, 0.29387760),
    vec2<f32>(-0.91588581, 0.45771432),
    vec2<f32>(-0.81544232, -0.87912464),
    vec2<f32>(-0.38277543, 0.27676845),
    vec2<f32>(0.97484398, 0.75648379),
    vec2<f32>(0.44323325, -0.97511554),
    vec2<f32>(0.53742981, -0.47373420),
    vec2<f32>(-0.26496911, -0.41893023),
    vec2<f32>(0.79197514, 0.19090188),
    vec2<f32>(-0.24188840, 0.99706507),
    vec2<f32>(-0.81409955, 0.91437590),
    vec2<f32>(0.19984126, 0.78641367),
    vec2<f32>(0.14383161, -0.14100790)
);

fn shadow_depth(uv: vec2<f32>) -> f32 {
    let dims = vec2<i32>(textureDimensions(shadow_map));
    let texel = clamp(vec2<i32>(floor(uv * vec2<f32>(dims))), vec2<i32>(0), dims - vec2<i32>(1));
    return textureLoad(shadow_map, texel, 0);
}

// Average depth of the occluders around uv; y holds the blocker count
fn find_blockers(uv: vec2<f32>, receiver: f32, bias: f32) -> vec2<f32> {
    let softness = shadow_data.params.z;
    let near = shadow_data.params.w;
    let search_width = softness * (receiver - near) / receiver;

    var depth_sum = 0.0;
    var count = 0.0;
    for (var i = 0u; i < 16u; i = i + 1u) {
        let depth = shadow_depth(uv + poisson_disk[i] * search_width);
        if (depth < receiver - bias) {
            depth_sum = depth_sum + depth;
            count = count + 1.0;
        }
    }
    return vec2<f32>(depth_sum, count);
}

// Percentage-closer soft shadows: 1 is fully lit
fn pcss(light_space_pos: vec4<f32>, n_dot_l: f32) -> f32 {
    let ndc = light_space_pos.xyz / light_space_pos.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    let receiver = max(ndc.z, 0.0001);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }

    let bias = max(shadow_data.params.x, shadow_data.params.y * (1.0 - abs(n_dot_l)));
    let blockers = find_blockers(uv, receiver, bias);
    if (blockers.y < 1.0) {
        return 1.0;
    }

    let blocker_depth = max(blockers.x / blockers.y, 0.0001);
    let penumbra = (receiver - blocker_depth) / blocker_depth;
    let uv_radius = penumbra * shadow_data.params.z * shadow_data.params.w / receiver;

    var lit = 0.0;
    for (var i = 0u; i < 16u; i = i + 1u) {
        if (shadow_depth(uv + poisson_disk[i] * uv_radius) >= receiver - bias) {
            lit = lit + 1.0;
        }
    }
    return lit / 16.0;
}
"#;

const CALC_SHADOWS: &str = r#"
    let shadow_normal = normalize(in.normal);
    let shadow_light = normalize(-lights.light_direction.xyz);
    shadow = pcss(in.light_space_pos, dot(shadow_normal, shadow_light));
"#;

const CALC_LIT_MAT: &str = r#"
    let n = normalize(in.normal);
    let l = normalize(-lights.light_direction.xyz);
    let v = normalize(lights.eye_world_pos.xyz - in.world_position);
    let base = material.diffuse.rgb;

    ambient = lights.ambient.rgb * lights.ambient.a * base;

    let n_dot_l = max(dot(n, l), 0.0);
    let diffuse = lights.light_diffuse.rgb * lights.light_diffuse.a * n_dot_l * base;
    var specular = vec3<f32>(0.0);
    if (n_dot_l > 0.0) {
        let r = reflect(-l, n);
        let highlight = pow(max(dot(r, v), 0.0), material.params.x);
        specular = lights.light_specular.rgb * lights.light_specular.a * material.specular.rgb * highlight;
    }

    directional = (diffuse + specular) * shadow;
    final_color.a = material.diffuse.a;
"#;

const DEFS_AO_MAP: &str = r#"
@group(2) @binding(1) var ao_map: texture_2d<f32>;
"#;

const CALC_AO_MAP: &str = r#"
    let ao_dims = vec2<i32>(textureDimensions(ao_map));
    let ao_coord = clamp(vec2<i32>(floor(in.clip_position.xy)), vec2<i32>(0), ao_dims - vec2<i32>(1));
    let ao_fac = (1.0 - textureLoad(ao_map, ao_coord, 0).r) * lights.ao.x;
    ambient = ambient * (1.0 - ao_fac);
"#;

const CALC_UNLIT_MAT: &str = r#"
    final_color = material.diffuse;
"#;

const CALC_VIEW_NORMALS: &str = r#"
    final_color = vec4<f32>(normalize(in.view_normal), 1.0);
"#;

// Post-processing family

const DEFS_DEPTH: &str = r#"
@group(0) @binding(1) var depth_texture: texture_depth_2d;

fn linear_depth(depth: f32) -> f32 {
    let near = ao_params.settings.y;
    let far = ao_params.settings.z;
    if (ao_params.proj[3][3] > 0.5) {
        return near + depth * (far - near);
    }
    return near * far / (far - depth * (far - near));
}

fn view_position(coord: vec2<i32>, depth: f32) -> vec3<f32> {
    let uv = (vec2<f32>(coord) + vec2<f32>(0.5)) * ao_params.screen.zw;
    let ndc = vec2<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
    let lin = linear_depth(depth);
    if (ao_params.proj[3][3] > 0.5) {
        let x = (ndc.x - ao_params.proj[3][0]) / ao_params.proj[0][0];
        let y = (ndc.y - ao_params.proj[3][1]) / ao_params.proj[1][1];
        return vec3<f32>(x, y, -lin);
    }
    return vec3<f32>(ndc.x * lin / ao_params.proj[0][0], ndc.y * lin / ao_params.proj[1][1], -lin);
}
"#;

const CALC_POSITIONS: &str = r#"
    let depth = textureLoad(depth_texture, clamp_coord(coord), 0);
    result = vec4<f32>(view_position(coord, depth), 1.0);
"#;

const DEFS_SOURCE: &str = r#"
@group(0) @binding(2) var source_texture: texture_2d<f32>;

fn load_source(coord: vec2<i32>) -> vec4<f32> {
    return textureLoad(source_texture, clamp_coord(coord), 0);
}

fn project_to_coord(view_pos: vec3<f32>) -> vec2<i32> {
    let clip = ao_params.proj * vec4<f32>(view_pos, 1.0);
    let ndc = clip.xy / clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    return vec2<i32>(floor(uv * ao_params.screen.xy));
}

fn is_background(p: vec3<f32>) -> bool {
    return -p.z >= ao_params.settings.z - 0.001;
}
"#;

const DEFS_NORMALS: &str = r#"
@group(0) @binding(3) var view_normals: texture_2d<f32>;

// Normal from neighboring positions, taking the flatter side on each axis
fn reconstruct_normal(coord: vec2<i32>, p: vec3<f32>) -> vec3<f32> {
    let right = load_source(coord + vec2<i32>(1, 0)).xyz - p;
    let left = p - load_source(coord - vec2<i32>(1, 0)).xyz;
    let down = load_source(coord + vec2<i32>(0, 1)).xyz - p;
    let up = p - load_source(coord - vec2<i32>(0, 1)).xyz;

    let dx = select(left, right, abs(right.z) < abs(left.z));
    let dy = select(up, down, abs(down.z) < abs(up.z));
    let n = cross(dy, dx);
    if (dot(n, n) < 1e-12) {
        return vec3<f32>(0.0, 0.0, 1.0);
    }
    return normalize(n);
}

fn surface_normal(coord: vec2<i32>, p: vec3<f32>) -> vec3<f32> {
    if (ao_params.counts.w == 1u) {
        let n = textureLoad(view_normals, clamp_coord(coord), 0).xyz;
        if (dot(n, n) > 0.0001) {
            return normalize(n);
        }
    }
    return reconstruct_normal(coord, p);
}
"#;

const DEFS_NOISE: &str = r#"
@group(0) @binding(4) var noise_texture: texture_2d<f32>;

fn load_noise(coord: vec2<i32>) -> vec4<f32> {
    let size = vec2<i32>(textureDimensions(noise_texture));
    let wrapped = ((coord % size) + size) % size;
    return textureLoad(noise_texture, wrapped, 0);
}

// Tangent frame around n, rotated by the noise vector
fn tangent_frame(n: vec3<f32>, rotation: vec3<f32>) -> mat3x3<f32> {
    var tangent = rotation - n * dot(rotation, n);
    if (dot(tangent, tangent) < 1e-6) {
        let axis = select(vec3<f32>(1.0, 0.0, 0.0), vec3<f32>(0.0, 1.0, 0.0), abs(n.x) > 0.9);
        tangent = axis - n * dot(axis, n);
    }
    tangent = normalize(tangent);
    let bitangent = cross(n, tangent);
    return mat3x3<f32>(tangent, bitangent, n);
}
"#;

const DEFS_WEIGHTS: &str = r#"
@group(0) @binding(5) var blur_weights: texture_2d<u32>;

struct BlurPass {
    // texel step, (1, 0) horizontal or (0, 1) vertical
    direction: vec4<f32>,
}

@group(0) @binding(6) var<uniform> blur_pass: BlurPass;
"#;

const CALC_SSAO: &str = r#"
    let p = load_source(coord).xyz;
    if (is_background(p)) {
        result = vec4<f32>(1.0);
    } else {
        let n = surface_normal(coord, p);
        let tbn = tangent_frame(n, load_noise(coord).xyz);
        let radius = ao_params.settings.x;
        let count = clamp(ao_params.counts.x, 1u, 64u);

        var occlusion = 0.0;
        for (var k = 0u; k < count; k = k + 1u) {
            let sample_pos = p + (tbn * ao_params.kernel[k].xyz) * radius;
            let scene_z = load_source(project_to_coord(sample_pos)).z;
            let delta = sample_pos.z - scene_z;
            if (delta < 0.0) {
                occlusion = occlusion + smoothstep(0.0, 1.0, 1.0 - abs(delta) / radius);
            }
        }
        result = vec4<f32>(vec3<f32>(1.0 - occlusion / f32(count)), 1.0);
    }
"#;

const DEFS_HBAO: &str = r#"
const PI: f32 = 3.14159265358979;

// Horizon angle gained along one direction, attenuated by distance
fn horizon_occlusion(p: vec3<f32>, direction: vec3<f32>, jitter: f32) -> f32 {
    let radius = ao_params.settings.x;
    let steps = clamp(ao_params.counts.y, 1u, 64u);
    let t = atan2(direction.z, length(direction.xy));
    let increment = radius / f32(steps) * (1.0 + 0.2 * jitter);
    let bias = PI / 6.0;
    let slope_bias = bias * (3.0 * t) / PI;

    var m = t;
    var max_len = 0.0;
    for (var i = 1u; i <= steps; i = i + 1u) {
        let sample_pos = p + direction * increment * f32(i);
        let d = load_source(project_to_coord(sample_pos)).xyz - p;
        let l = length(d);
        if (l > radius || l < 0.001) {
            continue;
        }
        let h = atan2(d.z, length(d.xy));
        if (h > m + bias + slope_bias) {
            m = h;
            max_len = l;
        }
    }

    let x = max_len / radius;
    return (sin(m) - sin(t)) * max(0.0, 1.0 - x * x);
}
"#;

const CALC_HBAO: &str = r#"
    let p = load_source(coord).xyz;
    if (is_background(p)) {
        result = vec4<f32>(1.0);
    } else {
        let n = surface_normal(coord, p);
        let tbn = tangent_frame(n, load_noise(coord).xyz);
        let count = clamp(ao_params.counts.x, 1u, 64u);
        let increment = 2.0 * PI / f32(count);

        var occlusion = 0.0;
        for (var k = 0u; k < count; k = k + 1u) {
            let angle = increment * f32(k);
            let direction = tbn * vec3<f32>(cos(angle), sin(angle), 0.0);
            let jitter = load_noise(coord + vec2<i32>(i32(k), 0)).x;
            occlusion = occlusion + horizon_occlusion(p, direction, jitter);
        }
        result = vec4<f32>(vec3<f32>(1.0 - occlusion / f32(count)), 1.0);
    }
"#;

const CALC_BLUR: &str = r#"
    let size = i32(min(ao_params.counts.z, 15u));
    var acc = vec4<f32>(0.0);
    for (var u = -size; u <= size; u = u + 1) {
        for (var v = -size; v <= size; v = v + 1) {
            acc = acc + load_source(coord + vec2<i32>(u, v));
        }
    }
    let side = f32(2 * size + 1);
    result = acc / (side * side);
"#;

const CALC_GAUSSIAN_BLUR: &str = r#"
    let blur_radius = i32(min(ao_params.counts.z, 15u));
    let stride = vec2<i32>(blur_pass.direction.xy);
    var acc = vec4<f32>(0.0);
    var total = 0.0;
    for (var i = -blur_radius; i <= blur_radius; i = i + 1) {
        let weight = f32(textureLoad(blur_weights, vec2<i32>(abs(i), blur_radius), 0).r);
        acc = acc + load_source(coord + stride * i) * weight;
        total = total + weight;
    }
    result = acc / max(total, 1.0);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderKind;

    #[test]
    fn test_every_kind_resolves_its_fragments() {
        let library = FragmentLibrary::standard();
        for kind in ShaderKind::ALL {
            for name in kind.vertex_fragments() {
                assert!(library.get(kind.family(), Stage::Vertex, name).is_some(), "{:?} {}", kind, name);
            }
            for name in kind.fragment_fragments() {
                assert!(library.get(kind.family(), Stage::Fragment, name).is_some(), "{:?} {}", kind, name);
            }
        }
    }

    #[test]
    fn test_templates_carry_sentinels() {
        let template = FragmentLibrary::template(ShaderFamily::PostProcessing, Stage::Fragment);
        assert!(template.contains("//[CALC_SSAO]"));
        assert!(template.contains("//[DEFS_SOURCE]"));
        assert!(FragmentLibrary::template(ShaderFamily::Geometry, Stage::Vertex).contains("//[CALC_SHADOWS]"));
    }

    #[test]
    fn test_empty_library_set() {
        let library = FragmentLibrary::new();
        assert!(library.set(ShaderFamily::Geometry, Stage::Vertex).is_empty());
    }
}
