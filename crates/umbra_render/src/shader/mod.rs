//! Shader variants built from composable WGSL fragments.
//!
//! Every program the renderer uses is one [`ShaderKind`]. A kind names a
//! template family (geometry or post-processing) and the fragments spliced
//! into each stage's `//[NAME]` sentinels. Assembled sources are validated
//! with naga and reflected into explicit bind group layouts, so passes bind
//! resources by uniform name instead of hard-coded slots.

pub mod assemble;
pub mod library;
pub mod reflect;
pub mod variant;

pub use assemble::{assemble, normalize_whitespace, AssemblyError};
pub use library::{Fragment, FragmentLibrary, FragmentSet, ShaderFamily, Stage};
pub use reflect::{BindingKind, ReflectedBinding, ReflectionError};
pub use variant::{
    BindError, LinkOptions, ShaderTable, ShaderVariant, ShaderVariantBuilder, VariantError,
    VariantSources,
};

use umbra_core::AoAlgorithm;

/// The closed set of shader programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Lit,
    LitShadows,
    LitSsao,
    LitShadowsSsao,
    Unlit,
    ViewNormals,
    PositionReconstruct,
    Ssao,
    Hbao,
    BoxBlur,
    GaussianBlur,
}

impl ShaderKind {
    pub const COUNT: usize = 11;

    pub const ALL: [ShaderKind; Self::COUNT] = [
        ShaderKind::Lit,
        ShaderKind::LitShadows,
        ShaderKind::LitSsao,
        ShaderKind::LitShadowsSsao,
        ShaderKind::Unlit,
        ShaderKind::ViewNormals,
        ShaderKind::PositionReconstruct,
        ShaderKind::Ssao,
        ShaderKind::Hbao,
        ShaderKind::BoxBlur,
        ShaderKind::GaussianBlur,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShaderKind::Lit => "LIT",
            ShaderKind::LitShadows => "LIT_SHADOWS",
            ShaderKind::LitSsao => "LIT_SSAO",
            ShaderKind::LitShadowsSsao => "LIT_SHADOWS_SSAO",
            ShaderKind::Unlit => "UNLIT",
            ShaderKind::ViewNormals => "VIEW_NORMALS",
            ShaderKind::PositionReconstruct => "POSITIONS",
            ShaderKind::Ssao => "SSAO",
            ShaderKind::Hbao => "HBAO",
            ShaderKind::BoxBlur => "BLUR",
            ShaderKind::GaussianBlur => "GAUSSIAN_BLUR",
        }
    }

    /// Look up a kind by its name, ignoring case. Only used when loading configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Lit variant for the enabled features.
    pub fn lit(shadows: bool, ssao: bool) -> Self {
        match (shadows, ssao) {
            (false, false) => ShaderKind::Lit,
            (true, false) => ShaderKind::LitShadows,
            (false, true) => ShaderKind::LitSsao,
            (true, true) => ShaderKind::LitShadowsSsao,
        }
    }

    pub fn family(self) -> ShaderFamily {
        match self {
            ShaderKind::Lit
            | ShaderKind::LitShadows
            | ShaderKind::LitSsao
            | ShaderKind::LitShadowsSsao
            | ShaderKind::Unlit
            | ShaderKind::ViewNormals => ShaderFamily::Geometry,
            ShaderKind::PositionReconstruct
            | ShaderKind::Ssao
            | ShaderKind::Hbao
            | ShaderKind::BoxBlur
            | ShaderKind::GaussianBlur => ShaderFamily::PostProcessing,
        }
    }

    /// Fragments spliced into the vertex template.
    pub fn vertex_fragments(self) -> &'static [&'static str] {
        match self {
            ShaderKind::LitShadows | ShaderKind::LitShadowsSsao => &["SHADOWS"],
            _ => &[],
        }
    }

    /// Fragments spliced into the fragment template.
    pub fn fragment_fragments(self) -> &'static [&'static str] {
        match self {
            ShaderKind::Lit => &["MATERIAL", "LIGHTS", "LIT_MAT"],
            ShaderKind::LitShadows => &["MATERIAL", "LIGHTS", "SHADOWS", "LIT_MAT"],
            ShaderKind::LitSsao => &["MATERIAL", "LIGHTS", "LIT_MAT", "SSAO"],
            ShaderKind::LitShadowsSsao => &["MATERIAL", "LIGHTS", "SHADOWS", "LIT_MAT", "SSAO"],
            ShaderKind::Unlit => &["MATERIAL", "UNLIT_MAT"],
            ShaderKind::ViewNormals => &["NORMALS"],
            ShaderKind::PositionReconstruct => &["DEPTH", "POSITIONS"],
            ShaderKind::Ssao => &["SOURCE", "NORMALS", "NOISE", "SSAO"],
            ShaderKind::Hbao => &["SOURCE", "NORMALS", "NOISE", "HBAO"],
            ShaderKind::BoxBlur => &["SOURCE", "BLUR"],
            ShaderKind::GaussianBlur => &["SOURCE", "WEIGHTS", "GAUSSIAN_BLUR"],
        }
    }

    /// The AO algorithm this kind estimates, if it is an estimator.
    pub fn ao_algorithm(self) -> Option<AoAlgorithm> {
        match self {
            ShaderKind::Ssao => Some(AoAlgorithm::Ssao),
            ShaderKind::Hbao => Some(AoAlgorithm::Hbao),
            _ => None,
        }
    }
}

impl From<AoAlgorithm> for ShaderKind {
    fn from(algorithm: AoAlgorithm) -> Self {
        match algorithm {
            AoAlgorithm::Ssao => ShaderKind::Ssao,
            AoAlgorithm::Hbao => ShaderKind::Hbao,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_table_is_dense() {
        for (i, kind) in ShaderKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ShaderKind::from_name("HBAO"), Some(ShaderKind::Hbao));
        assert_eq!(ShaderKind::from_name("ssao"), Some(ShaderKind::Ssao));
        assert_eq!(ShaderKind::from_name("gaussian_blur"), Some(ShaderKind::GaussianBlur));
        assert_eq!(ShaderKind::from_name("GTAO"), None);
        for kind in ShaderKind::ALL {
            assert_eq!(ShaderKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_lit_selection() {
        assert_eq!(ShaderKind::lit(false, false), ShaderKind::Lit);
        assert_eq!(ShaderKind::lit(true, true), ShaderKind::LitShadowsSsao);
        assert_eq!(ShaderKind::lit(false, true), ShaderKind::LitSsao);
    }

    #[test]
    fn test_algorithm_round_trip() {
        for algorithm in AoAlgorithm::ALL {
            assert_eq!(ShaderKind::from(algorithm).ao_algorithm(), Some(algorithm));
        }
        assert_eq!(ShaderKind::Lit.ao_algorithm(), None);
    }
}
