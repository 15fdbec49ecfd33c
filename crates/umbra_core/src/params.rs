//! Scene parameters edited between frames by the UI and read by the renderer.

use serde::{Deserialize, Serialize};
use umbra_math::{Vec3, Vec4};

/// Side length of the square shadow map.
pub const SHADOW_MAP_RESOLUTION: u32 = 2048;
/// Largest hemisphere kernel / horizon direction count.
pub const SSAO_MAX_SAMPLES: u32 = 64;
/// Size of the binomial weight table; blur radii go up to one less.
pub const SSAO_BLUR_MAX_RADIUS: u32 = 16;
/// Side length of the tiled rotation-noise texture.
pub const SSAO_NOISE_SIZE: u32 = 4;

/// Surface material for the lit shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub shininess: f32,
}

impl Material {
    pub const SHINY_RED: Material = Material {
        diffuse: Vec4::new(1.0, 0.0, 0.0, 1.0),
        specular: Vec4::new(1.0, 1.0, 1.0, 1.0),
        shininess: 256.0,
    };

    pub const PLASTIC_GREEN: Material = Material {
        diffuse: Vec4::new(0.0, 0.8, 0.0, 1.0),
        specular: Vec4::new(0.8, 0.8, 0.8, 1.0),
        shininess: 32.0,
    };

    pub const COPPER: Material = Material {
        diffuse: Vec4::new(0.8, 0.3, 0.0, 1.0),
        specular: Vec4::new(0.8, 0.3, 0.0, 1.0),
        shininess: 128.0,
    };

    pub const PURE_WHITE: Material = Material {
        diffuse: Vec4::new(0.9, 0.9, 0.9, 1.0),
        specular: Vec4::new(0.8, 0.3, 0.0, 1.0),
        shininess: 128.0,
    };

    pub const MATTE_GRAY: Material = Material {
        diffuse: Vec4::new(0.5, 0.5, 0.5, 1.0),
        specular: Vec4::new(0.5, 0.5, 0.5, 1.0),
        shininess: 64.0,
    };

    /// Flat color for unlit line and debug draws.
    pub fn flat(color: Vec4) -> Self {
        Self {
            diffuse: color,
            specular: Vec4::ZERO,
            shininess: 1.0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::MATTE_GRAY
    }
}

/// Occlusion estimator used by the AO pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AoAlgorithm {
    /// Hemisphere sample kernel
    #[serde(rename = "SSAO", alias = "ssao")]
    Ssao,
    /// Horizon scanning
    #[serde(rename = "HBAO", alias = "hbao")]
    Hbao,
}

impl AoAlgorithm {
    pub const ALL: [AoAlgorithm; 2] = [AoAlgorithm::Ssao, AoAlgorithm::Hbao];

    pub fn label(self) -> &'static str {
        match self {
            AoAlgorithm::Ssao => "SSAO",
            AoAlgorithm::Hbao => "HBAO",
        }
    }
}

/// Blur applied to the raw occlusion buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurKind {
    /// Two-pass binomial blur
    Gaussian,
    /// Single-pass box filter
    Box,
}

/// Where the AO estimators take surface normals from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalSource {
    /// Rebuilt from neighboring view-space positions
    Reconstructed,
    /// Read from the normals pre-pass
    Prepass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AoSettings {
    pub algorithm: AoAlgorithm,
    /// View-space sampling radius
    pub radius: f32,
    /// Kernel size (hemisphere) or direction count (horizon)
    pub samples: u32,
    /// March steps per direction (horizon only)
    pub steps: u32,
    pub blur_radius: u32,
    pub blur: BlurKind,
    /// Multiplier on the darkening applied to ambient light
    pub strength: f32,
    pub normals: NormalSource,
}

impl Default for AoSettings {
    fn default() -> Self {
        Self {
            algorithm: AoAlgorithm::Ssao,
            radius: 0.2,
            samples: 16,
            steps: 16,
            blur_radius: 3,
            blur: BlurKind::Gaussian,
            strength: 1.0,
            normals: NormalSource::Reconstructed,
        }
    }
}

impl AoSettings {
    /// Clamp every field into the range the shaders support.
    pub fn clamped(mut self) -> Self {
        self.radius = self.radius.clamp(0.001, 1.0);
        self.samples = self.samples.clamp(1, SSAO_MAX_SAMPLES);
        self.steps = self.steps.clamp(1, SSAO_MAX_SAMPLES);
        self.blur_radius = self.blur_radius.min(SSAO_BLUR_MAX_RADIUS - 1);
        self.strength = self.strength.clamp(0.0, 5.0);
        self
    }
}

/// Ambient light: `color.rgb` scaled by intensity `color.a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Vec4,
    pub ao: AoSettings,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec4::new(1.0, 1.0, 1.0, 0.6),
            ao: AoSettings::default(),
        }
    }
}

/// The single shadow-casting directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub diffuse: Vec4,
    pub specular: Vec4,
    /// Constant depth bias
    pub bias: f32,
    /// Extra bias at grazing angles
    pub slope_bias: f32,
    /// Light size for the soft-shadow filter
    pub softness: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(1.0, 1.0, -1.0),
            diffuse: Vec4::new(1.0, 1.0, 1.0, 0.75),
            specular: Vec4::new(1.0, 1.0, 1.0, 0.75),
            bias: 0.001,
            slope_bias: 0.025,
            softness: 0.025,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightingState {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}

/// Feature switches for the lit pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawParams {
    pub shadows: bool,
    pub ssao: bool,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self { shadows: true, ssao: true }
    }
}

/// Debug overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugToggles {
    pub grid: bool,
    pub bounding_box: bool,
    pub lights: bool,
    /// Show the occlusion buffer instead of the lit image
    pub ao_pass: bool,
}

/// Everything the UI can edit between frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneParams {
    pub lights: LightingState,
    pub draw: DrawParams,
    pub debug: DebugToggles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lighting() {
        let params = SceneParams::default();
        assert_eq!(params.lights.ambient.color, Vec4::new(1.0, 1.0, 1.0, 0.6));
        assert_eq!(params.lights.ambient.ao.samples, 16);
        assert_eq!(params.lights.directional.direction, Vec3::new(1.0, 1.0, -1.0));
        assert!(params.draw.shadows && params.draw.ssao);
        assert!(!params.debug.ao_pass);
    }

    #[test]
    fn test_ao_settings_clamped() {
        let settings = AoSettings {
            radius: 0.0,
            samples: 500,
            steps: 0,
            blur_radius: 40,
            strength: -1.0,
            ..Default::default()
        }
        .clamped();

        assert_eq!(settings.radius, 0.001);
        assert_eq!(settings.samples, SSAO_MAX_SAMPLES);
        assert_eq!(settings.steps, 1);
        assert_eq!(settings.blur_radius, SSAO_BLUR_MAX_RADIUS - 1);
        assert_eq!(settings.strength, 0.0);
    }

    #[test]
    fn test_algorithm_names_deserialize() {
        let ssao: AoAlgorithm = serde_json::from_str("\"SSAO\"").unwrap();
        let hbao: AoAlgorithm = serde_json::from_str("\"hbao\"").unwrap();
        assert_eq!(ssao, AoAlgorithm::Ssao);
        assert_eq!(hbao, AoAlgorithm::Hbao);
        assert!(serde_json::from_str::<AoAlgorithm>("\"GTAO\"").is_err());
    }

    #[test]
    fn test_material_presets() {
        assert_eq!(Material::SHINY_RED.shininess, 256.0);
        assert_eq!(Material::default(), Material::MATTE_GRAY);
        assert_eq!(Material::flat(Vec4::ONE).specular, Vec4::ZERO);
    }
}
