//! Viewer configuration loaded from an optional JSON file.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! {
//!     "window": { "width": 1280, "height": 720 },
//!     "ao": { "algorithm": "HBAO", "radius": 0.35 }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use umbra_math::{Vec3, Vec4};

use crate::params::{
    AoAlgorithm, AoSettings, BlurKind, DrawParams, LightingState, NormalSource, SceneParams,
    SHADOW_MAP_RESOLUTION,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Umbra".to_string(),
            width: 800,
            height: 800,
        }
    }
}

/// Which scene to build at startup.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// OBJ model shown on the ground slab; the primitives scene when unset
    pub model: Option<PathBuf>,
    pub grid: bool,
    pub bounding_box: bool,
    pub light_arrow: bool,
}

/// Cube-map faces in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SkyboxConfig {
    pub faces: Option<[PathBuf; 6]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: [f32; 4],
    pub direction: [f32; 3],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub bias: f32,
    pub slope_bias: f32,
    pub softness: f32,
    pub shadows: bool,
}

impl Default for LightingConfig {
    fn default() -> Self {
        let lights = LightingState::default();
        Self {
            ambient: lights.ambient.color.to_array(),
            direction: lights.directional.direction.to_array(),
            diffuse: lights.directional.diffuse.to_array(),
            specular: lights.directional.specular.to_array(),
            bias: lights.directional.bias,
            slope_bias: lights.directional.slope_bias,
            softness: lights.directional.softness,
            shadows: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AoConfig {
    pub enabled: bool,
    /// Shader name of the estimator, e.g. "SSAO" or "HBAO"
    pub algorithm: String,
    pub radius: f32,
    pub samples: u32,
    pub steps: u32,
    pub blur_radius: u32,
    pub blur: BlurKind,
    pub strength: f32,
    pub normals: NormalSource,
}

impl Default for AoConfig {
    fn default() -> Self {
        let ao = AoSettings::default();
        Self {
            enabled: true,
            algorithm: ao.algorithm.label().to_string(),
            radius: ao.radius,
            samples: ao.samples,
            steps: ao.steps,
            blur_radius: ao.blur_radius,
            blur: ao.blur,
            strength: ao.strength,
            normals: ao.normals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub scene: SceneConfig,
    pub skybox: SkyboxConfig,
    pub shadow_map_resolution: u32,
    pub lighting: LightingConfig,
    pub ao: AoConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            scene: SceneConfig::default(),
            skybox: SkyboxConfig::default(),
            shadow_map_resolution: SHADOW_MAP_RESOLUTION,
            lighting: LightingConfig::default(),
            ao: AoConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Initial scene parameters.
    ///
    /// `resolve_algorithm` maps the configured estimator name to an
    /// algorithm; unknown names fall back to the default with a warning.
    /// Numeric values are clamped into their supported ranges.
    pub fn scene_params<F>(&self, resolve_algorithm: F) -> SceneParams
    where
        F: FnOnce(&str) -> Option<AoAlgorithm>,
    {
        let mut params = SceneParams::default();

        let lights = &mut params.lights;
        lights.ambient.color = Vec4::from_array(self.lighting.ambient).clamp(Vec4::ZERO, Vec4::ONE);
        lights.directional.direction = Vec3::from_array(self.lighting.direction);
        lights.directional.diffuse = Vec4::from_array(self.lighting.diffuse).clamp(Vec4::ZERO, Vec4::ONE);
        lights.directional.specular = Vec4::from_array(self.lighting.specular).clamp(Vec4::ZERO, Vec4::ONE);
        lights.directional.bias = self.lighting.bias.clamp(0.0, 0.05);
        lights.directional.slope_bias = self.lighting.slope_bias.clamp(0.0, 0.05);
        lights.directional.softness = self.lighting.softness.clamp(0.0, 1.0);

        let algorithm = resolve_algorithm(&self.ao.algorithm).unwrap_or_else(|| {
            log::warn!(
                "Unknown AO algorithm '{}', using {}",
                self.ao.algorithm,
                AoAlgorithm::Ssao.label()
            );
            AoAlgorithm::Ssao
        });
        lights.ambient.ao = AoSettings {
            algorithm,
            radius: self.ao.radius,
            samples: self.ao.samples,
            steps: self.ao.steps,
            blur_radius: self.ao.blur_radius,
            blur: self.ao.blur,
            strength: self.ao.strength,
            normals: self.ao.normals,
        }
        .clamped();

        params.draw = DrawParams {
            shadows: self.lighting.shadows,
            ssao: self.ao.enabled,
        };
        params.debug.grid = self.scene.grid;
        params.debug.bounding_box = self.scene.bounding_box;
        params.debug.lights = self.scene.light_arrow;

        params
    }

    /// Shadow map side length, at least 1.
    pub fn shadow_map_resolution(&self) -> u32 {
        self.shadow_map_resolution.max(1)
    }
}
