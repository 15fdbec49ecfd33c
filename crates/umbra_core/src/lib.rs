//! Umbra Core - Scene data for the Umbra renderer.
//!
//! This crate provides:
//!
//! - **Geometry**: `Mesh` with validated construction, `Wire` line sets and
//!   procedural primitives (box, cone, cylinder, arrow, grid)
//! - **Import**: OBJ loading
//! - **Parameters**: materials, lighting, AO tuning and debug toggles
//! - **Scene**: drawables with transforms and a running bounding volume
//! - **Config**: JSON viewer configuration
//!
//! # Example
//!
//! ```ignore
//! use umbra_core::{import_meshes, Scene};
//!
//! let meshes = import_meshes("bunny.obj");
//! let scene = Scene::with_model("bunny", meshes)?;
//! println!("{} triangles", scene.total_triangle_count());
//! ```

pub mod config;
pub mod import;
pub mod mesh;
pub mod params;
pub mod primitives;
pub mod scene;

// Re-export commonly used types
pub use config::{ConfigError, ConfigResult, ViewerConfig};
pub use import::{import_meshes, load_obj, ImportError, ImportResult};
pub use mesh::{Mesh, MeshError, MeshResult, Wire};
pub use params::{
    AmbientLight, AoAlgorithm, AoSettings, BlurKind, DebugToggles, DirectionalLight, DrawParams,
    LightingState, Material, NormalSource, SceneParams,
};
pub use scene::{Geometry, Scene, SceneObject};
