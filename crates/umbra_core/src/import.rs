//! OBJ import.
//!
//! Every model in the file becomes one [`Mesh`]. Files without normals get
//! smooth normals computed from the triangles.

use std::path::{Path, PathBuf};

use thiserror::Error;
use umbra_math::Vec3;

use crate::mesh::{Mesh, MeshError};

/// Errors that can occur while importing a model file.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read OBJ file {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("no models found in {0}")]
    Empty(PathBuf),

    #[error("model '{name}' is not a valid mesh: {source}")]
    InvalidMesh {
        name: String,
        #[source]
        source: MeshError,
    },
}

pub type ImportResult<T> = Result<T, ImportError>;

/// Load every model of an OBJ file.
pub fn load_obj<P: AsRef<Path>>(path: P) -> ImportResult<Vec<Mesh>> {
    let path = path.as_ref();
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )
    .map_err(|source| ImportError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    if models.is_empty() {
        return Err(ImportError::Empty(path.to_path_buf()));
    }

    let meshes = models
        .iter()
        .map(|model| {
            mesh_from_model(model).map_err(|source| ImportError::InvalidMesh {
                name: model.name.clone(),
                source,
            })
        })
        .collect::<ImportResult<Vec<_>>>()?;

    let triangles: usize = meshes.iter().map(Mesh::triangle_count).sum();
    log::info!("Loaded {} meshes ({} triangles) from {:?}", meshes.len(), triangles, path);
    Ok(meshes)
}

/// Load an OBJ file, logging the failure and returning no meshes instead of an error.
pub fn import_meshes<P: AsRef<Path>>(path: P) -> Vec<Mesh> {
    match load_obj(path) {
        Ok(meshes) => meshes,
        Err(err) => {
            log::error!("Import failed: {}", err);
            Vec::new()
        }
    }
}

fn mesh_from_model(model: &tobj::Model) -> Result<Mesh, MeshError> {
    let mesh = &model.mesh;
    let positions: Vec<Vec3> = mesh.positions.chunks_exact(3).map(Vec3::from_slice).collect();
    let indices = mesh.indices.clone();

    if mesh.normals.len() == mesh.positions.len() {
        let normals = mesh.normals.chunks_exact(3).map(Vec3::from_slice).collect();
        Mesh::new(positions, normals, indices)
    } else {
        log::info!("Model '{}' has no per-vertex normals, computing them", model.name);
        Mesh::with_computed_normals(positions, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("umbra_import_{}_{}.obj", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_quad_without_normals() {
        let path = write_temp(
            "quad",
            "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n",
        );
        let meshes = load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].triangle_count(), 2);
        assert!(meshes[0].normals().iter().all(|n| (n.z - 1.0).abs() < 0.001));
    }

    #[test]
    fn test_load_with_normals() {
        let path = write_temp(
            "normals",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf 1//1 2//1 3//1\n",
        );
        let meshes = load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(meshes[0].vertex_count(), 3);
        assert!(meshes[0].normals().iter().all(|n| (n.z + 1.0).abs() < 0.001));
    }

    #[test]
    fn test_missing_file_yields_no_meshes() {
        let meshes = import_meshes("/definitely/not/here.obj");
        assert!(meshes.is_empty());
        assert!(matches!(
            load_obj("/definitely/not/here.obj"),
            Err(ImportError::Obj { .. })
        ));
    }
}
