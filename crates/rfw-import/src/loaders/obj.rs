use crate::source::{SceneImporter, SourceMesh, SourceNode, SourceScene};
use crate::ImportError;
use rfw_math::*;
use std::path::Path;

/// Wavefront OBJ files. These carry no skeleton or animation, so every mesh is static.
#[derive(Debug, Copy, Clone)]
pub struct ObjImporter {}

impl std::fmt::Display for ObjImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj-importer")
    }
}

impl Default for ObjImporter {
    fn default() -> Self {
        Self {}
    }
}

impl SceneImporter for ObjImporter {
    fn extensions(&self) -> &[&str] {
        &["obj"]
    }

    fn import(&self, path: &Path) -> Result<SourceScene, ImportError> {
        // Faces are kept as authored; polygons are reported and dropped during import.
        let (models, _) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: false,
                ignore_points: true,
                ignore_lines: true,
            },
        )
        .map_err(|e| ImportError::LoadError(path.to_path_buf(), e.to_string()))?;

        let mut root = SourceNode::new(
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            Mat4::IDENTITY,
        );

        let meshes: Vec<SourceMesh> = models
            .into_iter()
            .map(|model| {
                let mesh = model.mesh;

                let positions = mesh
                    .positions
                    .chunks_exact(3)
                    .map(|p| Vec3::new(p[0], p[1], p[2]))
                    .collect();
                let normals = mesh
                    .normals
                    .chunks_exact(3)
                    .map(|n| Vec3::new(n[0], n[1], n[2]))
                    .collect();
                let uvs = mesh
                    .texcoords
                    .chunks_exact(2)
                    .map(|t| Vec2::new(t[0], t[1]))
                    .collect();

                // No arities means every face is a triangle.
                let faces = if mesh.face_arities.is_empty() {
                    mesh.indices.chunks(3).map(|f| f.to_vec()).collect()
                } else {
                    let mut faces = Vec::with_capacity(mesh.face_arities.len());
                    let mut start = 0;
                    for arity in mesh.face_arities.iter() {
                        let end = (start + *arity as usize).min(mesh.indices.len());
                        faces.push(mesh.indices[start..end].to_vec());
                        start = end;
                    }
                    faces
                };

                SourceMesh {
                    name: model.name,
                    positions,
                    normals,
                    uvs,
                    faces,
                    material_index: mesh.material_id.unwrap_or(0) as u32,
                    bones: Vec::new(),
                }
            })
            .collect();

        root.meshes = (0..meshes.len() as u32).collect();

        Ok(SourceScene {
            root,
            meshes,
            animations: Vec::new(),
        })
    }
}
