use crate::source::{
    SceneImporter, SourceAnimation, SourceBone, SourceChannel, SourceKey, SourceMesh, SourceNode,
    SourceScene, VertexWeight,
};
use crate::ImportError;
use gltf::animation::util::ReadOutputs;
use gltf::animation::Interpolation;
use gltf::buffer::Data;
use rfw_math::*;
use rfw_utils::log;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Copy, Clone)]
pub struct GltfImporter {}

impl std::fmt::Display for GltfImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gltf-importer")
    }
}

impl Default for GltfImporter {
    fn default() -> Self {
        Self {}
    }
}

/// Nodes without a name are called after their index, so skins and animation channels can
/// still refer to them.
fn node_name(node: &gltf::Node) -> String {
    match node.name() {
        Some(name) if !name.is_empty() => String::from(name),
        _ => format!("node{}", node.index()),
    }
}

struct SceneBuilder<'a> {
    buffers: &'a [Data],
    meshes: Vec<SourceMesh>,
    /// (mesh, primitive, skin) to index into `meshes`.
    mesh_mapping: HashMap<(usize, usize, Option<usize>), u32>,
}

impl<'a> SceneBuilder<'a> {
    fn node(&mut self, node: &gltf::Node) -> SourceNode {
        let mut result = SourceNode::new(
            node_name(node),
            Mat4::from_cols_array_2d(&node.transform().matrix()),
        );

        if let Some(mesh) = node.mesh() {
            let skin = node.skin();
            for prim in mesh.primitives() {
                let key = (mesh.index(), prim.index(), skin.as_ref().map(|s| s.index()));
                if let Some(id) = self.mesh_mapping.get(&key) {
                    result.meshes.push(*id);
                    continue;
                }

                if let Some(source) = self.primitive(&mesh, &prim, skin.as_ref()) {
                    let id = self.meshes.len() as u32;
                    self.meshes.push(source);
                    self.mesh_mapping.insert(key, id);
                    result.meshes.push(id);
                }
            }
        }

        result.children = node.children().map(|child| self.node(&child)).collect();
        result
    }

    fn primitive(
        &self,
        mesh: &gltf::Mesh,
        prim: &gltf::Primitive,
        skin: Option<&gltf::Skin>,
    ) -> Option<SourceMesh> {
        let name = match mesh.name() {
            Some(name) if !name.is_empty() => format!("{}.{}", name, prim.index()),
            _ => format!("mesh{}.{}", mesh.index(), prim.index()),
        };

        let buffers = self.buffers;
        let reader = prim.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = match reader.read_positions() {
            Some(iter) => iter.map(Vec3::from).collect(),
            None => {
                log::warn!("primitive \"{}\" has no positions, skipping it", name);
                return None;
            }
        };

        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|iter| iter.map(Vec3::from).collect())
            .unwrap_or_default();
        let uvs: Vec<Vec2> = reader
            .read_tex_coords(0)
            .map(|iter| iter.into_f32().map(Vec2::from).collect())
            .unwrap_or_default();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(iter) => iter.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let faces: Vec<Vec<u32>> = match prim.mode() {
            gltf::mesh::Mode::Triangles => indices.chunks(3).map(|f| f.to_vec()).collect(),
            gltf::mesh::Mode::TriangleStrip => (2..indices.len())
                .map(|p| {
                    // Every odd triangle is flipped to keep the winding consistent.
                    if p % 2 == 0 {
                        vec![indices[p - 2], indices[p - 1], indices[p]]
                    } else {
                        vec![indices[p - 1], indices[p - 2], indices[p]]
                    }
                })
                .collect(),
            gltf::mesh::Mode::TriangleFan => (2..indices.len())
                .map(|p| vec![indices[0], indices[p - 1], indices[p]])
                .collect(),
            mode => {
                log::warn!(
                    "primitive \"{}\" uses unsupported mode {:?}, skipping it",
                    name,
                    mode
                );
                return None;
            }
        };

        let bones = match skin {
            Some(skin) => self.skin_bones(skin, prim),
            None => Vec::new(),
        };

        Some(SourceMesh {
            name,
            positions,
            normals,
            uvs,
            faces,
            material_index: prim.material().index().unwrap_or(0) as u32,
            bones,
        })
    }

    /// Regroups per-vertex joint/weight sets into per-bone weight lists.
    fn skin_bones(&self, skin: &gltf::Skin, prim: &gltf::Primitive) -> Vec<SourceBone> {
        let buffers = self.buffers;
        let skin_reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
        let inverse_binds: Vec<Mat4> = skin_reader
            .read_inverse_bind_matrices()
            .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
            .unwrap_or_default();

        let mut bones: Vec<SourceBone> = skin
            .joints()
            .enumerate()
            .map(|(i, joint)| SourceBone {
                name: node_name(&joint),
                offset_matrix: inverse_binds.get(i).copied().unwrap_or(Mat4::IDENTITY),
                weights: Vec::new(),
            })
            .collect();

        let reader = prim.reader(|buffer| Some(&buffers[buffer.index()]));
        let mut set = 0;
        while let (Some(joints), Some(weights)) =
            (reader.read_joints(set), reader.read_weights(set))
        {
            let influences = joints.into_u16().zip(weights.into_f32());
            for (vertex, (joints, weights)) in influences.enumerate() {
                for k in 0..4 {
                    if weights[k] <= 0.0 {
                        continue;
                    }

                    match bones.get_mut(joints[k] as usize) {
                        Some(bone) => bone
                            .weights
                            .push(VertexWeight::new(vertex as u32, weights[k])),
                        None => log::warn!(
                            "vertex {} references joint {} but the skin only has {}",
                            vertex,
                            joints[k],
                            skin.joints().count()
                        ),
                    }
                }
            }
            set += 1;
        }

        bones
    }
}

fn animation(anim: &gltf::Animation, buffers: &[Data]) -> SourceAnimation {
    let mut channels = Vec::new();

    for channel in anim.channels() {
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let times: Vec<f64> = match reader.read_inputs() {
            Some(iter) => iter.map(|t| t as f64).collect(),
            None => continue,
        };

        // Cubic-spline outputs are (in-tangent, value, out-tangent) triplets.
        let (stride, offset) = match channel.sampler().interpolation() {
            Interpolation::CubicSpline => (3, 1),
            Interpolation::Linear | Interpolation::Step => (1, 0),
        };

        let mut source = SourceChannel {
            node_name: node_name(&channel.target().node()),
            ..Default::default()
        };

        match reader.read_outputs() {
            Some(ReadOutputs::Translations(iter)) => {
                let values: Vec<Vec3> = iter.map(Vec3::from).collect();
                source.position_keys = keys(&times, &values, stride, offset);
            }
            Some(ReadOutputs::Rotations(iter)) => {
                let values: Vec<Quat> = iter.into_f32().map(Quat::from_array).collect();
                source.rotation_keys = keys(&times, &values, stride, offset);
            }
            Some(ReadOutputs::Scales(iter)) => {
                let values: Vec<Vec3> = iter.map(Vec3::from).collect();
                source.scale_keys = keys(&times, &values, stride, offset);
            }
            Some(ReadOutputs::MorphTargetWeights(_)) | None => continue,
        }

        channels.push(source);
    }

    SourceAnimation {
        name: anim.name().map(String::from).unwrap_or_default(),
        // glTF key times are in seconds.
        ticks_per_second: 1.0,
        duration_ticks: 0.0,
        channels,
    }
}

fn keys<T: Copy>(
    times: &[f64],
    values: &[T],
    stride: usize,
    offset: usize,
) -> Vec<SourceKey<T>> {
    times
        .iter()
        .enumerate()
        .filter_map(|(i, t)| {
            values
                .get(i * stride + offset)
                .map(|v| SourceKey::new(*t, *v))
        })
        .collect()
}

impl SceneImporter for GltfImporter {
    fn extensions(&self) -> &[&str] {
        &["gltf", "glb"]
    }

    fn import(&self, path: &Path) -> Result<SourceScene, ImportError> {
        let (document, buffers, _) = gltf::import(path)
            .map_err(|e| ImportError::LoadError(path.to_path_buf(), e.to_string()))?;

        let scene = match document.default_scene().or_else(|| document.scenes().next()) {
            Some(scene) => scene,
            None => {
                return Err(ImportError::LoadError(
                    path.to_path_buf(),
                    String::from("file does not contain a scene"),
                ))
            }
        };

        let mut builder = SceneBuilder {
            buffers: buffers.as_slice(),
            meshes: Vec::new(),
            mesh_mapping: HashMap::new(),
        };

        let mut root = SourceNode::new(scene.name().unwrap_or_default(), Mat4::IDENTITY);
        root.children = scene.nodes().map(|node| builder.node(&node)).collect();

        let animations = document
            .animations()
            .map(|anim| animation(&anim, buffers.as_slice()))
            .collect();

        Ok(SourceScene {
            root,
            meshes: builder.meshes,
            animations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{import_model, ImportSettings};
    use std::sync::atomic::AtomicBool;

    // Armature -> Hip -> Spine, plus Body carrying a skinned triangle and a 2 second
    // rotation of Spine.
    const SKINNED_TRIANGLE: &str = r#"{"asset": {"version": "2.0"}, "scene": 0, "scenes": [{"nodes": [0]}], "nodes": [{"name": "Armature", "children": [1, 3]}, {"name": "Hip", "children": [2]}, {"name": "Spine", "translation": [0, 1, 0]}, {"name": "Body", "mesh": 0, "skin": 0}], "meshes": [{"name": "body", "primitives": [{"attributes": {"POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2}, "indices": 3}]}], "skins": [{"joints": [1, 2], "inverseBindMatrices": 4}], "animations": [{"name": "turn", "channels": [{"sampler": 0, "target": {"node": 2, "path": "rotation"}}], "samplers": [{"input": 5, "output": 6, "interpolation": "LINEAR"}]}], "buffers": [{"byteLength": 284, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAAAAAABAAAAAAAAAAAAAAAAAAAAAABAPwAAgD4AAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABAAIAAAAAAIA/AAAAAAAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAgL8AAAAAAACAPwAAAAAAAABAAAAAAAAAAAAAAAAAAACAPwAAAAD0BDU/AAAAAPQENT8="}], "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962}, {"buffer": 0, "byteOffset": 36, "byteLength": 24, "target": 34962}, {"buffer": 0, "byteOffset": 60, "byteLength": 48, "target": 34962}, {"buffer": 0, "byteOffset": 108, "byteLength": 6, "target": 34963}, {"buffer": 0, "byteOffset": 116, "byteLength": 128}, {"buffer": 0, "byteOffset": 244, "byteLength": 8}, {"buffer": 0, "byteOffset": 252, "byteLength": 32}], "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0]}, {"bufferView": 1, "componentType": 5123, "count": 3, "type": "VEC4"}, {"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4"}, {"bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR"}, {"bufferView": 4, "componentType": 5126, "count": 2, "type": "MAT4"}, {"bufferView": 5, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0], "max": [2]}, {"bufferView": 6, "componentType": 5126, "count": 2, "type": "VEC4"}]}"#;

    fn write_fixture(name: &str) -> std::path::PathBuf {
        let path =
            std::env::temp_dir().join(format!("rfw-import-{}-{}", std::process::id(), name));
        std::fs::write(&path, SKINNED_TRIANGLE).unwrap();
        path
    }

    #[test]
    fn reads_hierarchy_skin_and_animation() {
        let path = write_fixture("skinned.gltf");
        let scene = GltfImporter::default().import(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(scene.root.count(), 5);
        assert_eq!(scene.meshes.len(), 1);

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2]]);
        assert_eq!(mesh.bones.len(), 2);
        assert_eq!(mesh.bones[0].name, "Hip");
        assert_eq!(mesh.bones[0].weights, vec![VertexWeight::new(0, 0.75)]);
        assert_eq!(mesh.bones[1].name, "Spine");
        assert_eq!(
            mesh.bones[1].weights,
            vec![VertexWeight::new(0, 0.25), VertexWeight::new(1, 1.0)]
        );
        assert!(mesh.bones[1]
            .offset_matrix
            .abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)), 1e-6));

        assert_eq!(scene.animations.len(), 1);
        let anim = &scene.animations[0];
        assert_eq!(anim.name, "turn");
        assert_eq!(anim.channels[0].node_name, "Spine");
        assert_eq!(anim.channels[0].rotation_keys.len(), 2);
        assert_eq!(anim.channels[0].rotation_keys[1].time_ticks, 2.0);
    }

    #[test]
    fn gltf_scene_imports_into_model() {
        let path = write_fixture("model.gltf");
        let scene = GltfImporter::default().import(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let model = import_model(
            &scene,
            &path,
            &ImportSettings::default(),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(model.bones().len(), 2);
        assert_eq!(model.bones()[0].name, "Hip");
        assert_eq!(model.bones()[1].parent_index, 0);

        let clip = model.clip("turn").unwrap();
        assert_eq!(clip.duration, 2.0);

        let skin = &model.meshes()[0].skin_data;
        assert_eq!(skin[0].joints[..2], [0, 1]);
        assert_eq!(skin[2], crate::JointData::default());
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let result = GltfImporter::default().import(Path::new("does/not/exist.gltf"));
        match result {
            Err(ImportError::LoadError(path, _)) => {
                assert_eq!(path, Path::new("does/not/exist.gltf"))
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }
}
