use crate::animation::{AnimationClip, AnimationCollection};
use rfw_math::*;
use std::collections::HashMap;
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Up to four bone influences of one vertex.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct JointData {
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl Default for JointData {
    /// Rigidly follows bone 0.
    fn default() -> Self {
        Self {
            joints: [0; 4],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl From<([u32; 4], [f32; 4])> for JointData {
    fn from(data: ([u32; 4], [f32; 4])) -> Self {
        Self {
            joints: data.0,
            weights: data.1,
        }
    }
}

impl JointData {
    pub fn weight_sum(&self) -> f32 {
        self.weights.iter().sum()
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Triangle list.
    pub indices: Vec<u32>,
    pub material_index: u32,
    /// One entry per vertex.
    pub skin_data: Vec<JointData>,
    /// Whether the source mesh carried any bone bindings.
    pub skinned: bool,
}

impl Display for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Mesh {{ name: {}, vertices: {}, triangles: {}, material: {}, skinned: {} }}",
            self.name,
            self.positions.len(),
            self.triangle_count(),
            self.material_index,
            self.skinned
        )
    }
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, -1 for roots. Always smaller than the bone's own index.
    pub parent_index: i32,
    /// Relative to the nearest bone ancestor, including any non-bone nodes in between.
    pub local_bind_transform: Mat4,
    /// Inverse bind matrix: mesh space to bone space at bind time.
    pub offset_matrix: Mat4,
    /// Folded transform of the non-bone nodes between the parent bone and this bone.
    pub pre_transform: Mat4,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent_index: -1,
            local_bind_transform: Mat4::IDENTITY,
            offset_matrix: Mat4::IDENTITY,
            pre_transform: Mat4::IDENTITY,
        }
    }
}

impl Bone {
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    pub fn parent(&self) -> Option<usize> {
        if self.parent_index < 0 {
            None
        } else {
            Some(self.parent_index as usize)
        }
    }
}

/// Immutable result of importing one file, shared read-only by every consumer.
#[derive(Debug, Clone)]
pub struct ModelData {
    name: String,
    meshes: Vec<Mesh>,
    bones: Vec<Bone>,
    bone_map: HashMap<String, usize>,
    animations: Option<AnimationCollection>,
}

impl Display for ModelData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ModelData {{ name: {}, meshes: {}, bones: {}, clips: {} }}",
            self.name,
            self.meshes.len(),
            self.bones.len(),
            self.animations.as_ref().map(|a| a.len()).unwrap_or(0)
        )
    }
}

impl ModelData {
    pub fn new(
        name: String,
        meshes: Vec<Mesh>,
        bones: Vec<Bone>,
        bone_map: HashMap<String, usize>,
        animations: Option<AnimationCollection>,
    ) -> Self {
        debug_assert!(bones
            .iter()
            .enumerate()
            .all(|(i, b)| b.parent_index < 0 || (b.parent_index as usize) < i));
        debug_assert_eq!(bones.len(), bone_map.len());

        Self {
            name,
            meshes,
            bones,
            bone_map,
            animations,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn meshes(&self) -> &[Mesh] {
        self.meshes.as_slice()
    }

    pub fn bones(&self) -> &[Bone] {
        self.bones.as_slice()
    }

    pub fn bone_map(&self) -> &HashMap<String, usize> {
        &self.bone_map
    }

    pub fn bone_index<S: AsRef<str>>(&self, name: S) -> Option<usize> {
        self.bone_map.get(name.as_ref()).copied()
    }

    pub fn animations(&self) -> Option<&AnimationCollection> {
        self.animations.as_ref()
    }

    pub fn clip<S: AsRef<str>>(&self, name: S) -> Option<&AnimationClip> {
        self.animations.as_ref().and_then(|a| a.get_by_name(name))
    }

    pub fn is_skinned(&self) -> bool {
        !self.bones.is_empty()
    }
}
