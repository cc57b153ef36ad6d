//! Object model produced by an external scene importer.
//!
//! These types mirror what geometry-import libraries hand out: a node tree, meshes with
//! per-bone weight lists and node-keyed animation tracks timed in ticks. The core only ever
//! reads them; an importer builds one per file and the caller may drop it after import.

use crate::ImportError;
use rfw_math::*;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SourceNode {
    pub name: String,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    /// Indices into [`SourceScene::meshes`].
    pub meshes: Vec<u32>,
    pub children: Vec<SourceNode>,
}

impl Default for SourceNode {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl SourceNode {
    pub fn new<T: Into<String>>(name: T, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: SourceNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_mesh(mut self, mesh: u32) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SourceNode::count).sum::<usize>()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

impl VertexWeight {
    pub fn new(vertex: u32, weight: f32) -> Self {
        Self { vertex, weight }
    }
}

/// Skin binding of one bone inside one mesh.
#[derive(Debug, Clone)]
pub struct SourceBone {
    pub name: String,
    /// Mesh space to bone space at bind time.
    pub offset_matrix: Mat4,
    pub weights: Vec<VertexWeight>,
}

/// A polygon as authored, any arity.
pub type SourceFace = Vec<u32>;

#[derive(Debug, Clone)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Empty or same length as `positions`.
    pub normals: Vec<Vec3>,
    /// Empty or same length as `positions`.
    pub uvs: Vec<Vec2>,
    pub faces: Vec<SourceFace>,
    pub material_index: u32,
    pub bones: Vec<SourceBone>,
}

impl Default for SourceMesh {
    fn default() -> Self {
        Self {
            name: String::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            faces: Vec::new(),
            material_index: 0,
            bones: Vec::new(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SourceKey<T> {
    pub time_ticks: f64,
    pub value: T,
}

impl<T> SourceKey<T> {
    pub fn new(time_ticks: f64, value: T) -> Self {
        Self { time_ticks, value }
    }
}

/// Keyframes targeting a single node. The three tracks are timed independently.
#[derive(Debug, Clone, Default)]
pub struct SourceChannel {
    pub node_name: String,
    pub position_keys: Vec<SourceKey<Vec3>>,
    pub rotation_keys: Vec<SourceKey<Quat>>,
    pub scale_keys: Vec<SourceKey<Vec3>>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceAnimation {
    pub name: String,
    pub ticks_per_second: f64,
    pub duration_ticks: f64,
    pub channels: Vec<SourceChannel>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceScene {
    pub root: SourceNode,
    pub meshes: Vec<SourceMesh>,
    pub animations: Vec<SourceAnimation>,
}

/// Seam to the external geometry-import library.
pub trait SceneImporter: std::fmt::Display + std::fmt::Debug + Send + Sync {
    /// Lower-case file extensions this importer understands, without the dot.
    fn extensions(&self) -> &[&str];

    fn import(&self, path: &Path) -> Result<SourceScene, ImportError>;
}
