use crate::model::JointData;
use crate::settings::{ImportSettings, MAX_INFLUENCES};
use crate::source::SourceMesh;
use rfw_utils::log;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Anomalies corrected while resolving the weights of one mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinReport {
    /// Bone names bound by the mesh but missing from the skeleton.
    pub dangling_bones: Vec<String>,
    /// Vertices that had more than four influences.
    pub truncated_vertices: usize,
    /// Influences dropped for an out-of-range vertex id or an unusable weight.
    pub invalid_influences: usize,
    /// Vertices whose kept weights summed to (nearly) zero.
    pub degenerate_vertices: usize,
}

impl SkinReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_bones.is_empty()
            && self.truncated_vertices == 0
            && self.invalid_influences == 0
            && self.degenerate_vertices == 0
    }

    /// Folds the report of another mesh into this one.
    pub fn merge(&mut self, other: SkinReport) {
        for name in other.dangling_bones.into_iter() {
            if !self.dangling_bones.contains(&name) {
                self.dangling_bones.push(name);
            }
        }
        self.truncated_vertices += other.truncated_vertices;
        self.invalid_influences += other.invalid_influences;
        self.degenerate_vertices += other.degenerate_vertices;
    }
}

/// Resolves per-vertex bone influences by bone name.
///
/// Influences are gathered in encounter order. A vertex with more than four keeps the four
/// largest (ties keep the earlier one), the kept weights are normalized, and vertices
/// without usable weights rigidly follow bone 0.
pub fn resolve_skin_weights(
    mesh: &SourceMesh,
    bone_map: &HashMap<String, usize>,
    settings: &ImportSettings,
) -> (Vec<JointData>, SkinReport) {
    let vertex_count = mesh.positions.len();
    let mut report = SkinReport::default();
    let mut influences: Vec<Vec<(u32, f32)>> = vec![Vec::new(); vertex_count];
    let mut missing: HashSet<&str> = HashSet::new();

    for bone in mesh.bones.iter() {
        let bone_index = match bone_map.get(&bone.name) {
            Some(index) => *index as u32,
            None => {
                if missing.insert(bone.name.as_str()) {
                    log::warn!(
                        "mesh \"{}\": bone \"{}\" does not exist in the skeleton, skipping its {} influences",
                        mesh.name,
                        bone.name,
                        bone.weights.len()
                    );
                    report.dangling_bones.push(bone.name.clone());
                }
                continue;
            }
        };

        for w in bone.weights.iter() {
            let vertex = w.vertex as usize;
            if vertex >= vertex_count || !w.weight.is_finite() || w.weight < 0.0 {
                report.invalid_influences += 1;
                continue;
            }

            influences[vertex].push((bone_index, w.weight));
        }
    }

    if report.invalid_influences > 0 {
        log::warn!(
            "mesh \"{}\": skipped {} influences with an invalid vertex id or weight",
            mesh.name,
            report.invalid_influences
        );
    }

    let skin_data = influences
        .into_iter()
        .map(|list| {
            if list.len() > MAX_INFLUENCES {
                report.truncated_vertices += 1;
            }

            match pack_influences(list, settings.weight_epsilon) {
                Some(data) => data,
                None => {
                    report.degenerate_vertices += 1;
                    JointData::default()
                }
            }
        })
        .collect();

    if report.truncated_vertices > 0 {
        log::warn!(
            "mesh \"{}\": {} vertices had more than {} influences, kept the strongest",
            mesh.name,
            report.truncated_vertices,
            MAX_INFLUENCES
        );
    }

    if report.degenerate_vertices > 0 {
        log::warn!(
            "mesh \"{}\": {} vertices had near-zero weights, bound to bone 0",
            mesh.name,
            report.degenerate_vertices
        );
    }

    (skin_data, report)
}

/// Packs one vertex's influences into four slots.
///
/// An empty list yields the bone-0 default; `None` means the kept weights did not sum above
/// `epsilon`.
pub fn pack_influences(mut influences: Vec<(u32, f32)>, epsilon: f32) -> Option<JointData> {
    if influences.is_empty() {
        return Some(JointData::default());
    }

    if influences.len() > MAX_INFLUENCES {
        // sort_by is stable, equal weights stay in encounter order
        influences.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        influences.truncate(MAX_INFLUENCES);
    }

    let total: f32 = influences.iter().map(|(_, w)| *w).sum();
    if total <= epsilon {
        return None;
    }

    let mut joints = [0_u32; 4];
    let mut weights = [0.0_f32; 4];
    for (i, (joint, weight)) in influences.into_iter().enumerate() {
        joints[i] = joint;
        weights[i] = weight / total;
    }

    Some(JointData::from((joints, weights)))
}
