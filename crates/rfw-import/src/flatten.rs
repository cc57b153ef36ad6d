use crate::model::Bone;
use crate::source::{SourceMesh, SourceNode};
use rfw_math::*;
use rfw_utils::log;
use std::collections::{HashMap, HashSet};

/// Flat bone array plus name lookup, built from a node tree.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    pub bone_map: HashMap<String, usize>,
}

impl Skeleton {
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn index_of<S: AsRef<str>>(&self, name: S) -> Option<usize> {
        self.bone_map.get(name.as_ref()).copied()
    }

    /// Attaches inverse bind matrices from the mesh skins. The first mesh that binds a bone wins.
    pub fn assign_offsets(&mut self, meshes: &[SourceMesh]) {
        let mut assigned = vec![false; self.bones.len()];

        for mesh in meshes {
            for source_bone in mesh.bones.iter() {
                let index = match self.bone_map.get(&source_bone.name) {
                    Some(i) => *i,
                    None => continue,
                };

                if !assigned[index] {
                    self.bones[index].offset_matrix = source_bone.offset_matrix;
                    assigned[index] = true;
                } else if !self.bones[index]
                    .offset_matrix
                    .abs_diff_eq(source_bone.offset_matrix, 1e-4)
                {
                    log::warn!(
                        "mesh \"{}\" binds bone \"{}\" with a different offset matrix, keeping the first",
                        mesh.name,
                        source_bone.name
                    );
                }
            }
        }
    }
}

/// Names of every node referenced as a bone by any mesh skin.
pub fn collect_bone_names(meshes: &[SourceMesh]) -> HashSet<String> {
    meshes
        .iter()
        .flat_map(|m| m.bones.iter().map(|b| b.name.clone()))
        .collect()
}

/// Walks the node tree depth-first and assigns bone indices in discovery order, so a
/// parent bone always precedes its children.
///
/// Non-bone nodes are folded into the next bone's bind transform. Bones without a bone
/// ancestor become roots with parent index -1.
pub fn flatten_skeleton(root: &SourceNode, bone_names: &HashSet<String>) -> Skeleton {
    let mut skeleton = Skeleton::default();
    if bone_names.is_empty() {
        return skeleton;
    }

    traverse(root, -1, Mat4::IDENTITY, bone_names, &mut skeleton);

    for name in bone_names.iter() {
        if !skeleton.bone_map.contains_key(name) {
            log::warn!(
                "skin references bone \"{}\" which is not part of the node hierarchy",
                name
            );
        }
    }

    skeleton
}

fn traverse(
    node: &SourceNode,
    parent_index: i32,
    accumulated: Mat4,
    bone_names: &HashSet<String>,
    skeleton: &mut Skeleton,
) {
    let is_bone = bone_names.contains(&node.name);
    if is_bone && skeleton.bone_map.contains_key(&node.name) {
        log::warn!(
            "bone name \"{}\" appears on more than one node, treating later occurrences as plain nodes",
            node.name
        );
    }

    if is_bone && !skeleton.bone_map.contains_key(&node.name) {
        let index = skeleton.bones.len();
        skeleton.bones.push(Bone {
            name: node.name.clone(),
            parent_index,
            local_bind_transform: accumulated * node.transform,
            offset_matrix: Mat4::IDENTITY,
            pre_transform: accumulated,
        });
        skeleton.bone_map.insert(node.name.clone(), index);

        for child in node.children.iter() {
            traverse(child, index as i32, Mat4::IDENTITY, bone_names, skeleton);
        }
    } else {
        let accumulated = accumulated * node.transform;
        for child in node.children.iter() {
            traverse(child, parent_index, accumulated, bone_names, skeleton);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceBone;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn translation(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn non_bone_root_is_folded_into_first_bone() {
        let root_t = translation(0.0, 1.0, 0.0) * Mat4::from_rotation_y(0.3);
        let spine_t = translation(0.0, 2.0, 0.0);
        let head_t = translation(0.0, 0.5, 0.0);

        let root = SourceNode::new("Root", root_t).with_child(
            SourceNode::new("Spine", spine_t).with_child(SourceNode::new("Head", head_t)),
        );

        let skeleton = flatten_skeleton(&root, &names(&["Spine", "Head"]));
        assert_eq!(skeleton.len(), 2);

        let spine = &skeleton.bones[0];
        let head = &skeleton.bones[1];
        assert_eq!(spine.name, "Spine");
        assert_eq!(spine.parent_index, -1);
        assert_eq!(head.name, "Head");
        assert_eq!(head.parent_index, 0);

        assert!(spine
            .local_bind_transform
            .abs_diff_eq(root_t * spine_t, 1e-6));
        assert!(spine.pre_transform.abs_diff_eq(root_t, 1e-6));
        assert!(head.local_bind_transform.abs_diff_eq(head_t, 1e-6));
        assert_eq!(skeleton.index_of("Head"), Some(1));
    }

    #[test]
    fn intermediate_nodes_fold_between_bones() {
        let a = translation(1.0, 0.0, 0.0);
        let helper = translation(0.0, 1.0, 0.0);
        let b = translation(0.0, 0.0, 1.0);

        let root = SourceNode::new("A", a)
            .with_child(SourceNode::new("Helper", helper).with_child(SourceNode::new("B", b)));

        let skeleton = flatten_skeleton(&root, &names(&["A", "B"]));
        assert_eq!(skeleton.bones[1].parent_index, 0);
        assert!(skeleton.bones[1]
            .local_bind_transform
            .abs_diff_eq(helper * b, 1e-6));
    }

    #[test]
    fn disconnected_roots_and_ordering() {
        let root = SourceNode::new("Scene", Mat4::IDENTITY)
            .with_child(
                SourceNode::new("L0", Mat4::IDENTITY)
                    .with_child(SourceNode::new("L1", Mat4::IDENTITY))
                    .with_child(SourceNode::new("L2", Mat4::IDENTITY)),
            )
            .with_child(
                SourceNode::new("Props", Mat4::IDENTITY).with_child(
                    SourceNode::new("R0", Mat4::IDENTITY)
                        .with_child(SourceNode::new("R1", Mat4::IDENTITY)),
                ),
            );

        let skeleton = flatten_skeleton(&root, &names(&["L0", "L1", "L2", "R0", "R1"]));
        let order: Vec<&str> = skeleton.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(order, vec!["L0", "L1", "L2", "R0", "R1"]);

        let roots = skeleton.bones.iter().filter(|b| b.is_root()).count();
        assert_eq!(roots, 2);

        for (i, bone) in skeleton.bones.iter().enumerate() {
            assert!(bone.parent_index == -1 || (bone.parent_index as usize) < i);
        }
    }

    #[test]
    fn no_bones_gives_empty_skeleton() {
        let root = SourceNode::new("Root", Mat4::IDENTITY)
            .with_child(SourceNode::new("Mesh", Mat4::IDENTITY));
        let skeleton = flatten_skeleton(&root, &HashSet::new());
        assert!(skeleton.is_empty());
        assert!(skeleton.bone_map.is_empty());
    }

    #[test]
    fn duplicate_bone_names_keep_first_node() {
        let root = SourceNode::new("Root", Mat4::IDENTITY)
            .with_child(SourceNode::new("Bone", translation(1.0, 0.0, 0.0)))
            .with_child(SourceNode::new("Bone", translation(2.0, 0.0, 0.0)));

        let skeleton = flatten_skeleton(&root, &names(&["Bone"]));
        assert_eq!(skeleton.len(), 1);
        assert!(skeleton.bones[0]
            .local_bind_transform
            .abs_diff_eq(translation(1.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn offsets_come_from_first_binding_mesh() {
        let root = SourceNode::new("Hip", Mat4::IDENTITY);
        let mut skeleton = flatten_skeleton(&root, &names(&["Hip"]));

        let offset = translation(0.0, -1.0, 0.0);
        let meshes = vec![
            SourceMesh {
                bones: vec![SourceBone {
                    name: String::from("Hip"),
                    offset_matrix: offset,
                    weights: Vec::new(),
                }],
                ..Default::default()
            },
            SourceMesh {
                bones: vec![SourceBone {
                    name: String::from("Hip"),
                    offset_matrix: translation(5.0, 5.0, 5.0),
                    weights: Vec::new(),
                }],
                ..Default::default()
            },
        ];

        skeleton.assign_offsets(&meshes);
        assert_eq!(skeleton.bones[0].offset_matrix, offset);
        assert_eq!(collect_bone_names(&meshes), names(&["Hip"]));
    }
}
