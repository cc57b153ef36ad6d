use crate::animation::AnimationClip;
use crate::model::{Bone, ModelData};
use rfw_math::*;

/// Composes world and skinning matrices for bones stored parent-before-child.
///
/// `world[i] = world[parent] * local[i]` (just `local[i]` for roots) and
/// `skinning[i] = world[i] * offset[i]`. All slices must be as long as `bones`.
pub fn resolve_skinning_matrices(
    bones: &[Bone],
    local: &[Mat4],
    world: &mut [Mat4],
    skinning: &mut [Mat4],
) {
    debug_assert_eq!(bones.len(), local.len());
    debug_assert_eq!(bones.len(), world.len());
    debug_assert_eq!(bones.len(), skinning.len());

    for (i, bone) in bones.iter().enumerate() {
        world[i] = match bone.parent() {
            Some(parent) if parent < i => world[parent] * local[i],
            _ => local[i],
        };
        skinning[i] = world[i] * bone.offset_matrix;
    }
}

/// Per-instance pose state. Owned and mutated by whoever animates the model, never shared.
#[derive(Debug, Clone, Default)]
pub struct SkeletonPose {
    local: Vec<Mat4>,
    world: Vec<Mat4>,
    skinning: Vec<Mat4>,
}

impl SkeletonPose {
    /// Starts in (resolved) bind pose.
    pub fn new(bones: &[Bone]) -> Self {
        let mut pose = Self::default();
        pose.reset_to_bind(bones);
        pose.resolve(bones);
        pose
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    pub fn reset_to_bind(&mut self, bones: &[Bone]) {
        self.local.clear();
        self.local.extend(bones.iter().map(|b| b.local_bind_transform));
        self.world.resize(bones.len(), Mat4::IDENTITY);
        self.skinning.resize(bones.len(), Mat4::IDENTITY);
    }

    /// Overrides a single bone's local transform. Out-of-range indices are ignored.
    pub fn set_local(&mut self, index: usize, transform: Mat4) {
        if let Some(local) = self.local.get_mut(index) {
            *local = transform;
        }
    }

    /// Poses the skeleton of `model` with `clip` sampled at `time` and resolves it.
    ///
    /// Bones without a channel keep their bind transform; channels that target nodes which
    /// are not bones are ignored.
    pub fn apply_clip(&mut self, model: &ModelData, clip: &AnimationClip, time: f32) -> &[Mat4] {
        let bones = model.bones();
        self.reset_to_bind(bones);

        let time = clip.normalize_time(time);
        for channel in clip.channels.iter() {
            if let Some(index) = model.bone_index(&channel.target) {
                let sampled = channel.sample(time).to_matrix();
                self.local[index] = bones[index].pre_transform * sampled;
            }
        }

        self.resolve(bones)
    }

    /// Recomputes world and skinning matrices from the current local transforms.
    pub fn resolve(&mut self, bones: &[Bone]) -> &[Mat4] {
        if self.local.len() != bones.len() {
            self.reset_to_bind(bones);
        }

        resolve_skinning_matrices(bones, &self.local, &mut self.world, &mut self.skinning);
        self.skinning.as_slice()
    }

    pub fn local_transforms(&self) -> &[Mat4] {
        self.local.as_slice()
    }

    pub fn world_transforms(&self) -> &[Mat4] {
        self.world.as_slice()
    }

    pub fn skinning_matrices(&self) -> &[Mat4] {
        self.skinning.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{AnimationChannel, AnimationCollection, Keyframe, Track};
    use std::collections::HashMap;

    fn chain() -> Vec<Bone> {
        let hip_bind = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let spine_bind = Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0));
        vec![
            Bone {
                name: String::from("Hip"),
                parent_index: -1,
                local_bind_transform: hip_bind,
                offset_matrix: hip_bind.inverse(),
                pre_transform: Mat4::IDENTITY,
            },
            Bone {
                name: String::from("Spine"),
                parent_index: 0,
                local_bind_transform: spine_bind,
                offset_matrix: (hip_bind * spine_bind).inverse(),
                pre_transform: Mat4::IDENTITY,
            },
        ]
    }

    fn model_with(bones: Vec<Bone>, clip: AnimationClip) -> ModelData {
        let bone_map: HashMap<String, usize> = bones
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect();
        ModelData::new(
            String::from("chain"),
            Vec::new(),
            bones,
            bone_map,
            Some(AnimationCollection::new(vec![clip])),
        )
    }

    fn rotate_spine_clip() -> AnimationClip {
        let rotations = Track::from_keys(vec![
            Keyframe::new(0.0, Quat::IDENTITY),
            Keyframe::new(1.0, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        ])
        .0;
        let positions = Track::from_keys(vec![Keyframe::new(0.0, Vec3::new(0.0, 0.5, 0.0))]).0;

        AnimationClip {
            name: String::from("bend"),
            duration: 1.0,
            ticks_per_second: 1.0,
            looping: false,
            channels: vec![
                AnimationChannel {
                    target: String::from("Spine"),
                    positions,
                    rotations,
                    ..Default::default()
                },
                AnimationChannel {
                    target: String::from("Camera"),
                    positions: Track::from_keys(vec![Keyframe::new(0.0, Vec3::splat(9.0))]).0,
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn bind_pose_skins_to_identity() {
        let bones = chain();
        let pose = SkeletonPose::new(&bones);
        assert_eq!(pose.len(), 2);
        for m in pose.skinning_matrices() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        }
        assert!(pose.world_transforms()[1]
            .abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 1.5, 0.0)), 1e-6));
    }

    #[test]
    fn world_follows_parent() {
        let bones = chain();
        let mut pose = SkeletonPose::new(&bones);
        let moved = Mat4::from_translation(Vec3::new(2.0, 1.0, 0.0));
        pose.set_local(0, moved);
        pose.resolve(&bones);

        let spine_world = pose.world_transforms()[1];
        assert!(spine_world.abs_diff_eq(moved * bones[1].local_bind_transform, 1e-6));

        let mut world = vec![Mat4::IDENTITY; 2];
        let mut skinning = vec![Mat4::IDENTITY; 2];
        resolve_skinning_matrices(&bones, pose.local_transforms(), &mut world, &mut skinning);
        assert_eq!(world.as_slice(), pose.world_transforms());
        assert_eq!(skinning.as_slice(), pose.skinning_matrices());
    }

    #[test]
    fn clip_overrides_animated_bones_only() {
        let model = model_with(chain(), rotate_spine_clip());
        let clip = model.clip("bend").unwrap();
        let mut pose = SkeletonPose::new(model.bones());

        pose.apply_clip(&model, clip, 1.0);

        // Hip has no channel, stays at bind.
        assert!(pose.local_transforms()[0]
            .abs_diff_eq(model.bones()[0].local_bind_transform, 1e-6));

        let spine_world = pose.world_transforms()[1];
        let tip = spine_world.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 2.5, 0.0), 1e-5));
    }

    #[test]
    fn at_time_zero_clip_matches_bind() {
        let model = model_with(chain(), rotate_spine_clip());
        let clip = model.clip("bend").unwrap();
        let mut pose = SkeletonPose::new(model.bones());

        let skinning = pose.apply_clip(&model, clip, 0.0).to_vec();
        for m in skinning.iter() {
            assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn pre_transform_is_kept_under_animation() {
        let mut bones = chain();
        let helper = Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        bones[1].pre_transform = helper;
        bones[1].local_bind_transform = helper * bones[1].local_bind_transform;

        let model = model_with(bones, rotate_spine_clip());
        let clip = model.clip("bend").unwrap();
        let mut pose = SkeletonPose::new(model.bones());
        pose.apply_clip(&model, clip, 0.0);

        assert!(pose.local_transforms()[1]
            .abs_diff_eq(model.bones()[1].local_bind_transform, 1e-6));
    }

    #[test]
    fn empty_skeleton() {
        let mut pose = SkeletonPose::new(&[]);
        assert!(pose.is_empty());
        assert!(pose.resolve(&[]).is_empty());
    }
}
