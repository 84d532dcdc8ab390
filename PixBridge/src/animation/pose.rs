//! Rest poses and the per-key delta transform
//!
//! For bone `b` with parent `p`, a game sample `S` (relative to the
//! parent's rest pose) maps to the host delta
//!
//! ```text
//! delta = rest_host(b)^-1 * to_host( B * rest_game(p) * S * R(b) )
//! ```
//!
//! where `B` is the basis bridge, `R(b)` removes the bone's rest scale and
//! `to_host` scales the translation into host units. `rest_host(b)` is the
//! same expression evaluated at rest, so a rest sample yields identity.

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::basis::{game_to_host_mat4, host_to_game_mat4};
use crate::formats::pis::{PisBone, PisSkeleton};
use crate::scene::{ArmatureData, BoneData};

/// Translation, XYZ Euler rotation and scale of a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub location: Vec3,
    /// Radians, applied X then Y then Z.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Decomposed {
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, location) = m.to_scale_rotation_translation();
        let (z, y, x) = rotation.normalize().to_euler(EulerRot::ZYX);
        Self {
            location,
            rotation: Vec3::new(x, y, z),
            scale,
        }
    }

    #[must_use]
    pub fn to_matrix(self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::ZYX, self.rotation.z, self.rotation.y, self.rotation.x);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.location)
    }
}

fn scale_translation(mut m: Mat4, factor: f32) -> Mat4 {
    m.w_axis.x *= factor;
    m.w_axis.y *= factor;
    m.w_axis.z *= factor;
    m
}

#[derive(Debug, Clone, PartialEq)]
struct BoneRest {
    parent_game: Mat4,
    parent_game_inverse: Mat4,
    scale_removal: Mat4,
    host: Mat4,
    host_inverse: Mat4,
}

/// Precomputed rest data of one skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct RestPoses {
    bones: Vec<BoneRest>,
    /// Host units per game unit.
    host_per_game: f32,
}

impl RestPoses {
    /// `rests` are armature-space game matrices, `parents` the parent
    /// indices, in bone order.
    #[must_use]
    pub fn new(rests: &[Mat4], parents: &[Option<usize>], host_per_game: f32) -> Self {
        let bones = rests
            .iter()
            .zip(parents)
            .map(|(&rest, parent)| {
                let parent_game = parent.and_then(|p| rests.get(p).copied()).unwrap_or(Mat4::IDENTITY);
                let (scale, _, _) = rest.to_scale_rotation_translation();
                let scale_removal = Mat4::from_scale(scale.recip());
                let host = scale_translation(game_to_host_mat4() * rest * scale_removal, host_per_game);
                BoneRest {
                    parent_game,
                    parent_game_inverse: parent_game.inverse(),
                    scale_removal,
                    host,
                    host_inverse: host.inverse(),
                }
            })
            .collect();
        Self { bones, host_per_game }
    }

    #[must_use]
    pub fn from_skeleton(skeleton: &PisSkeleton, host_per_game: f32) -> Self {
        let rests: Vec<Mat4> = skeleton.bones.iter().map(|b| b.transformation).collect();
        let parents: Vec<Option<usize>> = skeleton.bones.iter().map(|b| b.parent).collect();
        Self::new(&rests, &parents, host_per_game)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Host delta for a game sample of bone `bone`.
    #[must_use]
    pub fn delta(&self, bone: usize, sample: Mat4) -> Mat4 {
        let rest = &self.bones[bone];
        let pose = game_to_host_mat4() * rest.parent_game * sample * rest.scale_removal;
        rest.host_inverse * scale_translation(pose, self.host_per_game)
    }

    /// Game sample for a host delta of bone `bone`; inverse of [`Self::delta`].
    #[must_use]
    pub fn sample(&self, bone: usize, delta: Mat4) -> Mat4 {
        let rest = &self.bones[bone];
        let pose = scale_translation(rest.host * delta, self.host_per_game.recip());
        rest.parent_game_inverse * host_to_game_mat4() * pose * rest.scale_removal.inverse()
    }
}

/// Host armature for a skeleton. Rest matrices keep their scale.
#[must_use]
pub fn skeleton_to_armature(skeleton: &PisSkeleton, host_per_game: f32) -> ArmatureData {
    let bones = skeleton
        .bones
        .iter()
        .map(|bone| BoneData {
            name: bone.name.clone(),
            parent: bone.parent,
            rest: scale_translation(game_to_host_mat4() * bone.transformation, host_per_game),
        })
        .collect();
    ArmatureData {
        bones,
        animations: Vec::new(),
    }
}

/// Skeleton for a host armature; inverse of [`skeleton_to_armature`].
#[must_use]
pub fn armature_to_skeleton(name: &str, armature: &ArmatureData, host_per_game: f32) -> PisSkeleton {
    let bones = armature
        .bones
        .iter()
        .map(|bone| PisBone {
            name: bone.name.clone(),
            parent: bone.parent,
            transformation: host_to_game_mat4() * scale_translation(bone.rest, host_per_game.recip()),
        })
        .collect();
    PisSkeleton {
        name: name.to_string(),
        bones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pis::tests::two_bones;

    fn scaled_skeleton() -> PisSkeleton {
        let mut skeleton = two_bones();
        skeleton.bones[1].transformation = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 1.0),
            Quat::from_rotation_z(0.4),
            Vec3::new(0.0, 1.0, 0.5),
        );
        skeleton
    }

    #[test]
    fn test_rest_sample_is_identity() {
        let skeleton = scaled_skeleton();
        let poses = RestPoses::from_skeleton(&skeleton, 1.0);
        for (index, bone) in skeleton.bones.iter().enumerate() {
            let parent = bone.parent.map_or(Mat4::IDENTITY, |p| skeleton.bones[p].transformation);
            let sample = parent.inverse() * bone.transformation;
            assert!(poses.delta(index, sample).abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn test_delta_inverse() {
        let poses = RestPoses::from_skeleton(&scaled_skeleton(), 2.0);
        let delta = Mat4::from_rotation_translation(Quat::from_rotation_x(0.3), Vec3::new(0.1, 0.2, 0.3));
        let sample = poses.sample(1, delta);
        assert!(poses.delta(1, sample).abs_diff_eq(delta, 1e-5));
    }

    #[test]
    fn test_decompose_roundtrip() {
        let parts = Decomposed {
            location: Vec3::new(1.0, -2.0, 0.5),
            rotation: Vec3::new(0.3, -0.2, 1.1),
            scale: Vec3::new(1.0, 2.0, 1.0),
        };
        let back = Decomposed::from_matrix(parts.to_matrix());
        assert!(back.location.abs_diff_eq(parts.location, 1e-5));
        assert!(back.rotation.abs_diff_eq(parts.rotation, 1e-5));
        assert!(back.scale.abs_diff_eq(parts.scale, 1e-5));
    }

    #[test]
    fn test_armature_roundtrip() {
        let skeleton = scaled_skeleton();
        let armature = skeleton_to_armature(&skeleton, 0.5);
        // Game +Y bone offset is host +Z
        assert!(armature.bones[1].rest.w_axis.z > 0.0);
        let back = armature_to_skeleton("arm", &armature, 0.5);
        for (a, b) in back.bones.iter().zip(&skeleton.bones) {
            assert!(a.transformation.abs_diff_eq(b.transformation, 1e-5));
        }
    }
}
