//! Skeleton rest poses and the animation resampler
//!
//! Import turns every bone channel into nine linear FCurves (location,
//! XYZ Euler rotation, scale) grouped by bone. Export samples those curves
//! at a fixed frame step and writes uniform key times.

mod pose;

pub use pose::{Decomposed, RestPoses, armature_to_skeleton, skeleton_to_armature};

use glam::{Mat4, Vec3};

use crate::basis::{game_to_host, host_to_game};
use crate::error::{Diagnostic, Error, Location, Result};
use crate::formats::pia::{BoneChannel, CustomChannel, PiaAnimation, uniform_times};
use crate::formats::pis::PisSkeleton;
use crate::scene::{AnimationData, ArmatureData, FCurve, Keyframe};

/// Whole-rig translation channel, applied to the armature object.
pub const PRISM_MOVEMENT: &str = "Prism Movement";

const LOCATION: &str = "location";
const ROTATION: &str = "rotation_euler";
const SCALE: &str = "scale";

fn bone_path(bone: &str, property: &str) -> String {
    format!("pose.bones[\"{bone}\"].{property}")
}

fn curve(data_path: String, index: usize, group: &str, keys: Vec<Keyframe>) -> FCurve {
    FCurve {
        data_path,
        index,
        group: group.to_string(),
        keys,
    }
}

/// Frame of every key: cumulative key times at `fps`.
fn key_frames(times: &[f32], fps: f32) -> Vec<f32> {
    times
        .iter()
        .scan(0.0f32, |elapsed, dt| {
            *elapsed += dt;
            Some(*elapsed * fps)
        })
        .collect()
}

fn keys(frames: &[f32], values: impl Iterator<Item = f32>) -> Vec<Keyframe> {
    frames
        .iter()
        .zip(values)
        .map(|(&frame, value)| Keyframe { frame, value })
        .collect()
}

fn bone_curves(bone: &str, frames: &[f32], deltas: &[Decomposed]) -> Vec<FCurve> {
    let mut curves = Vec::with_capacity(9);
    for property in [LOCATION, ROTATION, SCALE] {
        let pick = |d: &Decomposed| match property {
            LOCATION => d.location,
            ROTATION => d.rotation,
            _ => d.scale,
        };
        for axis in 0..3 {
            curves.push(curve(
                bone_path(bone, property),
                axis,
                bone,
                keys(frames, deltas.iter().map(|d| pick(d)[axis])),
            ));
        }
    }
    curves
}

/// Host animation for a game animation.
///
/// Channels naming bones the skeleton lacks are skipped with a
/// diagnostic. `Prism Movement` increments are accumulated into absolute
/// `location` curves on the armature.
#[must_use]
pub fn import_animation(
    animation: &PiaAnimation,
    skeleton: &PisSkeleton,
    fps: f32,
    host_per_game: f32,
) -> (AnimationData, Vec<Diagnostic>) {
    let poses = RestPoses::from_skeleton(skeleton, host_per_game);
    let mut diagnostics = Vec::new();
    let mut curves = Vec::new();
    let mut frame_end = 0.0f32;

    for channel in &animation.bone_channels {
        let Some(bone) = skeleton.bone_index(&channel.bone) else {
            let diagnostic = Diagnostic::new(
                Location::section(format!("BoneChannel:{}", channel.bone)),
                format!("bone not in skeleton '{}', channel skipped", skeleton.name),
            );
            tracing::warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
            continue;
        };
        let frames = key_frames(&channel.times, fps);
        frame_end = frames.last().copied().unwrap_or(0.0).max(frame_end);
        let deltas: Vec<Decomposed> = channel
            .matrices
            .iter()
            .map(|&sample| Decomposed::from_matrix(poses.delta(bone, sample)))
            .collect();
        curves.extend(bone_curves(&channel.bone, &frames, &deltas));
    }

    for channel in &animation.custom_channels {
        if channel.name != PRISM_MOVEMENT {
            let diagnostic = Diagnostic::new(
                Location::section(format!("CustomChannel:{}", channel.name)),
                "unsupported custom channel skipped",
            );
            tracing::warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
            continue;
        }
        let frames = key_frames(&channel.times, fps);
        frame_end = frames.last().copied().unwrap_or(0.0).max(frame_end);
        let absolute: Vec<[f32; 3]> = channel
            .positions
            .iter()
            .scan(Vec3::ZERO, |total, step| {
                *total += Vec3::from_array(game_to_host(*step)) * host_per_game;
                Some(total.to_array())
            })
            .collect();
        for axis in 0..3 {
            curves.push(curve(
                LOCATION.to_string(),
                axis,
                PRISM_MOVEMENT,
                keys(&frames, absolute.iter().map(|p| p[axis])),
            ));
        }
    }

    tracing::debug!("Imported animation '{}': {} curve(s)", animation.name, curves.len());
    (
        AnimationData {
            name: animation.name.clone(),
            fps,
            frame_start: 0.0,
            frame_end,
            curves,
        },
        diagnostics,
    )
}

fn evaluate(animation: &AnimationData, data_path: &str, index: usize, frame: f32, default: f32) -> f32 {
    animation
        .curves
        .iter()
        .find(|c| c.data_path == data_path && c.index == index)
        .map_or(default, |c| c.evaluate(frame))
}

fn evaluate_vec(animation: &AnimationData, data_path: &str, frame: f32, default: f32) -> Vec3 {
    Vec3::new(
        evaluate(animation, data_path, 0, frame, default),
        evaluate(animation, data_path, 1, frame, default),
        evaluate(animation, data_path, 2, frame, default),
    )
}

/// Frames sampled on export: `frame_start..=frame_end` every `step`.
#[must_use]
pub fn sample_frames(animation: &AnimationData, step: u32) -> Vec<f32> {
    let step = step.max(1) as f32;
    let span = (animation.frame_end - animation.frame_start).max(0.0);
    // Tolerate key frames rebuilt from summed float times
    let count = (span / step + 1e-3).floor() as usize + 1;
    (0..count).map(|i| animation.frame_start + i as f32 * step).collect()
}

/// Game animation for a host animation of `armature`.
///
/// Bones with at least one curve get a channel; a `Prism Movement` group
/// becomes the custom channel of the same name.
///
/// # Errors
/// [`Error::Inconsistent`] when the animation has no usable frame rate.
pub fn export_animation(
    animation: &AnimationData,
    armature: &ArmatureData,
    skeleton_name: &str,
    frame_step: u32,
    game_per_host: f32,
) -> Result<PiaAnimation> {
    if animation.fps <= 0.0 {
        return Err(Error::inconsistent(
            &format!("Animation:{}", animation.name),
            format!("frame rate {} is not positive", animation.fps),
        ));
    }
    let host_per_game = game_per_host.recip();
    let skeleton = armature_to_skeleton(skeleton_name, armature, host_per_game);
    let poses = RestPoses::from_skeleton(&skeleton, host_per_game);
    let frames = sample_frames(animation, frame_step);
    let times = uniform_times(frames.len(), frame_step.max(1) as f32 / animation.fps);

    let mut bone_channels = Vec::new();
    for (index, bone) in armature.bones.iter().enumerate() {
        if animation.group(&bone.name).next().is_none() {
            continue;
        }
        let matrices = frames
            .iter()
            .map(|&frame| {
                let delta = Decomposed {
                    location: evaluate_vec(animation, &bone_path(&bone.name, LOCATION), frame, 0.0),
                    rotation: evaluate_vec(animation, &bone_path(&bone.name, ROTATION), frame, 0.0),
                    scale: evaluate_vec(animation, &bone_path(&bone.name, SCALE), frame, 1.0),
                }
                .to_matrix();
                poses.sample(index, delta)
            })
            .collect();
        bone_channels.push(BoneChannel {
            bone: bone.name.clone(),
            times: times.clone(),
            matrices,
        });
    }

    let mut custom_channels = Vec::new();
    if animation.group(PRISM_MOVEMENT).next().is_some() {
        let absolute: Vec<Vec3> = frames
            .iter()
            .map(|&frame| {
                let host = evaluate_vec(animation, LOCATION, frame, 0.0) * game_per_host;
                Vec3::from_array(host_to_game(host.to_array()))
            })
            .collect();
        let positions = absolute
            .iter()
            .enumerate()
            .map(|(i, p)| if i == 0 { p.to_array() } else { (*p - absolute[i - 1]).to_array() })
            .collect();
        custom_channels.push(CustomChannel {
            name: PRISM_MOVEMENT.to_string(),
            times: times.clone(),
            positions,
        });
    }

    let pia = PiaAnimation {
        name: animation.name.clone(),
        skeleton: skeleton_name.to_string(),
        total_time: times.iter().sum(),
        keyframe_count: frames.len(),
        bone_channels,
        custom_channels,
    };
    pia.validate()?;
    tracing::debug!(
        "Exported animation '{}': {} key(s) over {} bone channel(s)",
        pia.name,
        pia.keyframe_count,
        pia.bone_channels.len()
    );
    Ok(pia)
}

/// Rest-relative game matrix of every bone at rest; the samples a
/// motionless channel carries.
#[must_use]
pub fn rest_samples(skeleton: &PisSkeleton) -> Vec<Mat4> {
    skeleton
        .bones
        .iter()
        .map(|bone| {
            let parent = bone
                .parent
                .and_then(|p| skeleton.bones.get(p))
                .map_or(Mat4::IDENTITY, |p| p.transformation);
            parent.inverse() * bone.transformation
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pis::tests::two_bones;
    use glam::Quat;

    fn swing() -> PiaAnimation {
        let skeleton = two_bones();
        let rest = rest_samples(&skeleton)[1];
        let matrices = (0..3)
            .map(|i| rest * Mat4::from_quat(Quat::from_rotation_z(i as f32 * 0.2)))
            .collect();
        PiaAnimation {
            name: "swing".into(),
            skeleton: "arm.pis".into(),
            total_time: 2.0 / 30.0,
            keyframe_count: 3,
            bone_channels: vec![BoneChannel {
                bone: "hinge".into(),
                times: uniform_times(3, 1.0 / 30.0),
                matrices,
            }],
            custom_channels: vec![CustomChannel {
                name: PRISM_MOVEMENT.into(),
                times: uniform_times(3, 1.0 / 30.0),
                positions: vec![[0.0; 3], [0.0, 0.0, -1.0], [0.0, 0.0, -1.0]],
            }],
        }
    }

    #[test]
    fn test_import_builds_nine_curves_per_bone() {
        let (data, diagnostics) = import_animation(&swing(), &two_bones(), 30.0, 1.0);
        assert!(diagnostics.is_empty());
        assert_eq!(data.group("hinge").count(), 9);
        assert!((data.frame_end - 2.0).abs() < 1e-4);

        // First key sits at rest
        let first_rotation = data
            .curves
            .iter()
            .find(|c| c.data_path == bone_path("hinge", ROTATION) && c.index == 2)
            .unwrap();
        assert!(first_rotation.keys[0].value.abs() < 1e-5);
    }

    #[test]
    fn test_prism_movement_accumulates() {
        let (data, _) = import_animation(&swing(), &two_bones(), 30.0, 1.0);
        let forward: Vec<f32> = data
            .group(PRISM_MOVEMENT)
            .find(|c| c.index == 1)
            .unwrap()
            .keys
            .iter()
            .map(|k| k.value)
            .collect();
        // Game -Z is host +Y
        assert_eq!(forward, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_unknown_bone_is_diagnosed() {
        let mut animation = swing();
        animation.bone_channels[0].bone = "ghost".into();
        let (data, diagnostics) = import_animation(&animation, &two_bones(), 30.0, 1.0);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(data.group("ghost").count(), 0);
    }

    #[test]
    fn test_export_reverses_import() {
        let skeleton = two_bones();
        let original = swing();
        let (data, _) = import_animation(&original, &skeleton, 30.0, 1.0);
        let armature = skeleton_to_armature(&skeleton, 1.0);
        let exported = export_animation(&data, &armature, "arm.pis", 1, 1.0).unwrap();

        assert_eq!(exported.keyframe_count, 3);
        assert_eq!(exported.bone_channels.len(), 1);
        for (a, b) in exported.bone_channels[0].matrices.iter().zip(&original.bone_channels[0].matrices) {
            assert!(a.abs_diff_eq(*b, 1e-4));
        }
        let prism = &exported.custom_channels[0];
        assert!(Vec3::from_array(prism.positions[2]).abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
        assert!((exported.total_time - original.total_time).abs() < 1e-5);
    }

    #[test]
    fn test_sample_frames_step() {
        let data = AnimationData {
            name: "a".into(),
            fps: 30.0,
            frame_start: 0.0,
            frame_end: 10.0,
            curves: Vec::new(),
        };
        assert_eq!(sample_frames(&data, 5), vec![0.0, 5.0, 10.0]);
        assert_eq!(sample_frames(&data, 4).len(), 3);
    }
}
