//! Locator transforms between PIX records and host objects

use glam::{Mat4, Quat, Vec3};

use crate::basis::{game_to_host, game_to_host_quat, host_to_game, host_to_game_quat, quat_from_wxyz, quat_to_wxyz};

/// Per-axis extents swap Y and Z under the basis bridge; signs drop out.
pub(crate) fn swap_yz(v: [f32; 3]) -> [f32; 3] {
    [v[0], v[2], v[1]]
}

/// Host transform for a game-space placement.
pub(crate) fn host_transform(position: [f32; 3], rotation: [f32; 4], scale: [f32; 3], host_per_game: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        Vec3::from_array(swap_yz(scale)),
        game_to_host_quat(quat_from_wxyz(rotation)).normalize(),
        Vec3::from_array(game_to_host(position)) * host_per_game,
    )
}

/// A root-relative host transform split into game-space parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GamePlacement {
    pub position: [f32; 3],
    /// `( w x y z )`, `w >= 0`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl GamePlacement {
    pub(crate) fn from_host(local: Mat4, game_per_host: f32) -> Self {
        let (scale, rotation, translation) = local.to_scale_rotation_translation();
        let rotation = host_to_game_quat(rotation.normalize());
        let rotation = if rotation.w < 0.0 { -rotation } else { rotation };
        Self {
            position: host_to_game((translation * game_per_host).to_array()).map(|v| v + 0.0),
            rotation: quat_to_wxyz(canonical(rotation)),
            scale: swap_yz(scale.to_array()),
        }
    }
}

/// Snap near-identity rotations so untouched locators write `1 0 0 0`.
fn canonical(q: Quat) -> Quat {
    if q.abs_diff_eq(Quat::IDENTITY, 1e-7) {
        Quat::IDENTITY
    } else {
        q
    }
}

/// `world` relative to `root`, skipping the product when `root` is identity.
pub(crate) fn relative_to(root: Mat4, world: Mat4) -> Mat4 {
    if root == Mat4::IDENTITY {
        world
    } else {
        root.inverse() * world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_roundtrip() {
        let rotation = quat_to_wxyz(Quat::from_rotation_y(0.7));
        let host = host_transform([1.0, 2.0, -3.0], rotation, [1.0, 2.0, 3.0], 2.0);
        // Game -Z forward is host +Y
        assert!((host.w_axis.y - 6.0).abs() < 1e-6);
        let back = GamePlacement::from_host(host, 0.5);
        for (a, b) in back.position.iter().zip([1.0, 2.0, -3.0]) {
            assert!((a - b).abs() < 1e-5);
        }
        for (a, b) in back.rotation.iter().zip(rotation) {
            assert!((a - b).abs() < 1e-5);
        }
        for (a, b) in back.scale.iter().zip([1.0, 2.0, 3.0]) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_identity_placement_is_exact() {
        let back = GamePlacement::from_host(Mat4::IDENTITY, 1.0);
        assert_eq!(back.rotation, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(back.scale, [1.0; 3]);
    }
}
