//! Host (Z-up) <-> game (Y-up, inverted Z) basis bridge
//!
//! The bridge is a +90 degree rotation about X: game `(x, y, z)` is host
//! `(x, -z, y)`. Vector and quaternion conversions are component
//! permutations with sign flips, so they are exact.

use glam::{Mat3, Mat4, Quat, Vec3};

/// Host-from-game rotation.
pub const GAME_TO_HOST: Mat3 = Mat3::from_cols(
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(0.0, -1.0, 0.0),
);

/// Game-from-host rotation.
pub const HOST_TO_GAME: Mat3 = Mat3::from_cols(
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(0.0, 0.0, -1.0),
    Vec3::new(0.0, 1.0, 0.0),
);

#[must_use]
pub fn game_to_host_mat4() -> Mat4 {
    Mat4::from_mat3(GAME_TO_HOST)
}

#[must_use]
pub fn host_to_game_mat4() -> Mat4 {
    Mat4::from_mat3(HOST_TO_GAME)
}

#[must_use]
pub fn host_to_game(p: [f32; 3]) -> [f32; 3] {
    [p[0], p[2], -p[1]]
}

#[must_use]
pub fn game_to_host(p: [f32; 3]) -> [f32; 3] {
    [p[0], -p[2], p[1]]
}

#[must_use]
pub fn host_to_game_vec(v: Vec3) -> Vec3 {
    Vec3::from_array(host_to_game(v.to_array()))
}

#[must_use]
pub fn game_to_host_vec(v: Vec3) -> Vec3 {
    Vec3::from_array(game_to_host(v.to_array()))
}

/// Orientation in game basis for a host orientation.
#[must_use]
pub fn host_to_game_quat(q: Quat) -> Quat {
    Quat::from_xyzw(q.x, q.z, -q.y, q.w)
}

/// Orientation in host basis for a game orientation.
#[must_use]
pub fn game_to_host_quat(q: Quat) -> Quat {
    Quat::from_xyzw(q.x, -q.z, q.y, q.w)
}

/// Change of basis for a full transform: `B * m * B^-1`.
#[must_use]
pub fn host_to_game_transform(m: Mat4) -> Mat4 {
    host_to_game_mat4() * m * game_to_host_mat4()
}

#[must_use]
pub fn game_to_host_transform(m: Mat4) -> Mat4 {
    game_to_host_mat4() * m * host_to_game_mat4()
}

/// Quaternion stored as `( w x y z )` in PIX files.
#[must_use]
pub fn quat_to_wxyz(q: Quat) -> [f32; 4] {
    [q.w, q.x, q.y, q.z]
}

#[must_use]
pub fn quat_from_wxyz(v: [f32; 4]) -> Quat {
    Quat::from_xyzw(v[1], v[2], v[3], v[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_matches_rotation() {
        let rot = Mat3::from_quat(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        assert!(rot.abs_diff_eq(GAME_TO_HOST, 1e-6));
        assert_eq!(GAME_TO_HOST.transpose(), HOST_TO_GAME);
    }

    #[test]
    fn test_position_roundtrip_is_exact() {
        let samples = [[0.1f32, -2.5, 3.75], [f32::MIN_POSITIVE, 1e30, -0.0], [7.0, 0.0, -1e-8]];
        for p in samples {
            let back = game_to_host(host_to_game(p));
            let bits = |a: [f32; 3]| a.map(f32::to_bits);
            assert_eq!(bits(back), bits(p));
        }
    }

    #[test]
    fn test_vector_matches_matrix() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(GAME_TO_HOST * p, game_to_host_vec(p));
        assert_eq!(HOST_TO_GAME * p, host_to_game_vec(p));
        // Game up (Y) is host up (Z); game forward (-Z) is host +Y
        assert_eq!(game_to_host_vec(Vec3::Y), Vec3::Z);
        assert_eq!(game_to_host_vec(Vec3::NEG_Z), Vec3::Y);
    }

    #[test]
    fn test_quat_conversion_matches_sandwich() {
        let q = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.1, 2.0);
        let host = game_to_host_quat(q);
        let b = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);
        let sandwich = b * q * b.inverse();
        assert!(host.abs_diff_eq(sandwich, 1e-6) || host.abs_diff_eq(-sandwich, 1e-6));
        assert_eq!(host_to_game_quat(host), q);
    }

    #[test]
    fn test_transform_roundtrip() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 2.0, 0.5),
            Quat::from_rotation_y(0.7),
            Vec3::new(4.0, -1.0, 9.0),
        );
        assert!(game_to_host_transform(host_to_game_transform(m)).abs_diff_eq(m, 1e-6));
    }
}
