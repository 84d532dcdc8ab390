//! Collision locators <-> host colliders

use glam::Mat4;

use super::convert::{GamePlacement, host_transform, swap_yz};
use crate::basis::{game_to_host, host_to_game};
use crate::config::CollisionSettings;
use crate::error::{Error, Result};
use crate::formats::pic::{ColliderLocator, ConvexPiece, PicShape, build_hull};
use crate::scene::{Collider, ColliderShape};

/// Host collider and transform for a collision locator.
///
/// # Errors
/// [`Error::Inconsistent`] for a convex locator naming a missing piece.
pub(crate) fn collider_from_pic(
    locator: &ColliderLocator,
    pieces: &[ConvexPiece],
    host_per_game: f32,
) -> Result<(Collider, Mat4)> {
    let shape = match &locator.shape {
        PicShape::Box { size } => ColliderShape::Box {
            size: swap_yz(*size).map(|v| v * host_per_game),
        },
        PicShape::Sphere { radius } => ColliderShape::Sphere {
            radius: radius * host_per_game,
        },
        PicShape::Capsule { radius, length } => ColliderShape::Capsule {
            radius: radius * host_per_game,
            length: length * host_per_game,
        },
        PicShape::Cylinder { radius, length } => ColliderShape::Cylinder {
            radius: radius * host_per_game,
            length: length * host_per_game,
        },
        PicShape::Convex { piece } => {
            let hull = pieces.get(*piece).ok_or_else(|| {
                Error::inconsistent(
                    &format!("Locator:{}", locator.name),
                    format!("convex piece {piece} out of range ({} present)", pieces.len()),
                )
            })?;
            ColliderShape::Convex {
                vertices: hull
                    .vertices
                    .iter()
                    .map(|v| game_to_host(*v).map(|c| c * host_per_game))
                    .collect(),
                triangles: hull.triangles.clone(),
            }
        }
    };
    let collider = Collider {
        shape,
        mass: locator.mass,
        material: locator.material.clone(),
        flags: locator.flags,
    };
    let transform = host_transform(locator.position, locator.rotation, [1.0; 3], host_per_game);
    Ok((collider, transform))
}

/// Collision locator for a host collider. Convex shapes are appended to
/// `pieces`; they pass through the hull builder when they exceed the
/// triangle budget or a margin is configured.
///
/// # Errors
/// [`Error::Inconsistent`] when the hull cannot be built.
pub(crate) fn collider_to_pic(
    name: &str,
    collider: &Collider,
    local: Mat4,
    pieces: &mut Vec<ConvexPiece>,
    settings: &CollisionSettings,
    game_per_host: f32,
) -> Result<ColliderLocator> {
    let placement = GamePlacement::from_host(local, game_per_host);
    let shape = match &collider.shape {
        ColliderShape::Box { size } => PicShape::Box {
            size: swap_yz(*size).map(|v| v.abs() * game_per_host),
        },
        ColliderShape::Sphere { radius } => PicShape::Sphere {
            radius: radius * game_per_host,
        },
        ColliderShape::Capsule { radius, length } => PicShape::Capsule {
            radius: radius * game_per_host,
            length: length * game_per_host,
        },
        ColliderShape::Cylinder { radius, length } => PicShape::Cylinder {
            radius: radius * game_per_host,
            length: length * game_per_host,
        },
        ColliderShape::Convex { vertices, triangles } => {
            let points: Vec<[f32; 3]> = vertices
                .iter()
                .map(|v| host_to_game(*v).map(|c| c * game_per_host))
                .collect();
            let piece = if triangles.is_empty()
                || triangles.len() > settings.max_hull_triangles
                || settings.margin > 0.0
            {
                build_hull(&points, settings.max_hull_triangles, settings.margin)
                    .map_err(|e| match e {
                        Error::Inconsistent { message, .. } => {
                            Error::inconsistent(&format!("Locator:{name}"), message)
                        }
                        other => other,
                    })?
                    .into()
            } else {
                ConvexPiece {
                    vertices: points,
                    triangles: triangles.clone(),
                }
            };
            pieces.push(piece);
            PicShape::Convex {
                piece: pieces.len() - 1,
            }
        }
    };
    Ok(ColliderLocator {
        name: name.to_string(),
        shape,
        position: placement.position,
        rotation: placement.rotation,
        mass: collider.mass,
        material: collider.material.clone(),
        flags: collider.flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn locator(shape: PicShape) -> ColliderLocator {
        ColliderLocator {
            name: "col".into(),
            shape,
            position: [0.0, 1.0, -2.0],
            rotation: [1.0, 0.0, 0.0, 0.0],
            mass: 10.0,
            material: "metal".into(),
            flags: 1,
        }
    }

    #[test]
    fn test_box_roundtrip() {
        let original = locator(PicShape::Box { size: [1.0, 2.0, 3.0] });
        let (collider, transform) = collider_from_pic(&original, &[], 1.0).unwrap();
        assert_eq!(collider.shape, ColliderShape::Box { size: [1.0, 3.0, 2.0] });
        let mut pieces = Vec::new();
        let back = collider_to_pic("col", &collider, transform, &mut pieces, &CollisionSettings::default(), 1.0)
            .unwrap();
        assert_eq!(back, original);
        assert!(pieces.is_empty());
    }

    #[test]
    fn test_convex_kept_when_small() {
        let pieces = vec![ConvexPiece {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]],
            triangles: vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        }];
        let original = locator(PicShape::Convex { piece: 0 });
        let (collider, transform) = collider_from_pic(&original, &pieces, 1.0).unwrap();
        let mut out = Vec::new();
        let back =
            collider_to_pic("col", &collider, transform, &mut out, &CollisionSettings::default(), 1.0).unwrap();
        assert_eq!(back.shape, PicShape::Convex { piece: 0 });
        assert_eq!(out, pieces);
    }

    #[test]
    fn test_missing_convex_piece() {
        let err = collider_from_pic(&locator(PicShape::Convex { piece: 2 }), &[], 1.0).unwrap_err();
        assert!(err.to_string().contains("Locator:col"));
    }
}
