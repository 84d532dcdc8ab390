//! Model pieces <-> host meshes

use std::collections::HashMap;

use glam::{Mat3, Mat4, Vec3};

use crate::basis::{game_to_host, host_to_game};
use crate::error::{Error, Result};
use crate::formats::pim::{Influence, Piece, UvChannel};
use crate::scene::{ColorLayer, Face, MeshData, SkinInfluence, UvLayer};

/// Separator between texture-coordinate aliases in a UV layer name.
pub const UV_ALIAS_SEPARATOR: char = ',';

fn scaled(p: [f32; 3], factor: f32) -> [f32; 3] {
    p.map(|v| v * factor)
}

/// Host mesh for one piece. `bones[i]` maps the model's bone `i` to the
/// armature bone index; unmapped influences are dropped.
pub(crate) fn piece_to_mesh(piece: &Piece, alias: &str, bones: &[Option<usize>], host_per_game: f32) -> MeshData {
    let skin = piece
        .skin
        .iter()
        .map(|influences| {
            influences
                .iter()
                .filter_map(|i| {
                    bones.get(i.bone).copied().flatten().map(|bone| SkinInfluence {
                        bone,
                        weight: i.weight,
                    })
                })
                .collect()
        })
        .collect();

    MeshData {
        positions: piece
            .positions
            .iter()
            .map(|p| scaled(game_to_host(*p), host_per_game))
            .collect(),
        faces: piece
            .triangles
            .iter()
            .map(|t| Face {
                vertices: *t,
                material: 0,
            })
            .collect(),
        normals: piece.normals.iter().map(|n| game_to_host(*n)).collect(),
        tangents: piece
            .tangents
            .iter()
            .map(|t| {
                let [x, y, z] = game_to_host([t[0], t[1], t[2]]);
                [x, y, z, t[3]]
            })
            .collect(),
        uv_layers: piece
            .uvs
            .iter()
            .map(|uv| UvLayer {
                name: uv.aliases.join(&UV_ALIAS_SEPARATOR.to_string()),
                corners: uv.corners.clone(),
            })
            .collect(),
        color_layers: piece
            .colors
            .iter()
            .enumerate()
            .map(|(i, corners)| ColorLayer {
                name: format!("color{i}"),
                corners: corners.clone(),
            })
            .collect(),
        materials: vec![alias.to_string()],
        skin,
    }
}

/// Object-local to root-relative mapping of one mesh.
struct Placement {
    points: Mat4,
    normals: Mat3,
    directions: Mat3,
    identity: bool,
}

impl Placement {
    fn new(local: Mat4) -> Self {
        let directions = Mat3::from_mat4(local);
        Self {
            points: local,
            normals: directions.inverse().transpose(),
            directions,
            identity: local == Mat4::IDENTITY,
        }
    }

    fn point(&self, p: [f32; 3]) -> [f32; 3] {
        if self.identity {
            p
        } else {
            self.points.transform_point3(Vec3::from_array(p)).to_array()
        }
    }

    fn normal(&self, n: [f32; 3]) -> [f32; 3] {
        if self.identity {
            n
        } else {
            (self.normals * Vec3::from_array(n)).normalize_or_zero().to_array()
        }
    }

    fn direction(&self, d: [f32; 3]) -> [f32; 3] {
        if self.identity {
            d
        } else {
            (self.directions * Vec3::from_array(d)).normalize_or_zero().to_array()
        }
    }
}

fn uv_aliases(name: &str, index: usize) -> Vec<String> {
    let aliases: Vec<String> = name
        .split(UV_ALIAS_SEPARATOR)
        .map(str::trim)
        .filter(|a| a.starts_with("_TEXCOORD"))
        .map(str::to_string)
        .collect();
    if aliases.is_empty() {
        vec![format!("_TEXCOORD{index}")]
    } else {
        aliases
    }
}

/// Split a host mesh into one piece per used material slot.
///
/// `local` maps the mesh into root space; `material_ids` is the export
/// material column order.
///
/// # Errors
/// [`Error::Inconsistent`] when a face uses a slot the mesh lacks or a slot
/// names a material outside `material_ids`.
pub(crate) fn mesh_to_pieces(
    mesh: &MeshData,
    name: &str,
    local: Mat4,
    material_ids: &[String],
    game_per_host: f32,
) -> Result<Vec<Piece>> {
    let path = format!("Mesh:{name}");
    let placement = Placement::new(local);
    let corners = mesh.corner_count();
    for (what, len) in [("normal", mesh.normals.len()), ("tangent", mesh.tangents.len())] {
        if len != 0 && len != corners {
            return Err(Error::inconsistent(&path, format!("{what} layer has {len} corners, expected {corners}")));
        }
    }

    let mut slots: Vec<usize> = mesh.faces.iter().map(|f| f.material).collect();
    slots.sort_unstable();
    slots.dedup();

    let mut pieces = Vec::with_capacity(slots.len());
    for slot in slots {
        let alias = mesh.materials.get(slot).ok_or_else(|| {
            Error::inconsistent(
                &path,
                format!("face uses material slot {slot}, the mesh has {}", mesh.materials.len()),
            )
        })?;
        let material = material_ids.iter().position(|id| id == alias).ok_or_else(|| {
            Error::inconsistent(&path, format!("material '{alias}' is not in the active look"))
        })?;

        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut piece = Piece {
            material,
            uvs: mesh
                .uv_layers
                .iter()
                .enumerate()
                .map(|(i, layer)| UvChannel {
                    aliases: uv_aliases(&layer.name, i),
                    corners: Vec::new(),
                })
                .collect(),
            colors: vec![Vec::new(); mesh.color_layers.len()],
            ..Piece::default()
        };

        for (face_index, face) in mesh.faces.iter().enumerate().filter(|(_, f)| f.material == slot) {
            let mut triangle = [0u32; 3];
            for (k, &vertex) in face.vertices.iter().enumerate() {
                let source = mesh
                    .positions
                    .get(vertex as usize)
                    .ok_or_else(|| Error::inconsistent(&path, format!("face references vertex {vertex}")))?;
                let next = piece.positions.len() as u32;
                triangle[k] = *remap.entry(vertex).or_insert_with(|| {
                    piece.positions.push(scaled(host_to_game(placement.point(*source)), game_per_host));
                    if mesh.is_skinned() {
                        let influences = mesh.skin.get(vertex as usize).map_or_else(Vec::new, |s| {
                            s.iter()
                                .map(|i| Influence {
                                    bone: i.bone,
                                    weight: i.weight,
                                })
                                .collect()
                        });
                        piece.skin.push(influences);
                    }
                    next
                });

                let corner = face_index * 3 + k;
                let normal = mesh.normals.get(corner).copied().unwrap_or([0.0, 0.0, 1.0]);
                piece.normals.push(host_to_game(placement.normal(normal)));
                if let Some(t) = mesh.tangents.get(corner) {
                    let [x, y, z] = host_to_game(placement.direction([t[0], t[1], t[2]]));
                    piece.tangents.push([x, y, z, t[3]]);
                }
                for (channel, layer) in piece.uvs.iter_mut().zip(&mesh.uv_layers) {
                    channel.corners.push(layer.corners.get(corner).copied().unwrap_or_default());
                }
                for (colors, layer) in piece.colors.iter_mut().zip(&mesh.color_layers) {
                    colors.push(layer.corners.get(corner).copied().unwrap_or([1.0; 4]));
                }
            }
            piece.triangles.push(triangle);
        }
        pieces.push(piece);
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pim::tests::triangle_model;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_piece_roundtrip_is_exact() {
        let piece = triangle_model().pieces.remove(0);
        let mesh = piece_to_mesh(&piece, "paint", &[], 1.0);
        assert_eq!(mesh.uv_layers[0].name, "_TEXCOORD0");
        // Game -Z is host +Y
        assert_eq!(mesh.positions[2], [0.0, 1.0, 0.0]);
        let back = mesh_to_pieces(&mesh, "tri", Mat4::IDENTITY, &["paint".to_string()], 1.0).unwrap();
        assert_eq!(back, vec![piece]);
    }

    #[test]
    fn test_split_by_material_slot() {
        let mut mesh = piece_to_mesh(&triangle_model().pieces[0], "paint", &[], 1.0);
        mesh.positions.push([0.0, 0.0, 1.0]);
        mesh.faces.push(Face {
            vertices: [0, 1, 3],
            material: 1,
        });
        mesh.normals.extend([[0.0, 0.0, 1.0]; 3]);
        mesh.uv_layers[0].corners.extend([[0.0, 0.0]; 3]);
        mesh.materials.push("glass".into());

        let ids = ["glass".to_string(), "paint".to_string()];
        let pieces = mesh_to_pieces(&mesh, "tri", Mat4::IDENTITY, &ids, 1.0).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].material, 1);
        assert_eq!(pieces[1].material, 0);
        assert_eq!(pieces[1].positions.len(), 3);
        assert_eq!(pieces[1].triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_unknown_material_rejected() {
        let mesh = piece_to_mesh(&triangle_model().pieces[0], "paint", &[], 1.0);
        let err = mesh_to_pieces(&mesh, "tri", Mat4::IDENTITY, &[], 1.0).unwrap_err();
        assert!(err.to_string().contains("'paint'"));
    }

    #[test]
    fn test_offset_and_scale() {
        let mesh = piece_to_mesh(&triangle_model().pieces[0], "paint", &[], 1.0);
        let local = Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0));
        let pieces = mesh_to_pieces(&mesh, "tri", local, &["paint".to_string()], 0.5).unwrap();
        // Host +Z is game +Y
        assert_eq!(pieces[0].positions[0], [0.0, 1.0, 0.0]);
        assert_eq!(pieces[0].normals[0], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_skin_mapping() {
        let mut piece = triangle_model().pieces.remove(0);
        piece.skin = vec![
            vec![Influence { bone: 0, weight: 1.0 }],
            vec![Influence { bone: 1, weight: 1.0 }],
            vec![],
        ];
        let mesh = piece_to_mesh(&piece, "paint", &[Some(1), None], 1.0);
        assert_eq!(mesh.skin[0], vec![SkinInfluence { bone: 1, weight: 1.0 }]);
        assert!(mesh.skin[1].is_empty());
    }
}
