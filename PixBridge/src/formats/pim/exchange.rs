//! Exchange dialect pieces: per-vertex positions, per-corner face streams

use super::compact::{flip, read_triangles};
use super::streams::{self, NORMAL, POSITION, RGBA, TANGENT, UV};
use super::{Piece, UvChannel};
use crate::error::{Error, Result};
use crate::formats::pix::{Section, Value, indexed_row};

/// One row per face: the three corners in file winding, concatenated.
fn face_rows<const N: usize>(corners: &[[f32; N]]) -> Vec<Vec<f32>> {
    corners
        .chunks_exact(3)
        .map(|face| {
            let mut row = Vec::with_capacity(N * 3);
            for k in [0, 2, 1] {
                row.extend_from_slice(&face[k]);
            }
            row
        })
        .collect()
}

fn corners_from_rows<const N: usize>(rows: &[Vec<f32>]) -> Vec<[f32; N]> {
    let mut out = Vec::with_capacity(rows.len() * 3);
    for row in rows {
        let corner = |k: usize| streams::to_array::<N>(&row[k * N..(k + 1) * N]);
        out.extend([corner(0), corner(2), corner(1)]);
    }
    out
}

pub(super) fn write_piece(index: usize, piece: &Piece) -> Section {
    let mut faces = Vec::new();
    faces.push(streams::write_stream("FaceStream", NORMAL, 3, &[], &face_rows(&piece.normals)));
    if !piece.tangents.is_empty() {
        faces.push(streams::write_stream("FaceStream", TANGENT, 4, &[], &face_rows(&piece.tangents)));
    }
    for (i, layer) in piece.colors.iter().enumerate() {
        faces.push(streams::write_stream("FaceStream", &format!("{RGBA}{i}"), 4, &[], &face_rows(layer)));
    }
    for (i, uv) in piece.uvs.iter().enumerate() {
        faces.push(streams::write_stream(
            "FaceStream",
            &format!("{UV}{i}"),
            2,
            &uv.aliases,
            &face_rows(&uv.corners),
        ));
    }

    let positions: Vec<Vec<f32>> = piece.positions.iter().map(|p| p.to_vec()).collect();
    let mut section = Section::new("Piece")
        .with("Index", Value::Int(index as i64))
        .with("Material", Value::Int(piece.material as i64))
        .with("VertexCount", Value::Int(piece.positions.len() as i64))
        .with("FaceCount", Value::Int(piece.triangles.len() as i64))
        .with("StreamCount", Value::Int(1))
        .with("FaceStreamCount", Value::Int(faces.len() as i64));
    section.push_section(streams::write_stream("Stream", POSITION, 3, &[], &positions));

    let mut triangles = Section::new("Triangles");
    for (i, triangle) in piece.triangles.iter().enumerate() {
        triangles.push_row(indexed_row(i, Value::ints(&flip(*triangle).map(i64::from))));
    }
    section.push_section(triangles);
    for face in faces {
        section.push_section(face);
    }
    section
}

pub(super) fn read_piece(section: &Section) -> Result<Piece> {
    let vertex_count = section.req_usize("VertexCount")?;
    let triangles = read_triangles(section, vertex_count)?;
    let face_count = section.opt_int("FaceCount", triangles.len() as i64);
    if face_count != triangles.len() as i64 {
        return Err(Error::inconsistent(
            "Piece",
            format!("FaceCount declares {face_count} but {} present", triangles.len()),
        ));
    }

    let mut piece = Piece {
        material: section.req_usize("Material")?,
        ..Piece::default()
    };

    for stream in section.children_named("Stream") {
        if stream.req_str("Tag")? == POSITION {
            let (_, rows) = streams::read_stream(stream, 1)?;
            piece.positions = rows.iter().map(|r| streams::to_array(r)).collect();
        }
    }
    if piece.positions.len() != vertex_count {
        return Err(Error::inconsistent("Piece", "missing or short _POSITION stream"));
    }

    for stream in section.children_named("FaceStream") {
        let tag = stream.req_str("Tag")?;
        let (_, rows) = streams::read_stream(stream, 3)?;
        if rows.len() != triangles.len() {
            return Err(Error::inconsistent(
                "Piece/FaceStream",
                format!("face stream {tag} has {} rows for {} faces", rows.len(), triangles.len()),
            ));
        }
        match tag {
            NORMAL => piece.normals = corners_from_rows(&rows),
            TANGENT => piece.tangents = corners_from_rows(&rows),
            _ if streams::layer_index(tag, RGBA).is_some() => piece.colors.push(corners_from_rows(&rows)),
            _ if streams::layer_index(tag, UV).is_some() => piece.uvs.push(UvChannel {
                aliases: streams::aliases(stream),
                corners: corners_from_rows(&rows),
            }),
            other => tracing::debug!("Skipping unknown face stream {}", other),
        }
    }
    piece.triangles = triangles;
    if piece.normals.is_empty() {
        piece.normals = vec![[0.0; 3]; piece.corner_count()];
    }
    Ok(piece)
}
