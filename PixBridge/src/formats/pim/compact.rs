//! Compact dialect pieces: per-vertex streams
//!
//! Writing splits a vertex wherever its corners disagree on any
//! attribute; reading spreads per-vertex attributes back onto corners.

use std::collections::HashMap;

use super::streams::{self, NORMAL, POSITION, RGBA, TANGENT, UV};
use super::{Piece, UvChannel};
use crate::error::{Error, Result};
use crate::formats::pix::{Section, Value, indexed_row, read_int_rows};

/// Flip between scene winding and file winding.
pub(super) fn flip([a, b, c]: [u32; 3]) -> [u32; 3] {
    [a, c, b]
}

fn corner_key(piece: &Piece, vertex: u32, corner: usize) -> Vec<u32> {
    let mut key = vec![vertex];
    key.extend(piece.normals[corner].map(f32::to_bits));
    if let Some(t) = piece.tangents.get(corner) {
        key.extend(t.map(f32::to_bits));
    }
    for layer in &piece.colors {
        key.extend(layer[corner].map(f32::to_bits));
    }
    for uv in &piece.uvs {
        key.extend(uv.corners[corner].map(f32::to_bits));
    }
    key
}

/// Encode a piece. Returns the section and, for each written vertex,
/// the piece vertex it came from.
pub(super) fn write_piece(index: usize, piece: &Piece) -> (Section, Vec<usize>) {
    let vertex_count = piece.positions.len();
    let mut source: Vec<usize> = (0..vertex_count).collect();
    let mut first_corner: Vec<Option<usize>> = vec![None; vertex_count];
    let mut claimed: Vec<Option<Vec<u32>>> = vec![None; vertex_count];
    let mut splits: HashMap<Vec<u32>, u32> = HashMap::new();
    let mut triangles = Vec::with_capacity(piece.triangles.len());

    for (t, triangle) in piece.triangles.iter().enumerate() {
        let mut written = [0u32; 3];
        for (k, &vertex) in triangle.iter().enumerate() {
            let corner = t * 3 + k;
            let key = corner_key(piece, vertex, corner);
            let v = vertex as usize;
            written[k] = match &claimed[v] {
                None => {
                    claimed[v] = Some(key);
                    first_corner[v] = Some(corner);
                    vertex
                }
                Some(existing) if *existing == key => vertex,
                Some(_) => *splits.entry(key).or_insert_with(|| {
                    source.push(v);
                    first_corner.push(Some(corner));
                    (source.len() - 1) as u32
                }),
            };
        }
        triangles.push(flip(written));
    }

    let pick = |written: usize| first_corner[written];
    let mut section = Section::new("Piece")
        .with("Index", Value::Int(index as i64))
        .with("Material", Value::Int(piece.material as i64))
        .with("VertexCount", Value::Int(source.len() as i64))
        .with("FaceCount", Value::Int(triangles.len() as i64));

    let mut stream_sections = Vec::new();
    let positions: Vec<Vec<f32>> = source.iter().map(|&v| piece.positions[v].to_vec()).collect();
    stream_sections.push(streams::write_stream("Stream", POSITION, 3, &[], &positions));

    let per_vertex = |width: usize, value: &dyn Fn(usize) -> Vec<f32>| -> Vec<Vec<f32>> {
        (0..source.len())
            .map(|w| pick(w).map_or_else(|| vec![0.0; width], value))
            .collect()
    };

    stream_sections.push(streams::write_stream(
        "Stream",
        NORMAL,
        3,
        &[],
        &per_vertex(3, &|c| piece.normals[c].to_vec()),
    ));
    if !piece.tangents.is_empty() {
        stream_sections.push(streams::write_stream(
            "Stream",
            TANGENT,
            4,
            &[],
            &per_vertex(4, &|c| piece.tangents[c].to_vec()),
        ));
    }
    for (layer_index, layer) in piece.colors.iter().enumerate() {
        stream_sections.push(streams::write_stream(
            "Stream",
            &format!("{RGBA}{layer_index}"),
            4,
            &[],
            &per_vertex(4, &|c| layer[c].to_vec()),
        ));
    }
    for (layer_index, uv) in piece.uvs.iter().enumerate() {
        stream_sections.push(streams::write_stream(
            "Stream",
            &format!("{UV}{layer_index}"),
            2,
            &uv.aliases,
            &per_vertex(2, &|c| uv.corners[c].to_vec()),
        ));
    }

    section.push_prop("StreamCount", Value::Int(stream_sections.len() as i64));
    for stream in stream_sections {
        section.push_section(stream);
    }

    let mut tri_section = Section::new("Triangles");
    for (i, triangle) in triangles.iter().enumerate() {
        tri_section.push_row(indexed_row(i, Value::ints(&triangle.map(i64::from))));
    }
    section.push_section(tri_section);
    (section, source)
}

pub(super) fn read_triangles(piece_section: &Section, vertex_count: usize) -> Result<Vec<[u32; 3]>> {
    let Some(section) = piece_section.child("Triangles") else {
        return Ok(Vec::new());
    };
    read_int_rows(section, 3)?
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut triangle = [0u32; 3];
            for (slot, &v) in triangle.iter_mut().zip(&row) {
                *slot = u32::try_from(v)
                    .ok()
                    .filter(|&v| (v as usize) < vertex_count)
                    .ok_or_else(|| Error::inconsistent("Piece/Triangles", format!("triangle {i} references vertex {v}")))?;
            }
            Ok(flip(triangle))
        })
        .collect()
}

pub(super) fn read_piece(section: &Section) -> Result<Piece> {
    let vertex_count = section.req_usize("VertexCount")?;
    let declared_streams = section.opt_int("StreamCount", -1);
    let stream_sections: Vec<&Section> = section.children_named("Stream").collect();
    if declared_streams >= 0 && declared_streams as usize != stream_sections.len() {
        return Err(Error::inconsistent(
            "Piece",
            format!("StreamCount declares {declared_streams} but {} present", stream_sections.len()),
        ));
    }

    let triangles = read_triangles(section, vertex_count)?;
    let declared_faces = section.opt_int("FaceCount", triangles.len() as i64);
    if declared_faces != triangles.len() as i64 {
        return Err(Error::inconsistent(
            "Piece",
            format!("FaceCount declares {declared_faces} but {} present", triangles.len()),
        ));
    }

    let corners: Vec<usize> = triangles.iter().flatten().map(|&v| v as usize).collect();
    let spread = |rows: &[Vec<f32>]| -> Vec<Vec<f32>> { corners.iter().map(|&v| rows[v].clone()).collect() };

    let mut piece = Piece {
        material: section.req_usize("Material")?,
        triangles,
        ..Piece::default()
    };

    for stream in stream_sections {
        let tag = stream.req_str("Tag")?;
        let (_, rows) = streams::read_stream(stream, 1)?;
        if rows.len() != vertex_count {
            return Err(Error::inconsistent(
                "Piece/Stream",
                format!("stream {tag} has {} rows, VertexCount is {vertex_count}", rows.len()),
            ));
        }
        match tag {
            POSITION => piece.positions = rows.iter().map(|r| streams::to_array(r)).collect(),
            NORMAL => piece.normals = spread(&rows).iter().map(|r| streams::to_array(r)).collect(),
            TANGENT => piece.tangents = spread(&rows).iter().map(|r| streams::to_array(r)).collect(),
            _ if streams::layer_index(tag, RGBA).is_some() => {
                piece.colors.push(spread(&rows).iter().map(|r| streams::to_array(r)).collect());
            }
            _ if streams::layer_index(tag, UV).is_some() => piece.uvs.push(UvChannel {
                aliases: streams::aliases(stream),
                corners: spread(&rows).iter().map(|r| streams::to_array(r)).collect(),
            }),
            other => tracing::debug!("Skipping unknown stream {}", other),
        }
    }
    if piece.positions.len() != vertex_count {
        return Err(Error::inconsistent("Piece", "missing _POSITION stream"));
    }
    if piece.normals.is_empty() {
        piece.normals = vec![[0.0; 3]; piece.corner_count()];
    }
    Ok(piece)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seam_splits_vertex() {
        // Two triangles sharing an edge, with a UV seam on vertex 1
        let piece = Piece {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 1.0]],
            triangles: vec![[0, 1, 2], [1, 3, 2]],
            normals: vec![[0.0, 1.0, 0.0]; 6],
            uvs: vec![UvChannel {
                aliases: vec![],
                corners: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.5, 0.0], [1.0, 1.0], [0.0, 1.0]],
            }],
            ..Piece::default()
        };
        let (section, map) = write_piece(0, &piece);
        assert_eq!(map, vec![0, 1, 2, 3, 1]);
        assert_eq!(section.req_int("VertexCount").unwrap(), 5);

        let back = read_piece(&section).unwrap();
        assert_eq!(back.triangles, vec![[0, 1, 2], [4, 3, 2]]);
        assert_eq!(back.uvs[0].corners, piece.uvs[0].corners);
    }
}
