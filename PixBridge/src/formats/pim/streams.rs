//! Stream, name-list and skin sections shared by both model dialects

use super::{Influence, Piece};
use crate::error::{Error, Result};
use crate::formats::pix::{Section, Value, indexed_row, read_float_rows};

pub(super) const POSITION: &str = "_POSITION";
pub(super) const NORMAL: &str = "_NORMAL";
pub(super) const TANGENT: &str = "_TANGENT";
pub(super) const RGBA: &str = "_RGBA";
pub(super) const UV: &str = "_UV";

fn format_token(width: usize) -> &'static str {
    match width {
        1 => "FLOAT",
        2 => "FLOAT2",
        3 => "FLOAT3",
        _ => "FLOAT4",
    }
}

/// Width of a `FLOATn` format token.
pub(super) fn format_width(section: &Section) -> Result<usize> {
    let token = section.req_str("Format")?;
    match token {
        "FLOAT" => Ok(1),
        "FLOAT2" => Ok(2),
        "FLOAT3" => Ok(3),
        "FLOAT4" => Ok(4),
        other => Err(Error::inconsistent(
            &section.type_name,
            format!("unsupported stream format '{other}'"),
        )),
    }
}

/// `Stream { Format Tag [Aliases] rows }` with one row per item.
pub(super) fn write_stream(type_name: &str, tag: &str, width: usize, aliases: &[String], rows: &[Vec<f32>]) -> Section {
    let mut section = Section::new(type_name)
        .with("Format", Value::token(format_token(width)))
        .with("Tag", Value::string(tag));
    if !aliases.is_empty() {
        section.push_prop("AliasCount", Value::Int(aliases.len() as i64));
        section.push_prop("Aliases", Value::StrVec(aliases.to_vec()));
    }
    for (index, row) in rows.iter().enumerate() {
        section.push_row(indexed_row(index, Value::hex(row)));
    }
    section
}

/// Stream rows, with a row width of `items_per_row * format width`.
pub(super) fn read_stream(section: &Section, items_per_row: usize) -> Result<(usize, Vec<Vec<f32>>)> {
    let width = format_width(section)?;
    let rows = read_float_rows(section, width * items_per_row)?;
    Ok((width, rows))
}

pub(super) fn aliases(section: &Section) -> Vec<String> {
    section
        .prop("Aliases")
        .and_then(Value::as_strs)
        .map(|v| v.into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// UV layer index from a `_UVn` tag.
pub(super) fn layer_index(tag: &str, prefix: &str) -> Option<usize> {
    tag.strip_prefix(prefix)?.parse().ok()
}

pub(super) fn to_array<const N: usize>(row: &[f32]) -> [f32; N] {
    let mut out = [0.0; N];
    out.copy_from_slice(&row[..N]);
    out
}

/// `Name { 0  "first" ... }`.
pub(super) fn write_name_rows(type_name: &str, names: &[String]) -> Section {
    let mut section = Section::new(type_name);
    for (index, name) in names.iter().enumerate() {
        section.push_row(indexed_row(index, Value::string(name)));
    }
    section
}

pub(super) fn read_name_rows(section: &Section) -> Result<Vec<String>> {
    section
        .rows()
        .enumerate()
        .map(|(i, row)| {
            row.0
                .last()
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::inconsistent(&section.type_name, format!("row {i} has no name")))
        })
        .collect()
}

fn influence_values(influences: &[Influence]) -> [Value; 2] {
    let bones: Vec<i64> = influences.iter().map(|i| i.bone as i64).collect();
    let weights: Vec<f32> = influences.iter().map(|i| i.weight).collect();
    [Value::ints(&bones), Value::hex(&weights)]
}

fn parse_influences(section: &Section, row_index: usize, bones: &Value, weights: &Value) -> Result<Vec<Influence>> {
    let bones = bones.as_ints().unwrap_or_default();
    let weights = weights.as_floats().unwrap_or_default();
    if bones.len() != weights.len() {
        return Err(Error::inconsistent(
            &section.type_name,
            format!("row {row_index}: {} bone(s) but {} weight(s)", bones.len(), weights.len()),
        ));
    }
    bones
        .iter()
        .zip(weights)
        .map(|(&bone, weight)| {
            let bone = usize::try_from(bone).map_err(|_| {
                Error::inconsistent(&section.type_name, format!("row {row_index}: negative bone index"))
            })?;
            Ok(Influence { bone, weight })
        })
        .collect()
}

fn vertex_slot<'a>(pieces: &'a mut [Piece], section: &Section, piece: i64, vertex: i64) -> Result<&'a mut Vec<Influence>> {
    let piece = usize::try_from(piece)
        .ok()
        .and_then(|p| pieces.get_mut(p))
        .ok_or_else(|| Error::inconsistent(&section.type_name, format!("skin references piece {piece}")))?;
    if piece.skin.is_empty() {
        piece.skin = vec![Vec::new(); piece.positions.len()];
    }
    usize::try_from(vertex)
        .ok()
        .and_then(|v| piece.skin.get_mut(v))
        .ok_or_else(|| Error::inconsistent(&section.type_name, format!("skin references vertex {vertex}")))
}

/// Compact dialect: one file-global `Skin` with rows
/// `i  ( piece vertex )  ( bones )  ( weights )`. `maps[piece]` turns
/// written vertex indices into piece vertex indices.
pub(super) fn write_global_skin(pieces: &[Piece], maps: &[Vec<usize>]) -> Section {
    let mut stream = Section::new("SkinStream").with("Tag", Value::string("_SKIN"));
    let mut rows = Vec::new();
    for (piece_index, (piece, map)) in pieces.iter().zip(maps).enumerate() {
        if piece.skin.is_empty() {
            continue;
        }
        for (written, &source) in map.iter().enumerate() {
            let [bones, weights] = influence_values(&piece.skin[source]);
            rows.push((piece_index, written, bones, weights));
        }
    }
    stream.push_prop("ItemCount", Value::Int(rows.len() as i64));
    for (index, (piece, vertex, bones, weights)) in rows.into_iter().enumerate() {
        stream.push_row(vec![
            Value::Int(index as i64),
            Value::ints(&[piece as i64, vertex as i64]),
            bones,
            weights,
        ]);
    }
    let mut skin = Section::new("Skin").with("StreamCount", Value::Int(1));
    skin.push_section(stream);
    skin
}

pub(super) fn read_global_skin(section: &Section, pieces: &mut [Piece]) -> Result<()> {
    for stream in section.children_named("SkinStream") {
        for (i, row) in stream.rows().enumerate() {
            let [_, target, bones, weights] = row.0.as_slice() else {
                return Err(Error::inconsistent("Skin/SkinStream", format!("row {i} needs 4 values")));
            };
            let target = target.as_ints().filter(|t| t.len() == 2).ok_or_else(|| {
                Error::inconsistent("Skin/SkinStream", format!("row {i}: bad (piece vertex) pair"))
            })?;
            let influences = parse_influences(stream, i, bones, weights)?;
            *vertex_slot(pieces, stream, target[0], target[1])? = influences;
        }
    }
    Ok(())
}

/// Exchange dialect: one `PieceSkin` per skinned piece with rows
/// `vertex  ( bones )  ( weights )`.
pub(super) fn write_piece_skin(index: usize, piece: &Piece) -> Section {
    let mut section = Section::new("PieceSkin")
        .with("Piece", Value::Int(index as i64))
        .with("ItemCount", Value::Int(piece.skin.len() as i64));
    for (vertex, influences) in piece.skin.iter().enumerate() {
        let [bones, weights] = influence_values(influences);
        section.push_row(vec![Value::Int(vertex as i64), bones, weights]);
    }
    section
}

pub(super) fn read_piece_skin(section: &Section, pieces: &mut [Piece]) -> Result<()> {
    let piece = section.req_int("Piece")?;
    for (i, row) in section.rows().enumerate() {
        let [vertex, bones, weights] = row.0.as_slice() else {
            return Err(Error::inconsistent("PieceSkin", format!("row {i} needs 3 values")));
        };
        let vertex = vertex
            .as_int()
            .ok_or_else(|| Error::inconsistent("PieceSkin", format!("row {i}: bad vertex index")))?;
        let influences = parse_influences(section, i, bones, weights)?;
        *vertex_slot(pieces, section, piece, vertex)? = influences;
    }
    Ok(())
}
