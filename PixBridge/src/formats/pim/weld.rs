//! Import-side vertex welding

use std::collections::HashMap;

use super::{Influence, Piece};

fn quantize(values: &[f32], scale: f32) -> impl Iterator<Item = i64> + '_ {
    values.iter().map(move |v| (v * scale).round() as i64)
}

/// Collapse vertices whose position, normal and colors agree to
/// `precision` decimal places. Triangles and skin are rewritten in place.
///
/// Returns the redirection table: `table[old] == new`.
pub fn weld_piece(piece: &mut Piece, precision: u32) -> Vec<usize> {
    let scale = 10f32.powi(precision.min(9) as i32);
    let vertex_count = piece.positions.len();

    let mut first_corner: Vec<Option<usize>> = vec![None; vertex_count];
    for (corner, &vertex) in piece.triangles.iter().flatten().enumerate() {
        first_corner[vertex as usize].get_or_insert(corner);
    }

    let mut keys: HashMap<Vec<i64>, usize> = HashMap::new();
    let mut table = Vec::with_capacity(vertex_count);
    let mut positions = Vec::new();
    let mut skin: Vec<Vec<Influence>> = Vec::new();
    for vertex in 0..vertex_count {
        let mut key: Vec<i64> = quantize(&piece.positions[vertex], scale).collect();
        if let Some(corner) = first_corner[vertex] {
            key.extend(quantize(&piece.normals[corner], scale));
            for layer in &piece.colors {
                key.extend(quantize(&layer[corner], scale));
            }
        }
        let next = positions.len();
        let target = *keys.entry(key).or_insert(next);
        if target == next {
            positions.push(piece.positions[vertex]);
            if !piece.skin.is_empty() {
                skin.push(piece.skin[vertex].clone());
            }
        }
        table.push(target);
    }

    for triangle in &mut piece.triangles {
        for v in triangle.iter_mut() {
            *v = table[*v as usize] as u32;
        }
    }
    if vertex_count != positions.len() {
        tracing::debug!("Welded {} vertices into {}", vertex_count, positions.len());
    }
    piece.positions = positions;
    piece.skin = skin;
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weld_collapses_duplicates() {
        let up = [0.0, 1.0, 0.0];
        let mut piece = Piece {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.00001, 0.0, 0.0], [1.0, 0.0, 1.0]],
            triangles: vec![[0, 1, 2], [3, 4, 2]],
            normals: vec![up; 6],
            ..Piece::default()
        };
        let table = weld_piece(&mut piece, 4);
        assert_eq!(table, vec![0, 1, 2, 1, 3]);
        assert_eq!(piece.positions.len(), 4);
        assert_eq!(piece.triangles, vec![[0, 1, 2], [1, 3, 2]]);
    }

    #[test]
    fn test_weld_keeps_hard_edges() {
        let mut piece = Piece {
            positions: vec![[0.0; 3], [0.0; 3], [1.0, 0.0, 0.0]],
            triangles: vec![[0, 2, 1]],
            normals: vec![[0.0, 1.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
            ..Piece::default()
        };
        let table = weld_piece(&mut piece, 4);
        assert_eq!(table, vec![0, 1, 2]);
    }
}
