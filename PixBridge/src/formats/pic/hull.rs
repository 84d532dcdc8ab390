//! Convex hull builder for convex colliders
//!
//! Incremental hull over the input points. When the hull has more
//! triangles than allowed, the points are clustered on a coarser grid and
//! the hull is rebuilt until it fits.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::error::{Error, Result};

const EPSILON: f32 = 1e-6;

/// A closed triangle hull.
#[derive(Debug, Clone, PartialEq)]
pub struct Hull {
    pub vertices: Vec<[f32; 3]>,
    /// Outward-facing triangles.
    pub triangles: Vec<[u32; 3]>,
}

fn normal(points: &[Vec3], [a, b, c]: [usize; 3]) -> Vec3 {
    (points[b] - points[a]).cross(points[c] - points[a])
}

fn degenerate() -> Error {
    Error::inconsistent("Piece", "convex hull input is flat or too small")
}

fn initial_tetrahedron(points: &[Vec3]) -> Result<[usize; 4]> {
    let p0 = (0..points.len())
        .min_by(|&a, &b| points[a].x.total_cmp(&points[b].x))
        .ok_or_else(degenerate)?;
    let farthest = |score: &dyn Fn(Vec3) -> f32| {
        (0..points.len()).max_by(|&a, &b| score(points[a]).total_cmp(&score(points[b])))
    };
    let p1 = farthest(&|p| p.distance_squared(points[p0])).ok_or_else(degenerate)?;
    let axis = points[p1] - points[p0];
    let p2 = farthest(&|p| axis.cross(p - points[p0]).length_squared()).ok_or_else(degenerate)?;
    let plane = axis.cross(points[p2] - points[p0]);
    let p3 = farthest(&|p| plane.dot(p - points[p0]).abs()).ok_or_else(degenerate)?;

    let scale = axis.length().max(EPSILON);
    if axis.length() < EPSILON
        || plane.length() < EPSILON * scale
        || plane.normalize().dot(points[p3] - points[p0]).abs() < EPSILON * scale
    {
        return Err(degenerate());
    }
    Ok([p0, p1, p2, p3])
}

/// Convex hull of `points`.
///
/// # Errors
/// [`Error::Inconsistent`] when the points span no volume.
pub fn convex_hull(input: &[[f32; 3]]) -> Result<Hull> {
    let points: Vec<Vec3> = input.iter().map(|&p| Vec3::from_array(p)).collect();
    let [a, b, c, d] = initial_tetrahedron(&points)?;
    let centroid = (points[a] + points[b] + points[c] + points[d]) / 4.0;

    let mut faces: Vec<[usize; 3]> = Vec::new();
    for face in [[a, b, c], [a, b, d], [a, c, d], [b, c, d]] {
        let n = normal(&points, face);
        if n.dot(points[face[0]] - centroid) < 0.0 {
            faces.push([face[0], face[2], face[1]]);
        } else {
            faces.push(face);
        }
    }

    for (i, &p) in points.iter().enumerate() {
        if [a, b, c, d].contains(&i) {
            continue;
        }
        let visible: Vec<bool> = faces
            .iter()
            .map(|&face| {
                let n = normal(&points, face).normalize_or_zero();
                n.dot(p - points[face[0]]) > EPSILON
            })
            .collect();
        if !visible.contains(&true) {
            continue;
        }

        let mut visible_edges: HashSet<(usize, usize)> = HashSet::new();
        for (face, _) in faces.iter().zip(&visible).filter(|(_, v)| **v) {
            for k in 0..3 {
                visible_edges.insert((face[k], face[(k + 1) % 3]));
            }
        }
        let mut next_faces = Vec::with_capacity(faces.len());
        let mut horizon = Vec::new();
        for (face, is_visible) in faces.iter().zip(&visible) {
            if !is_visible {
                next_faces.push(*face);
                continue;
            }
            for k in 0..3 {
                let edge = (face[k], face[(k + 1) % 3]);
                if !visible_edges.contains(&(edge.1, edge.0)) {
                    horizon.push(edge);
                }
            }
        }
        for (from, to) in horizon {
            next_faces.push([from, to, i]);
        }
        faces = next_faces;
    }

    // Keep only hull vertices, in first-use order
    let mut remap: HashMap<usize, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let triangles = faces
        .iter()
        .map(|face| {
            face.map(|v| {
                *remap.entry(v).or_insert_with(|| {
                    vertices.push(input[v]);
                    (vertices.len() - 1) as u32
                })
            })
        })
        .collect();
    Ok(Hull { vertices, triangles })
}

/// Snap points to a grid with `cells` cells along the longest axis,
/// averaging each cell.
fn cluster(points: &[[f32; 3]], cells: f32) -> Vec<[f32; 3]> {
    let (min, max) = bounds(points);
    let cell = ((max - min).max_element() / cells).max(EPSILON);
    let mut groups: HashMap<[i64; 3], (Vec3, f32)> = HashMap::new();
    let mut order = Vec::new();
    for &p in points {
        let v = Vec3::from_array(p);
        let key = ((v - min) / cell).floor().as_i64vec3().to_array();
        let entry = groups.entry(key).or_insert_with(|| {
            order.push(key);
            (Vec3::ZERO, 0.0)
        });
        entry.0 += v;
        entry.1 += 1.0;
    }
    order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|(sum, count)| (*sum / *count).to_array())
        .collect()
}

fn bounds(points: &[[f32; 3]]) -> (Vec3, Vec3) {
    points.iter().fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), &p| {
        let v = Vec3::from_array(p);
        (lo.min(v), hi.max(v))
    })
}

/// Shrink the hull toward its bounding-box center so each axis loses
/// `2 * margin`, never below zero.
fn apply_margin(hull: &mut Hull, margin: f32) {
    if margin <= 0.0 || hull.vertices.is_empty() {
        return;
    }
    let (min, max) = bounds(&hull.vertices);
    let center = (min + max) * 0.5;
    let size = max - min;
    let factor = Vec3::select(
        size.cmpgt(Vec3::splat(EPSILON)),
        ((size - Vec3::splat(2.0 * margin)) / size).max(Vec3::ZERO),
        Vec3::ONE,
    );
    for vertex in &mut hull.vertices {
        let v = Vec3::from_array(*vertex);
        *vertex = (center + (v - center) * factor).to_array();
    }
}

/// Hull with at most `max_triangles` triangles, shrunk by `margin`.
///
/// # Errors
/// [`Error::Inconsistent`] for degenerate input.
pub fn build_hull(points: &[[f32; 3]], max_triangles: usize, margin: f32) -> Result<Hull> {
    let mut hull = convex_hull(points)?;
    let mut cells = 64.0;
    while hull.triangles.len() > max_triangles.max(4) {
        let reduced = cluster(&hull.vertices, cells);
        hull = convex_hull(&reduced)?;
        cells *= 0.75;
        if cells < 1.0 {
            return Err(degenerate());
        }
    }
    apply_margin(&mut hull, margin);
    tracing::debug!(
        "Built hull: {} vertices, {} triangles from {} points",
        hull.vertices.len(),
        hull.triangles.len(),
        points.len()
    );
    Ok(hull)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Vec<[f32; 3]> {
        let mut points = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    points.push([x, y, z]);
                }
            }
        }
        points.push([0.5, 0.5, 0.5]);
        points
    }

    fn sphere(n: usize) -> Vec<[f32; 3]> {
        let golden = std::f32::consts::PI * (3.0 - 5f32.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f32;
                [r * theta.cos(), y, r * theta.sin()]
            })
            .collect()
    }

    fn is_closed_and_outward(hull: &Hull) -> bool {
        let points: Vec<Vec3> = hull.vertices.iter().map(|&p| Vec3::from_array(p)).collect();
        let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        let mut edges = HashSet::new();
        for t in &hull.triangles {
            let face = t.map(|v| v as usize);
            if normal(&points, face).dot(points[face[0]] - center) <= 0.0 {
                return false;
            }
            for k in 0..3 {
                edges.insert((t[k], t[(k + 1) % 3]));
            }
        }
        edges.iter().all(|&(a, b)| edges.contains(&(b, a)))
    }

    #[test]
    fn test_cube_hull() {
        let hull = convex_hull(&cube()).unwrap();
        assert_eq!(hull.vertices.len(), 8);
        assert_eq!(hull.triangles.len(), 12);
        assert!(is_closed_and_outward(&hull));
    }

    #[test]
    fn test_flat_input_rejected() {
        let flat = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        assert!(convex_hull(&flat).is_err());
    }

    #[test]
    fn test_triangle_limit() {
        let hull = build_hull(&sphere(400), 64, 0.0).unwrap();
        assert!(hull.triangles.len() <= 64);
        assert!(is_closed_and_outward(&hull));
    }

    #[test]
    fn test_margin_shrinks() {
        let hull = build_hull(&cube(), 256, 0.1).unwrap();
        let (min, max) = bounds(&hull.vertices);
        assert!((max - min).abs_diff_eq(Vec3::splat(0.8), 1e-5));
    }
}
