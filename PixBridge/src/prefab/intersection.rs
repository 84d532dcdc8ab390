//! Curve intersections for prefab export
//!
//! Every unordered pair of curves is tested in the ground plane. Curves
//! leaving the same point form a fork, curves arriving at the same point
//! form a joint, anything else that crosses is a cross. Each finding
//! yields one record per curve.

use glam::{Vec2, Vec3};

use super::curve::NavCurve;
use crate::scene::ObjectId;

/// Intersection kind, the low nibble of the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionKind {
    Fork = 1,
    Joint = 2,
    Cross = 4,
}

/// Half lane width used for the crossing radius.
pub const LANE_HALF_WIDTH: f32 = 2.25;

const SEGMENTS: usize = 32;
const ENDPOINT_EPSILON: f32 = 1e-3;
const POINT_EPSILON: f32 = 1e-2;

/// A curve taking part in the search.
#[derive(Debug, Clone, Copy)]
pub struct CurveRef<'a> {
    pub curve: &'a NavCurve,
    pub start: ObjectId,
    pub end: ObjectId,
}

/// One intersection record, as exported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Curve index.
    pub curve: usize,
    /// Curve parameter of the intersection, `0..=1`.
    pub param: f32,
    pub radius: f32,
    pub kind: IntersectionKind,
    /// Other curves meeting at the same point.
    pub siblings: u32,
}

impl Intersection {
    /// Kind in the low nibble, sibling count in bits 4..8.
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.kind as u32 | (self.siblings.min(15) << 4)
    }

    #[must_use]
    pub fn from_flags(curve: usize, param: f32, radius: f32, flags: u32) -> Option<Self> {
        let kind = match flags & 0xf {
            1 => IntersectionKind::Fork,
            2 => IntersectionKind::Joint,
            4 => IntersectionKind::Cross,
            _ => return None,
        };
        Some(Self {
            curve,
            param,
            radius,
            kind,
            siblings: (flags >> 4) & 0xf,
        })
    }
}

struct Finding {
    a: usize,
    b: usize,
    ta: f32,
    tb: f32,
    point: Vec3,
    kind: IntersectionKind,
}

fn same_point(a: Vec3, b: Vec3) -> bool {
    a.distance(b) < POINT_EPSILON
}

fn near_end(t: f32) -> bool {
    !(ENDPOINT_EPSILON..=1.0 - ENDPOINT_EPSILON).contains(&t)
}

/// Segment/segment intersection in 2D; returns both segment parameters.
fn segment_hit(p: Vec2, p2: Vec2, q: Vec2, q2: Vec2) -> Option<(f32, f32)> {
    let r = p2 - p;
    let s = q2 - q;
    let denom = r.perp_dot(s);
    if denom.abs() < 1e-9 {
        return None;
    }
    let qp = q - p;
    let t = qp.perp_dot(s) / denom;
    let u = qp.perp_dot(r) / denom;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then_some((t, u))
}

fn crossings(a: &NavCurve, b: &NavCurve) -> Vec<(f32, f32)> {
    let pa = a.polyline(SEGMENTS);
    let pb = b.polyline(SEGMENTS);
    let step = 1.0 / SEGMENTS as f32;
    let mut hits: Vec<(f32, f32)> = Vec::new();
    for i in 0..SEGMENTS {
        for j in 0..SEGMENTS {
            let Some((s, u)) = segment_hit(
                pa[i].truncate(),
                pa[i + 1].truncate(),
                pb[j].truncate(),
                pb[j + 1].truncate(),
            ) else {
                continue;
            };
            let coarse = ((i as f32 + s) * step, (j as f32 + u) * step);
            // Neighboring segments report the same crossing twice
            if hits
                .iter()
                .any(|h| (h.0 - coarse.0).abs() < step && (h.1 - coarse.1).abs() < step)
            {
                continue;
            }
            hits.push(coarse);
        }
    }
    hits.into_iter()
        .map(|(ta, tb)| {
            // Refine each parameter by projecting the other curve's point
            let ta = a.nearest_param(b.point(tb));
            let tb = b.nearest_param(a.point(ta));
            (ta, tb)
        })
        .collect()
}

/// Crossing radius from tangent agreement sampled just before and after
/// the intersection on both curves.
fn radius(a: &NavCurve, ta: f32, b: &NavCurve, tb: f32) -> f32 {
    const DELTA: f32 = 0.01;
    let dir = |curve: &NavCurve, t: f32| curve.tangent(t.clamp(0.0, 1.0)).truncate().normalize_or_zero();
    let samples_a = [dir(a, ta - DELTA), dir(a, ta + DELTA)];
    let samples_b = [dir(b, tb - DELTA), dir(b, tb + DELTA)];

    let mut agreement: f32 = 0.0;
    for da in samples_a {
        for db in samples_b {
            agreement = agreement.max(da.dot(db).abs());
        }
    }
    let sine = (1.0 - agreement * agreement).max(0.0).sqrt().max(1e-3);
    (LANE_HALF_WIDTH / sine).min(a.length.min(b.length))
}

/// Find every intersection between `curves`. Record order follows the
/// pair order `(0,1), (0,2), ...`, first curve then second.
#[must_use]
pub fn find_intersections(curves: &[CurveRef<'_>]) -> Vec<Intersection> {
    let mut findings = Vec::new();
    for a in 0..curves.len() {
        for b in a + 1..curves.len() {
            let (ca, cb) = (&curves[a], &curves[b]);
            let fork = ca.start == cb.start || same_point(ca.curve.start, cb.curve.start);
            let joint = ca.end == cb.end || same_point(ca.curve.end, cb.curve.end);

            if fork {
                findings.push(Finding { a, b, ta: 0.0, tb: 0.0, point: ca.curve.start, kind: IntersectionKind::Fork });
            } else if joint {
                // A pair that also forks is already covered by the fork
                findings.push(Finding { a, b, ta: 1.0, tb: 1.0, point: ca.curve.end, kind: IntersectionKind::Joint });
            }

            for (ta, tb) in crossings(ca.curve, cb.curve) {
                // Chain continuations and the fork/joint point itself
                if near_end(ta) && near_end(tb) {
                    continue;
                }
                findings.push(Finding {
                    a,
                    b,
                    ta,
                    tb,
                    point: ca.curve.point(ta),
                    kind: IntersectionKind::Cross,
                });
            }
        }
    }

    // Curves meeting at one point are siblings of each other
    let siblings = |point: Vec3| -> u32 {
        let mut members: Vec<usize> = findings
            .iter()
            .filter(|f| same_point(f.point, point))
            .flat_map(|f| [f.a, f.b])
            .collect();
        members.sort_unstable();
        members.dedup();
        u32::try_from(members.len().saturating_sub(1)).unwrap_or(u32::MAX)
    };

    let mut out = Vec::with_capacity(findings.len() * 2);
    for finding in &findings {
        let (ca, cb) = (curves[finding.a].curve, curves[finding.b].curve);
        let r = radius(ca, finding.ta, cb, finding.tb);
        let count = siblings(finding.point);
        out.push(Intersection { curve: finding.a, param: finding.ta, radius: r, kind: finding.kind, siblings: count });
        out.push(Intersection { curve: finding.b, param: finding.tb, radius: r, kind: finding.kind, siblings: count });
    }
    tracing::debug!("Found {} intersection record(s) over {} curve(s)", out.len(), curves.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn facing(angle: f32) -> Quat {
        Quat::from_rotation_z(angle)
    }

    fn curve(start: Vec3, start_rot: Quat, end: Vec3, end_rot: Quat) -> NavCurve {
        NavCurve::new(start, start_rot, end, end_rot, 0.1, 8)
    }

    #[test]
    fn test_perpendicular_cross() {
        let east = facing(-std::f32::consts::FRAC_PI_2);
        let north = Quat::IDENTITY;
        let a = curve(Vec3::new(-10.0, 0.0, 0.0), east, Vec3::new(10.0, 0.0, 0.0), east);
        let b = curve(Vec3::new(0.0, -10.0, 0.0), north, Vec3::new(0.0, 10.0, 0.0), north);
        let found = find_intersections(&[
            CurveRef { curve: &a, start: 1, end: 2 },
            CurveRef { curve: &b, start: 3, end: 4 },
        ]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, IntersectionKind::Cross);
        assert!((found[0].param - 0.5).abs() < 1e-3);
        assert!((found[1].param - 0.5).abs() < 1e-3);
        assert!((found[0].radius - LANE_HALF_WIDTH).abs() < 1e-2);
        assert_eq!(found[0].flags(), 4 | (1 << 4));
    }

    #[test]
    fn test_fork_and_chain() {
        let north = Quat::IDENTITY;
        let left = facing(std::f32::consts::FRAC_PI_2);
        let straight = curve(Vec3::ZERO, north, Vec3::new(0.0, 20.0, 0.0), north);
        let turn = curve(Vec3::ZERO, north, Vec3::new(-15.0, 15.0, 0.0), left);
        let tail = curve(Vec3::new(0.0, 20.0, 0.0), north, Vec3::new(0.0, 40.0, 0.0), north);
        let found = find_intersections(&[
            CurveRef { curve: &straight, start: 1, end: 2 },
            CurveRef { curve: &turn, start: 1, end: 3 },
            CurveRef { curve: &tail, start: 2, end: 4 },
        ]);
        // Only the fork; straight -> tail is a continuation
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|i| i.kind == IntersectionKind::Fork && i.param == 0.0));
        assert_eq!(found[0].curve, 0);
        assert_eq!(found[1].curve, 1);
    }

    #[test]
    fn test_flags_roundtrip() {
        let i = Intersection::from_flags(3, 0.25, 2.0, 2 | (3 << 4)).unwrap();
        assert_eq!(i.kind, IntersectionKind::Joint);
        assert_eq!(i.siblings, 3);
        assert_eq!(i.flags(), 0x32);
        assert!(Intersection::from_flags(0, 0.0, 0.0, 0).is_none());
    }
}
