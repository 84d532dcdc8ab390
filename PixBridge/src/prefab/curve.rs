//! Edge geometry: cubic Bezier navigation curves and two-tone lines

use glam::{Mat4, Quat, Vec3};

/// Segments used to integrate curve length for export.
pub const LENGTH_SEGMENTS: usize = 300;

/// Local forward axis of a navigation point, host basis.
pub const FORWARD: Vec3 = Vec3::Y;

/// A cubic Bezier between two navigation points.
#[derive(Debug, Clone, PartialEq)]
pub struct NavCurve {
    pub start: Vec3,
    pub start_rotation: Quat,
    pub end: Vec3,
    pub end_rotation: Quat,
    /// Control points `p0..p3`.
    pub control: [Vec3; 4],
    /// Length over [`LENGTH_SEGMENTS`].
    pub length: f32,
    /// Coarse polyline for display.
    pub preview: Vec<Vec3>,
}

fn decompose(m: Mat4) -> (Vec3, Quat) {
    let (_, rotation, translation) = m.to_scale_rotation_translation();
    (translation, rotation.normalize())
}

impl NavCurve {
    /// Build the curve from world transforms of both endpoints.
    ///
    /// Each handle sits one third of the endpoint distance along the
    /// endpoint's forward axis, never shorter than `min_handle`.
    #[must_use]
    pub fn from_transforms(start: Mat4, end: Mat4, min_handle: f32, preview_segments: usize) -> Self {
        let (p0, start_rotation) = decompose(start);
        let (p3, end_rotation) = decompose(end);
        Self::new(p0, start_rotation, p3, end_rotation, min_handle, preview_segments)
    }

    #[must_use]
    pub fn new(
        start: Vec3,
        start_rotation: Quat,
        end: Vec3,
        end_rotation: Quat,
        min_handle: f32,
        preview_segments: usize,
    ) -> Self {
        let handle = (start.distance(end) / 3.0).max(min_handle);
        let control = [
            start,
            start + start_rotation * FORWARD * handle,
            end - end_rotation * FORWARD * handle,
            end,
        ];
        let mut curve = Self {
            start,
            start_rotation,
            end,
            end_rotation,
            control,
            length: 0.0,
            preview: Vec::new(),
        };
        curve.length = curve.polyline_length(LENGTH_SEGMENTS);
        curve.preview = curve.polyline(preview_segments.max(1));
        curve
    }

    /// Point at parameter `t` in `[0, 1]`.
    #[must_use]
    pub fn point(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.control;
        let u = 1.0 - t;
        p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
    }

    /// First derivative at `t`.
    #[must_use]
    pub fn tangent(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.control;
        let u = 1.0 - t;
        (p1 - p0) * (3.0 * u * u) + (p2 - p1) * (6.0 * u * t) + (p3 - p2) * (3.0 * t * t)
    }

    #[must_use]
    pub fn polyline(&self, segments: usize) -> Vec<Vec3> {
        (0..=segments)
            .map(|i| self.point(i as f32 / segments as f32))
            .collect()
    }

    #[must_use]
    pub fn polyline_length(&self, segments: usize) -> f32 {
        self.polyline(segments)
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    /// Parameter of the curve point nearest `target` in the ground plane.
    ///
    /// Coarse sampling followed by bisection refinement around the best
    /// sample.
    #[must_use]
    pub fn nearest_param(&self, target: Vec3) -> f32 {
        const SAMPLES: usize = 64;
        let ground = |v: Vec3| v.truncate();
        let distance = |t: f32| ground(self.point(t)).distance_squared(ground(target));

        let mut best = 0.0;
        let mut best_distance = f32::MAX;
        for i in 0..=SAMPLES {
            let t = i as f32 / SAMPLES as f32;
            let d = distance(t);
            if d < best_distance {
                best = t;
                best_distance = d;
            }
        }

        let mut step = 1.0 / SAMPLES as f32;
        for _ in 0..24 {
            step *= 0.5;
            let lower = (best - step).max(0.0);
            let upper = (best + step).min(1.0);
            if distance(lower) < best_distance {
                best = lower;
                best_distance = distance(lower);
            } else if distance(upper) < best_distance {
                best = upper;
                best_distance = distance(upper);
            }
        }
        best
    }
}

/// An undirected map/trigger connection drawn in two tones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: Vec3,
    pub mid: Vec3,
    pub end: Vec3,
}

impl Line {
    #[must_use]
    pub fn between(start: Vec3, end: Vec3) -> Self {
        Self {
            start,
            mid: start.lerp(end, 0.5),
            end,
        }
    }

    #[must_use]
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}
