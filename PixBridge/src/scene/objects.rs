//! Plain scene data exchanged with the host

use glam::Mat4;

use super::ObjectId;
use crate::object::GameObject;
use crate::prefab::PrefabLocator;

/// A host object as the core sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    pub parent: Option<ObjectId>,
    /// World transform in host basis.
    pub transform: Mat4,
    pub kind: ObjectKind,
}

impl SceneObject {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: 0,
            name: name.into(),
            parent: None,
            transform: Mat4::IDENTITY,
            kind,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn game_object(&self) -> Option<&GameObject> {
        match &self.kind {
            ObjectKind::Root(game_object) => Some(&**game_object),
            _ => None,
        }
    }

    #[must_use]
    pub fn prefab_locator(&self) -> Option<&PrefabLocator> {
        match &self.kind {
            ObjectKind::Locator(LocatorData::Prefab(locator)) => Some(locator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// Game object root with its part/variant/look state.
    Root(Box<GameObject>),
    Mesh(MeshData),
    Locator(LocatorData),
    Armature(ArmatureData),
    Empty,
}

impl ObjectKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Root(_) => "root",
            ObjectKind::Mesh(_) => "mesh",
            ObjectKind::Locator(_) => "locator",
            ObjectKind::Armature(_) => "armature",
            ObjectKind::Empty => "empty",
        }
    }
}

/// One triangle and its material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub vertices: [u32; 3],
    pub material: usize,
}

/// Per-corner UV layer (`faces * 3` entries).
#[derive(Debug, Clone, PartialEq)]
pub struct UvLayer {
    pub name: String,
    pub corners: Vec<[f32; 2]>,
}

/// Per-corner color layer (`faces * 3` entries).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLayer {
    pub name: String,
    pub corners: Vec<[f32; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinInfluence {
    /// Index into the armature's bone list.
    pub bone: usize,
    pub weight: f32,
}

/// Triangle mesh in host basis, object local.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub faces: Vec<Face>,
    /// Per-corner normals.
    pub normals: Vec<[f32; 3]>,
    /// Per-corner tangents (xyz + sign), empty when absent.
    pub tangents: Vec<[f32; 4]>,
    pub uv_layers: Vec<UvLayer>,
    pub color_layers: Vec<ColorLayer>,
    /// Material slot to material alias.
    pub materials: Vec<String>,
    /// Per-vertex bone influences, empty when unskinned.
    pub skin: Vec<Vec<SkinInfluence>>,
}

impl MeshData {
    #[must_use]
    pub fn corner_count(&self) -> usize {
        self.faces.len() * 3
    }

    #[must_use]
    pub fn is_skinned(&self) -> bool {
        !self.skin.is_empty()
    }
}

/// Collider primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Box { size: [f32; 3] },
    Sphere { radius: f32 },
    Capsule { radius: f32, length: f32 },
    Cylinder { radius: f32, length: f32 },
    Convex { vertices: Vec<[f32; 3]>, triangles: Vec<[u32; 3]> },
}

impl ColliderShape {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ColliderShape::Box { .. } => "Box",
            ColliderShape::Sphere { .. } => "Sphere",
            ColliderShape::Capsule { .. } => "Capsule",
            ColliderShape::Cylinder { .. } => "Cylinder",
            ColliderShape::Convex { .. } => "Convex",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub shape: ColliderShape,
    pub mass: f32,
    /// Collision material tag.
    pub material: String,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocatorData {
    /// Model locator (hookup anchor).
    Model { hookup: Option<String> },
    Collision(Collider),
    Prefab(PrefabLocator),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    /// Rest matrix in armature space, host basis.
    pub rest: Mat4,
}

/// One linear keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub frame: f32,
    pub value: f32,
}

/// Animation curve with linear interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct FCurve {
    /// `pose.bones["name"].location` style path.
    pub data_path: String,
    pub index: usize,
    /// Grouping (bone or custom channel name).
    pub group: String,
    pub keys: Vec<Keyframe>,
}

impl FCurve {
    /// Linear evaluation, clamped at both ends.
    #[must_use]
    pub fn evaluate(&self, frame: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if frame <= first.frame {
            return first.value;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if frame <= b.frame {
                let span = b.frame - a.frame;
                if span <= 0.0 {
                    return b.value;
                }
                let t = (frame - a.frame) / span;
                return a.value + (b.value - a.value) * t;
            }
        }
        self.keys.last().map_or(first.value, |k| k.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationData {
    pub name: String,
    pub fps: f32,
    pub frame_start: f32,
    pub frame_end: f32,
    pub curves: Vec<FCurve>,
}

impl AnimationData {
    /// Curves belonging to one group.
    pub fn group<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FCurve> {
        self.curves.iter().filter(move |c| c.group == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArmatureData {
    pub bones: Vec<BoneData>,
    pub animations: Vec<AnimationData>,
}

impl ArmatureData {
    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fcurve_linear() {
        let curve = FCurve {
            data_path: "location".into(),
            index: 0,
            group: "g".into(),
            keys: vec![Keyframe { frame: 0.0, value: 0.0 }, Keyframe { frame: 10.0, value: 5.0 }],
        };
        assert_eq!(curve.evaluate(-1.0), 0.0);
        assert_eq!(curve.evaluate(4.0), 2.0);
        assert_eq!(curve.evaluate(20.0), 5.0);
    }
}
