//! Host scene boundary
//!
//! The core never touches a host application directly. Exporters read a
//! [`SceneSource`]; importers build plain [`SceneObject`]s and hand them to
//! a [`SceneSink`] once every file has parsed. [`MemoryScene`] implements
//! both for tests and command-line use.

mod memory;
mod objects;

pub use memory::MemoryScene;
pub use objects::{
    AnimationData, ArmatureData, BoneData, Collider, ColliderShape, ColorLayer, Face, FCurve, Keyframe,
    LocatorData, MeshData, ObjectKind, SceneObject, SkinInfluence, UvLayer,
};

use crate::error::Result;
use crate::object::GameObject;

/// Host-supplied identity token of a scene object.
pub type ObjectId = u64;

/// Read access to the host scene used by exporters.
pub trait SceneSource {
    /// Root objects (game objects) in export scope.
    fn roots(&self) -> Vec<ObjectId>;

    fn object(&self, id: ObjectId) -> Option<&SceneObject>;

    /// Direct children, in creation order.
    fn children(&self, id: ObjectId) -> Vec<ObjectId>;

    /// Every descendant of `id`, depth first.
    fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectId> = self.children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    /// The root a given object hangs under.
    fn root_of(&self, id: ObjectId) -> Option<ObjectId> {
        let mut current = self.object(id)?;
        while let Some(parent) = current.parent {
            current = self.object(parent)?;
        }
        Some(current.id)
    }
}

/// Write access used by importers to publish reconstructed objects.
pub trait SceneSink {
    /// Create an object; `object.parent` already holds a host id. Returns
    /// the identity the host assigned.
    ///
    /// # Errors
    /// Host specific failures.
    fn add_object(&mut self, object: SceneObject) -> Result<ObjectId>;

    /// Replace the game object state of a root created earlier. Importers
    /// call this once every descendant has its host id.
    ///
    /// # Errors
    /// [`crate::Error::UnknownObject`] when `root` is not a game object root.
    fn update_game_object(&mut self, root: ObjectId, game_object: GameObject) -> Result<()>;
}
