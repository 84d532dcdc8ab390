//! In-memory scene

use indexmap::IndexMap;

use super::{ObjectId, SceneObject, SceneSink, SceneSource};
use crate::error::{Error, Result};
use crate::object::GameObject;

/// A scene held entirely in memory. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    objects: IndexMap<ObjectId, SceneObject>,
    next_id: ObjectId,
}

impl MemoryScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, assigning a fresh id.
    ///
    /// # Errors
    /// [`Error::UnknownObject`] when the parent does not exist.
    pub fn insert(&mut self, mut object: SceneObject) -> Result<ObjectId> {
        if let Some(parent) = object.parent {
            if !self.objects.contains_key(&parent) {
                return Err(Error::UnknownObject(parent));
            }
        }
        self.next_id += 1;
        object.id = self.next_id;
        self.objects.insert(object.id, object);
        Ok(self.next_id)
    }

    /// Remove an object and its descendants; returns removed ids.
    pub fn remove(&mut self, id: ObjectId) -> Vec<ObjectId> {
        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        for gone in &removed {
            self.objects.shift_remove(gone);
        }
        removed
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// Game object state of a root.
    pub fn game_object_mut(&mut self, root: ObjectId) -> Option<&mut GameObject> {
        match &mut self.objects.get_mut(&root)?.kind {
            super::ObjectKind::Root(game_object) => Some(&mut **game_object),
            _ => None,
        }
    }

    /// First object with `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SceneObject> {
        self.objects.values().find(|o| o.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl SceneSource for MemoryScene {
    fn roots(&self) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.parent.is_none() && o.game_object().is_some())
            .map(|o| o.id)
            .collect()
    }

    fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.parent == Some(id))
            .map(|o| o.id)
            .collect()
    }
}

impl SceneSink for MemoryScene {
    fn add_object(&mut self, object: SceneObject) -> Result<ObjectId> {
        self.insert(object)
    }

    fn update_game_object(&mut self, root: ObjectId, game_object: GameObject) -> Result<()> {
        let slot = self.game_object_mut(root).ok_or(Error::UnknownObject(root))?;
        *slot = game_object;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ObjectKind;

    #[test]
    fn test_tree_queries() {
        let mut scene = MemoryScene::new();
        let root = scene
            .insert(SceneObject::new("truck", ObjectKind::Root(Box::new(GameObject::new_default("truck")))))
            .unwrap();
        let a = scene.insert(SceneObject::new("a", ObjectKind::Empty).with_parent(root)).unwrap();
        let b = scene.insert(SceneObject::new("b", ObjectKind::Empty).with_parent(a)).unwrap();
        let c = scene.insert(SceneObject::new("c", ObjectKind::Empty).with_parent(root)).unwrap();

        assert_eq!(scene.roots(), vec![root]);
        assert_eq!(scene.descendants(root), vec![a, b, c]);
        assert_eq!(scene.root_of(b), Some(root));
        assert!(matches!(
            scene.insert(SceneObject::new("x", ObjectKind::Empty).with_parent(99)),
            Err(Error::UnknownObject(99))
        ));

        assert_eq!(scene.remove(a), vec![a, b]);
        assert_eq!(scene.len(), 2);
    }
}
