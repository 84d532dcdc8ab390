//! Prefab connection registry
//!
//! Keyed by host object ids. Each known locator holds back-references to
//! its edges; each edge holds both endpoints, a validity bit, its cached
//! geometry and, for navigation curves, the `next`/`prev` curve lists.

use glam::Mat4;
use indexmap::IndexMap;

use super::curve::{Line, NavCurve};
use super::locator::{Connectivity, LocatorCategory, PrefabLocator};
use crate::config::PrefabSettings;
use crate::error::{Error, Result};
use crate::scene::{ObjectId, SceneSource};

pub type EdgeId = u64;

/// What the registry needs to know about one locator.
#[derive(Debug, Clone, Copy)]
pub struct LocatorSnapshot<'a> {
    pub id: ObjectId,
    /// Owning game object root.
    pub root: Option<ObjectId>,
    /// World transform, host basis.
    pub transform: Mat4,
    pub locator: &'a PrefabLocator,
}

impl<'a> LocatorSnapshot<'a> {
    /// Snapshot a scene object.
    ///
    /// # Errors
    /// [`Error::UnknownObject`] for unknown ids, [`Error::TypeMismatch`]
    /// when the object is not a prefab locator.
    pub fn from_source<S: SceneSource + ?Sized>(source: &'a S, id: ObjectId) -> Result<Self> {
        let object = source.object(id).ok_or(Error::UnknownObject(id))?;
        let locator = object.prefab_locator().ok_or_else(|| Error::TypeMismatch {
            message: format!("'{}' is not a prefab locator", object.name),
        })?;
        Ok(Self {
            id,
            root: source.root_of(id).filter(|root| *root != id),
            transform: object.transform,
            locator,
        })
    }

    fn content_hash(&self) -> u32 {
        let mut bytes = Vec::with_capacity(96);
        for value in self.transform.to_cols_array() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        self.locator.hash_attributes(&mut bytes);
        bytes.extend_from_slice(&self.root.unwrap_or(0).to_le_bytes());
        crc32fast::hash(&bytes)
    }
}

/// Cached geometry of an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeGeometry {
    Curve(NavCurve),
    Line(Line),
}

impl EdgeGeometry {
    #[must_use]
    pub fn length(&self) -> f32 {
        match self {
            EdgeGeometry::Curve(curve) => curve.length,
            EdgeGeometry::Line(line) => line.length(),
        }
    }

    pub fn as_curve(&self) -> Option<&NavCurve> {
        match self {
            EdgeGeometry::Curve(curve) => Some(curve),
            EdgeGeometry::Line(_) => None,
        }
    }
}

/// One connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub start: ObjectId,
    pub end: ObjectId,
    pub category: LocatorCategory,
    /// Both endpoints still share a root.
    pub valid: bool,
    dirty: bool,
    geometry: EdgeGeometry,
    next: Vec<EdgeId>,
    prev: Vec<EdgeId>,
}

impl Edge {
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Geometry as last computed; may be stale when dirty.
    #[must_use]
    pub fn cached_geometry(&self) -> &EdgeGeometry {
        &self.geometry
    }

    /// Downstream curves.
    #[must_use]
    pub fn next(&self) -> &[EdgeId] {
        &self.next
    }

    /// Upstream curves.
    #[must_use]
    pub fn prev(&self) -> &[EdgeId] {
        &self.prev
    }

    #[must_use]
    pub fn other(&self, id: ObjectId) -> ObjectId {
        if self.start == id { self.end } else { self.start }
    }
}

#[derive(Debug, Clone)]
struct LocatorEntry {
    category: LocatorCategory,
    root: Option<ObjectId>,
    transform: Mat4,
    hash: u32,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
    neighbors: Vec<EdgeId>,
}

impl LocatorEntry {
    fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.incoming
            .iter()
            .chain(&self.outgoing)
            .chain(&self.neighbors)
            .copied()
    }

    fn is_isolated(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty() && self.neighbors.is_empty()
    }
}

/// The prefab graph of a session.
#[derive(Debug, Clone)]
pub struct PrefabRegistry {
    locators: IndexMap<ObjectId, LocatorEntry>,
    edges: IndexMap<EdgeId, Edge>,
    next_edge: EdgeId,
    min_handle: f32,
    preview_segments: usize,
}

impl Default for PrefabRegistry {
    fn default() -> Self {
        Self::new(&PrefabSettings::default())
    }
}

impl PrefabRegistry {
    #[must_use]
    pub fn new(settings: &PrefabSettings) -> Self {
        Self {
            locators: IndexMap::new(),
            edges: IndexMap::new(),
            next_edge: 0,
            min_handle: settings.min_handle_length,
            preview_segments: settings.curve_preview_segments,
        }
    }

    /// Start tracking a locator (idempotent; refreshes stored state).
    pub fn register(&mut self, snapshot: &LocatorSnapshot<'_>) {
        let hash = snapshot.content_hash();
        let entry = self.locators.entry(snapshot.id).or_insert_with(|| LocatorEntry {
            category: snapshot.locator.category(),
            root: snapshot.root,
            transform: snapshot.transform,
            hash,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            neighbors: Vec::new(),
        });
        entry.category = snapshot.locator.category();
        entry.root = snapshot.root;
        entry.transform = snapshot.transform;
        entry.hash = hash;
    }

    /// Connect two locators. Preconditions are checked in order and a
    /// failure leaves the registry untouched.
    ///
    /// # Errors
    /// [`Error::TypeMismatch`] for non-connectable, mixed-type or
    /// cross-root endpoints; [`Error::Duplicate`] for self-loops and
    /// existing connections; [`Error::SlotFull`] at a slot limit.
    pub fn connect(&mut self, a: &LocatorSnapshot<'_>, b: &LocatorSnapshot<'_>) -> Result<EdgeId> {
        let category = a.locator.category();
        let connectivity = category.connectivity().ok_or_else(|| Error::TypeMismatch {
            message: format!("{} locators do not connect", category.as_str()),
        })?;
        if b.locator.category() != category {
            return Err(Error::TypeMismatch {
                message: format!(
                    "cannot connect {} to {}",
                    category.as_str(),
                    b.locator.category().as_str()
                ),
            });
        }
        if a.id == b.id {
            return Err(Error::Duplicate {
                message: format!("locator {} cannot connect to itself", a.id),
            });
        }
        if a.root.is_none() || a.root != b.root {
            return Err(Error::TypeMismatch {
                message: format!("locators {} and {} belong to different roots", a.id, b.id),
            });
        }
        if self.find_edge(a.id, b.id).is_some() {
            return Err(Error::Duplicate {
                message: format!("locators {} and {} are already connected", a.id, b.id),
            });
        }

        let slots = |id: ObjectId| self.locators.get(&id);
        match connectivity {
            Connectivity::Directed { incoming, outgoing } => {
                if slots(a.id).is_some_and(|e| e.outgoing.len() >= outgoing) {
                    return Err(Error::SlotFull {
                        locator: a.id,
                        limit: outgoing,
                    });
                }
                if slots(b.id).is_some_and(|e| e.incoming.len() >= incoming) {
                    return Err(Error::SlotFull {
                        locator: b.id,
                        limit: incoming,
                    });
                }
            }
            Connectivity::Undirected { neighbors } => {
                for id in [a.id, b.id] {
                    if slots(id).is_some_and(|e| e.neighbors.len() >= neighbors) {
                        return Err(Error::SlotFull { locator: id, limit: neighbors });
                    }
                }
            }
        }

        self.register(a);
        self.register(b);
        let id = self.next_edge;
        self.next_edge += 1;

        let mut edge = Edge {
            id,
            start: a.id,
            end: b.id,
            category,
            valid: true,
            dirty: false,
            geometry: self.compute_geometry(category, a.transform, b.transform),
            next: Vec::new(),
            prev: Vec::new(),
        };

        match connectivity {
            Connectivity::Directed { .. } => {
                edge.prev = self.locators[&a.id].incoming.clone();
                edge.next = self.locators[&b.id].outgoing.clone();
                for upstream in &edge.prev {
                    if let Some(e) = self.edges.get_mut(upstream) {
                        e.next.push(id);
                    }
                }
                for downstream in &edge.next {
                    if let Some(e) = self.edges.get_mut(downstream) {
                        e.prev.push(id);
                    }
                }
                if let Some(entry) = self.locators.get_mut(&a.id) {
                    entry.outgoing.push(id);
                }
                if let Some(entry) = self.locators.get_mut(&b.id) {
                    entry.incoming.push(id);
                }
            }
            Connectivity::Undirected { .. } => {
                for end in [a.id, b.id] {
                    if let Some(entry) = self.locators.get_mut(&end) {
                        entry.neighbors.push(id);
                    }
                }
            }
        }

        tracing::debug!("Connected {} -> {} as edge {}", a.id, b.id, id);
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Remove the connection between two locators, in either direction.
    ///
    /// # Errors
    /// [`Error::UnknownName`] when they are not connected.
    pub fn disconnect(&mut self, a: ObjectId, b: ObjectId) -> Result<EdgeId> {
        let id = self.find_edge(a, b).ok_or_else(|| Error::UnknownName {
            kind: "connection",
            name: format!("{a} <-> {b}"),
        })?;
        self.remove_edge(id);
        Ok(id)
    }

    /// Drop a locator the host deleted, with all its edges. With
    /// `collect_isolated`, opposite endpoints left without any edge are
    /// dropped too; their ids are returned so the host can delete them.
    pub fn forget(&mut self, id: ObjectId, collect_isolated: bool) -> Vec<ObjectId> {
        let Some(entry) = self.locators.shift_remove(&id) else {
            return Vec::new();
        };
        let mut opposite = Vec::new();
        for edge_id in entry.edge_ids() {
            if let Some(edge) = self.edges.get(&edge_id) {
                opposite.push(edge.other(id));
            }
            self.remove_edge(edge_id);
        }

        let mut collected = Vec::new();
        if collect_isolated {
            for other in opposite {
                if self.locators.get(&other).is_some_and(LocatorEntry::is_isolated) {
                    self.locators.shift_remove(&other);
                    collected.push(other);
                }
            }
        }
        tracing::debug!("Forgot locator {} (collected {:?})", id, collected);
        collected
    }

    /// Re-hash every known locator against the scene. Edges touching a
    /// changed locator are marked dirty and their validity is updated.
    /// Locators missing from the scene are forgotten. Returns the number
    /// of changed locators.
    pub fn refresh<S: SceneSource + ?Sized>(&mut self, source: &S) -> usize {
        let ids: Vec<ObjectId> = self.locators.keys().copied().collect();
        let mut changed = 0;
        for id in ids {
            let Ok(snapshot) = LocatorSnapshot::from_source(source, id) else {
                self.forget(id, false);
                continue;
            };
            let hash = snapshot.content_hash();
            let Some(entry) = self.locators.get_mut(&id) else {
                continue;
            };
            if entry.hash == hash {
                continue;
            }
            entry.hash = hash;
            entry.root = snapshot.root;
            entry.transform = snapshot.transform;
            let edge_ids: Vec<EdgeId> = entry.edge_ids().collect();
            changed += 1;
            for edge_id in edge_ids {
                let valid = self.edge_roots_match(edge_id);
                if let Some(edge) = self.edges.get_mut(&edge_id) {
                    edge.dirty = true;
                    edge.valid = valid;
                }
            }
        }
        if changed > 0 {
            tracing::debug!("Prefab refresh: {} locator(s) changed", changed);
        }
        changed
    }

    /// Geometry of an edge, recomputed first when dirty.
    ///
    /// # Errors
    /// [`Error::UnknownName`] for an unknown edge.
    pub fn geometry(&mut self, id: EdgeId) -> Result<&EdgeGeometry> {
        let edge = self.edges.get(&id).ok_or_else(|| Error::UnknownName {
            kind: "connection",
            name: id.to_string(),
        })?;
        if edge.dirty {
            let start = self.locators.get(&edge.start).map_or(Mat4::IDENTITY, |e| e.transform);
            let end = self.locators.get(&edge.end).map_or(Mat4::IDENTITY, |e| e.transform);
            let geometry = self.compute_geometry(edge.category, start, end);
            if let Some(edge) = self.edges.get_mut(&id) {
                edge.geometry = geometry;
                edge.dirty = false;
            }
        }
        Ok(&self.edges[&id].geometry)
    }

    /// Recompute every dirty edge.
    pub fn recompute_dirty(&mut self) {
        let dirty: Vec<EdgeId> = self.edges.values().filter(|e| e.dirty).map(|e| e.id).collect();
        for id in dirty {
            let _ = self.geometry(id);
        }
    }

    fn compute_geometry(&self, category: LocatorCategory, start: Mat4, end: Mat4) -> EdgeGeometry {
        if category == LocatorCategory::NavigationPoint {
            EdgeGeometry::Curve(NavCurve::from_transforms(
                start,
                end,
                self.min_handle,
                self.preview_segments,
            ))
        } else {
            EdgeGeometry::Line(Line::between(
                start.w_axis.truncate(),
                end.w_axis.truncate(),
            ))
        }
    }

    fn edge_roots_match(&self, id: EdgeId) -> bool {
        let Some(edge) = self.edges.get(&id) else {
            return false;
        };
        let root = |locator| self.locators.get(&locator).and_then(|e| e.root);
        root(edge.start).is_some() && root(edge.start) == root(edge.end)
    }

    fn find_edge(&self, a: ObjectId, b: ObjectId) -> Option<EdgeId> {
        let entry = self.locators.get(&a)?;
        entry
            .edge_ids()
            .find(|id| self.edges.get(id).is_some_and(|e| e.other(a) == b))
    }

    fn remove_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.shift_remove(&id) else {
            return;
        };
        for upstream in &edge.prev {
            if let Some(e) = self.edges.get_mut(upstream) {
                e.next.retain(|x| *x != id);
            }
        }
        for downstream in &edge.next {
            if let Some(e) = self.edges.get_mut(downstream) {
                e.prev.retain(|x| *x != id);
            }
        }
        for end in [edge.start, edge.end] {
            if let Some(entry) = self.locators.get_mut(&end) {
                entry.incoming.retain(|x| *x != id);
                entry.outgoing.retain(|x| *x != id);
                entry.neighbors.retain(|x| *x != id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.locators.contains_key(&id)
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Every edge, in creation order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Valid edges of one category under `root`, in creation order.
    pub fn edges_of<'a>(
        &'a self,
        root: ObjectId,
        category: LocatorCategory,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |edge| {
            edge.category == category
                && edge.valid
                && self.locators.get(&edge.start).and_then(|e| e.root) == Some(root)
        })
    }

    #[must_use]
    pub fn incoming(&self, id: ObjectId) -> &[EdgeId] {
        self.locators.get(&id).map_or(&[], |e| &e.incoming)
    }

    #[must_use]
    pub fn outgoing(&self, id: ObjectId) -> &[EdgeId] {
        self.locators.get(&id).map_or(&[], |e| &e.outgoing)
    }

    #[must_use]
    pub fn neighbors(&self, id: ObjectId) -> &[EdgeId] {
        self.locators.get(&id).map_or(&[], |e| &e.neighbors)
    }

    #[must_use]
    pub fn locator_count(&self) -> usize {
        self.locators.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn clear(&mut self) {
        self.locators.clear();
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::GameObject;
    use crate::prefab::{MapPoint, NavigationPoint, TriggerPoint};
    use crate::scene::{LocatorData, MemoryScene, ObjectKind, SceneObject};
    use glam::Vec3;

    fn scene_with_root() -> (MemoryScene, ObjectId) {
        let mut scene = MemoryScene::new();
        let root = scene
            .insert(SceneObject::new("root", ObjectKind::Root(Box::new(GameObject::new_default("root")))))
            .unwrap();
        (scene, root)
    }

    fn add(scene: &mut MemoryScene, parent: ObjectId, locator: PrefabLocator, x: f32) -> ObjectId {
        scene
            .insert(
                SceneObject::new(format!("loc{x}"), ObjectKind::Locator(LocatorData::Prefab(locator)))
                    .with_parent(parent)
                    .with_transform(Mat4::from_translation(Vec3::new(x, 0.0, 0.0))),
            )
            .unwrap()
    }

    fn nav() -> PrefabLocator {
        PrefabLocator::NavigationPoint(NavigationPoint::default())
    }

    fn link(registry: &mut PrefabRegistry, scene: &MemoryScene, a: ObjectId, b: ObjectId) -> Result<EdgeId> {
        let a = LocatorSnapshot::from_source(scene, a)?;
        let b = LocatorSnapshot::from_source(scene, b)?;
        registry.connect(&a, &b)
    }

    #[test]
    fn test_preconditions() {
        let (mut scene, root) = scene_with_root();
        let other_root = scene
            .insert(SceneObject::new("other", ObjectKind::Root(Box::new(GameObject::new_default("other")))))
            .unwrap();
        let a = add(&mut scene, root, nav(), 0.0);
        let b = add(&mut scene, root, nav(), 1.0);
        let m = add(&mut scene, root, PrefabLocator::MapPoint(MapPoint::default()), 2.0);
        let far = add(&mut scene, other_root, nav(), 3.0);
        let sign = add(&mut scene, root, PrefabLocator::Sign { model: String::new(), part: String::new() }, 4.0);

        let mut registry = PrefabRegistry::default();
        assert!(matches!(link(&mut registry, &scene, a, m), Err(Error::TypeMismatch { .. })));
        assert!(matches!(link(&mut registry, &scene, sign, sign), Err(Error::TypeMismatch { .. })));
        assert!(matches!(link(&mut registry, &scene, a, a), Err(Error::Duplicate { .. })));
        assert!(matches!(link(&mut registry, &scene, a, far), Err(Error::TypeMismatch { .. })));
        assert_eq!(registry.edge_count(), 0);

        link(&mut registry, &scene, a, b).unwrap();
        assert!(matches!(link(&mut registry, &scene, a, b), Err(Error::Duplicate { .. })));
        assert!(matches!(link(&mut registry, &scene, b, a), Err(Error::Duplicate { .. })));
    }

    #[test]
    fn test_slot_limits() {
        let (mut scene, root) = scene_with_root();
        let hub = add(&mut scene, root, nav(), 0.0);
        let mut registry = PrefabRegistry::default();
        for i in 0..6 {
            let n = add(&mut scene, root, nav(), 10.0 + i as f32);
            link(&mut registry, &scene, hub, n).unwrap();
        }
        let extra = add(&mut scene, root, nav(), 20.0);
        assert!(matches!(
            link(&mut registry, &scene, hub, extra),
            Err(Error::SlotFull { limit: 6, .. })
        ));
        // Incoming side is independent
        link(&mut registry, &scene, extra, hub).unwrap();

        let t: Vec<ObjectId> = (0..4)
            .map(|i| add(&mut scene, root, PrefabLocator::TriggerPoint(TriggerPoint::default()), 30.0 + i as f32))
            .collect();
        link(&mut registry, &scene, t[0], t[1]).unwrap();
        link(&mut registry, &scene, t[0], t[2]).unwrap();
        assert!(matches!(
            link(&mut registry, &scene, t[0], t[3]),
            Err(Error::SlotFull { limit: 2, .. })
        ));
    }

    #[test]
    fn test_symmetry_and_next_prev() {
        let (mut scene, root) = scene_with_root();
        let n: Vec<ObjectId> = (0..4).map(|i| add(&mut scene, root, nav(), i as f32 * 10.0)).collect();
        let mut registry = PrefabRegistry::default();
        let e0 = link(&mut registry, &scene, n[0], n[1]).unwrap();
        let e2 = link(&mut registry, &scene, n[2], n[3]).unwrap();
        let e1 = link(&mut registry, &scene, n[1], n[2]).unwrap();

        for edge in registry.edges() {
            assert!(registry.outgoing(edge.start).contains(&edge.id));
            assert!(registry.incoming(edge.end).contains(&edge.id));
        }
        assert_eq!(registry.edge(e0).unwrap().next(), [e1]);
        assert_eq!(registry.edge(e1).unwrap().next(), [e2]);
        assert_eq!(registry.edge(e1).unwrap().prev(), [e0]);
        assert!(registry.edge(e2).unwrap().next().is_empty());

        registry.disconnect(n[2], n[1]).unwrap();
        assert!(registry.edge(e0).unwrap().next().is_empty());
        assert!(registry.edge(e2).unwrap().prev().is_empty());
    }

    #[test]
    fn test_forget_collects_isolated() {
        let (mut scene, root) = scene_with_root();
        let a = add(&mut scene, root, nav(), 0.0);
        let b = add(&mut scene, root, nav(), 1.0);
        let c = add(&mut scene, root, nav(), 2.0);
        let d = add(&mut scene, root, nav(), 3.0);
        let mut registry = PrefabRegistry::default();
        link(&mut registry, &scene, a, b).unwrap();
        link(&mut registry, &scene, a, c).unwrap();
        link(&mut registry, &scene, c, d).unwrap();

        let collected = registry.forget(a, true);
        assert_eq!(collected, vec![b]);
        assert!(!registry.contains(a));
        assert!(registry.contains(c));
        assert_eq!(registry.edge_count(), 1);
    }

    #[test]
    fn test_refresh_marks_dirty() {
        let (mut scene, root) = scene_with_root();
        let a = add(&mut scene, root, nav(), 0.0);
        let b = add(&mut scene, root, nav(), 9.0);
        let mut registry = PrefabRegistry::default();
        let edge = link(&mut registry, &scene, a, b).unwrap();
        assert_eq!(registry.refresh(&scene), 0);

        scene.object_mut(b).unwrap().transform = Mat4::from_translation(Vec3::new(0.0, 30.0, 0.0));
        assert_eq!(registry.refresh(&scene), 1);
        assert!(registry.edge(edge).unwrap().is_dirty());
        let length = registry.geometry(edge).unwrap().length();
        assert!(length >= 30.0 - 1e-3);
        assert!(!registry.edge(edge).unwrap().is_dirty());

        scene.remove(b);
        registry.refresh(&scene);
        assert_eq!(registry.edge_count(), 0);
    }
}
