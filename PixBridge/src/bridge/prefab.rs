//! Prefab records <-> host locators and registry connections

use std::collections::HashMap;

use glam::Mat4;

use super::convert::{GamePlacement, host_transform, relative_to};
use crate::error::{Diagnostic, Error, Location, Result};
use crate::formats::pip::{
    CURVE_LINKS, CurveEnd, PipCurve, PipMapPoint, PipNode, PipPrefab, PipSemaphore, PipSign, PipSpawnPoint, PipTriggerPoint,
    Placement,
};
use crate::prefab::{
    Boundary, CurveRef, LocatorCategory, LocatorSnapshot, NavigationPoint, PrefabLocator, PrefabRegistry,
    find_intersections,
};
use crate::scene::{ObjectId, SceneObject, SceneSource};

/// A prefab locator waiting for its host id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StagedLocator {
    pub name: String,
    pub transform: Mat4,
    pub locator: PrefabLocator,
}

/// Locators rebuilt from a prefab file and the connections between them,
/// as indices into `locators`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PrefabImport {
    pub locators: Vec<StagedLocator>,
    pub connections: Vec<(usize, usize)>,
}

fn placement_transform(placement: &Placement, host_per_game: f32) -> Mat4 {
    host_transform(placement.position, placement.rotation, [1.0; 3], host_per_game)
}

fn point_transform(position: [f32; 3], host_per_game: f32) -> Mat4 {
    host_transform(position, [1.0, 0.0, 0.0, 0.0], [1.0; 3], host_per_game)
}

/// Quantized placement; curve ends meeting here share one navigation point.
fn end_key(placement: &Placement) -> [i64; 7] {
    let mut key = [0i64; 7];
    for (slot, value) in key.iter_mut().zip(placement.position.iter().chain(&placement.rotation)) {
        *slot = (value * 1e4).round() as i64;
    }
    key
}

fn claim_boundary(nav: &mut NavigationPoint, end: &CurveEnd) {
    if end.boundary != Boundary::None {
        nav.boundary = end.boundary;
        nav.boundary_lane = end.lane;
        nav.boundary_node = end.node;
    }
}

fn curve_attributes(nav: &mut NavigationPoint, curve: &PipCurve) {
    nav.blinker = curve.blinker;
    nav.allowed_vehicles = curve.allowed_vehicles;
    nav.priority = curve.priority;
    nav.speed_limit = curve.speed_limit;
    nav.traffic_semaphore = curve.traffic_semaphore;
    nav.traffic_rule.clone_from(&curve.traffic_rule);
    nav.low_probability = curve.low_probability;
}

fn undirected(neighbors: impl Iterator<Item = (usize, Vec<usize>)>, offset: usize, out: &mut Vec<(usize, usize)>) {
    let mut seen = Vec::new();
    for (index, list) in neighbors {
        for other in list {
            let pair = (index.min(other), index.max(other));
            if other != index && !seen.contains(&pair) {
                seen.push(pair);
                out.push((offset + pair.0, offset + pair.1));
            }
        }
    }
}

/// Host locators for a prefab. Navigation points are recovered from the
/// curve ends: the start point carries the curve's attributes.
pub(crate) fn import_prefab(prefab: &PipPrefab, host_per_game: f32) -> PrefabImport {
    let mut staged = PrefabImport::default();
    let push = |staged: &mut PrefabImport, name: String, transform: Mat4, locator: PrefabLocator| {
        staged.locators.push(StagedLocator {
            name,
            transform,
            locator,
        });
        staged.locators.len() - 1
    };

    for node in &prefab.nodes {
        push(
            &mut staged,
            format!("node_{}", node.index),
            placement_transform(&node.placement, host_per_game),
            PrefabLocator::ControlNode { index: node.index },
        );
    }

    let mut by_key: HashMap<[i64; 7], usize> = HashMap::new();
    let mut nav_index = |staged: &mut PrefabImport, placement: &Placement| {
        let key = end_key(placement);
        if let Some(&index) = by_key.get(&key) {
            return index;
        }
        let name = format!("nav_{}", by_key.len());
        let index = push(
            staged,
            name,
            placement_transform(placement, host_per_game),
            PrefabLocator::NavigationPoint(NavigationPoint::default()),
        );
        by_key.insert(key, index);
        index
    };
    for curve in &prefab.curves {
        let start = nav_index(&mut staged, &curve.start.placement);
        let end = nav_index(&mut staged, &curve.end.placement);
        if let PrefabLocator::NavigationPoint(nav) = &mut staged.locators[start].locator {
            curve_attributes(nav, curve);
            claim_boundary(nav, &curve.start);
        }
        if let PrefabLocator::NavigationPoint(nav) = &mut staged.locators[end].locator {
            claim_boundary(nav, &curve.end);
        }
        staged.connections.push((start, end));
    }

    for sign in &prefab.signs {
        push(
            &mut staged,
            sign.name.clone(),
            placement_transform(&sign.placement, host_per_game),
            PrefabLocator::Sign {
                model: sign.model.clone(),
                part: sign.part.clone(),
            },
        );
    }
    for spawn in &prefab.spawn_points {
        push(
            &mut staged,
            spawn.name.clone(),
            placement_transform(&spawn.placement, host_per_game),
            PrefabLocator::SpawnPoint {
                spawn_type: spawn.spawn_type,
            },
        );
    }
    for semaphore in &prefab.semaphores {
        push(
            &mut staged,
            semaphore.name.clone(),
            placement_transform(&semaphore.placement, host_per_game),
            PrefabLocator::Semaphore(semaphore.semaphore.clone()),
        );
    }

    let offset = staged.locators.len();
    for point in &prefab.map_points {
        push(
            &mut staged,
            point.name.clone(),
            point_transform(point.position, host_per_game),
            PrefabLocator::MapPoint(point.point.clone()),
        );
    }
    let mut connections = Vec::new();
    undirected(
        prefab.map_points.iter().map(|p| p.neighbors.clone()).enumerate(),
        offset,
        &mut connections,
    );

    let offset = staged.locators.len();
    for point in &prefab.trigger_points {
        push(
            &mut staged,
            point.name.clone(),
            point_transform(point.position, host_per_game),
            PrefabLocator::TriggerPoint(point.point.clone()),
        );
    }
    undirected(
        prefab.trigger_points.iter().map(|p| p.neighbors.clone()).enumerate(),
        offset,
        &mut connections,
    );
    staged.connections.extend(connections);

    tracing::debug!(
        "Prefab '{}': {} locator(s), {} connection(s)",
        prefab.name,
        staged.locators.len(),
        staged.connections.len()
    );
    staged
}

fn placement(object: &SceneObject, root: Mat4, game_per_host: f32) -> Placement {
    let game = GamePlacement::from_host(relative_to(root, object.transform), game_per_host);
    Placement {
        position: game.position,
        rotation: game.rotation,
    }
}

fn curve_end(nav: &NavigationPoint, placement: Placement) -> CurveEnd {
    CurveEnd {
        placement,
        boundary: nav.boundary,
        lane: nav.boundary_lane,
        node: nav.boundary_node,
    }
}

/// Index of every object of one category under the root, in scene order.
fn indexed<'a>(locators: &[(&'a SceneObject, &'a PrefabLocator)], category: LocatorCategory) -> HashMap<ObjectId, usize> {
    locators
        .iter()
        .filter(|(_, l)| l.category() == category)
        .enumerate()
        .map(|(i, (o, _))| (o.id, i))
        .collect()
}

fn nav_of<'a>(
    by_id: &HashMap<ObjectId, (&'a SceneObject, &'a PrefabLocator)>,
    id: ObjectId,
) -> Result<(&'a SceneObject, &'a NavigationPoint)> {
    let &(object, locator) = by_id.get(&id).ok_or(Error::UnknownObject(id))?;
    let nav = locator.as_nav().ok_or(Error::UnknownObject(id))?;
    Ok((object, nav))
}

fn neighbor_indices(registry: &PrefabRegistry, id: ObjectId, index: &HashMap<ObjectId, usize>) -> Vec<usize> {
    registry
        .neighbors(id)
        .iter()
        .filter_map(|edge| registry.edge(*edge))
        .filter(|edge| edge.valid)
        .filter_map(|edge| index.get(&edge.other(id)).copied())
        .collect()
}

/// Prefab records for the locators under `root`, or `None` when there are
/// none. The registry is refreshed against the scene first so moved
/// locators get fresh curve geometry.
///
/// Curve indices of `edges`, cut to the width of the curve link lists.
fn curve_links(
    edges: &[u64],
    curve_index: &HashMap<u64, usize>,
    curve: &str,
    what: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<usize> {
    let mut links: Vec<usize> = edges.iter().filter_map(|id| curve_index.get(id).copied()).collect();
    if links.len() > CURVE_LINKS {
        let diagnostic = Diagnostic::new(
            Location::section(format!("Curve:{curve}")),
            format!("{} {what} curve(s), only the first {CURVE_LINKS} are kept", links.len()),
        );
        tracing::warn!("{}", diagnostic);
        diagnostics.push(diagnostic);
        links.truncate(CURVE_LINKS);
    }
    links
}

/// Overflowing curve link lists are cut and reported in `diagnostics`.
///
/// # Errors
/// [`Error::UnknownObject`] for an unknown root or a dangling edge end.
pub(crate) fn export_prefab<S: SceneSource + ?Sized>(
    source: &S,
    root: ObjectId,
    registry: &mut PrefabRegistry,
    game_per_host: f32,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Option<PipPrefab>> {
    let root_object = source.object(root).ok_or(Error::UnknownObject(root))?;
    let locators: Vec<(&SceneObject, &PrefabLocator)> = source
        .descendants(root)
        .into_iter()
        .filter_map(|id| source.object(id))
        .filter_map(|o| o.prefab_locator().map(|l| (o, l)))
        .collect();
    if locators.is_empty() {
        return Ok(None);
    }

    registry.refresh(source);
    for (object, _) in &locators {
        if !registry.contains(object.id) {
            registry.register(&LocatorSnapshot::from_source(source, object.id)?);
        }
    }
    registry.recompute_dirty();

    let root_transform = root_object.transform;
    let by_id: HashMap<ObjectId, (&SceneObject, &PrefabLocator)> =
        locators.iter().map(|(o, l)| (o.id, (*o, *l))).collect();

    let mut prefab = PipPrefab {
        name: root_object.name.clone(),
        ..PipPrefab::default()
    };

    let mut nodes: Vec<PipNode> = locators
        .iter()
        .filter_map(|(object, locator)| match locator {
            PrefabLocator::ControlNode { index } => Some(PipNode {
                index: *index,
                placement: placement(object, root_transform, game_per_host),
                ..PipNode::default()
            }),
            _ => None,
        })
        .collect();
    nodes.sort_by_key(|n| n.index);
    prefab.nodes = nodes;

    let edges: Vec<_> = registry.edges_of(root, LocatorCategory::NavigationPoint).collect();
    let curve_index: HashMap<u64, usize> = edges.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
    for (i, edge) in edges.iter().enumerate() {
        let (start_object, start) = nav_of(&by_id, edge.start)?;
        let curve = i.to_string();
        let (end_object, end) = nav_of(&by_id, edge.end)?;
        prefab.curves.push(PipCurve {
            name: start_object.name.clone(),
            start: curve_end(start, placement(start_object, root_transform, game_per_host)),
            end: curve_end(end, placement(end_object, root_transform, game_per_host)),
            blinker: start.blinker,
            allowed_vehicles: start.allowed_vehicles,
            priority: start.priority,
            low_probability: start.low_probability,
            speed_limit: start.speed_limit,
            traffic_semaphore: start.traffic_semaphore,
            traffic_rule: start.traffic_rule.clone(),
            length: edge.cached_geometry().length() * game_per_host,
            next: curve_links(edge.next(), &curve_index, &curve, "next", diagnostics),
            prev: curve_links(edge.prev(), &curve_index, &curve, "prev", diagnostics),
            leads_to_nodes: 0,
        });
    }

    let refs: Vec<CurveRef<'_>> = edges
        .iter()
        .filter_map(|edge| {
            edge.cached_geometry().as_curve().map(|curve| CurveRef {
                curve,
                start: edge.start,
                end: edge.end,
            })
        })
        .collect();
    if refs.len() == edges.len() {
        prefab.intersections = find_intersections(&refs)
            .into_iter()
            .map(|mut x| {
                x.radius *= game_per_host;
                x
            })
            .collect();
    }

    let map_index = indexed(&locators, LocatorCategory::MapPoint);
    let trigger_index = indexed(&locators, LocatorCategory::TriggerPoint);
    for (object, locator) in &locators {
        let name = object.name.clone();
        match locator {
            PrefabLocator::Sign { model, part } => prefab.signs.push(PipSign {
                name,
                placement: placement(object, root_transform, game_per_host),
                model: model.clone(),
                part: part.clone(),
            }),
            PrefabLocator::SpawnPoint { spawn_type } => prefab.spawn_points.push(PipSpawnPoint {
                name,
                placement: placement(object, root_transform, game_per_host),
                spawn_type: *spawn_type,
            }),
            PrefabLocator::Semaphore(semaphore) => prefab.semaphores.push(PipSemaphore {
                name,
                placement: placement(object, root_transform, game_per_host),
                semaphore: semaphore.clone(),
            }),
            PrefabLocator::MapPoint(point) => prefab.map_points.push(PipMapPoint {
                name,
                position: placement(object, root_transform, game_per_host).position,
                point: point.clone(),
                neighbors: neighbor_indices(registry, object.id, &map_index),
            }),
            PrefabLocator::TriggerPoint(point) => prefab.trigger_points.push(PipTriggerPoint {
                name,
                position: placement(object, root_transform, game_per_host).position,
                point: point.clone(),
                neighbors: neighbor_indices(registry, object.id, &trigger_index),
            }),
            PrefabLocator::ControlNode { .. } | PrefabLocator::NavigationPoint(_) => {}
        }
    }

    tracing::debug!(
        "Prefab '{}': {} node(s), {} curve(s), {} intersection record(s)",
        prefab.name,
        prefab.nodes.len(),
        prefab.curves.len(),
        prefab.intersections.len()
    );
    Ok(Some(prefab))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pip::tests::chain;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chain_shares_middle_point() {
        let staged = import_prefab(&chain(), 1.0);
        let navs: Vec<&StagedLocator> = staged
            .locators
            .iter()
            .filter(|l| l.locator.category() == LocatorCategory::NavigationPoint)
            .collect();
        assert_eq!(navs.len(), 3);
        assert_eq!(staged.connections[..2], [(2, 3), (3, 4)]);

        let first = navs[0].locator.as_nav().unwrap();
        assert_eq!(first.boundary, Boundary::Input);
        assert_eq!(first.priority, 3);
        let middle = navs[1].locator.as_nav().unwrap();
        assert_eq!(middle.speed_limit, Some(50.0));
        assert_eq!(middle.boundary, Boundary::None);
        let last = navs[2].locator.as_nav().unwrap();
        assert_eq!((last.boundary, last.boundary_node), (Boundary::Output, 1));
    }

    #[test]
    fn test_map_neighbors_connect_once() {
        let staged = import_prefab(&chain(), 1.0);
        // Two nodes, three navigation points, then the map points
        assert_eq!(staged.connections[2..], [(5, 6)]);
        assert_eq!(staged.locators[5].name, "m0");
    }

    #[test]
    fn test_node_forward_is_host_y() {
        let staged = import_prefab(&chain(), 2.0);
        // Node 1 sits at game z = -20
        assert!((staged.locators[1].transform.w_axis.y - 40.0).abs() < 1e-4);
    }
}
