//! Prefab graph: locators, connections, curves and intersections
//!
//! Navigation points form a directed graph whose edges are Bezier curves;
//! map points and trigger points form undirected graphs drawn as lines.
//! [`PrefabRegistry`] owns every connection of a session.

mod curve;
mod intersection;
mod locator;
mod registry;

pub use curve::{FORWARD, LENGTH_SEGMENTS, Line, NavCurve};
pub use intersection::{CurveRef, Intersection, IntersectionKind, LANE_HALF_WIDTH, find_intersections};
pub use locator::{
    Boundary, Connectivity, LocatorCategory, MapPoint, NavigationPoint, PrefabLocator, Semaphore,
    TriggerPoint, blinker, vehicles,
};
pub use registry::{Edge, EdgeGeometry, EdgeId, LocatorSnapshot, PrefabRegistry};
