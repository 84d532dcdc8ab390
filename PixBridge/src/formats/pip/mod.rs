//! PIP prefab files
//!
//! Control nodes, navigation curves, signs, spawn points, semaphores, map
//! points, trigger points and curve intersections. Curves reference each
//! other by index through fixed four-wide `next`/`prev` lists; map and
//! trigger points list their neighbors the same way.

mod lanes;

use std::path::Path;

use super::pix::{FileKind, Header, PixFile, Section, Value, WriteOptions, global_section, validate_globals};
use crate::config::PrefabSettings;
use crate::error::{Diagnostic, Error, Result};
use crate::prefab::{Boundary, Intersection, MapPoint, Semaphore, TriggerPoint};

pub use lanes::{LaneTable, lane_tables, leads_to_nodes};

pub const FORMAT_VERSION: i64 = 21;

/// Lanes per control node direction.
pub const LANE_COUNT: usize = 8;
/// Width of the curve `NextCurves` / `PrevCurves` lists.
pub const CURVE_LINKS: usize = 4;
/// Width of the map point neighbor list.
pub const MAP_NEIGHBORS: usize = 6;
/// Width of the trigger point neighbor list.
pub const TRIGGER_NEIGHBORS: usize = 2;

/// Curve flag layout.
pub mod curve_flags {
    pub const BLINKER_MASK: u32 = 0x7;
    pub const VEHICLES_SHIFT: u32 = 4;
    pub const VEHICLES_MASK: u32 = 0x3 << VEHICLES_SHIFT;
    pub const PRIORITY_SHIFT: u32 = 8;
    pub const PRIORITY_MASK: u32 = 0xf << PRIORITY_SHIFT;
    pub const LOW_PROBABILITY: u32 = 1 << 12;
}

/// Trigger point flag bits.
pub mod trigger_flags {
    pub const SPHERE: u32 = 0x1;
    pub const PARTIAL: u32 = 0x2;
    pub const ONE_TIME: u32 = 0x4;
    pub const MANUAL: u32 = 0x8;
}

/// Position and `( w x y z )` rotation, game basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Placement {
    fn read(section: &Section) -> Result<Self> {
        Ok(Self {
            position: section.req_floats::<3>("Position")?,
            rotation: section
                .prop("Rotation")
                .map(|_| section.req_floats::<4>("Rotation"))
                .transpose()?
                .unwrap_or([1.0, 0.0, 0.0, 0.0]),
        })
    }

    fn write(&self, section: &mut Section) {
        section.push_prop("Position", Value::hex(&self.position));
        section.push_prop("Rotation", Value::hex(&self.rotation));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipNode {
    pub index: i64,
    pub placement: Placement,
    /// Lane tables as read; recomputed on write.
    pub input_lanes: [i64; LANE_COUNT],
    pub output_lanes: [i64; LANE_COUNT],
}

/// One end of a curve with its lane boundary role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveEnd {
    pub placement: Placement,
    pub boundary: Boundary,
    pub lane: i64,
    pub node: i64,
}

impl Default for CurveEnd {
    fn default() -> Self {
        Self {
            placement: Placement::default(),
            boundary: Boundary::None,
            lane: -1,
            node: -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipCurve {
    pub name: String,
    pub start: CurveEnd,
    pub end: CurveEnd,
    pub blinker: u32,
    pub allowed_vehicles: u32,
    pub priority: u32,
    pub low_probability: bool,
    pub speed_limit: Option<f32>,
    pub traffic_semaphore: i64,
    pub traffic_rule: String,
    pub length: f32,
    pub next: Vec<usize>,
    pub prev: Vec<usize>,
    /// As read; recomputed on write.
    pub leads_to_nodes: u32,
}

impl Default for PipCurve {
    fn default() -> Self {
        Self {
            name: String::new(),
            start: CurveEnd::default(),
            end: CurveEnd::default(),
            blinker: 0,
            allowed_vehicles: 0,
            priority: 0,
            low_probability: false,
            speed_limit: None,
            traffic_semaphore: -1,
            traffic_rule: String::new(),
            length: 0.0,
            next: Vec::new(),
            prev: Vec::new(),
            leads_to_nodes: 0,
        }
    }
}

impl PipCurve {
    #[must_use]
    pub fn flags(&self) -> u32 {
        let mut flags = (self.blinker & curve_flags::BLINKER_MASK)
            | ((self.allowed_vehicles << curve_flags::VEHICLES_SHIFT) & curve_flags::VEHICLES_MASK)
            | ((self.priority << curve_flags::PRIORITY_SHIFT) & curve_flags::PRIORITY_MASK);
        if self.low_probability {
            flags |= curve_flags::LOW_PROBABILITY;
        }
        flags
    }

    fn apply_flags(&mut self, flags: u32) {
        self.blinker = flags & curve_flags::BLINKER_MASK;
        self.allowed_vehicles = (flags & curve_flags::VEHICLES_MASK) >> curve_flags::VEHICLES_SHIFT;
        self.priority = (flags & curve_flags::PRIORITY_MASK) >> curve_flags::PRIORITY_SHIFT;
        self.low_probability = flags & curve_flags::LOW_PROBABILITY != 0;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipSign {
    pub name: String,
    pub placement: Placement,
    pub model: String,
    pub part: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipSpawnPoint {
    pub name: String,
    pub placement: Placement,
    pub spawn_type: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipSemaphore {
    pub name: String,
    pub placement: Placement,
    pub semaphore: Semaphore,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipMapPoint {
    pub name: String,
    pub position: [f32; 3],
    pub point: MapPoint,
    pub neighbors: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipTriggerPoint {
    pub name: String,
    pub position: [f32; 3],
    pub point: TriggerPoint,
    pub neighbors: Vec<usize>,
}

/// A parsed prefab file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipPrefab {
    pub name: String,
    pub nodes: Vec<PipNode>,
    pub curves: Vec<PipCurve>,
    pub signs: Vec<PipSign>,
    pub spawn_points: Vec<PipSpawnPoint>,
    pub semaphores: Vec<PipSemaphore>,
    pub map_points: Vec<PipMapPoint>,
    pub trigger_points: Vec<PipTriggerPoint>,
    pub intersections: Vec<Intersection>,
}

fn check_links(path: &str, what: &str, links: &[usize], width: usize, count: usize) -> Result<()> {
    if links.len() > width {
        return Err(Error::inconsistent(
            path,
            format!("{} {what} link(s), the format holds {width}", links.len()),
        ));
    }
    if let Some(bad) = links.iter().find(|&&l| l >= count) {
        return Err(Error::inconsistent(path, format!("{what} link {bad} out of range ({count} present)")));
    }
    Ok(())
}

impl PipPrefab {
    /// Check every index reference and list width.
    ///
    /// # Errors
    /// [`Error::Inconsistent`] naming the first bad record.
    pub fn validate(&self) -> Result<()> {
        let curves = self.curves.len();
        for (i, curve) in self.curves.iter().enumerate() {
            let path = format!("Curve:{i}");
            check_links(&path, "next", &curve.next, CURVE_LINKS, curves)?;
            check_links(&path, "prev", &curve.prev, CURVE_LINKS, curves)?;
        }
        let maps = self.map_points.len();
        for (i, point) in self.map_points.iter().enumerate() {
            check_links(&format!("MapPoint:{i}"), "neighbor", &point.neighbors, MAP_NEIGHBORS, maps)?;
        }
        let triggers = self.trigger_points.len();
        for (i, point) in self.trigger_points.iter().enumerate() {
            check_links(&format!("TriggerPoint:{i}"), "neighbor", &point.neighbors, TRIGGER_NEIGHBORS, triggers)?;
        }
        if let Some(bad) = self.intersections.iter().find(|x| x.curve >= curves) {
            return Err(Error::inconsistent(
                "Intersection",
                format!("curve {} out of range ({curves} present)", bad.curve),
            ));
        }
        Ok(())
    }
}

fn padded(links: &[usize], width: usize) -> Value {
    let mut row: Vec<i64> = links.iter().map(|&l| l as i64).collect();
    row.resize(width, -1);
    Value::ints(&row)
}

fn unpadded(section: &Section, key: &str) -> Result<Vec<usize>> {
    section
        .opt_ints(key)
        .into_iter()
        .filter(|&l| l >= 0)
        .map(|l| usize::try_from(l).map_err(|_| Error::inconsistent(&section.type_name, format!("bad {key} entry"))))
        .collect()
}

fn fixed_ints<const N: usize>(section: &Section, key: &str) -> [i64; N] {
    let mut out = [-1; N];
    for (slot, v) in out.iter_mut().zip(section.opt_ints(key)) {
        *slot = v;
    }
    out
}

fn read_u32(section: &Section, key: &str) -> u32 {
    u32::try_from(section.opt_int(key, 0)).unwrap_or_default()
}

fn read_curve_end(section: &Section, prefix: &str) -> Result<CurveEnd> {
    Ok(CurveEnd {
        placement: Placement {
            position: section.req_floats::<3>(&format!("{prefix}Position"))?,
            rotation: section.req_floats::<4>(&format!("{prefix}Rotation"))?,
        },
        boundary: Boundary::from_code(section.opt_int(&format!("{prefix}Boundary"), 0)),
        lane: section.opt_int(&format!("{prefix}Lane"), -1),
        node: section.opt_int(&format!("{prefix}Node"), -1),
    })
}

fn write_curve_end(section: &mut Section, prefix: &str, end: &CurveEnd) {
    section.push_prop(&format!("{prefix}Position"), Value::hex(&end.placement.position));
    section.push_prop(&format!("{prefix}Rotation"), Value::hex(&end.placement.rotation));
    section.push_prop(&format!("{prefix}Boundary"), Value::Int(end.boundary.code()));
    section.push_prop(&format!("{prefix}Lane"), Value::Int(end.lane));
    section.push_prop(&format!("{prefix}Node"), Value::Int(end.node));
}

fn read_curve(section: &Section) -> Result<PipCurve> {
    let mut curve = PipCurve {
        name: section.opt_str("Name").unwrap_or_default().to_string(),
        start: read_curve_end(section, "Start")?,
        end: read_curve_end(section, "End")?,
        speed_limit: Some(section.opt_float("SpeedLimit", -1.0)).filter(|&s| s >= 0.0),
        traffic_semaphore: section.opt_int("SemaphoreID", -1),
        traffic_rule: section.opt_str("TrafficRule").unwrap_or_default().to_string(),
        length: section.req_float("Length")?,
        next: unpadded(section, "NextCurves")?,
        prev: unpadded(section, "PrevCurves")?,
        leads_to_nodes: read_u32(section, "LeadsToNodes"),
        ..PipCurve::default()
    };
    curve.apply_flags(read_u32(section, "Flags"));
    for (key, list) in [("NextCount", &curve.next), ("PrevCount", &curve.prev)] {
        if section.opt_int(key, list.len() as i64) != list.len() as i64 {
            return Err(Error::inconsistent("Curve", format!("{key} differs from its list")));
        }
    }
    Ok(curve)
}

fn write_curve(index: usize, curve: &PipCurve, leads_to: u32) -> Section {
    let mut section = Section::new("Curve")
        .with("Index", Value::Int(index as i64))
        .with("Name", Value::string(&curve.name))
        .with("Flags", Value::Int(i64::from(curve.flags())))
        .with("LeadsToNodes", Value::Int(i64::from(leads_to)));
    write_curve_end(&mut section, "Start", &curve.start);
    write_curve_end(&mut section, "End", &curve.end);
    section.push_prop("Length", Value::hex_scalar(curve.length));
    section.push_prop("NextCurves", padded(&curve.next, CURVE_LINKS));
    section.push_prop("PrevCurves", padded(&curve.prev, CURVE_LINKS));
    section.push_prop("NextCount", Value::Int(curve.next.len() as i64));
    section.push_prop("PrevCount", Value::Int(curve.prev.len() as i64));
    section.push_prop("SemaphoreID", Value::Int(curve.traffic_semaphore));
    section.push_prop("TrafficRule", Value::string(&curve.traffic_rule));
    section.push_prop("SpeedLimit", Value::hex_scalar(curve.speed_limit.unwrap_or(-1.0)));
    section
}

fn read_map_point(section: &Section) -> Result<PipMapPoint> {
    Ok(PipMapPoint {
        name: section.opt_str("Name").unwrap_or_default().to_string(),
        position: section.req_floats::<3>("Position")?,
        point: MapPoint {
            road_size: read_u32(section, "RoadSize"),
            road_offset: read_u32(section, "RoadOffset"),
            custom_color: read_u32(section, "CustomColor"),
            exit: section.opt_int("Exit", 0) != 0,
            assigned_node: section.opt_int("AssignedNode", -1),
            visual_only: section.opt_int("VisualOnly", 0) != 0,
        },
        neighbors: unpadded(section, "Neighbours")?,
    })
}

fn write_map_point(point: &PipMapPoint) -> Section {
    let map = &point.point;
    Section::new("MapPoint")
        .with("Name", Value::string(&point.name))
        .with("Position", Value::hex(&point.position))
        .with("RoadSize", Value::Int(i64::from(map.road_size)))
        .with("RoadOffset", Value::Int(i64::from(map.road_offset)))
        .with("CustomColor", Value::Int(i64::from(map.custom_color)))
        .with("Exit", Value::Int(i64::from(map.exit)))
        .with("AssignedNode", Value::Int(map.assigned_node))
        .with("VisualOnly", Value::Int(i64::from(map.visual_only)))
        .with("NeighbourCount", Value::Int(point.neighbors.len() as i64))
        .with("Neighbours", padded(&point.neighbors, MAP_NEIGHBORS))
}

fn read_trigger_point(section: &Section) -> Result<PipTriggerPoint> {
    let flags = read_u32(section, "Flags");
    Ok(PipTriggerPoint {
        name: section.opt_str("Name").unwrap_or_default().to_string(),
        position: section.req_floats::<3>("Position")?,
        point: TriggerPoint {
            trigger_id: section.opt_int("TriggerID", -1),
            action: section.opt_str("Action").unwrap_or_default().to_string(),
            range: section.opt_float("Range", 1.0),
            reset_delay: section.opt_float("ResetDelay", 0.0),
            sphere: flags & trigger_flags::SPHERE != 0,
            partial: flags & trigger_flags::PARTIAL != 0,
            one_time: flags & trigger_flags::ONE_TIME != 0,
            manual: flags & trigger_flags::MANUAL != 0,
        },
        neighbors: unpadded(section, "Neighbours")?,
    })
}

fn write_trigger_point(point: &PipTriggerPoint) -> Section {
    let trigger = &point.point;
    let flags = [
        (trigger.sphere, trigger_flags::SPHERE),
        (trigger.partial, trigger_flags::PARTIAL),
        (trigger.one_time, trigger_flags::ONE_TIME),
        (trigger.manual, trigger_flags::MANUAL),
    ]
    .into_iter()
    .filter(|&(on, _)| on)
    .fold(0, |acc, (_, bit)| acc | bit);
    Section::new("TriggerPoint")
        .with("Name", Value::string(&point.name))
        .with("TriggerID", Value::Int(trigger.trigger_id))
        .with("Action", Value::string(&trigger.action))
        .with("Range", Value::hex_scalar(trigger.range))
        .with("ResetDelay", Value::hex_scalar(trigger.reset_delay))
        .with("Flags", Value::Int(i64::from(flags)))
        .with("Position", Value::hex(&point.position))
        .with("NeighbourCount", Value::Int(point.neighbors.len() as i64))
        .with("Neighbours", padded(&point.neighbors, TRIGGER_NEIGHBORS))
}

fn read_semaphore(section: &Section) -> Result<PipSemaphore> {
    Ok(PipSemaphore {
        name: section.opt_str("Name").unwrap_or_default().to_string(),
        placement: Placement::read(section)?,
        semaphore: Semaphore {
            semaphore_type: read_u32(section, "Type"),
            semaphore_id: section.opt_int("SemaphoreID", -1),
            intervals: section.req_floats::<4>("Intervals")?,
            cycle_delay: section.opt_float("Cycle", 0.0),
            profile: section.opt_str("Profile").unwrap_or_default().to_string(),
        },
    })
}

fn write_semaphore(semaphore: &PipSemaphore) -> Section {
    let data = &semaphore.semaphore;
    let mut section = Section::new("Semaphore").with("Name", Value::string(&semaphore.name));
    semaphore.placement.write(&mut section);
    section
        .with("Type", Value::Int(i64::from(data.semaphore_type)))
        .with("SemaphoreID", Value::Int(data.semaphore_id))
        .with("Intervals", Value::hex(&data.intervals))
        .with("Cycle", Value::hex_scalar(data.cycle_delay))
        .with("Profile", Value::string(&data.profile))
}

/// Read a prefab file.
///
/// # Errors
/// Grammar errors, [`Error::SchemaMismatch`], [`Error::Inconsistent`].
pub fn read_pip<P: AsRef<Path>>(path: P, recount: bool) -> Result<(PipPrefab, Vec<Diagnostic>)> {
    let path = path.as_ref();
    tracing::info!("Reading prefab {}", path.display());
    let mut file = PixFile::read(path)?;
    parse_pip(&mut file, recount).map_err(|e| e.in_file(path))
}

/// Decode a parsed prefab file.
///
/// # Errors
/// See [`read_pip`].
pub fn parse_pip(file: &mut PixFile, recount: bool) -> Result<(PipPrefab, Vec<Diagnostic>)> {
    let header = Header::read(file, FileKind::Prefab, &[FORMAT_VERSION])?;
    let diagnostics = validate_globals(file, FileKind::Prefab, recount)?;

    let nodes = file
        .sections_named("Node")
        .map(|s| {
            Ok(PipNode {
                index: s.req_int("Index")?,
                placement: Placement::read(s)?,
                input_lanes: fixed_ints(s, "InputLanes"),
                output_lanes: fixed_ints(s, "OutputLanes"),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let curves = file.sections_named("Curve").map(read_curve).collect::<Result<Vec<_>>>()?;
    let signs = file
        .sections_named("Sign")
        .map(|s| {
            Ok(PipSign {
                name: s.opt_str("Name").unwrap_or_default().to_string(),
                placement: Placement::read(s)?,
                model: s.opt_str("Model").unwrap_or_default().to_string(),
                part: s.opt_str("Part").unwrap_or_default().to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let spawn_points = file
        .sections_named("SpawnPoint")
        .map(|s| {
            Ok(PipSpawnPoint {
                name: s.opt_str("Name").unwrap_or_default().to_string(),
                placement: Placement::read(s)?,
                spawn_type: read_u32(s, "Type"),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let semaphores = file.sections_named("Semaphore").map(read_semaphore).collect::<Result<Vec<_>>>()?;
    let map_points = file.sections_named("MapPoint").map(read_map_point).collect::<Result<Vec<_>>>()?;
    let trigger_points = file
        .sections_named("TriggerPoint")
        .map(read_trigger_point)
        .collect::<Result<Vec<_>>>()?;
    let intersections = file
        .sections_named("Intersection")
        .map(|s| {
            let flags = read_u32(s, "Flags");
            Intersection::from_flags(
                s.req_usize("CurveIndex")?,
                s.req_float("Position")?,
                s.req_float("Radius")?,
                flags,
            )
            .ok_or_else(|| Error::inconsistent("Intersection", format!("unknown intersection kind in flags {flags:#x}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let prefab = PipPrefab {
        name: header.name,
        nodes,
        curves,
        signs,
        spawn_points,
        semaphores,
        map_points,
        trigger_points,
        intersections,
    };
    prefab.validate()?;
    tracing::debug!(
        "Prefab '{}': {} node(s), {} curve(s), {} map point(s), {} trigger point(s)",
        prefab.name,
        prefab.nodes.len(),
        prefab.curves.len(),
        prefab.map_points.len(),
        prefab.trigger_points.len()
    );
    Ok((prefab, diagnostics))
}

/// Encode a prefab. Lane tables and `LeadsToNodes` are filled as
/// `settings` asks.
///
/// # Errors
/// [`Error::Inconsistent`] for bad references or overfull link lists,
/// [`Error::BoundaryOutOfRange`] from the lane tables.
pub fn to_pix(prefab: &PipPrefab, settings: &PrefabSettings) -> Result<PixFile> {
    prefab.validate()?;
    let tables = lane_tables(prefab, settings.lane_tables)?;
    let leads_to = leads_to_nodes(prefab, settings.leads_to_nodes);

    let mut file = PixFile::new();
    file.push(Header::new(FileKind::Prefab, FORMAT_VERSION, &prefab.name).to_section());

    let mut body = PixFile::new();
    for (node, (input, output)) in prefab.nodes.iter().zip(&tables) {
        let mut section = Section::new("Node").with("Index", Value::Int(node.index));
        node.placement.write(&mut section);
        section.push_prop("InputLanes", Value::ints(input));
        section.push_prop("OutputLanes", Value::ints(output));
        body.push(section);
    }
    for (index, (curve, mask)) in prefab.curves.iter().zip(&leads_to).enumerate() {
        body.push(write_curve(index, curve, *mask));
    }
    for sign in &prefab.signs {
        let mut section = Section::new("Sign").with("Name", Value::string(&sign.name));
        sign.placement.write(&mut section);
        body.push(
            section
                .with("Model", Value::string(&sign.model))
                .with("Part", Value::string(&sign.part)),
        );
    }
    for spawn in &prefab.spawn_points {
        let mut section = Section::new("SpawnPoint").with("Name", Value::string(&spawn.name));
        spawn.placement.write(&mut section);
        body.push(section.with("Type", Value::Int(i64::from(spawn.spawn_type))));
    }
    for semaphore in &prefab.semaphores {
        body.push(write_semaphore(semaphore));
    }
    for point in &prefab.map_points {
        body.push(write_map_point(point));
    }
    for point in &prefab.trigger_points {
        body.push(write_trigger_point(point));
    }
    for intersection in &prefab.intersections {
        body.push(
            Section::new("Intersection")
                .with("CurveIndex", Value::Int(intersection.curve as i64))
                .with("Position", Value::hex_scalar(intersection.param))
                .with("Radius", Value::hex_scalar(intersection.radius))
                .with("Flags", Value::Int(i64::from(intersection.flags()))),
        );
    }

    file.push(global_section(&body, FileKind::Prefab, Vec::new()));
    file.items.extend(body.items);
    Ok(file)
}

/// Write a prefab file.
///
/// # Errors
/// See [`to_pix`]; IO errors.
pub fn write_pip<P: AsRef<Path>>(prefab: &PipPrefab, settings: &PrefabSettings, path: P, options: &WriteOptions) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Writing prefab {}", path.display());
    to_pix(prefab, settings)?.write(path, options)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{LaneTableMode, LeadsToMode};
    use crate::prefab::IntersectionKind;
    use pretty_assertions::assert_eq;

    fn at(x: f32, z: f32) -> Placement {
        Placement {
            position: [x, 0.0, z],
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Two chained curves from an input boundary at node 0 to an output
    /// boundary at node 1.
    pub(crate) fn chain() -> PipPrefab {
        PipPrefab {
            name: "crossing".into(),
            nodes: vec![
                PipNode {
                    index: 0,
                    placement: at(0.0, 0.0),
                    ..PipNode::default()
                },
                PipNode {
                    index: 1,
                    placement: at(0.0, -20.0),
                    ..PipNode::default()
                },
            ],
            curves: vec![
                PipCurve {
                    name: "in".into(),
                    start: CurveEnd {
                        placement: at(0.0, 0.0),
                        boundary: Boundary::Input,
                        lane: 0,
                        node: 0,
                    },
                    end: CurveEnd {
                        placement: at(0.0, -10.0),
                        ..CurveEnd::default()
                    },
                    priority: 3,
                    blinker: crate::prefab::blinker::RIGHT,
                    length: 10.0,
                    next: vec![1],
                    ..PipCurve::default()
                },
                PipCurve {
                    name: "out".into(),
                    start: CurveEnd {
                        placement: at(0.0, -10.0),
                        ..CurveEnd::default()
                    },
                    end: CurveEnd {
                        placement: at(0.0, -20.0),
                        boundary: Boundary::Output,
                        lane: 0,
                        node: 1,
                    },
                    speed_limit: Some(50.0),
                    length: 10.0,
                    prev: vec![0],
                    ..PipCurve::default()
                },
            ],
            map_points: vec![
                PipMapPoint {
                    name: "m0".into(),
                    position: [0.0; 3],
                    point: MapPoint {
                        assigned_node: 0,
                        ..MapPoint::default()
                    },
                    neighbors: vec![1],
                },
                PipMapPoint {
                    name: "m1".into(),
                    position: [0.0, 0.0, -20.0],
                    point: MapPoint::default(),
                    neighbors: vec![0],
                },
            ],
            intersections: Vec::new(),
            ..PipPrefab::default()
        }
    }

    fn reparse(file: &PixFile) -> PipPrefab {
        let text = file.to_pix_string(&WriteOptions::default());
        let mut reparsed = PixFile::parse(&text).unwrap();
        parse_pip(&mut reparsed, false).unwrap().0
    }

    #[test]
    fn test_roundtrip_with_computed_tables() {
        let mut prefab = chain();
        prefab.signs.push(PipSign {
            name: "stop".into(),
            placement: at(2.0, -1.0),
            model: "sign.stop".into(),
            part: "default".into(),
        });
        prefab.trigger_points.push(PipTriggerPoint {
            name: "gate".into(),
            point: TriggerPoint {
                action: "hud_parking".into(),
                sphere: true,
                one_time: true,
                ..TriggerPoint::default()
            },
            ..PipTriggerPoint::default()
        });
        let settings = PrefabSettings {
            leads_to_nodes: LeadsToMode::Computed,
            ..PrefabSettings::default()
        };
        let file = to_pix(&prefab, &settings).unwrap();
        let back = reparse(&file);

        assert_eq!(back.nodes[0].input_lanes[0], 0);
        assert_eq!(back.nodes[1].output_lanes[0], 1);
        assert_eq!(back.curves[0].leads_to_nodes, 0b10);
        assert_eq!(back.curves[0].priority, 3);
        assert_eq!(back.curves[1].speed_limit, Some(50.0));
        assert_eq!(back.curves[0].next, vec![1]);
        assert_eq!(back.signs, prefab.signs);
        assert_eq!(back.map_points, prefab.map_points);
        assert_eq!(back.trigger_points, prefab.trigger_points);
    }

    #[test]
    fn test_links_padded_to_four() {
        let file = to_pix(&chain(), &PrefabSettings::default()).unwrap();
        let curve = file.section("Curve").unwrap();
        assert_eq!(curve.prop("NextCurves").and_then(Value::as_ints), Some(&[1, -1, -1, -1][..]));
        assert_eq!(curve.req_int("LeadsToNodes").unwrap(), 0);
    }

    #[test]
    fn test_legacy_tables() {
        let settings = PrefabSettings {
            lane_tables: LaneTableMode::Legacy,
            ..PrefabSettings::default()
        };
        let back = reparse(&to_pix(&chain(), &settings).unwrap());
        assert_eq!(back.nodes[0].input_lanes, [-1; LANE_COUNT]);
        // Curve boundaries survive for the next export
        assert_eq!(back.curves[0].start.boundary, Boundary::Input);
    }

    #[test]
    fn test_too_many_links() {
        let mut prefab = chain();
        prefab.curves[0].next = vec![1; 5];
        assert!(matches!(to_pix(&prefab, &PrefabSettings::default()), Err(Error::Inconsistent { .. })));
    }

    #[test]
    fn test_intersection_flags() {
        let mut prefab = chain();
        prefab.intersections.push(Intersection {
            curve: 1,
            param: 0.5,
            radius: 4.5,
            kind: IntersectionKind::Cross,
            siblings: 1,
        });
        let file = to_pix(&prefab, &PrefabSettings::default()).unwrap();
        assert_eq!(file.section("Intersection").unwrap().req_int("Flags").unwrap(), 0x14);
        assert_eq!(reparse(&file).intersections, prefab.intersections);
    }
}
