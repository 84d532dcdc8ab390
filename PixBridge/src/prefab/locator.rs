//! Prefab locator types and their payloads

/// Locator category, which decides how (and whether) it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorCategory {
    ControlNode,
    NavigationPoint,
    Sign,
    SpawnPoint,
    Semaphore,
    MapPoint,
    TriggerPoint,
}

/// Edge shape for a connectable category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Separate incoming/outgoing lists, each with its own limit.
    Directed { incoming: usize, outgoing: usize },
    /// One neighbor list.
    Undirected { neighbors: usize },
}

impl LocatorCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LocatorCategory::ControlNode => "Control Node",
            LocatorCategory::NavigationPoint => "Navigation Point",
            LocatorCategory::Sign => "Sign",
            LocatorCategory::SpawnPoint => "Spawn Point",
            LocatorCategory::Semaphore => "Traffic Semaphore",
            LocatorCategory::MapPoint => "Map Point",
            LocatorCategory::TriggerPoint => "Trigger Point",
        }
    }

    /// Slot limits, or `None` for categories that never connect.
    #[must_use]
    pub fn connectivity(self) -> Option<Connectivity> {
        match self {
            LocatorCategory::NavigationPoint => Some(Connectivity::Directed {
                incoming: 6,
                outgoing: 6,
            }),
            LocatorCategory::MapPoint => Some(Connectivity::Undirected { neighbors: 6 }),
            LocatorCategory::TriggerPoint => Some(Connectivity::Undirected { neighbors: 2 }),
            _ => None,
        }
    }
}

/// Lane boundary role of a navigation point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Boundary {
    #[default]
    None,
    /// Traffic enters the prefab here.
    Input,
    /// Traffic leaves the prefab here.
    Output,
}

impl Boundary {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Boundary::None => 0,
            Boundary::Input => 1,
            Boundary::Output => 2,
        }
    }

    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Boundary::Input,
            2 => Boundary::Output,
            _ => Boundary::None,
        }
    }
}

/// Blinker bits on a navigation curve.
pub mod blinker {
    pub const NONE: u32 = 0;
    pub const RIGHT: u32 = 0x1;
    pub const LEFT: u32 = 0x2;
    pub const FORCE: u32 = 0x4;
}

/// Allowed vehicle classes.
pub mod vehicles {
    pub const ALL: u32 = 0;
    pub const SMALL: u32 = 1;
    pub const LARGE: u32 = 2;
    pub const NO_LARGE: u32 = 3;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationPoint {
    pub blinker: u32,
    pub allowed_vehicles: u32,
    /// Right-of-way priority, 0..=15.
    pub priority: u32,
    /// Speed limit in km/h, `None` for the road default.
    pub speed_limit: Option<f32>,
    /// Semaphore id controlling this lane, -1 for none.
    pub traffic_semaphore: i64,
    pub boundary: Boundary,
    /// Lane index at the boundary node, 0..8.
    pub boundary_lane: i64,
    /// Control node index at the boundary.
    pub boundary_node: i64,
    pub traffic_rule: String,
    pub low_probability: bool,
}

impl Default for NavigationPoint {
    fn default() -> Self {
        Self {
            blinker: blinker::NONE,
            allowed_vehicles: vehicles::ALL,
            priority: 0,
            speed_limit: None,
            traffic_semaphore: -1,
            boundary: Boundary::None,
            boundary_lane: -1,
            boundary_node: -1,
            traffic_rule: String::new(),
            low_probability: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapPoint {
    /// Road width class, 0..=7.
    pub road_size: u32,
    /// Road offset class, 0..=7.
    pub road_offset: u32,
    /// Custom color index, 0 for none.
    pub custom_color: u32,
    pub exit: bool,
    /// Control node index this point is tied to, -1 for none.
    pub assigned_node: i64,
    pub visual_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerPoint {
    pub trigger_id: i64,
    pub action: String,
    pub range: f32,
    pub reset_delay: f32,
    pub sphere: bool,
    pub partial: bool,
    pub one_time: bool,
    pub manual: bool,
}

impl Default for TriggerPoint {
    fn default() -> Self {
        Self {
            trigger_id: -1,
            action: String::new(),
            range: 1.0,
            reset_delay: 0.0,
            sphere: false,
            partial: false,
            one_time: false,
            manual: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Semaphore {
    pub semaphore_type: u32,
    pub semaphore_id: i64,
    /// Green, orange, red, orange durations in seconds.
    pub intervals: [f32; 4],
    pub cycle_delay: f32,
    pub profile: String,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self {
            semaphore_type: 0,
            semaphore_id: -1,
            intervals: [20.0, 5.0, 20.0, 5.0],
            cycle_delay: 0.0,
            profile: String::new(),
        }
    }
}

/// Payload of a prefab locator.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefabLocator {
    ControlNode { index: i64 },
    NavigationPoint(NavigationPoint),
    Sign { model: String, part: String },
    SpawnPoint { spawn_type: u32 },
    Semaphore(Semaphore),
    MapPoint(MapPoint),
    TriggerPoint(TriggerPoint),
}

impl PrefabLocator {
    #[must_use]
    pub fn category(&self) -> LocatorCategory {
        match self {
            PrefabLocator::ControlNode { .. } => LocatorCategory::ControlNode,
            PrefabLocator::NavigationPoint(_) => LocatorCategory::NavigationPoint,
            PrefabLocator::Sign { .. } => LocatorCategory::Sign,
            PrefabLocator::SpawnPoint { .. } => LocatorCategory::SpawnPoint,
            PrefabLocator::Semaphore(_) => LocatorCategory::Semaphore,
            PrefabLocator::MapPoint(_) => LocatorCategory::MapPoint,
            PrefabLocator::TriggerPoint(_) => LocatorCategory::TriggerPoint,
        }
    }

    pub fn as_nav(&self) -> Option<&NavigationPoint> {
        match self {
            PrefabLocator::NavigationPoint(nav) => Some(nav),
            _ => None,
        }
    }

    /// Attribute bytes that feed the change-detection hash. Only the
    /// fields that alter edge geometry or edge rendering take part.
    pub(crate) fn hash_attributes(&self, out: &mut Vec<u8>) {
        out.push(self.category() as u8);
        match self {
            PrefabLocator::NavigationPoint(nav) => {
                out.extend_from_slice(&nav.blinker.to_le_bytes());
                out.extend_from_slice(&nav.allowed_vehicles.to_le_bytes());
                out.extend_from_slice(&nav.priority.to_le_bytes());
            }
            PrefabLocator::MapPoint(map) => {
                out.extend_from_slice(&map.custom_color.to_le_bytes());
                out.push(u8::from(map.exit));
            }
            PrefabLocator::TriggerPoint(trigger) => {
                out.extend_from_slice(&trigger.range.to_le_bytes());
            }
            _ => {}
        }
    }
}
