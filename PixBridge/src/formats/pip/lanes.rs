//! Control-node lane tables and `LeadsToNodes` masks

use std::collections::VecDeque;

use super::{LANE_COUNT, PipPrefab};
use crate::config::{LaneTableMode, LeadsToMode};
use crate::error::{Error, Result};
use crate::prefab::Boundary;

/// Input and output lane table of one control node.
pub type LaneTable = ([i64; LANE_COUNT], [i64; LANE_COUNT]);

fn node_slot(prefab: &PipPrefab, curve: usize, node: i64) -> Result<usize> {
    prefab
        .nodes
        .iter()
        .position(|n| n.index == node)
        .ok_or(Error::BoundaryOutOfRange {
            curve,
            node,
            node_count: prefab.nodes.len(),
        })
}

fn lane_slot(curve: usize, lane: i64) -> Result<usize> {
    usize::try_from(lane)
        .ok()
        .filter(|&l| l < LANE_COUNT)
        .ok_or_else(|| Error::inconsistent(&format!("Curve:{curve}"), format!("boundary lane {lane} outside 0..{LANE_COUNT}")))
}

/// Lane tables per node, in node order.
///
/// In [`LaneTableMode::Computed`] every input-boundary curve start and
/// output-boundary curve end claims its lane at its node.
///
/// # Errors
/// [`Error::BoundaryOutOfRange`] when a curve names a node that does not
/// exist; [`Error::Inconsistent`] for a bad lane or two curves on one lane.
pub fn lane_tables(prefab: &PipPrefab, mode: LaneTableMode) -> Result<Vec<LaneTable>> {
    let mut tables = vec![([-1; LANE_COUNT], [-1; LANE_COUNT]); prefab.nodes.len()];
    if mode == LaneTableMode::Legacy {
        return Ok(tables);
    }
    for (index, curve) in prefab.curves.iter().enumerate() {
        let claims = [
            (curve.start.boundary == Boundary::Input, &curve.start, true),
            (curve.end.boundary == Boundary::Output, &curve.end, false),
        ];
        for (claimed, end, input) in claims {
            if !claimed {
                continue;
            }
            let node = node_slot(prefab, index, end.node)?;
            let lane = lane_slot(index, end.lane)?;
            let table = if input { &mut tables[node].0 } else { &mut tables[node].1 };
            if table[lane] >= 0 && table[lane] != index as i64 {
                return Err(Error::inconsistent(
                    &format!("Node:{}", end.node),
                    format!("lane {lane} claimed by curves {} and {index}", table[lane]),
                ));
            }
            table[lane] = index as i64;
        }
    }
    Ok(tables)
}

/// `LeadsToNodes` per curve.
///
/// In [`LeadsToMode::Computed`] bit `n` is set when following `next`
/// links from the curve reaches an output boundary at control node `n`.
#[must_use]
pub fn leads_to_nodes(prefab: &PipPrefab, mode: LeadsToMode) -> Vec<u32> {
    if mode == LeadsToMode::Zero {
        return vec![0; prefab.curves.len()];
    }
    (0..prefab.curves.len())
        .map(|start| {
            let mut mask = 0u32;
            let mut seen = vec![false; prefab.curves.len()];
            let mut queue = VecDeque::from([start]);
            seen[start] = true;
            while let Some(index) = queue.pop_front() {
                let curve = &prefab.curves[index];
                if curve.end.boundary == Boundary::Output && (0..32).contains(&curve.end.node) {
                    mask |= 1u32 << curve.end.node;
                }
                for &next in &curve.next {
                    if next < seen.len() && !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            mask
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::tests::chain;
    use super::*;

    #[test]
    fn test_computed_lanes() {
        let prefab = chain();
        let tables = lane_tables(&prefab, LaneTableMode::Computed).unwrap();
        assert_eq!(tables[0].0[0], 0);
        assert_eq!(tables[1].1[0], 1);
        assert_eq!(tables[0].1, [-1; LANE_COUNT]);
    }

    #[test]
    fn test_legacy_lanes() {
        let tables = lane_tables(&chain(), LaneTableMode::Legacy).unwrap();
        assert!(tables.iter().all(|(i, o)| i.iter().chain(o).all(|&v| v == -1)));
    }

    #[test]
    fn test_boundary_out_of_range() {
        let mut prefab = chain();
        prefab.curves[0].start.node = 5;
        assert!(matches!(
            lane_tables(&prefab, LaneTableMode::Computed),
            Err(Error::BoundaryOutOfRange { curve: 0, node: 5, node_count: 2 })
        ));
        assert!(lane_tables(&prefab, LaneTableMode::Legacy).is_ok());
    }

    #[test]
    fn test_leads_to() {
        let prefab = chain();
        assert_eq!(leads_to_nodes(&prefab, LeadsToMode::Zero), vec![0, 0]);
        assert_eq!(leads_to_nodes(&prefab, LeadsToMode::Computed), vec![0b10, 0b10]);
    }
}
