//! pathfinding.rs - A* over the stitched waypoint graph.
//!
//! Stateless per query: each call is a fresh search over an immutable
//! network borrow, so batches of queries for many vehicles can run in
//! parallel as long as no edit is in flight.
//!
//! Open-set policy: duplicate heap entries are allowed; a popped entry that
//! is already closed or worse than the recorded best g is skipped. With a
//! consistent heuristic (every edge cost is at least the straight-line
//! distance it covers, and here it is exactly that) this terminates with
//! the optimal path. Ties on f prefer lower h, then lower id, which keeps
//! results deterministic and biased toward the goal.

use crate::helpers::positions::CellCoord;
use crate::roads::road_subsystem::RoadNetwork;
use crate::roads::road_structs::{WaypointId, WaypointRole};
use glam::Vec3;
use log::warn;
use ordered_float::OrderedFloat;
use rand::Rng;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use thiserror::Error;

/// Safety cap on node expansions. A query that exhausts it is treated as
/// no-path rather than stalling the caller on a pathological grid.
pub const MAX_EXPANSIONS: usize = 100_000;

/// Invalid query input. No-path is NOT an error - it comes back as
/// `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("waypoint {0:?} does not exist")]
    UnknownWaypoint(WaypointId),
    #[error("cell ({}, {}) is outside the grid", .0.x, .0.z)]
    CellOutOfBounds(CellCoord),
    #[error("cell ({}, {}) has no waypoints", .0.x, .0.z)]
    EmptyCell(CellCoord),
}

/// An ordered waypoint sequence from start to goal inclusive, plus its
/// total edge cost. Recomputed per request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub waypoints: Vec<WaypointId>,
    pub cost: f32,
}

impl Path {
    #[inline]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// World positions along the path, for handing to a motion controller.
    pub fn positions(&self, network: &RoadNetwork) -> Vec<Vec3> {
        network.path_positions(&self.waypoints)
    }
}

/// One start/goal pair for the batch API.
#[derive(Debug, Clone, Copy)]
pub struct PathQuery {
    pub start: WaypointId,
    pub goal: WaypointId,
}

/// Minimum-cost directed path between two waypoints, or `Ok(None)` when the
/// goal is unreachable. `start == goal` yields the single-element path.
pub fn find_path(
    network: &RoadNetwork,
    start: WaypointId,
    goal: WaypointId,
) -> Result<Option<Path>, QueryError> {
    network
        .waypoint(start)
        .ok_or(QueryError::UnknownWaypoint(start))?;
    let goal_pos = network
        .waypoint(goal)
        .ok_or(QueryError::UnknownWaypoint(goal))?
        .pos;

    if start == goal {
        return Ok(Some(Path {
            waypoints: vec![start],
            cost: 0.0,
        }));
    }

    // Heap key: (f, h, id). BinaryHeap is a max-heap, hence Reverse.
    let mut open: BinaryHeap<Reverse<(OrderedFloat<f32>, OrderedFloat<f32>, WaypointId)>> =
        BinaryHeap::new();
    let mut best_g: HashMap<WaypointId, f32> = HashMap::new();
    let mut parent: HashMap<WaypointId, WaypointId> = HashMap::new();
    let mut closed: HashSet<WaypointId> = HashSet::new();

    let h = |id: WaypointId| -> f32 {
        network
            .waypoint(id)
            .map(|wp| wp.pos.distance(goal_pos))
            .unwrap_or(f32::INFINITY)
    };

    best_g.insert(start, 0.0);
    let h0 = h(start);
    open.push(Reverse((OrderedFloat(h0), OrderedFloat(h0), start)));

    let mut expansions = 0usize;

    while let Some(Reverse((_, _, current))) = open.pop() {
        if !closed.insert(current) {
            continue; // stale duplicate entry
        }
        if current == goal {
            return Ok(Some(reconstruct(&parent, &best_g, start, goal)));
        }

        expansions += 1;
        if expansions > MAX_EXPANSIONS {
            warn!(
                "path query {start:?} -> {goal:?} exceeded {MAX_EXPANSIONS} expansions, \
                 treating as unreachable"
            );
            return Ok(None);
        }

        let g = best_g[&current];
        for conn in network.outgoing(current) {
            if closed.contains(&conn.target) {
                continue;
            }
            let tentative = g + conn.cost;
            let improved = best_g
                .get(&conn.target)
                .map(|&known| tentative < known)
                .unwrap_or(true);
            if improved {
                best_g.insert(conn.target, tentative);
                parent.insert(conn.target, current);
                let hh = h(conn.target);
                open.push(Reverse((
                    OrderedFloat(tentative + hh),
                    OrderedFloat(hh),
                    conn.target,
                )));
            }
        }
    }

    Ok(None)
}

fn reconstruct(
    parent: &HashMap<WaypointId, WaypointId>,
    best_g: &HashMap<WaypointId, f32>,
    start: WaypointId,
    goal: WaypointId,
) -> Path {
    let mut waypoints = vec![goal];
    let mut current = goal;
    while current != start {
        current = parent[&current];
        waypoints.push(current);
    }
    waypoints.reverse();
    Path {
        waypoints,
        cost: best_g[&goal],
    }
}

/// Cell-to-cell convenience form. Endpoints are picked from each cell's
/// waypoints: an Entry matching the preferred lane first, then any Entry,
/// then any waypoint at all.
pub fn find_path_cells(
    network: &RoadNetwork,
    start_cell: CellCoord,
    goal_cell: CellCoord,
    preferred_lane: Option<u8>,
) -> Result<Option<Path>, QueryError> {
    let start = select_endpoint(network, start_cell, preferred_lane)?;
    let goal = select_endpoint(network, goal_cell, preferred_lane)?;
    find_path(network, start, goal)
}

fn select_endpoint(
    network: &RoadNetwork,
    cell: CellCoord,
    preferred_lane: Option<u8>,
) -> Result<WaypointId, QueryError> {
    if !network.grid().in_bounds(cell) {
        return Err(QueryError::CellOutOfBounds(cell));
    }
    let ids = network.cell_waypoints(cell);
    if ids.is_empty() {
        return Err(QueryError::EmptyCell(cell));
    }

    let entries = || {
        ids.iter().copied().filter(|id| {
            network
                .waypoint(*id)
                .map(|wp| wp.role == WaypointRole::Entry)
                .unwrap_or(false)
        })
    };

    if let Some(lane) = preferred_lane {
        let preferred = entries().find(|id| {
            network
                .waypoint(*id)
                .map(|wp| wp.lane_index == lane)
                .unwrap_or(false)
        });
        if let Some(id) = preferred {
            return Ok(id);
        }
    }
    Ok(entries().next().unwrap_or(ids[0]))
}

/// Batch form: independent read-only queries fan out across the rayon pool.
/// Only valid between edits, like any other read of the network.
pub fn find_paths_par(
    network: &RoadNetwork,
    queries: &[PathQuery],
) -> Vec<Result<Option<Path>, QueryError>> {
    queries
        .par_iter()
        .map(|q| find_path(network, q.start, q.goal))
        .collect()
}

/// Uniformly random Entry waypoint, for callers that pick destinations at
/// random. None when the network has no entries.
pub fn random_entry_waypoint(network: &RoadNetwork, rng: &mut impl Rng) -> Option<WaypointId> {
    let mut entries: Vec<WaypointId> = network.entry_waypoints().map(|(id, _)| id).collect();
    if entries.is_empty() {
        return None;
    }
    entries.sort_unstable();
    let index = rng.random_range(0..entries.len());
    Some(entries[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roads::road_structs::NetworkConfig;

    fn network_with(coords: &[(i32, i32)]) -> RoadNetwork {
        let mut network = RoadNetwork::new(NetworkConfig::default());
        for &(x, z) in coords {
            network.set_cell(CellCoord::new(x, z), true);
        }
        network
    }

    /// Hand-built triangle: A->B->C costs 1+1, the direct A->C edge costs 5.
    /// The search must take the cheaper two-hop route.
    #[test]
    fn test_a_star_prefers_cheaper_detour() {
        use crate::roads::road_structs::{Connection, Waypoint};

        let mut network = RoadNetwork::new(NetworkConfig::default());
        let cell = CellCoord::new(0, 0);
        let ids = [WaypointId::new(0), WaypointId::new(1), WaypointId::new(2)];
        let arena = network.arena_mut();
        for (i, id) in ids.iter().enumerate() {
            arena.insert_waypoint(
                *id,
                Waypoint {
                    pos: Vec3::new(i as f32, 0.0, 0.0),
                    role: WaypointRole::Entry,
                    cell,
                    lane_index: 0,
                },
            );
        }
        arena.add_edge(ids[0], Connection { target: ids[1], cost: 1.0 });
        arena.add_edge(ids[1], Connection { target: ids[2], cost: 1.0 });
        arena.add_edge(ids[0], Connection { target: ids[2], cost: 5.0 });

        let path = find_path(&network, ids[0], ids[2]).unwrap().unwrap();
        assert_eq!(path.waypoints, vec![ids[0], ids[1], ids[2]]);
        assert!((path.cost - 2.0).abs() < 1e-6);
    }

    /// 1x3 corridor scenario: the best path walks the corridor in cell
    /// order without backtracking.
    #[test]
    fn test_corridor_traversed_in_cell_order() {
        let network = network_with(&[(2, 2), (3, 2), (4, 2)]);
        let path =
            find_path_cells(&network, CellCoord::new(2, 2), CellCoord::new(4, 2), None)
                .unwrap()
                .expect("corridor must be routable");

        let cells: Vec<CellCoord> = path
            .waypoints
            .iter()
            .map(|id| network.waypoint(*id).unwrap().cell)
            .collect();

        // Traverses exactly the 3 cells, in order, never revisiting one
        // after leaving it.
        let mut seen_order: Vec<CellCoord> = Vec::new();
        for c in &cells {
            if seen_order.last() != Some(c) {
                seen_order.push(*c);
            }
        }
        assert_eq!(
            seen_order,
            vec![
                CellCoord::new(2, 2),
                CellCoord::new(3, 2),
                CellCoord::new(4, 2)
            ]
        );
        assert!(path.cost > 0.0);
    }

    #[test]
    fn test_no_path_between_disconnected_components() {
        let network = network_with(&[(1, 1), (2, 1), (5, 5), (6, 5)]);
        let result =
            find_path_cells(&network, CellCoord::new(1, 1), CellCoord::new(5, 5), None).unwrap();
        assert!(result.is_none(), "disconnected components must be Ok(None)");
    }

    #[test]
    fn test_start_equals_goal() {
        let network = network_with(&[(2, 2), (3, 2)]);
        let (id, _) = network.entry_waypoints().next().unwrap();
        let path = find_path(&network, id, id).unwrap().unwrap();
        assert_eq!(path.waypoints, vec![id]);
        assert_eq!(path.cost, 0.0);
    }

    #[test]
    fn test_unknown_waypoint_is_an_error_not_a_panic() {
        let network = network_with(&[(2, 2), (3, 2)]);
        let bogus = WaypointId::new(u32::MAX);
        let (valid, _) = network.all_waypoints().next().unwrap();
        assert_eq!(
            find_path(&network, bogus, valid),
            Err(QueryError::UnknownWaypoint(bogus))
        );
    }

    #[test]
    fn test_empty_and_out_of_bounds_cells_are_errors() {
        let network = network_with(&[(2, 2), (3, 2)]);
        assert_eq!(
            find_path_cells(&network, CellCoord::new(0, 0), CellCoord::new(2, 2), None),
            Err(QueryError::EmptyCell(CellCoord::new(0, 0)))
        );
        assert_eq!(
            find_path_cells(&network, CellCoord::new(-1, 0), CellCoord::new(2, 2), None),
            Err(QueryError::CellOutOfBounds(CellCoord::new(-1, 0)))
        );
    }

    #[test]
    fn test_one_way_respected_through_a_corner() {
        // L-shape: (2,2)-(3,2)-(3,3). Every consecutive hop in the result
        // must follow an existing directed edge.
        let network = network_with(&[(2, 2), (3, 2), (3, 3)]);
        let path =
            find_path_cells(&network, CellCoord::new(2, 2), CellCoord::new(3, 3), None)
                .unwrap()
                .expect("L corridor must be routable");

        for pair in path.waypoints.windows(2) {
            let followed_edge = network
                .outgoing(pair[0])
                .iter()
                .any(|c| c.target == pair[1]);
            assert!(followed_edge, "hop {:?} -> {:?} has no edge", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_corridor_scenario_round_trip() {
        // West dead end, straight middle, east dead end: both directions
        // must route, using different (one-way) lanes.
        let network = network_with(&[(2, 2), (3, 2), (4, 2)]);
        let there =
            find_path_cells(&network, CellCoord::new(2, 2), CellCoord::new(4, 2), None)
                .unwrap()
                .expect("eastbound");
        let back =
            find_path_cells(&network, CellCoord::new(4, 2), CellCoord::new(2, 2), None)
                .unwrap()
                .expect("westbound");
        assert_ne!(there.waypoints, back.waypoints);
    }

    #[test]
    fn test_batch_queries_match_serial() {
        let network = network_with(&[(2, 2), (3, 2), (4, 2), (4, 3)]);
        let entries: Vec<WaypointId> = network.entry_waypoints().map(|(id, _)| id).collect();
        let queries: Vec<PathQuery> = entries
            .iter()
            .flat_map(|&start| entries.iter().map(move |&goal| PathQuery { start, goal }))
            .collect();

        let parallel = find_paths_par(&network, &queries);
        for (query, result) in queries.iter().zip(parallel.iter()) {
            let serial = find_path(&network, query.start, query.goal).unwrap();
            match (serial, result) {
                (Some(a), Ok(Some(b))) => assert_eq!(a.waypoints, b.waypoints),
                (None, Ok(None)) => {}
                other => panic!("parallel/serial mismatch: {other:?}"),
            }
        }
    }

    #[test]
    fn test_random_entry_waypoint_returns_valid_entry() {
        let network = network_with(&[(2, 2), (3, 2)]);
        let mut rng = rand::rng();
        for _ in 0..16 {
            let id = random_entry_waypoint(&network, &mut rng).unwrap();
            assert_eq!(network.waypoint(id).unwrap().role, WaypointRole::Entry);
        }
    }
}
