//! templates.rs - Per-cell waypoint graph instantiation.
//!
//! Every topology is produced by one generic route synthesizer over the
//! cell's open sides instead of a hand-written block per rotation. In
//! cell-local terms (h = half cell size, o = half lane width, left-hand
//! traffic):
//!
//! - exit boundary point toward side d:  dir(d)*h + left(d)*o
//! - entry boundary point on side d:     dir(d)*h - left(d)*o
//! - a straight route (exit side opposite the entry side) is a single edge
//! - a turning route goes through a dedicated turn apex at
//!   -left(in)*o + left(out)*o, the intersection of the two lane guide lines
//! - a dead end folds the single lane back on itself through two midpoints
//!   and one U-turn apex near the far boundary
//!
//! Boundary waypoints are shared per side: every route entering a side fans
//! out from that side's single entry waypoint. Turn apexes are never shared
//! between routes. The whole graph for a cell is fully determined by
//! (topology, open sides, center, cell size, lane width) - regeneration with
//! the same inputs reproduces bit-identical positions.

use crate::helpers::positions::{CellCoord, Direction, DirectionSet, cell_center};
use crate::roads::road_structs::{
    CellTopology, Connection, NetworkConfig, Waypoint, WaypointId, WaypointIdAllocator,
    WaypointRole,
};
use glam::Vec3;
use log::warn;

/// Freshly generated waypoint graph for one cell, not yet inserted into the
/// arena. Boundary lists are per side, in lane-index order.
#[derive(Debug, Default)]
pub struct CellGraph {
    pub waypoints: Vec<(WaypointId, Waypoint)>,
    pub edges: Vec<(WaypointId, Connection)>,
    pub entries: [Vec<WaypointId>; 4],
    pub exits: [Vec<WaypointId>; 4],
}

impl CellGraph {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn count_role(&self, role: WaypointRole) -> usize {
        self.waypoints.iter().filter(|(_, w)| w.role == role).count()
    }
}

/// How many open sides each topology bucket expects. Used to reject
/// inconsistent (topology, open set) inputs instead of generating garbage.
fn open_count_matches(topology: CellTopology, open: DirectionSet) -> bool {
    match topology {
        CellTopology::Empty => true,
        CellTopology::Single => open.is_empty(),
        CellTopology::DeadEnd => open.len() == 1,
        CellTopology::Straight => open.len() == 2 && open.is_opposite_pair(),
        CellTopology::Corner => open.len() == 2 && !open.is_opposite_pair(),
        CellTopology::TJunction => open.len() == 3,
        CellTopology::Crossroads => open.len() == 4,
    }
}

/// Instantiate the waypoint template for one cell.
///
/// `Empty` and `Single` cells legitimately produce an empty graph. Any
/// topology/open-set mismatch also produces an empty graph but is logged;
/// the subsystem surfaces those as ungenerated cells.
pub fn generate_cell(
    coord: CellCoord,
    topology: CellTopology,
    open: DirectionSet,
    config: &NetworkConfig,
    alloc: &mut WaypointIdAllocator,
) -> CellGraph {
    if !open_count_matches(topology, open) {
        warn!(
            "cell ({}, {}): topology {topology:?} does not match open sides {open:?}, \
             generating no waypoints",
            coord.x, coord.z
        );
        return CellGraph::default();
    }

    match topology {
        CellTopology::Empty | CellTopology::Single => CellGraph::default(),
        CellTopology::DeadEnd => {
            // Unwrap is fine: open_count_matches guaranteed exactly one side.
            let side = open.iter().next().expect("dead end has one open side");
            generate_dead_end(coord, side, config, alloc)
        }
        CellTopology::Straight
        | CellTopology::Corner
        | CellTopology::TJunction
        | CellTopology::Crossroads => generate_junction(coord, open, config, alloc),
    }
}

struct CellBuilder<'a> {
    graph: CellGraph,
    center: Vec3,
    coord: CellCoord,
    alloc: &'a mut WaypointIdAllocator,
}

impl<'a> CellBuilder<'a> {
    fn new(coord: CellCoord, config: &NetworkConfig, alloc: &'a mut WaypointIdAllocator) -> Self {
        Self {
            graph: CellGraph::default(),
            center: cell_center(coord, config.cell_size),
            coord,
            alloc,
        }
    }

    fn add(&mut self, local: Vec3, role: WaypointRole, lane_index: u8) -> WaypointId {
        let id = self.alloc.alloc();
        self.graph.waypoints.push((
            id,
            Waypoint {
                pos: self.center + local,
                role,
                cell: self.coord,
                lane_index,
            },
        ));
        id
    }

    fn connect(&mut self, from: WaypointId, to: WaypointId) {
        let pos = |id: WaypointId| {
            self.graph
                .waypoints
                .iter()
                .find(|(wid, _)| *wid == id)
                .map(|(_, w)| w.pos)
                .expect("connect() called with an id from this builder")
        };
        let cost = pos(from).distance(pos(to));
        self.graph
            .edges
            .push((from, Connection { target: to, cost }));
    }
}

/// Shared boundary waypoints plus one route per ordered pair of distinct
/// open sides. Covers Straight, Corner, TJunction and Crossroads; the route
/// counts (2, 2, 6, 12) fall out of the pair enumeration.
fn generate_junction(
    coord: CellCoord,
    open: DirectionSet,
    config: &NetworkConfig,
    alloc: &mut WaypointIdAllocator,
) -> CellGraph {
    let h = config.half_extent();
    let o = config.lane_offset();
    let mut b = CellBuilder::new(coord, config, alloc);

    // One shared entry and exit waypoint per open side, allocated first in
    // Direction::ALL order.
    let mut entry_ids = [None; 4];
    let mut exit_ids = [None; 4];
    for dir in open.iter() {
        let along = dir.vector() * h;
        let lateral = dir.left_vector() * o;
        let entry = b.add(along - lateral, WaypointRole::Entry, 0);
        let exit = b.add(along + lateral, WaypointRole::Exit, 0);
        b.graph.entries[dir.index()].push(entry);
        b.graph.exits[dir.index()].push(exit);
        entry_ids[dir.index()] = Some(entry);
        exit_ids[dir.index()] = Some(exit);
    }

    // Routes: every (entry side, different exit side) ordered pair. Straight
    // pairs are single edges; perpendicular pairs get a dedicated turn apex.
    let mut route_index: u8 = 0;
    for in_dir in open.iter() {
        let entry = entry_ids[in_dir.index()].expect("open side has an entry");
        for out_dir in open.iter() {
            if out_dir == in_dir {
                continue;
            }
            let exit = exit_ids[out_dir.index()].expect("open side has an exit");
            if out_dir == in_dir.opposite() {
                b.connect(entry, exit);
            } else {
                let apex = -in_dir.left_vector() * o + out_dir.left_vector() * o;
                let turn = b.add(apex, WaypointRole::Turn, route_index);
                b.connect(entry, turn);
                b.connect(turn, exit);
            }
            route_index += 1;
        }
    }

    b.graph
}

/// Single lane folding back on itself: entry, midpoint near the far wall,
/// U-turn apex on the centerline, second midpoint, exit back out the same
/// side. Exactly four edges, exactly one U-turn waypoint.
fn generate_dead_end(
    coord: CellCoord,
    side: Direction,
    config: &NetworkConfig,
    alloc: &mut WaypointIdAllocator,
) -> CellGraph {
    let h = config.half_extent();
    let o = config.lane_offset();
    let mut b = CellBuilder::new(coord, config, alloc);

    let travel = side.opposite().vector();
    let along = side.vector() * h;
    let lateral = side.left_vector() * o;

    let entry = b.add(along - lateral, WaypointRole::Entry, 0);
    let mid_in = b.add(travel * (h - 2.0 * o) - lateral, WaypointRole::Midpoint, 0);
    let apex = b.add(travel * (h - o), WaypointRole::UTurn, 0);
    let mid_out = b.add(travel * (h - 2.0 * o) + lateral, WaypointRole::Midpoint, 0);
    let exit = b.add(along + lateral, WaypointRole::Exit, 0);

    b.graph.entries[side.index()].push(entry);
    b.graph.exits[side.index()].push(exit);

    b.connect(entry, mid_in);
    b.connect(mid_in, apex);
    b.connect(apex, mid_out);
    b.connect(mid_out, exit);

    b.graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::positions::rotate_xz_ccw;
    use std::collections::HashSet;

    fn config() -> NetworkConfig {
        NetworkConfig::default()
    }

    fn dirs(list: &[Direction]) -> DirectionSet {
        list.iter().copied().collect()
    }

    fn generate(topology: CellTopology, open: DirectionSet) -> CellGraph {
        let mut alloc = WaypointIdAllocator::new();
        generate_cell(CellCoord::zero(), topology, open, &config(), &mut alloc)
    }

    #[test]
    fn test_straight_has_two_one_way_edges() {
        let open = dirs(&[Direction::North, Direction::South]);
        let graph = generate(CellTopology::Straight, open);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.count_role(WaypointRole::Entry), 2);
        assert_eq!(graph.count_role(WaypointRole::Exit), 2);
        assert_eq!(graph.count_role(WaypointRole::Turn), 0);

        // One-way: no edge is the reverse of another.
        for (from, conn) in &graph.edges {
            let reversed = graph
                .edges
                .iter()
                .any(|(f, c)| *f == conn.target && c.target == *from);
            assert!(!reversed, "straight lanes must not be bidirectional");
        }
    }

    #[test]
    fn test_straight_lanes_run_on_the_left() {
        let cfg = config();
        let open = dirs(&[Direction::North, Direction::South]);
        let graph = generate(CellTopology::Straight, open);

        // Northbound traffic (entering from the south side) keeps west of
        // the centerline under left-hand traffic.
        let south_entry = graph.entries[Direction::South.index()][0];
        let (_, wp) = graph
            .waypoints
            .iter()
            .find(|(id, _)| *id == south_entry)
            .unwrap();
        assert!(wp.pos.x < 0.0);
        assert!((wp.pos.x + cfg.lane_offset()).abs() < 1e-6);
    }

    #[test]
    fn test_corner_is_two_turn_chains() {
        let open = dirs(&[Direction::North, Direction::East]);
        let graph = generate(CellTopology::Corner, open);

        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.count_role(WaypointRole::Turn), 2);
        assert_eq!(graph.count_role(WaypointRole::Entry), 2);
        assert_eq!(graph.count_role(WaypointRole::Exit), 2);
    }

    #[test]
    fn test_dead_end_chain() {
        let open = dirs(&[Direction::West]);
        let graph = generate(CellTopology::DeadEnd, open);

        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.count_role(WaypointRole::UTurn), 1);
        assert_eq!(graph.count_role(WaypointRole::Midpoint), 2);

        // The chain is continuous: entry reaches exit in exactly 4 hops.
        let entry = graph.entries[Direction::West.index()][0];
        let exit = graph.exits[Direction::West.index()][0];
        let mut current = entry;
        for _ in 0..4 {
            let (_, conn) = graph
                .edges
                .iter()
                .find(|(from, _)| *from == current)
                .expect("chain link");
            current = conn.target;
        }
        assert_eq!(current, exit);
    }

    #[test]
    fn test_t_junction_routes() {
        // Closed to the west: straight pair runs north-south.
        let open = dirs(&[Direction::North, Direction::East, Direction::South]);
        let graph = generate(CellTopology::TJunction, open);

        let turns = graph.count_role(WaypointRole::Turn);
        let straight_edges = graph.edge_count() - turns * 2;
        assert_eq!(turns, 4);
        assert_eq!(straight_edges, 2);
        assert_eq!(turns + straight_edges, 6, "six one-way routes");
    }

    #[test]
    fn test_crossroads_routes() {
        let graph = generate(CellTopology::Crossroads, DirectionSet::all());

        let turns = graph.count_role(WaypointRole::Turn);
        let straight_edges = graph.edge_count() - turns * 2;
        assert_eq!(turns, 8);
        assert_eq!(straight_edges, 4);
        assert_eq!(turns + straight_edges, 12, "twelve one-way routes");

        // No turn apex is shared between routes.
        let turn_ids: HashSet<_> = graph
            .waypoints
            .iter()
            .filter(|(_, w)| w.role == WaypointRole::Turn)
            .map(|(id, _)| *id)
            .collect();
        for id in &turn_ids {
            let inbound = graph.edges.iter().filter(|(_, c)| c.target == *id).count();
            let outbound = graph.edges.iter().filter(|(f, _)| f == id).count();
            assert_eq!((inbound, outbound), (1, 1));
        }
    }

    #[test]
    fn test_regeneration_is_bit_identical() {
        let open = dirs(&[Direction::North, Direction::East, Direction::South]);
        let a = generate(CellTopology::TJunction, open);
        let b = generate(CellTopology::TJunction, open);

        assert_eq!(a.waypoints.len(), b.waypoints.len());
        for ((_, wa), (_, wb)) in a.waypoints.iter().zip(b.waypoints.iter()) {
            assert_eq!(wa.pos, wb.pos);
            assert_eq!(wa.role, wb.role);
            assert_eq!(wa.lane_index, wb.lane_index);
        }
        assert_eq!(a.edge_count(), b.edge_count());
    }

    #[test]
    fn test_corner_rotation_symmetry() {
        // Corner(S,W) must be Corner(N,E) rotated 180° about the center.
        let ne = generate(
            CellTopology::Corner,
            dirs(&[Direction::North, Direction::East]),
        );
        let sw = generate(
            CellTopology::Corner,
            dirs(&[Direction::South, Direction::West]),
        );

        let mut rotated: Vec<Vec3> = ne
            .waypoints
            .iter()
            .map(|(_, w)| rotate_xz_ccw(w.pos, 2))
            .collect();
        let mut actual: Vec<Vec3> = sw.waypoints.iter().map(|(_, w)| w.pos).collect();

        let key = |v: &Vec3| (v.x * 4096.0).round() as i64 * 1_000_000 + (v.z * 4096.0).round() as i64;
        rotated.sort_by_key(key);
        actual.sort_by_key(key);

        assert_eq!(rotated.len(), actual.len());
        for (r, a) in rotated.iter().zip(actual.iter()) {
            assert!(r.distance(*a) < 1e-5, "rotated {r:?} vs actual {a:?}");
        }
    }

    #[test]
    fn test_mismatched_open_set_yields_empty_graph() {
        let open = dirs(&[Direction::North, Direction::East, Direction::South]);
        let graph = generate(CellTopology::Corner, open);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_single_cell_generates_nothing() {
        let graph = generate(CellTopology::Single, DirectionSet::empty());
        assert!(graph.is_empty());
    }
}
