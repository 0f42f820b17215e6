//! road_structs.rs - Core types for the lane-level waypoint graph.
//!
//! # Invariants
//! - Waypoint IDs are monotonically increasing and never reused
//! - Edges are one-way; A→B implies nothing about B→A
//! - A cell's waypoint set is replaced wholesale on regeneration, never
//!   partially mutated

use crate::helpers::positions::{CellCoord, Direction};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// ID Newtypes
// ============================================================================

/// Stable, monotonically increasing waypoint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct WaypointId(pub u32);

impl WaypointId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for WaypointId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<WaypointId> for u32 {
    #[inline]
    fn from(id: WaypointId) -> Self {
        id.0
    }
}

pub struct WaypointIdAllocator {
    next: u32,
}

impl WaypointIdAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn alloc(&mut self) -> WaypointId {
        let id = WaypointId::new(self.next);
        self.next += 1;
        id
    }
}

impl Default for WaypointIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Topology & Waypoints
// ============================================================================

/// Junction shape of a cell, classified from its cardinal neighbor count
/// and arrangement.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellTopology {
    Empty,
    Single,
    DeadEnd,
    Straight,
    Corner,
    TJunction,
    Crossroads,
}

impl Default for CellTopology {
    fn default() -> Self {
        Self::Empty
    }
}

/// Role of a waypoint within its owning cell's template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaypointRole {
    /// Boundary point where traffic enters the cell.
    Entry,
    /// Boundary point where traffic leaves the cell.
    Exit,
    /// Interior turn apex of a turning route.
    Turn,
    /// Interior point along a dead-end fold-back chain.
    Midpoint,
    /// Dead-end turnaround apex.
    UTurn,
}

/// One node of the navigation graph.
#[derive(Debug, Clone)]
pub struct Waypoint {
    pub pos: Vec3,
    pub role: WaypointRole,
    /// Owning cell (back-reference only; the arena owns the waypoint).
    pub cell: CellCoord,
    /// Disambiguates parallel routes within the owning cell.
    pub lane_index: u8,
}

/// Directed edge to another waypoint. Cost is the Euclidean edge length.
#[derive(Debug, Clone, Copy)]
pub struct Connection {
    pub target: WaypointId,
    pub cost: f32,
}

/// One grid square of the road network.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cell {
    pub occupied: bool,
    pub topology: CellTopology,
}

// ============================================================================
// Configuration
// ============================================================================

/// Geometry and grid dimensions. All template offsets derive from
/// `cell_size` and `lane_width` only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig {
    pub width: usize,
    pub depth: usize,
    pub cell_size: f32,
    pub lane_width: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            width: 64,
            depth: 64,
            cell_size: 16.0,
            lane_width: 3.1,
        }
    }
}

impl NetworkConfig {
    /// Half the cell size: distance from center to a boundary.
    #[inline]
    pub fn half_extent(&self) -> f32 {
        self.cell_size * 0.5
    }

    /// Half the lane width: lateral offset of a lane from its guide line.
    #[inline]
    pub fn lane_offset(&self) -> f32 {
        self.lane_width * 0.5
    }
}

// ============================================================================
// Waypoint Arena
// ============================================================================

/// Per-cell waypoint membership, kept alongside the arena for stitching and
/// endpoint selection. Boundary lists are sorted by lane index.
#[derive(Debug, Clone, Default)]
pub struct CellWaypoints {
    pub all: Vec<WaypointId>,
    pub entries: [Vec<WaypointId>; 4],
    pub exits: [Vec<WaypointId>; 4],
}

impl CellWaypoints {
    #[inline]
    pub fn entries_on(&self, side: Direction) -> &[WaypointId] {
        &self.entries[side.index()]
    }

    #[inline]
    pub fn exits_on(&self, side: Direction) -> &[WaypointId] {
        &self.exits[side.index()]
    }
}

/// Single owned collection of all waypoints and their outgoing edges,
/// indexed by ID, with a per-cell membership index. Cells and edges hold
/// IDs rather than references, so replacing a cell's waypoints can never
/// leave a dangling borrow - at worst a neighbor's edge targets an ID that
/// no longer resolves, which `prune_dangling_edges` cleans up.
#[derive(Default)]
pub struct WaypointArena {
    waypoints: HashMap<WaypointId, Waypoint>,
    edges: HashMap<WaypointId, Vec<Connection>>,
    by_cell: HashMap<CellCoord, CellWaypoints>,
}

impl WaypointArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.edges.clear();
        self.by_cell.clear();
    }

    #[inline]
    pub fn contains(&self, id: WaypointId) -> bool {
        self.waypoints.contains_key(&id)
    }

    #[inline]
    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.get(&id)
    }

    /// Outgoing connections of a waypoint. Unknown IDs yield an empty slice.
    #[inline]
    pub fn outgoing(&self, id: WaypointId) -> &[Connection] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn cell(&self, coord: CellCoord) -> Option<&CellWaypoints> {
        self.by_cell.get(&coord)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WaypointId, &Waypoint)> {
        self.waypoints.iter().map(|(id, wp)| (*id, wp))
    }

    pub fn insert_waypoint(&mut self, id: WaypointId, waypoint: Waypoint) {
        let cell = waypoint.cell;
        self.waypoints.insert(id, waypoint);
        self.by_cell.entry(cell).or_default().all.push(id);
    }

    pub fn register_boundary(&mut self, cell: CellCoord, side: Direction, id: WaypointId, exit: bool) {
        let entry = self.by_cell.entry(cell).or_default();
        let list = if exit {
            &mut entry.exits[side.index()]
        } else {
            &mut entry.entries[side.index()]
        };
        list.push(id);
    }

    /// Add a directed edge, skipping exact duplicates so re-stitching a
    /// boundary twice stays idempotent.
    pub fn add_edge(&mut self, from: WaypointId, connection: Connection) -> bool {
        let edges = self.edges.entry(from).or_default();
        if edges.iter().any(|c| c.target == connection.target) {
            return false;
        }
        edges.push(connection);
        true
    }

    /// Remove a cell's entire waypoint set and all edges sourced from it.
    /// Edges *into* the removed waypoints are left dangling; callers prune
    /// the neighboring cells afterwards.
    pub fn remove_cell(&mut self, coord: CellCoord) -> Vec<WaypointId> {
        let Some(cell) = self.by_cell.remove(&coord) else {
            return Vec::new();
        };
        for id in &cell.all {
            self.waypoints.remove(id);
            self.edges.remove(id);
        }
        cell.all
    }

    /// Drop edges of `coord`'s waypoints whose target no longer resolves.
    /// Returns the number of edges removed.
    pub fn prune_dangling_edges(&mut self, coord: CellCoord) -> usize {
        let Some(cell) = self.by_cell.get(&coord) else {
            return 0;
        };
        let ids = cell.all.clone();
        let mut removed = 0;
        for id in &ids {
            if let Some(edges) = self.edges.get_mut(id) {
                let before = edges.len();
                let waypoints = &self.waypoints;
                edges.retain(|c| waypoints.contains_key(&c.target));
                removed += before - edges.len();
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoint_at(cell: CellCoord, x: f32) -> Waypoint {
        Waypoint {
            pos: Vec3::new(x, 0.0, 0.0),
            role: WaypointRole::Entry,
            cell,
            lane_index: 0,
        }
    }

    #[test]
    fn test_allocator_is_monotonic() {
        let mut alloc = WaypointIdAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_remove_cell_drops_waypoints_and_sourced_edges() {
        let mut arena = WaypointArena::new();
        let mut alloc = WaypointIdAllocator::new();
        let cell_a = CellCoord::new(0, 0);
        let cell_b = CellCoord::new(1, 0);

        let a = alloc.alloc();
        let b = alloc.alloc();
        arena.insert_waypoint(a, waypoint_at(cell_a, 0.0));
        arena.insert_waypoint(b, waypoint_at(cell_b, 16.0));
        arena.add_edge(a, Connection { target: b, cost: 16.0 });
        arena.add_edge(b, Connection { target: a, cost: 16.0 });

        let removed = arena.remove_cell(cell_a);
        assert_eq!(removed, vec![a]);
        assert!(!arena.contains(a));
        assert!(arena.outgoing(a).is_empty());

        // b's edge into the removed waypoint dangles until pruned
        assert_eq!(arena.outgoing(b).len(), 1);
        assert_eq!(arena.prune_dangling_edges(cell_b), 1);
        assert!(arena.outgoing(b).is_empty());
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut arena = WaypointArena::new();
        let cell = CellCoord::zero();
        let a = WaypointId::new(0);
        let b = WaypointId::new(1);
        arena.insert_waypoint(a, waypoint_at(cell, 0.0));
        arena.insert_waypoint(b, waypoint_at(cell, 1.0));

        assert!(arena.add_edge(a, Connection { target: b, cost: 1.0 }));
        assert!(!arena.add_edge(a, Connection { target: b, cost: 1.0 }));
        assert_eq!(arena.outgoing(a).len(), 1);
    }
}
