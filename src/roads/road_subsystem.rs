//! road_subsystem.rs - RoadNetwork: the owner of grid, arena and edit flow.
//!
//! All components take the network (or its parts) explicitly; there is no
//! process-wide "current grid". Mutation and queries run from one control
//! flow: edits are blocking, path queries only run between edits.
//!
//! Edit contract: toggling a cell reclassifies it and its four cardinal
//! neighbors, regenerates every cell whose topology or open-direction set
//! changed (waypoint sets are replaced wholesale, never patched), prunes
//! edges left dangling by the removals, then re-stitches the affected
//! boundaries.

use crate::helpers::positions::{CellCoord, Direction, DirectionSet};
use crate::roads::road_structs::{
    CellTopology, Connection, NetworkConfig, Waypoint, WaypointArena, WaypointId,
    WaypointIdAllocator, WaypointRole,
};
use crate::roads::stitcher::{self, StitchReport};
use crate::roads::templates::generate_cell;
use crate::roads::topology::RoadGrid;
use glam::Vec3;
use log::warn;
use std::collections::HashSet;

/// Outcome of one occupancy edit.
#[derive(Debug, Default)]
pub struct EditReport {
    /// Cells whose waypoint set was regenerated.
    pub regenerated: Vec<CellCoord>,
    pub stitch: StitchReport,
}

pub struct RoadNetwork {
    config: NetworkConfig,
    grid: RoadGrid,
    arena: WaypointArena,
    alloc: WaypointIdAllocator,
}

impl RoadNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            grid: RoadGrid::new(config.width, config.depth),
            arena: WaypointArena::new(),
            alloc: WaypointIdAllocator::new(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    #[inline]
    pub fn grid(&self) -> &RoadGrid {
        &self.grid
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Toggle a cell's occupancy and repair the navigation graph around it.
    pub fn set_cell(&mut self, coord: CellCoord, occupied: bool) -> EditReport {
        let mut report = EditReport::default();

        if !self.grid.in_bounds(coord) {
            warn!("edit at ({}, {}) is outside the grid", coord.x, coord.z);
            return report;
        }
        if !self.grid.set_occupied(coord, occupied) {
            return report;
        }

        self.grid.reclassify_around(coord);

        // The toggled cell and all four neighbors changed their open sets,
        // so all of them regenerate (occupied ones) or lose their waypoints
        // (the toggled cell going empty).
        let mut affected = vec![coord];
        affected.extend(Direction::ALL.into_iter().map(|d| coord.neighbor(d)));
        affected.retain(|c| self.grid.in_bounds(*c));

        for &cell in &affected {
            self.arena.remove_cell(cell);
        }

        // Cells adjacent to the affected set may hold edges into removed
        // waypoints. IDs are never reused, so a dangling target simply fails
        // to resolve; prune those edge lists.
        let affected_set: HashSet<CellCoord> = affected.iter().copied().collect();
        let mut prune: HashSet<CellCoord> = HashSet::new();
        for &cell in &affected {
            for dir in Direction::ALL {
                let n = cell.neighbor(dir);
                if !affected_set.contains(&n) {
                    prune.insert(n);
                }
            }
        }
        for cell in prune {
            self.arena.prune_dangling_edges(cell);
        }

        for &cell in &affected {
            if self.grid.is_occupied(cell) {
                self.instantiate_cell(cell);
                report.regenerated.push(cell);
            }
        }

        for &cell in &affected {
            report.stitch.merge(stitcher::stitch_cell(&self.grid, &mut self.arena, cell));
        }

        report
    }

    /// Full two-pass rebuild: classify everything, generate every occupied
    /// cell's template, then stitch all boundaries.
    pub fn rebuild_all(&mut self) -> StitchReport {
        self.arena.clear();
        self.grid.reclassify_all();
        for coord in self.grid.occupied_coords().collect::<Vec<_>>() {
            self.instantiate_cell(coord);
        }
        stitcher::stitch_all(&self.grid, &mut self.arena)
    }

    fn instantiate_cell(&mut self, coord: CellCoord) {
        let topology = self.grid.topology(coord);
        let open = self.grid.open_directions(coord);
        let graph = generate_cell(coord, topology, open, &self.config, &mut self.alloc);

        for (id, wp) in graph.waypoints {
            self.arena.insert_waypoint(id, wp);
        }
        for (from, conn) in graph.edges {
            self.arena.add_edge(from, conn);
        }
        for dir in Direction::ALL {
            for id in &graph.entries[dir.index()] {
                self.arena.register_boundary(coord, dir, *id, false);
            }
            for id in &graph.exits[dir.index()] {
                self.arena.register_boundary(coord, dir, *id, true);
            }
        }
    }

    /// Direct arena access for tests that hand-build graphs.
    #[cfg(test)]
    pub(crate) fn arena_mut(&mut self) -> &mut WaypointArena {
        &mut self.arena
    }

    // ========================================================================
    // Mesh-layer surface (topology only, no waypoints)
    // ========================================================================

    #[inline]
    pub fn topology(&self, coord: CellCoord) -> CellTopology {
        self.grid.topology(coord)
    }

    #[inline]
    pub fn open_directions(&self, coord: CellCoord) -> DirectionSet {
        self.grid.open_directions(coord)
    }

    #[inline]
    pub fn is_occupied(&self, coord: CellCoord) -> bool {
        self.grid.is_occupied(coord)
    }

    // ========================================================================
    // Vehicle-layer surface
    // ========================================================================

    #[inline]
    pub fn waypoint(&self, id: WaypointId) -> Option<&Waypoint> {
        self.arena.get(id)
    }

    #[inline]
    pub fn outgoing(&self, id: WaypointId) -> &[Connection] {
        self.arena.outgoing(id)
    }

    pub fn waypoint_count(&self) -> usize {
        self.arena.len()
    }

    pub fn all_waypoints(&self) -> impl Iterator<Item = (WaypointId, &Waypoint)> {
        self.arena.iter()
    }

    /// Entry-role waypoints, the natural path starts/ends for callers
    /// picking destinations.
    pub fn entry_waypoints(&self) -> impl Iterator<Item = (WaypointId, &Waypoint)> {
        self.arena
            .iter()
            .filter(|(_, wp)| wp.role == WaypointRole::Entry)
    }

    /// Waypoints owned by a cell, in generation order. Empty for cells
    /// without a template.
    pub fn cell_waypoints(&self, coord: CellCoord) -> &[WaypointId] {
        self.arena
            .cell(coord)
            .map(|c| c.all.as_slice())
            .unwrap_or(&[])
    }

    /// World positions for a waypoint id sequence, skipping ids that no
    /// longer resolve.
    pub fn path_positions(&self, waypoints: &[WaypointId]) -> Vec<Vec3> {
        waypoints
            .iter()
            .filter_map(|id| self.arena.get(*id).map(|wp| wp.pos))
            .collect()
    }

    /// Occupied cells with open sides whose template came out empty. These
    /// silently break connectivity if left unnoticed, so they are
    /// detectable here.
    pub fn ungenerated_cells(&self) -> Vec<CellCoord> {
        self.grid
            .occupied_coords()
            .filter(|&coord| {
                !self.grid.open_directions(coord).is_empty()
                    && self.cell_waypoints(coord).is_empty()
            })
            .collect()
    }
}
