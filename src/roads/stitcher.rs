//! stitcher.rs - Cross-cell Exit→Entry boundary wiring.
//!
//! Pass 1 (templates) has already placed boundary waypoints so that an exit
//! of one cell and the matching entry of its neighbor land on the same
//! point. Stitching therefore matches under a float-snap tolerance, not a
//! geometric design parameter. Each occupied cell only inspects its North
//! and East neighbors; the shared boundary is wired in both directions
//! while it is visited, so no boundary is processed twice.
//!
//! An exit with no entry within tolerance is a terminated lane, not an
//! error: partially edited grids are a normal transient state. Unmatched
//! exits are counted and reported.

use crate::helpers::positions::{CellCoord, Direction};
use crate::roads::road_structs::{Connection, WaypointArena, WaypointId};
use crate::roads::topology::RoadGrid;
use log::debug;

/// Maximum distance between an exit and the entry it connects to.
/// Float-snap scale: coincident points that drifted through arithmetic.
pub const STITCH_TOLERANCE: f32 = 1e-3;

/// One exit waypoint that found no matching entry on the neighbor.
#[derive(Debug, Clone)]
pub struct UnmatchedExit {
    pub cell: CellCoord,
    pub waypoint: WaypointId,
    pub side: Direction,
}

/// Outcome of a stitching pass. Unmatched exits are diagnostics, never
/// failures.
#[derive(Debug, Default)]
pub struct StitchReport {
    pub edges_added: usize,
    pub unmatched: Vec<UnmatchedExit>,
}

impl StitchReport {
    pub fn merge(&mut self, other: StitchReport) {
        self.edges_added += other.edges_added;
        self.unmatched.extend(other.unmatched);
    }
}

/// Stitch every occupied cell boundary in the grid. Assumes all templates
/// are already generated (the two-pass contract).
pub fn stitch_all(grid: &RoadGrid, arena: &mut WaypointArena) -> StitchReport {
    let mut report = StitchReport::default();
    for coord in grid.occupied_coords().collect::<Vec<_>>() {
        for dir in [Direction::North, Direction::East] {
            let neighbor = coord.neighbor(dir);
            if grid.is_occupied(neighbor) {
                stitch_boundary(arena, coord, dir, &mut report);
            }
        }
    }
    if !report.unmatched.is_empty() {
        debug!(
            "stitch pass: {} edges added, {} unmatched exits",
            report.edges_added,
            report.unmatched.len()
        );
    }
    report
}

/// Re-stitch all four boundaries of one cell, in both directions. Used
/// after an incremental edit; `add_edge` deduplication keeps boundaries
/// that were already wired intact.
pub fn stitch_cell(grid: &RoadGrid, arena: &mut WaypointArena, coord: CellCoord) -> StitchReport {
    let mut report = StitchReport::default();
    if !grid.is_occupied(coord) {
        return report;
    }
    for dir in Direction::ALL {
        let neighbor = coord.neighbor(dir);
        if grid.is_occupied(neighbor) {
            stitch_boundary(arena, coord, dir, &mut report);
        }
    }
    report
}

/// Wire the boundary between `coord` and its neighbor in `dir`, both ways:
/// this cell's exits on that side into the neighbor's entries, and the
/// neighbor's exits back into this cell's entries.
fn stitch_boundary(
    arena: &mut WaypointArena,
    coord: CellCoord,
    dir: Direction,
    report: &mut StitchReport,
) {
    let neighbor = coord.neighbor(dir);
    stitch_side(arena, coord, dir, neighbor, report);
    stitch_side(arena, neighbor, dir.opposite(), coord, report);
}

/// Connect every exit of `from` on `side` to the nearest entry of `to` on
/// the opposite side, within tolerance. Tie-break is (distance, lane index,
/// id) so the mapping is deterministic.
fn stitch_side(
    arena: &mut WaypointArena,
    from: CellCoord,
    side: Direction,
    to: CellCoord,
    report: &mut StitchReport,
) {
    let exits: Vec<WaypointId> = match arena.cell(from) {
        Some(cell) => cell.exits_on(side).to_vec(),
        None => return,
    };
    let entries: Vec<WaypointId> = match arena.cell(to) {
        Some(cell) => cell.entries_on(side.opposite()).to_vec(),
        None => Vec::new(),
    };

    for exit_id in exits {
        let Some(exit) = arena.get(exit_id) else {
            continue;
        };
        let exit_pos = exit.pos;

        let mut best: Option<(f32, u8, WaypointId)> = None;
        for &entry_id in &entries {
            let Some(entry) = arena.get(entry_id) else {
                continue;
            };
            let dist = exit_pos.distance(entry.pos);
            if dist > STITCH_TOLERANCE {
                continue;
            }
            let candidate = (dist, entry.lane_index, entry_id);
            let better = match best {
                None => true,
                Some(current) => candidate < current,
            };
            if better {
                best = Some(candidate);
            }
        }

        match best {
            Some((dist, _, entry_id)) => {
                if arena.add_edge(
                    exit_id,
                    Connection {
                        target: entry_id,
                        cost: dist,
                    },
                ) {
                    report.edges_added += 1;
                }
            }
            None => {
                debug!(
                    "unmatched exit {:?} on {:?} side of cell ({}, {})",
                    exit_id, side, from.x, from.z
                );
                report.unmatched.push(UnmatchedExit {
                    cell: from,
                    waypoint: exit_id,
                    side,
                });
            }
        }
    }
}
