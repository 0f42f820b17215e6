//! lanegraph - lane-level waypoint graphs for grid road networks.
//!
//! Per occupied grid cell, a directed micro-graph of entry/turn/exit
//! waypoints encodes legal movement through that cell's junction shape.
//! Cell graphs are stitched across boundaries into one citywide navigation
//! graph, and A* routes vehicles over it.
//!
//! Flow: classify topology from neighbor adjacency ([`roads::topology`]),
//! instantiate the per-cell waypoint template ([`roads::templates`]),
//! stitch adjacent cells ([`roads::stitcher`]), query paths
//! ([`cars::pathfinding`]). [`roads::road_subsystem::RoadNetwork`] owns the
//! whole thing and keeps the graph consistent across interactive edits.
//!
//! Single-threaded by design: one writer, readers between edits. Batch
//! path queries may run in parallel over an immutable network borrow.

pub mod cars;
pub mod helpers;
pub mod roads;

pub use cars::pathfinding::{
    Path, PathQuery, QueryError, find_path, find_path_cells, find_paths_par,
    random_entry_waypoint,
};
pub use helpers::positions::{CellCoord, Direction, DirectionSet};
pub use roads::road_structs::{
    CellTopology, Connection, NetworkConfig, Waypoint, WaypointId, WaypointRole,
};
pub use roads::road_subsystem::{EditReport, RoadNetwork};
pub use roads::stitcher::{StitchReport, UnmatchedExit};
