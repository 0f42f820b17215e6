//! topology.rs - Occupancy grid and junction-shape classification.
//!
//! Classification looks only at the four cardinal neighbors:
//! 0 neighbors -> Single, 1 -> DeadEnd, 2 collinear -> Straight,
//! 2 perpendicular -> Corner, 3 -> TJunction, 4 -> Crossroads.
//! An unoccupied cell is always Empty. Whenever a cell's occupancy flips,
//! the cell AND its four neighbors must be reclassified - their neighbor
//! counts changed too.

use crate::helpers::positions::{CellCoord, Direction, DirectionSet};
use crate::roads::road_structs::{Cell, CellTopology};

/// Fixed-size dense occupancy grid. Coordinates outside the grid are
/// treated as permanently unoccupied.
pub struct RoadGrid {
    width: usize,
    depth: usize,
    cells: Vec<Cell>,
}

impl RoadGrid {
    pub fn new(width: usize, depth: usize) -> Self {
        Self {
            width,
            depth,
            cells: vec![Cell::default(); width * depth],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn in_bounds(&self, coord: CellCoord) -> bool {
        coord.x >= 0
            && coord.z >= 0
            && (coord.x as usize) < self.width
            && (coord.z as usize) < self.depth
    }

    #[inline]
    fn index(&self, coord: CellCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some(coord.z as usize * self.width + coord.x as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    #[inline]
    pub fn is_occupied(&self, coord: CellCoord) -> bool {
        self.cell(coord).map(|c| c.occupied).unwrap_or(false)
    }

    #[inline]
    pub fn topology(&self, coord: CellCoord) -> CellTopology {
        self.cell(coord).map(|c| c.topology).unwrap_or_default()
    }

    /// Flip occupancy. Returns true if the stored state actually changed;
    /// out-of-bounds coordinates are ignored.
    pub fn set_occupied(&mut self, coord: CellCoord, occupied: bool) -> bool {
        let Some(i) = self.index(coord) else {
            return false;
        };
        if self.cells[i].occupied == occupied {
            return false;
        }
        self.cells[i].occupied = occupied;
        true
    }

    /// The set of sides with an occupied cardinal neighbor.
    pub fn open_directions(&self, coord: CellCoord) -> DirectionSet {
        Direction::ALL
            .into_iter()
            .filter(|dir| self.is_occupied(coord.neighbor(*dir)))
            .collect()
    }

    /// All occupied coordinates in row-major (z, then x) order.
    pub fn occupied_coords(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.depth).flat_map(move |z| {
            (0..self.width).filter_map(move |x| {
                let coord = CellCoord::new(x as i32, z as i32);
                self.is_occupied(coord).then_some(coord)
            })
        })
    }

    fn set_topology(&mut self, coord: CellCoord, topology: CellTopology) -> bool {
        let Some(i) = self.index(coord) else {
            return false;
        };
        if self.cells[i].topology == topology {
            return false;
        }
        self.cells[i].topology = topology;
        true
    }

    /// Reclassify `coord` and its four cardinal neighbors, storing the
    /// results. Returns the coordinates whose stored topology changed.
    pub fn reclassify_around(&mut self, coord: CellCoord) -> Vec<CellCoord> {
        let mut changed = Vec::new();
        let targets =
            std::iter::once(coord).chain(Direction::ALL.into_iter().map(|d| coord.neighbor(d)));
        for target in targets {
            let topology = classify(self, target);
            if self.set_topology(target, topology) {
                changed.push(target);
            }
        }
        changed
    }

    /// Classify and store every cell. Full-rebuild counterpart of
    /// `reclassify_around`.
    pub fn reclassify_all(&mut self) {
        for z in 0..self.depth {
            for x in 0..self.width {
                let coord = CellCoord::new(x as i32, z as i32);
                let topology = classify(self, coord);
                self.set_topology(coord, topology);
            }
        }
    }
}

/// Pure classification of a single coordinate from its neighbor set.
pub fn classify(grid: &RoadGrid, coord: CellCoord) -> CellTopology {
    if !grid.is_occupied(coord) {
        return CellTopology::Empty;
    }
    let open = grid.open_directions(coord);
    match open.len() {
        0 => CellTopology::Single,
        1 => CellTopology::DeadEnd,
        2 => {
            if open.is_opposite_pair() {
                CellTopology::Straight
            } else {
                CellTopology::Corner
            }
        }
        3 => CellTopology::TJunction,
        _ => CellTopology::Crossroads,
    }
}
