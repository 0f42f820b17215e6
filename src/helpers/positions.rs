//! Grid coordinates, cardinal directions and cell-space math.
//!
//! The world lives in the XZ plane (y is up). North is +Z, East is +X.
//! "Left of a direction" follows the CCW rotation (x, z) -> (-z, x), so
//! left of North is West. Traffic is left-hand: the lane carrying traffic
//! toward a direction is offset to that direction's left.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Integer grid coordinate of one road cell.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub z: i32,
}

impl CellCoord {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, z: 0 }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// The adjacent coordinate in the given cardinal direction.
    #[inline]
    pub const fn neighbor(self, dir: Direction) -> Self {
        let (dx, dz) = dir.grid_offset();
        self.offset(dx, dz)
    }
}

/// World-space center of a cell (y = 0).
#[inline]
pub fn cell_center(coord: CellCoord, cell_size: f32) -> Vec3 {
    Vec3::new(coord.x as f32 * cell_size, 0.0, coord.z as f32 * cell_size)
}

/// Rotate a vector CCW in the XZ plane by 90° `times` times.
#[inline]
pub fn rotate_xz_ccw(v: Vec3, times: u32) -> Vec3 {
    let mut out = v;
    for _ in 0..(times % 4) {
        out = Vec3::new(-out.z, out.y, out.x);
    }
    out
}

/// Cardinal direction on the grid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Fixed iteration order. Template generation and stitching walk
    /// directions in this order, which is what makes both deterministic.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// 90° CCW in the XZ plane: left of North is West.
    #[inline]
    pub const fn left(self) -> Self {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    #[inline]
    pub const fn right(self) -> Self {
        self.left().opposite()
    }

    #[inline]
    pub const fn rotate_ccw(self, times: u32) -> Self {
        let mut out = self;
        let mut i = 0;
        while i < times % 4 {
            out = out.left();
            i += 1;
        }
        out
    }

    /// Grid delta (dx, dz) of one step in this direction.
    #[inline]
    pub const fn grid_offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    /// Unit vector in the XZ plane.
    #[inline]
    pub fn vector(self) -> Vec3 {
        let (dx, dz) = self.grid_offset();
        Vec3::new(dx as f32, 0.0, dz as f32)
    }

    /// Perpendicular unit vector pointing to the LEFT of this direction.
    #[inline]
    pub fn left_vector(self) -> Vec3 {
        let v = self.vector();
        Vec3::new(-v.z, 0.0, v.x)
    }

    /// True if `self` and `other` lie on the same axis.
    #[inline]
    pub fn is_collinear(self, other: Direction) -> bool {
        self == other || self == other.opposite()
    }
}

/// Compact set of cardinal directions (the "open sides" of a cell).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, Hash, Eq, PartialEq)]
#[repr(transparent)]
pub struct DirectionSet(u8);

impl DirectionSet {
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn all() -> Self {
        Self(0b1111)
    }

    #[inline]
    pub const fn single(dir: Direction) -> Self {
        Self(1 << dir.index())
    }

    #[inline]
    pub const fn insert(self, dir: Direction) -> Self {
        Self(self.0 | (1 << dir.index()))
    }

    #[inline]
    pub const fn contains(self, dir: Direction) -> bool {
        self.0 & (1 << dir.index()) != 0
    }

    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate contained directions in `Direction::ALL` order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    /// Rotate every contained direction CCW by 90° `times` times.
    pub fn rotate_ccw(self, times: u32) -> Self {
        let mut out = Self::empty();
        for dir in self.iter() {
            out = out.insert(dir.rotate_ccw(times));
        }
        out
    }

    /// True if the set is exactly one axis-aligned opposite pair.
    pub fn is_opposite_pair(self) -> bool {
        self == Self::single(Direction::North).insert(Direction::South)
            || self == Self::single(Direction::East).insert(Direction::West)
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, dir| set.insert(dir))
    }
}
