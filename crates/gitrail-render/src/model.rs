use git2::Oid;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Lattice coordinate of one commit.
///
/// `x` is the track index (smaller is further left), `y` the emission order
/// of the chrono-topological sort: the k-th emitted commit has `y = k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [i64; 2] {
    fn from(pos: Position) -> Self {
        [pos.x, pos.y]
    }
}

impl From<[i64; 2]> for Position {
    fn from([x, y]: [i64; 2]) -> Self {
        Self { x, y }
    }
}

/// The layout result: every placed commit's position.
#[derive(Debug, Default)]
pub struct RailwayLayout {
    pub positions: FxHashMap<Oid, Position>,
}

impl RailwayLayout {
    /// Largest `(x, y)` over all positions; `(0, 0)` when empty.
    pub fn extents(&self) -> (i64, i64) {
        let mut max_x = 0;
        let mut max_y = 0;
        for pos in self.positions.values() {
            max_x = max_x.max(pos.x);
            max_y = max_y.max(pos.y);
        }
        (max_x, max_y)
    }
}
