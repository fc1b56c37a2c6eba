use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Integer cell coordinate on a board.
///
/// X increases rightward, Y increases downward. Coordinates may be negative
/// while a piece is still above the visible area.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("({x}, {y})")]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
}

impl CellPos {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Fractional 2D point backing a [`Block`]'s position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Truncates toward negative infinity.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub fn to_cell(self) -> CellPos {
        CellPos::new(self.x.floor() as i32, self.y.floor() as i32)
    }
}

impl From<CellPos> for Point {
    fn from(pos: CellPos) -> Self {
        Self::new(f64::from(pos.x), f64::from(pos.y))
    }
}

/// Opaque identity of a block.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, derive_more::Display,
)]
#[display("#{_0}")]
pub struct BlockId(u64);

impl BlockId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A single cell of a piece.
///
/// Blocks in a piece's component template hold offsets relative to the
/// piece's local origin; blocks in its working locations hold absolute board
/// cells. Exactly one block of a rotating piece is the origin (the pivot).
///
/// # Example
///
/// ```
/// use blockfall_engine::{Block, CellPos};
///
/// let block = Block::new(2, -1, true);
/// assert_eq!(block.location_with_offset(1, 1), CellPos::new(3, 0));
/// assert_eq!(block.position(), CellPos::new(2, -1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Block {
    id: BlockId,
    point: Point,
    is_origin: bool,
}

impl Block {
    #[must_use]
    pub fn new(x: i32, y: i32, is_origin: bool) -> Self {
        Self::at(CellPos::new(x, y), is_origin)
    }

    #[must_use]
    pub fn at(pos: CellPos, is_origin: bool) -> Self {
        Self {
            id: BlockId::next(),
            point: pos.into(),
            is_origin,
        }
    }

    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn is_origin(&self) -> bool {
        self.is_origin
    }

    #[must_use]
    pub fn x(&self) -> i32 {
        self.position().x
    }

    #[must_use]
    pub fn y(&self) -> i32 {
        self.position().y
    }

    #[must_use]
    pub fn position(&self) -> CellPos {
        self.point.to_cell()
    }

    #[must_use]
    pub fn point(&self) -> Point {
        self.point
    }

    pub fn set_x(&mut self, x: i32) {
        self.point.x = f64::from(x);
    }

    pub fn set_y(&mut self, y: i32) {
        self.point.y = f64::from(y);
    }

    pub fn set_position(&mut self, pos: CellPos) {
        self.point = pos.into();
    }

    pub fn set_point(&mut self, point: Point) {
        self.point = point;
    }

    /// Returns the cell this block would occupy after moving by `(dx, dy)`.
    #[must_use]
    pub fn location_with_offset(&self, dx: i32, dy: i32) -> CellPos {
        self.position().offset(dx, dy)
    }
}
