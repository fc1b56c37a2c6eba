use serde::{Deserialize, Serialize};

use super::{block::CellPos, piece::PieceId, shape::ShapeId};

/// Identity of a board; a piece remembers which board it was placed on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[display("board#{_0}")]
pub struct BoardId(pub u32);

/// Direction of a committed single-step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Classifies a move offset; vertical motion takes precedence.
    #[must_use]
    pub fn from_offset(dx: i32, dy: i32) -> Self {
        match (dx, dy) {
            (_, dy) if dy > 0 => Self::Down,
            (_, dy) if dy < 0 => Self::Up,
            (dx, _) if dx < 0 => Self::Left,
            _ => Self::Right,
        }
    }
}

/// Direction of a 90° rotation. `Right` is clockwise on screen (Y down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationDirection {
    Left,
    Right,
}

impl RotationDirection {
    #[must_use]
    pub fn angle_radians(self) -> f64 {
        match self {
            Self::Left => -std::f64::consts::FRAC_PI_2,
            Self::Right => std::f64::consts::FRAC_PI_2,
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// The playing field a piece collides with and eventually merges into.
///
/// A piece never owns its board: every operation that needs one borrows it
/// for the duration of the call, and the piece checks that it is the board
/// it was placed on. The notification hooks default to no-ops.
pub trait Board {
    fn id(&self) -> BoardId;

    /// Whether `pos` is free. Cells above the top edge are free; cells
    /// outside the horizontal bounds or below the bottom are not.
    fn is_cell_empty(&self, pos: CellPos) -> bool;

    /// Inclusive `(left, right)` column range of the play area.
    fn horizontal_bounds(&self) -> (i32, i32);

    fn is_below_bottom(&self, pos: CellPos) -> bool;

    /// Whether `pos` lies above the visible play area.
    fn is_above_visible(&self, pos: CellPos) -> bool;

    /// Cell where the bottom-centre of a new piece is placed.
    fn spawn_origin(&self) -> CellPos;

    /// Permanently occupies `cells` and returns the number of cleared lines.
    fn merge_piece(&mut self, piece: PieceId, shape: ShapeId, cells: &[CellPos]) -> usize;

    fn on_piece_moved(&mut self, _piece: PieceId, _direction: Direction, _commanded: bool) {}
    fn on_rotation_succeeded(&mut self, _piece: PieceId, _direction: RotationDirection) {}
    fn on_rotation_failed(&mut self, _piece: PieceId, _direction: RotationDirection) {}
    fn on_freeze_started(&mut self, _piece: PieceId) {}
    fn on_freeze_stopped(&mut self, _piece: PieceId) {}
    fn on_piece_frozen(&mut self, _piece: PieceId) {}
    fn on_piece_out_of_bounds(&mut self, _piece: PieceId) {}
    fn on_piece_discarded(&mut self, _piece: PieceId) {}
}

/// A notification delivered to a [`Board`], as recorded by [`GridBoard`].
///
/// [`GridBoard`]: super::grid_board::GridBoard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BoardEvent {
    Moved {
        piece: PieceId,
        direction: Direction,
        commanded: bool,
    },
    RotationSucceeded {
        piece: PieceId,
        direction: RotationDirection,
    },
    RotationFailed {
        piece: PieceId,
        direction: RotationDirection,
    },
    FreezeStarted {
        piece: PieceId,
    },
    FreezeStopped {
        piece: PieceId,
    },
    Frozen {
        piece: PieceId,
    },
    OutOfBounds {
        piece: PieceId,
    },
    Discarded {
        piece: PieceId,
    },
}

impl BoardEvent {
    #[must_use]
    pub fn piece(&self) -> PieceId {
        match *self {
            Self::Moved { piece, .. }
            | Self::RotationSucceeded { piece, .. }
            | Self::RotationFailed { piece, .. }
            | Self::FreezeStarted { piece }
            | Self::FreezeStopped { piece }
            | Self::Frozen { piece }
            | Self::OutOfBounds { piece }
            | Self::Discarded { piece } => piece,
        }
    }
}
