//! Core data structures of the falling-block simulation.
//!
//! - [`Block`] - a single cell of a piece, optionally the rotation origin
//! - [`ShapeCatalog`] - immutable table of shape definitions
//! - [`Board`] - the collaborator a piece is placed on
//! - [`GridBoard`] - reference board with hidden rows and line clearing
//! - [`Piece`] - the falling entity and its freeze state machine

pub use self::{block::*, board::*, grid_board::*, piece::*, shape::*};

pub(crate) mod block;
pub(crate) mod board;
pub(crate) mod grid_board;
pub(crate) mod piece;
pub(crate) mod shape;
