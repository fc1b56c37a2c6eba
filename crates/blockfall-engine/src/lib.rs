pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;

/// A shape identifier that is absent from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("shape definition not found: {_0}")]
pub struct DefinitionNotFound(#[error(not(source))] pub ShapeId);

/// Errors raised while loading a shape catalog.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CatalogError {
    #[display("failed to parse shape catalog: {_0}")]
    Parse(serde_json::Error),
    #[display("duplicate shape id {_0}")]
    DuplicateId(#[error(not(source))] ShapeId),
    #[display("duplicate shape name {_0:?}")]
    DuplicateName(#[error(not(source))] String),
    #[display("shape {name:?} must define exactly one of `rows` or `random`")]
    AmbiguousBlocks { name: String },
    #[display("shape {name:?} has no blocks")]
    NoBlocks { name: String },
    #[display("shape {name:?} has {count} blocks, at most {max} are supported")]
    TooManyBlocks {
        name: String,
        count: usize,
        max: usize,
    },
    #[display("shape {name:?} has {count} origin blocks, at most one is allowed")]
    MultipleOrigins { name: String, count: usize },
    #[display("shape {name:?} has an unexpected character {found:?} in its rows")]
    InvalidCell { name: String, found: char },
    #[display("random shape {name:?} cannot place {count} distinct blocks in a {side}x{side} square")]
    RandomSquareTooSmall { name: String, side: u8, count: u8 },
}

/// Errors raised when a configuration cannot drive a simulation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("no shapes are eligible for the enabled categories {_0:?}")]
    EmptyShapePool(#[error(not(source))] Vec<ShapeCategory>),
    #[display("lookahead queue must hold at least one piece")]
    ZeroLookahead,
    #[display("maximum same pieces in a row must be at least one")]
    ZeroMaxSameInRow,
    #[display("list of valid motions is empty")]
    NoValidMotions,
    #[display("{_0} must be longer than zero")]
    ZeroInterval(#[error(not(source))] &'static str),
    #[display("board must be at least 1x1, got {width}x{height}")]
    EmptyBoard { width: usize, height: usize },
}

/// The freshly spawned piece overlaps occupied cells.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("{_0} collides with occupied cells at its spawn position")]
pub struct SpawnError(#[error(not(source))] pub PieceId);
