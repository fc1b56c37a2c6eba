//! Simulation logic driving the core data structures.
//!
//! - [`Timers`] - cancellable events on a simulated clock
//! - [`PieceFactory`] - lookahead queue with anti-repetition
//! - [`PieceSeed`] - seed for deterministic piece generation
//! - [`Simulation`] - one board, its active piece, input and gravity
//! - [`SimulationConfig`] - serde-loadable settings
//! - [`SimulationStats`] - score, cleared lines and piece counters
//!
//! # Flow
//!
//! 1. Build a [`Simulation`] from a [`SimulationConfig`], a shape catalog
//!    and a seed, then [`Simulation::start`] it
//! 2. Feed player [`Motion`]s and advance the clock
//! 3. Gravity moves the piece down; once blocked it freezes and locks
//! 4. Lines are cleared and the next queued piece spawns
//! 5. Repeat until a piece locks above the visible area or cannot spawn

pub use self::{config::*, piece_factory::*, simulation::*, stats::*, timers::*};

mod config;
mod piece_factory;
mod serde_duration;
mod simulation;
mod stats;
mod timers;
