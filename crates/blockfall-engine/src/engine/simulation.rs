use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{
    ConfigError, SpawnError,
    core::{Board, BoardId, FreezeOutcome, GridBoard, Piece, RotationDirection, ShapeCatalog},
};

use super::{
    SimulationConfig, SimulationStats,
    piece_factory::{PieceFactory, PieceSeed},
    timers::{TimerEvent, TimerKind, Timers},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Playing,
    Paused,
    GameOver,
}

/// A player command applied to the active piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Motion {
    Left,
    Right,
    Down,
    RotateLeft,
    RotateRight,
    /// Move to the bottom and let the freeze countdown run.
    Drop,
    /// Move to the bottom and lock at once.
    HardDrop,
    FastDropStart,
    FastDropStop,
    /// Throw the active piece away.
    Discard,
}

impl Motion {
    pub const ALL: [Self; 10] = [
        Self::Left,
        Self::Right,
        Self::Down,
        Self::RotateLeft,
        Self::RotateRight,
        Self::Drop,
        Self::HardDrop,
        Self::FastDropStart,
        Self::FastDropStop,
        Self::Discard,
    ];
}

/// A single-threaded simulation of one board and its active piece.
///
/// Player input and timer expiry are applied one at a time on the same
/// timeline: [`Simulation::handle_input`] acts immediately, and
/// [`Simulation::advance`] moves the simulated clock forward, firing due
/// gravity ticks, freeze expiries and fade-outs in order.
///
/// # Example
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use blockfall_engine::{Motion, PieceSeed, ShapeCatalog, Simulation, SimulationConfig};
///
/// let mut sim = Simulation::with_grid_board(
///     SimulationConfig::default(),
///     Arc::new(ShapeCatalog::embedded()),
///     PieceSeed::from_u64(1),
/// )
/// .unwrap();
/// sim.start().unwrap();
///
/// sim.handle_input(Motion::Left);
/// sim.handle_input(Motion::HardDrop);
/// sim.advance(Duration::from_secs(3));
/// assert_eq!(sim.stats().completed_pieces(), 1);
/// ```
#[derive(Debug)]
pub struct Simulation<B> {
    config: SimulationConfig,
    board: B,
    factory: PieceFactory,
    timers: Timers,
    active: Option<Piece>,
    stats: SimulationStats,
    state: SessionState,
}

impl Simulation<GridBoard> {
    /// Creates a simulation on a [`GridBoard`] sized by `config.board`.
    pub fn with_grid_board(
        config: SimulationConfig,
        catalog: Arc<ShapeCatalog>,
        seed: PieceSeed,
    ) -> Result<Self, ConfigError> {
        let board = GridBoard::new(BoardId(0), config.board)?;
        Self::new(config, catalog, board, seed)
    }
}

impl<B> Simulation<B>
where
    B: Board,
{
    pub fn new(
        config: SimulationConfig,
        catalog: Arc<ShapeCatalog>,
        board: B,
        seed: PieceSeed,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let factory = PieceFactory::with_seed(catalog, config.factory_config(), seed)?;
        Ok(Self {
            config,
            board,
            factory,
            timers: Timers::new(),
            active: None,
            stats: SimulationStats::new(),
            state: SessionState::Playing,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    #[must_use]
    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    #[must_use]
    pub fn factory(&self) -> &PieceFactory {
        &self.factory
    }

    #[must_use]
    pub fn active_piece(&self) -> Option<&Piece> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Spawns the first piece if none is active.
    pub fn start(&mut self) -> Result<(), SpawnError> {
        if self.active.is_some() || !self.state.is_playing() {
            return Ok(());
        }
        info!(board = %self.board.id(), "simulation started");
        self.spawn_next()
    }

    /// Replaces the set of accepted motions.
    pub fn set_valid_motions(&mut self, motions: Vec<Motion>) -> Result<(), ConfigError> {
        if motions.is_empty() {
            return Err(ConfigError::NoValidMotions);
        }
        self.config.valid_motions = motions;
        Ok(())
    }

    /// Starts over on a fresh board: the active piece and the lookahead
    /// queue are discarded and the counters reset. Call [`Self::start`] to
    /// spawn the first piece.
    pub fn reset(&mut self, board: B) {
        self.release_active();
        self.factory.drain();
        self.board = board;
        self.stats = SimulationStats::new();
        self.state = SessionState::Playing;
        debug!("simulation reset");
    }

    pub fn toggle_pause(&mut self) -> SessionState {
        self.state = match self.state {
            SessionState::Playing => SessionState::Paused,
            SessionState::Paused => SessionState::Playing,
            SessionState::GameOver => SessionState::GameOver,
        };
        self.state
    }

    /// Applies a player motion to the active piece. Returns whether it had
    /// an effect; motions are ignored while paused, after game over, or when
    /// they are not in the configured set of valid motions.
    pub fn handle_input(&mut self, motion: Motion) -> bool {
        if !self.state.is_playing() || !self.config.valid_motions.contains(&motion) {
            return false;
        }
        let Some(piece) = self.active.as_mut() else {
            return false;
        };
        trace!(piece = %piece.id(), ?motion, "input");

        let board = &mut self.board;
        let timers = &mut self.timers;
        let (accepted, locked) = match motion {
            Motion::Left => (piece.try_move(board, timers, -1, 0, true), None),
            Motion::Right => (piece.try_move(board, timers, 1, 0, true), None),
            Motion::Down => (piece.try_move(board, timers, 0, 1, true), None),
            Motion::RotateLeft => (
                piece.try_rotate(board, timers, RotationDirection::Left),
                None,
            ),
            Motion::RotateRight => (
                piece.try_rotate(board, timers, RotationDirection::Right),
                None,
            ),
            Motion::Drop => {
                let accepted = !piece.state().is_terminal();
                piece.drop_to_bottom(board, timers, false);
                (accepted, None)
            }
            Motion::HardDrop => {
                let outcome = piece.drop_to_bottom(board, timers, true);
                (outcome.is_some(), outcome)
            }
            Motion::FastDropStart | Motion::FastDropStop => {
                let accepted = !piece.state().is_terminal();
                if accepted {
                    piece.set_dropping_fast(timers, motion == Motion::FastDropStart);
                }
                (accepted, None)
            }
            Motion::Discard => {
                let accepted = piece.throw_away(board, timers, self.config.discard_fade);
                if accepted {
                    self.stats.discard_piece();
                }
                (accepted, None)
            }
        };

        if let Some(outcome) = locked {
            self.finish_piece(outcome);
        }
        accepted
    }

    /// Moves the simulated clock forward by `dt`, firing every timer that
    /// comes due on the way. Does nothing unless playing.
    pub fn advance(&mut self, dt: Duration) {
        if !self.state.is_playing() {
            return;
        }
        let until = self.timers.now().saturating_add(dt);
        while self.state.is_playing() {
            let Some(event) = self.timers.pop_due(until) else {
                break;
            };
            self.dispatch(event);
        }
        self.timers.advance_to(until);
    }

    fn dispatch(&mut self, event: TimerEvent) {
        let Some(piece) = self.active.as_mut() else {
            return;
        };
        if piece.id() != event.piece {
            trace!(piece = %event.piece, kind = ?event.kind, "timer for inactive piece");
            return;
        }
        match event.kind {
            TimerKind::Gravity => {
                piece.on_gravity_tick(&mut self.board, &mut self.timers, event.token);
            }
            TimerKind::Freeze => {
                if let Some(outcome) = piece.on_freeze_elapsed(&mut self.board, event.token) {
                    self.finish_piece(outcome);
                }
            }
            TimerKind::DiscardFade => {
                if piece.on_fade_elapsed(event.token) {
                    self.release_active();
                    self.spawn_after_piece();
                }
            }
        }
    }

    fn finish_piece(&mut self, outcome: FreezeOutcome) {
        self.release_active();
        self.stats.complete_piece_drop(outcome.cleared_lines);
        if outcome.out_of_bounds {
            self.state = SessionState::GameOver;
            info!(score = self.stats.score(), "piece locked out of bounds; game over");
            return;
        }
        self.spawn_after_piece();
    }

    fn spawn_after_piece(&mut self) {
        if let Err(e) = self.spawn_next() {
            info!(score = self.stats.score(), "game over: {e}");
        }
    }

    fn spawn_next(&mut self) -> Result<(), SpawnError> {
        let mut piece = self.factory.next_piece(&self.board);
        if !piece.is_placeable(&self.board) {
            self.state = SessionState::GameOver;
            return Err(SpawnError(piece.id()));
        }
        piece.schedule_gravity(&mut self.timers);
        debug!(piece = %piece.id(), shape = %piece.shape(), "spawned piece");
        self.active = Some(piece);
        Ok(())
    }

    fn release_active(&mut self) {
        if let Some(mut piece) = self.active.take() {
            piece.terminate(&mut self.timers);
        }
    }
}

impl<B> Drop for Simulation<B> {
    fn drop(&mut self) {
        if let Some(piece) = &mut self.active {
            piece.terminate(&mut self.timers);
        }
    }
}
