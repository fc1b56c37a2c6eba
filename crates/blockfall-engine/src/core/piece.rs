use std::{collections::BTreeMap, ops::Index, time::Duration};

use arrayvec::ArrayVec;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::engine::{TimerKind, TimerToken, Timers};

use super::{
    block::{Block, CellPos},
    board::{Board, BoardId, Direction, RotationDirection},
    shape::{MAX_PIECE_BLOCKS, PieceBlocks, ShapeDefinition, ShapeId},
};

type Cells = ArrayVec<CellPos, MAX_PIECE_BLOCKS>;

/// Identity of a piece, unique per factory.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("piece#{_0}")]
pub struct PieceId(pub u64);

/// Lifecycle state of a [`Piece`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "kebab-case")]
pub enum PieceState {
    /// Falling and controllable.
    Active,
    /// Blocked downward; the freeze countdown is running but the piece can
    /// still be shifted off the blocking surface.
    Freezing,
    /// Locked into the board.
    Frozen,
    /// Discarded by request; fading out.
    ThrownAway,
}

impl PieceState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Frozen | Self::ThrownAway)
    }
}

/// Gravity and freeze durations applied to a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceTiming {
    pub gravity_interval: Duration,
    /// Gravity interval while the player holds fast drop.
    pub fast_gravity_interval: Duration,
    pub freeze_duration: Duration,
}

impl Default for PieceTiming {
    fn default() -> Self {
        Self {
            gravity_interval: Duration::from_millis(1000),
            fast_gravity_interval: Duration::from_millis(50),
            freeze_duration: Duration::from_millis(500),
        }
    }
}

/// Result of a piece locking into the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeOutcome {
    pub cleared_lines: usize,
    /// Some block was above the visible area when the piece locked.
    pub out_of_bounds: bool,
}

/// Inclusive cell bounds of a set of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    fn of(mut cells: impl Iterator<Item = CellPos>) -> Self {
        let first = cells.next().expect("piece has at least one block");
        cells.fold(
            Self {
                left: first.x,
                top: first.y,
                right: first.x,
                bottom: first.y,
            },
            |b, c| Self {
                left: b.left.min(c.x),
                top: b.top.min(c.y),
                right: b.right.max(c.x),
                bottom: b.bottom.max(c.y),
            },
        )
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        (self.right - self.left).unsigned_abs() + 1
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        (self.bottom - self.top).unsigned_abs() + 1
    }
}

/// Everything needed to build a [`Piece`] of one shape.
#[derive(Debug, Clone)]
pub struct PieceTemplate {
    pub shape: ShapeId,
    pub components: PieceBlocks,
    pub rotationally_symmetric: bool,
}

impl PieceTemplate {
    /// Builds a template from a catalog definition; random shapes draw their
    /// blocks from `rng`.
    pub fn from_definition<R>(definition: &ShapeDefinition, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self {
            shape: definition.id(),
            components: definition.component_blocks(rng),
            rotationally_symmetric: definition.is_rotationally_symmetric(),
        }
    }
}

/// The falling entity.
///
/// A piece keeps an immutable component template (local offsets) and its
/// working locations (absolute cells, same order and count). Moves and
/// rotations are validated against the [`Board`] before anything is
/// committed, so a rejected attempt leaves the piece untouched.
///
/// # States
///
/// ```text
/// Active --blocked downward--> Freezing --countdown elapses--> Frozen
///   ^                             |
///   +----successful move/rotate---+
/// Active/Freezing --throw_away--> ThrownAway
/// ```
///
/// Timer-driven transitions are scheduled on [`Timers`]; the piece keeps the
/// tokens it owns. Dropping a piece that still owns pending timers panics:
/// call [`Piece::terminate`] first.
///
/// # Example
///
/// ```
/// use blockfall_engine::{
///     Block, BoardId, CellPos, GridBoard, GridBoardConfig, Piece, PieceId, PieceTemplate,
///     PieceTiming, RotationDirection, ShapeId, Timers,
/// };
///
/// let mut board = GridBoard::new(BoardId(0), GridBoardConfig::default()).unwrap();
/// let mut timers = Timers::new();
/// let template = PieceTemplate {
///     shape: ShapeId::new(1),
///     components: [(0, 0, false), (0, 1, true), (0, 2, false)]
///         .into_iter()
///         .map(|(x, y, origin)| Block::new(x, y, origin))
///         .collect(),
///     rotationally_symmetric: false,
/// };
/// let mut piece = Piece::place(
///     PieceId(0),
///     template,
///     PieceTiming::default(),
///     BoardId(0),
///     CellPos::new(4, 4),
/// );
///
/// assert!(piece.try_move(&mut board, &mut timers, 1, 0, true));
/// assert!(piece.try_rotate(&mut board, &mut timers, RotationDirection::Right));
/// assert_eq!(piece.width(), 3);
/// piece.terminate(&mut timers);
/// ```
#[derive(Debug)]
pub struct Piece {
    id: PieceId,
    shape: ShapeId,
    board: BoardId,
    components: PieceBlocks,
    locations: PieceBlocks,
    rotationally_symmetric: bool,
    state: PieceState,
    dropping_fast: bool,
    activated: bool,
    timing: PieceTiming,
    gravity_timer: Option<TimerToken>,
    freeze_timer: Option<TimerToken>,
    fade_timer: Option<TimerToken>,
}

impl Piece {
    /// Places a new piece so that its bottom-centre sits on the board's
    /// spawn origin.
    pub fn spawn<B>(id: PieceId, template: PieceTemplate, timing: PieceTiming, board: &B) -> Self
    where
        B: Board + ?Sized,
    {
        let bounds = BoundingBox::of(template.components.iter().map(Block::position));
        let spawn = board.spawn_origin();
        let top_left = CellPos::new(
            spawn.x - (bounds.right - bounds.left + 1) / 2,
            spawn.y - (bounds.bottom - bounds.top),
        );
        Self::place(id, template, timing, board.id(), top_left)
    }

    /// Places a new piece with the top-left corner of its component bounds
    /// at `top_left`.
    #[must_use]
    pub fn place(
        id: PieceId,
        template: PieceTemplate,
        timing: PieceTiming,
        board: BoardId,
        top_left: CellPos,
    ) -> Self {
        let PieceTemplate {
            shape,
            components,
            rotationally_symmetric,
        } = template;
        assert!(!components.is_empty(), "piece {id} has no blocks");

        let bounds = BoundingBox::of(components.iter().map(Block::position));
        let locations = components
            .iter()
            .map(|c| {
                let mut block = *c;
                block.set_position(
                    c.position()
                        .offset(top_left.x - bounds.left, top_left.y - bounds.top),
                );
                block
            })
            .collect();

        Self {
            id,
            shape,
            board,
            components,
            locations,
            rotationally_symmetric,
            state: PieceState::Active,
            dropping_fast: false,
            activated: false,
            timing,
            gravity_timer: None,
            freeze_timer: None,
            fade_timer: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> PieceId {
        self.id
    }

    #[must_use]
    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    #[must_use]
    pub fn board(&self) -> BoardId {
        self.board
    }

    #[must_use]
    pub fn state(&self) -> PieceState {
        self.state
    }

    #[must_use]
    pub fn is_rotationally_symmetric(&self) -> bool {
        self.rotationally_symmetric
    }

    #[must_use]
    pub fn is_dropping_fast(&self) -> bool {
        self.dropping_fast
    }

    #[must_use]
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub(crate) fn activate(&mut self) {
        self.activated = true;
    }

    #[must_use]
    pub fn timing(&self) -> PieceTiming {
        self.timing
    }

    /// Immutable component template, in local coordinates.
    #[must_use]
    pub fn components(&self) -> &[Block] {
        &self.components
    }

    /// Current blocks, in board coordinates.
    #[must_use]
    pub fn locations(&self) -> &[Block] {
        &self.locations
    }

    pub fn cells(&self) -> impl Iterator<Item = CellPos> + '_ {
        self.locations.iter().map(Block::position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Current cell of the origin block, if the piece has one.
    #[must_use]
    pub fn origin(&self) -> Option<CellPos> {
        self.locations
            .iter()
            .find(|b| b.is_origin())
            .map(Block::position)
    }

    /// Whether any timer owned by this piece is still scheduled.
    #[must_use]
    pub fn has_pending_timers(&self) -> bool {
        self.gravity_timer.is_some() || self.freeze_timer.is_some() || self.fade_timer.is_some()
    }

    fn check_board<B>(&self, board: &B)
    where
        B: Board + ?Sized,
    {
        debug_assert_eq!(
            board.id(),
            self.board,
            "{} is placed on {} but was given {}",
            self.id,
            self.board,
            board.id()
        );
    }

    fn occupies(&self, pos: CellPos) -> bool {
        self.cells().any(|c| c == pos)
    }

    /// Whether every candidate cell is inside the play area and either free
    /// or already occupied by this piece.
    pub fn fits<B>(&self, board: &B, candidates: &[CellPos]) -> bool
    where
        B: Board + ?Sized,
    {
        let (left, right) = board.horizontal_bounds();
        candidates.iter().all(|&pos| {
            (left..=right).contains(&pos.x)
                && !board.is_below_bottom(pos)
                && (self.occupies(pos) || board.is_cell_empty(pos))
        })
    }

    /// Whether the piece's current cells are all free on the board.
    pub fn is_placeable<B>(&self, board: &B) -> bool
    where
        B: Board + ?Sized,
    {
        let (left, right) = board.horizontal_bounds();
        self.cells().all(|pos| {
            (left..=right).contains(&pos.x)
                && !board.is_below_bottom(pos)
                && board.is_cell_empty(pos)
        })
    }

    fn translated(&self, dx: i32, dy: i32) -> Cells {
        self.locations
            .iter()
            .map(|b| b.location_with_offset(dx, dy))
            .collect()
    }

    #[expect(clippy::cast_possible_truncation)]
    fn rotated(&self, origin: CellPos, direction: RotationDirection) -> Cells {
        let (sin, cos) = direction.angle_radians().sin_cos();
        self.locations
            .iter()
            .map(|b| {
                let rx = f64::from(b.x() - origin.x);
                let ry = f64::from(b.y() - origin.y);
                let x = (rx * cos - ry * sin).round() as i32;
                let y = (rx * sin + ry * cos).round() as i32;
                origin.offset(x, y)
            })
            .collect()
    }

    fn commit(&mut self, candidates: &Cells) {
        debug_assert_eq!(candidates.len(), self.locations.len());
        for (block, &pos) in self.locations.iter_mut().zip(candidates) {
            block.set_position(pos);
        }
    }

    /// Moves every block by `(dx, dy)` if all target cells are free.
    ///
    /// A move blocked while heading down starts the freeze countdown
    /// (unless it is already running); blocked sideways or upward moves
    /// never do. A successful move cancels the countdown.
    pub fn try_move<B>(
        &mut self,
        board: &mut B,
        timers: &mut Timers,
        dx: i32,
        dy: i32,
        commanded: bool,
    ) -> bool
    where
        B: Board + ?Sized,
    {
        self.check_board(board);
        if self.state.is_terminal() {
            return false;
        }

        let candidates = self.translated(dx, dy);
        if !self.fits(board, &candidates) {
            trace!(piece = %self.id, dx, dy, "move blocked");
            if dy > 0 && !self.state.is_freezing() {
                self.start_freezing(board, timers);
            }
            return false;
        }

        self.commit(&candidates);
        self.stop_freezing(board, timers);
        board.on_piece_moved(self.id, Direction::from_offset(dx, dy), commanded);
        true
    }

    /// Rotates the piece 90° about its origin block if all target cells
    /// are free. Pieces without an origin never rotate.
    pub fn try_rotate<B>(
        &mut self,
        board: &mut B,
        timers: &mut Timers,
        direction: RotationDirection,
    ) -> bool
    where
        B: Board + ?Sized,
    {
        self.check_board(board);
        if self.state.is_terminal() {
            return false;
        }

        let Some(origin) = self.origin() else {
            board.on_rotation_failed(self.id, direction);
            return false;
        };
        let candidates = self.rotated(origin, direction);
        if !self.fits(board, &candidates) {
            trace!(piece = %self.id, ?direction, "rotation blocked");
            board.on_rotation_failed(self.id, direction);
            return false;
        }

        self.commit(&candidates);
        self.stop_freezing(board, timers);
        board.on_rotation_succeeded(self.id, direction);
        true
    }

    /// Moves the piece down until it is blocked.
    ///
    /// With `lock_immediately` the piece freezes at once; otherwise the
    /// freeze countdown started by the blocked move keeps running.
    pub fn drop_to_bottom<B>(
        &mut self,
        board: &mut B,
        timers: &mut Timers,
        lock_immediately: bool,
    ) -> Option<FreezeOutcome>
    where
        B: Board + ?Sized,
    {
        while self.try_move(board, timers, 0, 1, true) {}
        if lock_immediately {
            self.freeze_now(board, timers)
        } else {
            None
        }
    }

    fn start_freezing<B>(&mut self, board: &mut B, timers: &mut Timers)
    where
        B: Board + ?Sized,
    {
        self.state = PieceState::Freezing;
        self.freeze_timer = Some(timers.schedule(
            self.id,
            TimerKind::Freeze,
            self.timing.freeze_duration,
        ));
        debug!(piece = %self.id, "freeze started");
        board.on_freeze_started(self.id);
    }

    fn stop_freezing<B>(&mut self, board: &mut B, timers: &mut Timers)
    where
        B: Board + ?Sized,
    {
        if let Some(token) = self.freeze_timer.take() {
            timers.cancel(token);
        }
        if self.state.is_freezing() {
            self.state = PieceState::Active;
            debug!(piece = %self.id, "freeze stopped");
            board.on_freeze_stopped(self.id);
        }
    }

    /// Handles expiry of the freeze countdown. Tokens this piece no longer
    /// owns are ignored.
    pub fn on_freeze_elapsed<B>(&mut self, board: &mut B, token: TimerToken) -> Option<FreezeOutcome>
    where
        B: Board + ?Sized,
    {
        if self.freeze_timer != Some(token) {
            trace!(piece = %self.id, %token, "ignoring stale freeze timer");
            return None;
        }
        self.freeze_timer = None;
        Some(self.lock(board))
    }

    /// Locks the piece into the board without waiting for the countdown.
    pub fn freeze_now<B>(&mut self, board: &mut B, timers: &mut Timers) -> Option<FreezeOutcome>
    where
        B: Board + ?Sized,
    {
        self.check_board(board);
        if self.state.is_terminal() {
            return None;
        }
        if let Some(token) = self.freeze_timer.take() {
            timers.cancel(token);
        }
        Some(self.lock(board))
    }

    fn lock<B>(&mut self, board: &mut B) -> FreezeOutcome
    where
        B: Board + ?Sized,
    {
        self.check_board(board);
        self.state = PieceState::Frozen;
        let cells: Cells = self.cells().collect();
        let out_of_bounds = cells.iter().any(|&c| board.is_above_visible(c));
        let cleared_lines = board.merge_piece(self.id, self.shape, &cells);
        if out_of_bounds {
            debug!(piece = %self.id, "piece frozen out of bounds");
            board.on_piece_out_of_bounds(self.id);
        }
        debug!(piece = %self.id, cleared_lines, "piece frozen");
        board.on_piece_frozen(self.id);
        FreezeOutcome {
            cleared_lines,
            out_of_bounds,
        }
    }

    /// Interval until the next gravity tick.
    #[must_use]
    pub fn gravity_interval(&self) -> Duration {
        if self.dropping_fast {
            self.timing.fast_gravity_interval
        } else {
            self.timing.gravity_interval
        }
    }

    /// (Re)schedules the next gravity tick. Terminal pieces are not ticked.
    pub fn schedule_gravity(&mut self, timers: &mut Timers) {
        if let Some(token) = self.gravity_timer.take() {
            timers.cancel(token);
        }
        if !self.state.is_terminal() {
            self.gravity_timer =
                Some(timers.schedule(self.id, TimerKind::Gravity, self.gravity_interval()));
        }
    }

    /// Handles a gravity tick: moves one cell down and schedules the next
    /// tick. Returns whether the piece moved.
    pub fn on_gravity_tick<B>(&mut self, board: &mut B, timers: &mut Timers, token: TimerToken) -> bool
    where
        B: Board + ?Sized,
    {
        if self.gravity_timer != Some(token) {
            trace!(piece = %self.id, %token, "ignoring stale gravity timer");
            return false;
        }
        self.gravity_timer = None;
        let moved = self.try_move(board, timers, 0, 1, false);
        self.schedule_gravity(timers);
        moved
    }

    /// Switches between the normal and the fast gravity interval.
    pub fn set_dropping_fast(&mut self, timers: &mut Timers, dropping_fast: bool) {
        if self.dropping_fast == dropping_fast {
            return;
        }
        self.dropping_fast = dropping_fast;
        if self.gravity_timer.is_some() {
            self.schedule_gravity(timers);
        }
    }

    /// Discards the piece: cancels its timers and schedules the end of the
    /// fade-out. Returns `false` if the piece already reached a terminal state.
    pub fn throw_away<B>(&mut self, board: &mut B, timers: &mut Timers, fade: Duration) -> bool
    where
        B: Board + ?Sized,
    {
        self.check_board(board);
        if self.state.is_terminal() {
            return false;
        }
        self.cancel_timers(timers);
        self.state = PieceState::ThrownAway;
        self.fade_timer = Some(timers.schedule(self.id, TimerKind::DiscardFade, fade));
        debug!(piece = %self.id, "piece thrown away");
        board.on_piece_discarded(self.id);
        true
    }

    /// Handles the end of the fade-out; returns whether the token was ours.
    pub fn on_fade_elapsed(&mut self, token: TimerToken) -> bool {
        if self.fade_timer != Some(token) {
            return false;
        }
        self.fade_timer = None;
        true
    }

    fn cancel_timers(&mut self, timers: &mut Timers) {
        for token in [
            self.gravity_timer.take(),
            self.freeze_timer.take(),
            self.fade_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            timers.cancel(token);
        }
    }

    /// Releases every timer owned by the piece. Must be called before the
    /// piece is dropped.
    pub fn terminate(&mut self, timers: &mut Timers) {
        self.cancel_timers(timers);
        trace!(piece = %self.id, state = ?self.state, "piece terminated");
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::of(self.cells())
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.bounding_box().width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.bounding_box().height()
    }

    /// Longer side of the bounding box.
    #[must_use]
    pub fn span(&self) -> u32 {
        let bounds = self.bounding_box();
        bounds.width().max(bounds.height())
    }

    // Ties resolve to the first block in template order.
    fn extreme_block(&self, key: impl Fn(&Block) -> i32) -> &Block {
        self.locations
            .iter()
            .min_by_key(|b| key(b))
            .expect("piece has at least one block")
    }

    #[must_use]
    pub fn leftmost_block(&self) -> &Block {
        self.extreme_block(Block::x)
    }

    #[must_use]
    pub fn rightmost_block(&self) -> &Block {
        self.extreme_block(|b| -b.x())
    }

    #[must_use]
    pub fn topmost_block(&self) -> &Block {
        self.extreme_block(Block::y)
    }

    #[must_use]
    pub fn bottommost_block(&self) -> &Block {
        self.extreme_block(|b| -b.y())
    }

    /// For every occupied column, the lowest cell of the piece (the one
    /// facing the gravity direction), ordered by column.
    #[must_use]
    pub fn bottom_profile(&self) -> Vec<CellPos> {
        let mut lowest = BTreeMap::new();
        for pos in self.cells() {
            lowest
                .entry(pos.x)
                .and_modify(|y: &mut i32| *y = (*y).max(pos.y))
                .or_insert(pos.y);
        }
        lowest.into_iter().map(|(x, y)| CellPos::new(x, y)).collect()
    }

    /// Current cells translated so the bounding box starts at `(0, 0)`.
    #[must_use]
    pub fn normalized_locations(&self) -> Vec<CellPos> {
        normalize(&self.locations)
    }

    /// Component offsets translated so their bounding box starts at `(0, 0)`.
    #[must_use]
    pub fn normalized_components(&self) -> Vec<CellPos> {
        normalize(&self.components)
    }
}

fn normalize(blocks: &[Block]) -> Vec<CellPos> {
    let bounds = BoundingBox::of(blocks.iter().map(Block::position));
    blocks
        .iter()
        .map(|b| b.location_with_offset(-bounds.left, -bounds.top))
        .collect()
}

impl Index<usize> for Piece {
    type Output = Block;

    fn index(&self, index: usize) -> &Block {
        self.locations.get(index).unwrap_or_else(|| {
            panic!(
                "block index {index} out of range for {} with {} blocks",
                self.id,
                self.locations.len()
            )
        })
    }
}

impl Drop for Piece {
    fn drop(&mut self) {
        if self.has_pending_timers() && !std::thread::panicking() {
            panic!(
                "{} dropped with pending timers; call Piece::terminate first",
                self.id
            );
        }
    }
}
