use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::ConfigError;

use super::{
    block::CellPos,
    board::{Board, BoardEvent, BoardId, Direction, RotationDirection},
    piece::PieceId,
    shape::ShapeId,
};

/// Dimensions of a [`GridBoard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridBoardConfig {
    /// Number of columns.
    pub width: u16,
    /// Number of visible rows.
    pub height: u16,
    /// Rows above the visible area where pieces spawn.
    pub hidden_rows: u16,
    /// Number of most recent notifications kept in the event log; `0`
    /// disables recording.
    pub event_log_capacity: usize,
}

impl Default for GridBoardConfig {
    fn default() -> Self {
        Self {
            width: 10,
            height: 20,
            hidden_rows: 4,
            event_log_capacity: 1024,
        }
    }
}

impl GridBoardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyBoard {
                width: usize::from(self.width),
                height: usize::from(self.height),
            });
        }
        Ok(())
    }
}

/// A single cell of a [`GridBoard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    /// Locked block of a frozen piece of the given shape.
    Locked(ShapeId),
}

impl Cell {
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

/// Cell-by-cell reference implementation of [`Board`].
///
/// # Layout
///
/// - Columns `0..width`, visible rows `0..height` (Y grows downward)
/// - `hidden_rows` rows with negative Y sit above the visible area; a piece
///   frozen with any block there is out of bounds
/// - Cells above the hidden rows are always free, cells outside the columns
///   or below the last row never are
///
/// Notifications received from pieces are appended to an event log that
/// keeps the last `event_log_capacity` entries.
///
/// # Example
///
/// ```
/// use blockfall_engine::{Board, BoardId, CellPos, GridBoard, GridBoardConfig};
///
/// let board = GridBoard::new(BoardId(0), GridBoardConfig::default()).unwrap();
/// assert_eq!(board.horizontal_bounds(), (0, 9));
/// assert!(board.is_cell_empty(CellPos::new(0, 19)));
/// assert!(board.is_below_bottom(CellPos::new(0, 20)));
/// assert!(board.is_above_visible(CellPos::new(0, -1)));
/// ```
#[derive(Debug, Clone)]
pub struct GridBoard {
    id: BoardId,
    width: i32,
    height: i32,
    hidden_rows: i32,
    rows: Vec<Vec<Cell>>,
    events: VecDeque<BoardEvent>,
    event_log_capacity: usize,
}

impl GridBoard {
    pub fn new(id: BoardId, config: GridBoardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let total_rows = usize::from(config.height) + usize::from(config.hidden_rows);
        Ok(Self {
            id,
            width: i32::from(config.width),
            height: i32::from(config.height),
            hidden_rows: i32::from(config.hidden_rows),
            rows: vec![vec![Cell::Empty; usize::from(config.width)]; total_rows],
            events: VecDeque::with_capacity(config.event_log_capacity.min(1024)),
            event_log_capacity: config.event_log_capacity,
        })
    }

    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[must_use]
    pub fn hidden_rows(&self) -> i32 {
        self.hidden_rows
    }

    fn index(&self, pos: CellPos) -> Option<(usize, usize)> {
        let x = usize::try_from(pos.x).ok().filter(|_| pos.x < self.width)?;
        let y = usize::try_from(pos.y + self.hidden_rows)
            .ok()
            .filter(|_| pos.y < self.height)?;
        Some((x, y))
    }

    /// Returns the cell at `pos`, or `None` outside the stored rows.
    #[must_use]
    pub fn cell(&self, pos: CellPos) -> Option<Cell> {
        self.index(pos).map(|(x, y)| self.rows[y][x])
    }

    /// Overwrites a stored cell. Positions outside the stored rows are ignored.
    pub fn set_cell(&mut self, pos: CellPos, cell: Cell) {
        if let Some((x, y)) = self.index(pos) {
            self.rows[y][x] = cell;
        }
    }

    /// Returns an iterator over the visible rows, top to bottom.
    pub fn visible_rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows[self.hidden_rows.unsigned_abs() as usize..]
            .iter()
            .map(Vec::as_slice)
    }

    /// Recorded notifications, oldest first.
    #[must_use]
    pub fn events(&self) -> &VecDeque<BoardEvent> {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<BoardEvent> {
        self.events.drain(..).collect()
    }

    fn record(&mut self, event: BoardEvent) {
        trace!(board = %self.id, piece = %event.piece(), ?event, "board event");
        if self.event_log_capacity == 0 {
            return;
        }
        if self.events.len() == self.event_log_capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Renders the visible rows as text, `#` for locked cells and `@` for
    /// `overlay` cells (typically the active piece).
    #[must_use]
    pub fn render(&self, overlay: &[CellPos]) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .map(|x| {
                        let pos = CellPos::new(x, y);
                        if overlay.contains(&pos) {
                            '@'
                        } else if self.cell(pos).is_some_and(|c| !c.is_empty()) {
                            '#'
                        } else {
                            '.'
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Clears filled lines and returns the number of lines cleared.
    ///
    /// A line is filled when all of its cells are locked. Cleared lines are
    /// removed and rows above shift down.
    pub fn clear_lines(&mut self) -> usize {
        let mut count = 0;
        for y in (0..self.rows.len()).rev() {
            if self.rows[y].iter().all(|c| !c.is_empty()) {
                count += 1;
                continue;
            }
            if count > 0 {
                self.rows.swap(y, y + count);
            }
        }
        for row in &mut self.rows[..count] {
            row.fill(Cell::Empty);
        }
        count
    }
}

impl Board for GridBoard {
    fn id(&self) -> BoardId {
        self.id
    }

    fn is_cell_empty(&self, pos: CellPos) -> bool {
        if pos.x < 0 || pos.x >= self.width || pos.y >= self.height {
            return false;
        }
        self.cell(pos).is_none_or(Cell::is_empty)
    }

    fn horizontal_bounds(&self) -> (i32, i32) {
        (0, self.width - 1)
    }

    fn is_below_bottom(&self, pos: CellPos) -> bool {
        pos.y >= self.height
    }

    fn is_above_visible(&self, pos: CellPos) -> bool {
        pos.y < 0
    }

    fn spawn_origin(&self) -> CellPos {
        CellPos::new(self.width / 2, -1)
    }

    fn merge_piece(&mut self, piece: PieceId, shape: ShapeId, cells: &[CellPos]) -> usize {
        for &pos in cells {
            self.set_cell(pos, Cell::Locked(shape));
        }
        let cleared = self.clear_lines();
        debug!(%piece, %shape, cleared, "merged piece into board");
        cleared
    }

    fn on_piece_moved(&mut self, piece: PieceId, direction: Direction, commanded: bool) {
        self.record(BoardEvent::Moved {
            piece,
            direction,
            commanded,
        });
    }

    fn on_rotation_succeeded(&mut self, piece: PieceId, direction: RotationDirection) {
        self.record(BoardEvent::RotationSucceeded { piece, direction });
    }

    fn on_rotation_failed(&mut self, piece: PieceId, direction: RotationDirection) {
        self.record(BoardEvent::RotationFailed { piece, direction });
    }

    fn on_freeze_started(&mut self, piece: PieceId) {
        self.record(BoardEvent::FreezeStarted { piece });
    }

    fn on_freeze_stopped(&mut self, piece: PieceId) {
        self.record(BoardEvent::FreezeStopped { piece });
    }

    fn on_piece_frozen(&mut self, piece: PieceId) {
        self.record(BoardEvent::Frozen { piece });
    }

    fn on_piece_out_of_bounds(&mut self, piece: PieceId) {
        self.record(BoardEvent::OutOfBounds { piece });
    }

    fn on_piece_discarded(&mut self, piece: PieceId) {
        self.record(BoardEvent::Discarded { piece });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: ShapeId = ShapeId::new(1);

    fn board() -> GridBoard {
        GridBoard::new(BoardId(0), GridBoardConfig::default()).unwrap()
    }

    fn fill_row(board: &mut GridBoard, y: i32, width: i32) {
        for x in 0..width {
            board.set_cell(CellPos::new(x, y), Cell::Locked(SHAPE));
        }
    }

    #[test]
    fn test_initial_board() {
        let board = board();
        for y in -board.hidden_rows()..board.height() {
            for x in 0..board.width() {
                let pos = CellPos::new(x, y);
                assert!(board.is_cell_empty(pos), "cell {pos} should be empty");
            }
        }
        assert_eq!(board.visible_rows().count(), 20);
    }

    #[test]
    fn test_cells_outside_the_grid() {
        let board = board();
        assert!(!board.is_cell_empty(CellPos::new(-1, 0)));
        assert!(!board.is_cell_empty(CellPos::new(10, 0)));
        assert!(!board.is_cell_empty(CellPos::new(0, 20)));
        assert!(board.is_cell_empty(CellPos::new(0, -100)));
        assert_eq!(board.cell(CellPos::new(0, -100)), None);
    }

    #[test]
    fn test_zero_sized_board_is_rejected() {
        let config = GridBoardConfig {
            width: 0,
            ..GridBoardConfig::default()
        };
        assert_eq!(
            GridBoard::new(BoardId(0), config).unwrap_err(),
            ConfigError::EmptyBoard {
                width: 0,
                height: 20
            }
        );
    }

    #[test]
    fn test_merge_piece_locks_cells() {
        let mut board = board();
        let cells = [CellPos::new(0, 19), CellPos::new(1, 19), CellPos::new(0, -2)];
        let cleared = board.merge_piece(PieceId(1), SHAPE, &cells);
        assert_eq!(cleared, 0);
        for pos in cells {
            assert_eq!(board.cell(pos), Some(Cell::Locked(SHAPE)));
            assert!(!board.is_cell_empty(pos));
        }
    }

    #[test]
    fn test_clear_lines_basic() {
        let mut board = board();
        fill_row(&mut board, 19, 10);
        board.set_cell(CellPos::new(3, 18), Cell::Locked(SHAPE));

        assert_eq!(board.clear_lines(), 1);
        assert_eq!(board.cell(CellPos::new(3, 19)), Some(Cell::Locked(SHAPE)));
        assert_eq!(board.cell(CellPos::new(3, 18)), Some(Cell::Empty));
    }

    #[test]
    fn test_clear_lines_non_consecutive() {
        let mut board = board();
        fill_row(&mut board, 19, 10);
        board.set_cell(CellPos::new(0, 18), Cell::Locked(SHAPE));
        fill_row(&mut board, 17, 10);
        board.set_cell(CellPos::new(5, 16), Cell::Locked(SHAPE));

        assert_eq!(board.clear_lines(), 2);
        assert_eq!(board.cell(CellPos::new(0, 19)), Some(Cell::Locked(SHAPE)));
        assert_eq!(board.cell(CellPos::new(5, 18)), Some(Cell::Locked(SHAPE)));
        assert_eq!(board.cell(CellPos::new(0, 18)), Some(Cell::Empty));
        assert_eq!(board.cell(CellPos::new(5, 17)), Some(Cell::Empty));
    }

    #[test]
    fn test_clear_lines_with_partial_lines() {
        let mut board = board();
        fill_row(&mut board, 19, 9);
        assert_eq!(board.clear_lines(), 0);
        assert_eq!(
            board
                .visible_rows()
                .last()
                .unwrap()
                .iter()
                .filter(|c| !c.is_empty())
                .count(),
            9
        );
    }

    #[test]
    fn test_render_with_overlay() {
        let config = GridBoardConfig {
            width: 3,
            height: 2,
            hidden_rows: 1,
            ..GridBoardConfig::default()
        };
        let mut board = GridBoard::new(BoardId(0), config).unwrap();
        board.set_cell(CellPos::new(0, 1), Cell::Locked(SHAPE));
        let rendered = board.render(&[CellPos::new(2, 0)]);
        assert_eq!(rendered, vec!["..@".to_owned(), "#..".to_owned()]);
    }

    #[test]
    fn test_notifications_are_logged() {
        let mut board = board();
        board.on_freeze_started(PieceId(3));
        board.on_piece_frozen(PieceId(3));
        assert_eq!(
            board.take_events(),
            vec![
                BoardEvent::FreezeStarted { piece: PieceId(3) },
                BoardEvent::Frozen { piece: PieceId(3) },
            ]
        );
        assert!(board.events().is_empty());
    }

    #[test]
    fn test_event_log_keeps_most_recent_entries() {
        let config = GridBoardConfig {
            event_log_capacity: 3,
            ..GridBoardConfig::default()
        };
        let mut board = GridBoard::new(BoardId(0), config).unwrap();
        for id in 0..10 {
            board.on_piece_frozen(PieceId(id));
        }
        assert_eq!(
            board.take_events(),
            vec![
                BoardEvent::Frozen { piece: PieceId(7) },
                BoardEvent::Frozen { piece: PieceId(8) },
                BoardEvent::Frozen { piece: PieceId(9) },
            ]
        );
    }

    #[test]
    fn test_event_log_can_be_disabled() {
        let config = GridBoardConfig {
            event_log_capacity: 0,
            ..GridBoardConfig::default()
        };
        let mut board = GridBoard::new(BoardId(0), config).unwrap();
        board.on_freeze_started(PieceId(1));
        board.on_piece_discarded(PieceId(1));
        assert!(board.events().is_empty());
    }
}
