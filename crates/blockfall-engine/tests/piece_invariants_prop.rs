//! Property tests for piece movement, the factory queue and full rollouts.
//!
//! Invariants covered:
//! - Four successful rotations in one direction restore every block.
//! - The origin block never moves during a rotation.
//! - Moves and rotations either commit every block or none.
//! - The factory never enqueues more identical shapes in a row than allowed,
//!   and keeps its queue at the configured depth.
//! - During a rollout the active piece never overlaps locked cells.

use std::sync::{Arc, LazyLock};

use blockfall_engine::{
    Board as _, BoardId, Cell, CellPos, FactoryConfig, GridBoard, GridBoardConfig, Motion, Piece,
    PieceFactory, PieceId, PieceSeed, PieceTemplate, PieceTiming, RotationDirection,
    ShapeCatalog, ShapeCategory, Simulation, SimulationConfig, Timers,
};
use proptest::prelude::*;
use rand::{SeedableRng as _, rngs::StdRng};

static CATALOG: LazyLock<Arc<ShapeCatalog>> = LazyLock::new(|| Arc::new(ShapeCatalog::embedded()));

fn open_board() -> GridBoard {
    GridBoard::new(
        BoardId(0),
        GridBoardConfig {
            width: 30,
            height: 30,
            hidden_rows: 0,
            ..GridBoardConfig::default()
        },
    )
    .unwrap()
}

fn place(index: usize, seed: u64, at: CellPos) -> Piece {
    let definition = CATALOG.iter().nth(index % CATALOG.len()).unwrap();
    let template = PieceTemplate::from_definition(definition, &mut StdRng::seed_from_u64(seed));
    Piece::place(PieceId(0), template, PieceTiming::default(), BoardId(0), at)
}

fn cells(piece: &Piece) -> Vec<CellPos> {
    piece.cells().collect()
}

fn direction(right: bool) -> RotationDirection {
    if right {
        RotationDirection::Right
    } else {
        RotationDirection::Left
    }
}

proptest! {
    #[test]
    fn four_rotations_restore_the_piece(
        index in 0usize..64,
        seed in any::<u64>(),
        x in 10i32..=12,
        y in 10i32..=12,
        right in any::<bool>(),
    ) {
        let mut board = open_board();
        let mut timers = Timers::new();
        let mut piece = place(index, seed, CellPos::new(x, y));
        prop_assume!(piece.origin().is_some());

        let before = cells(&piece);
        let origin = piece.origin();
        for _ in 0..4 {
            assert!(piece.try_rotate(&mut board, &mut timers, direction(right)));
            assert_eq!(piece.origin(), origin);
            assert_eq!(piece.len(), before.len());
        }
        assert_eq!(cells(&piece), before);
    }

    #[test]
    fn moves_and_rotations_are_all_or_nothing(
        index in 0usize..64,
        seed in any::<u64>(),
        obstacles in prop::collection::vec((0i32..30, 0i32..30), 0..150),
        ops in prop::collection::vec(0u8..6, 1..60),
    ) {
        let mut board = open_board();
        let mut timers = Timers::new();
        let mut piece = place(index, seed, CellPos::new(10, 10));
        let start = cells(&piece);
        for (x, y) in obstacles {
            let pos = CellPos::new(x, y);
            if !start.contains(&pos) {
                board.set_cell(pos, Cell::Locked(piece.shape()));
            }
        }

        for op in ops {
            let before = cells(&piece);
            let origin = piece.origin();
            let committed = match op {
                0 => piece.try_move(&mut board, &mut timers, -1, 0, true),
                1 => piece.try_move(&mut board, &mut timers, 1, 0, true),
                2 => piece.try_move(&mut board, &mut timers, 0, 1, true),
                3 => piece.try_move(&mut board, &mut timers, 0, -1, true),
                4 => piece.try_rotate(&mut board, &mut timers, RotationDirection::Left),
                _ => piece.try_rotate(&mut board, &mut timers, RotationDirection::Right),
            };
            let after = cells(&piece);
            if committed {
                let (left, right) = board.horizontal_bounds();
                for pos in &after {
                    assert!((left..=right).contains(&pos.x), "{pos} out of bounds");
                    assert!(!board.is_below_bottom(*pos));
                    assert!(board.is_cell_empty(*pos), "{pos} is occupied");
                }
                if op >= 4 {
                    assert_eq!(piece.origin(), origin);
                }
            } else {
                assert_eq!(after, before);
            }
        }
        piece.terminate(&mut timers);
    }

    #[test]
    fn factory_respects_repetition_limit_and_depth(
        seed in any::<u64>(),
        categories in prop::sample::subsequence(ShapeCategory::ALL.to_vec(), 1..=7),
        max_same_in_row in 1usize..4,
        lookahead in 1usize..6,
        draws in 1usize..120,
    ) {
        let board = GridBoard::new(BoardId(0), GridBoardConfig::default()).unwrap();
        let mut factory = PieceFactory::with_seed(
            Arc::clone(&CATALOG),
            FactoryConfig {
                lookahead,
                enabled_categories: categories,
                max_same_in_row,
                ..FactoryConfig::default()
            },
            PieceSeed::from_u64(seed),
        )
        .unwrap();

        let mut run = 0;
        let mut last = None;
        for _ in 0..draws {
            let piece = factory.next_piece(&board);
            assert_eq!(factory.len(), lookahead);
            assert!(factory.pool().contains(&piece.shape()));
            run = if last == Some(piece.shape()) { run + 1 } else { 1 };
            last = Some(piece.shape());
            assert!(run <= max_same_in_row, "{run} identical shapes in a row");
        }
    }

    #[test]
    fn rollout_keeps_active_piece_off_locked_cells(
        seed in any::<u64>(),
        steps in prop::collection::vec((0usize..Motion::ALL.len(), 0u64..400), 1..150),
    ) {
        let config = SimulationConfig {
            enabled_categories: ShapeCategory::ALL.to_vec(),
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::with_grid_board(
            config,
            Arc::clone(&CATALOG),
            PieceSeed::from_u64(seed),
        )
        .unwrap();
        sim.start().unwrap();

        let mut finished = 0;
        for (motion, millis) in steps {
            sim.handle_input(Motion::ALL[motion]);
            sim.advance(std::time::Duration::from_millis(millis));

            let stats = sim.stats();
            let total = stats.completed_pieces() + stats.discarded_pieces();
            assert!(total >= finished);
            finished = total;

            if sim.state().is_game_over() {
                break;
            }
            let piece = sim.active_piece().unwrap();
            if !piece.state().is_terminal() {
                for pos in piece.cells() {
                    assert!(
                        !matches!(sim.board().cell(pos), Some(Cell::Locked(_))),
                        "{pos} overlaps a locked cell"
                    );
                }
            }
        }
    }
}
