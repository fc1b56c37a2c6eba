use std::{collections::VecDeque, sync::Arc};

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
    seq::IndexedRandom as _,
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, trace};

use crate::{
    ConfigError,
    core::{Board, Piece, PieceId, PieceTemplate, PieceTiming, ShapeCatalog, ShapeCategory, ShapeId},
};

/// Draws spent on avoiding an excluded shape before falling back.
pub const RETRY_BUDGET: usize = 32;

/// Settings of a [`PieceFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryConfig {
    /// Depth of the lookahead queue.
    pub lookahead: usize,
    /// Categories whose shapes are eligible for random selection.
    pub enabled_categories: Vec<ShapeCategory>,
    /// Maximum number of identical shapes enqueued in a row.
    pub max_same_in_row: usize,
    pub timing: PieceTiming,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            lookahead: 3,
            enabled_categories: vec![ShapeCategory::Standard],
            max_same_in_row: 2,
            timing: PieceTiming::default(),
        }
    }
}

/// Seed for deterministic piece generation.
///
/// A 128-bit seed for the piece generator's random number generator. The
/// same seed, catalog and configuration produce the same sequence of
/// pieces. Serialized as a 32-character hex string.
///
/// # Example
///
/// ```
/// use blockfall_engine::PieceSeed;
/// use rand::Rng as _;
///
/// let seed: PieceSeed = rand::rng().random();
/// let json = serde_json::to_string(&seed).unwrap();
/// assert_eq!(json.len(), 34);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSeed([u8; 16]);

impl PieceSeed {
    /// Derives a seed from a small integer, for command lines and tests.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(u128::from(value).to_be_bytes())
    }
}

impl Serialize for PieceSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let num = u128::from_be_bytes(self.0);
        serializer.serialize_str(&format!("{num:032x}"))
    }
}

impl<'de> Deserialize<'de> for PieceSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 32 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u128::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self(num.to_be_bytes()))
    }
}

impl Distribution<PieceSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PieceSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        PieceSeed(seed)
    }
}

/// Manufactures pieces and keeps a lookahead queue of upcoming ones.
///
/// Shapes are drawn uniformly from the pool of shapes in the enabled
/// categories. When the last `max_same_in_row` enqueued shapes are all the
/// same, the next draw excludes that shape. The queue is filled lazily on
/// first access and kept at the configured depth afterwards.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use blockfall_engine::{
///     BoardId, FactoryConfig, GridBoard, GridBoardConfig, PieceFactory, PieceSeed, ShapeCatalog,
/// };
///
/// let board = GridBoard::new(BoardId(0), GridBoardConfig::default()).unwrap();
/// let mut factory = PieceFactory::with_seed(
///     Arc::new(ShapeCatalog::embedded()),
///     FactoryConfig::default(),
///     PieceSeed::from_u64(7),
/// )
/// .unwrap();
///
/// let upcoming = factory.peek_next(&board).shape();
/// let piece = factory.next_piece(&board);
/// assert_eq!(piece.shape(), upcoming);
/// assert!(piece.is_activated());
/// assert_eq!(factory.len(), 3);
/// ```
#[derive(Debug)]
pub struct PieceFactory {
    catalog: Arc<ShapeCatalog>,
    rng: Pcg32,
    config: FactoryConfig,
    pool: Vec<ShapeId>,
    queue: VecDeque<Piece>,
    recent: VecDeque<ShapeId>,
    next_id: u64,
}

impl PieceFactory {
    /// Creates a factory with a random seed.
    pub fn new(catalog: Arc<ShapeCatalog>, config: FactoryConfig) -> Result<Self, ConfigError> {
        Self::with_seed(catalog, config, rand::rng().random())
    }

    /// Like [`Self::new`], but with a specific seed for deterministic piece generation.
    pub fn with_seed(
        catalog: Arc<ShapeCatalog>,
        config: FactoryConfig,
        seed: PieceSeed,
    ) -> Result<Self, ConfigError> {
        let pool = build_pool(&catalog, &config)?;
        Ok(Self {
            catalog,
            rng: Pcg32::from_seed(seed.0),
            queue: VecDeque::with_capacity(config.lookahead + 1),
            recent: VecDeque::with_capacity(config.max_same_in_row + 1),
            config,
            pool,
            next_id: 0,
        })
    }

    /// Replaces the configuration and rebuilds the eligible pool. The queue
    /// is drained; it refills on next access.
    pub fn configure(&mut self, config: FactoryConfig) -> Result<(), ConfigError> {
        let pool = build_pool(&self.catalog, &config)?;
        self.drain();
        self.pool = pool;
        self.config = config;
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Shapes eligible for random selection.
    #[must_use]
    pub fn pool(&self) -> &[ShapeId] {
        &self.pool
    }

    /// Pieces currently waiting in the lookahead queue, head first.
    pub fn queued(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.queue.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Empties the queue and forgets the repetition history.
    pub fn drain(&mut self) {
        debug!(queued = self.queue.len(), "draining piece queue");
        self.queue.clear();
        self.recent.clear();
    }

    /// Takes the head of the queue, enqueues a replacement and returns the
    /// taken piece activated.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty after filling (should never happen).
    pub fn next_piece<B>(&mut self, board: &B) -> Piece
    where
        B: Board + ?Sized,
    {
        self.fill_queue(board);
        let mut piece = self
            .queue
            .pop_front()
            .expect("piece queue should never be empty after filling");
        self.fill_queue(board);
        piece.activate();
        debug!(piece = %piece.id(), shape = %piece.shape(), "next piece");
        piece
    }

    /// Returns the piece [`Self::next_piece`] would return.
    ///
    /// # Panics
    ///
    /// Panics if the queue is empty after filling (should never happen).
    pub fn peek_next<B>(&mut self, board: &B) -> &Piece
    where
        B: Board + ?Sized,
    {
        self.fill_queue(board);
        self.queue
            .front()
            .expect("piece queue should never be empty after filling")
    }

    fn fill_queue<B>(&mut self, board: &B)
    where
        B: Board + ?Sized,
    {
        while self.queue.len() < self.config.lookahead {
            let excluding = self.repeated_shape();
            let piece = self.create_random_piece(board, excluding);
            self.recent.push_back(piece.shape());
            while self.recent.len() > self.config.max_same_in_row {
                self.recent.pop_front();
            }
            self.queue.push_back(piece);
        }
    }

    /// The shape that filled the whole repetition window, if any.
    fn repeated_shape(&self) -> Option<ShapeId> {
        let &first = self.recent.front()?;
        (self.recent.len() >= self.config.max_same_in_row && self.recent.iter().all(|&s| s == first))
            .then_some(first)
    }

    /// Creates a piece of a shape drawn uniformly from the pool, avoiding
    /// `excluding` when possible.
    pub fn create_random_piece<B>(&mut self, board: &B, excluding: Option<ShapeId>) -> Piece
    where
        B: Board + ?Sized,
    {
        let shape = self.draw_shape(excluding);
        self.create_piece(shape, board)
    }

    fn draw_shape(&mut self, excluding: Option<ShapeId>) -> ShapeId {
        for _ in 0..RETRY_BUDGET {
            let &shape = self
                .pool
                .choose(&mut self.rng)
                .expect("shape pool is validated to be non-empty");
            if Some(shape) != excluding {
                return shape;
            }
        }
        // retry budget exhausted: take the first other shape, or give in
        let fallback = self
            .pool
            .iter()
            .copied()
            .find(|&s| Some(s) != excluding)
            .unwrap_or(self.pool[0]);
        debug!(?excluding, %fallback, "retry budget exhausted");
        fallback
    }

    /// Creates a piece of `shape` placed at the board's spawn position.
    ///
    /// # Panics
    ///
    /// Panics if `shape` is not in the catalog.
    pub fn create_piece<B>(&mut self, shape: ShapeId, board: &B) -> Piece
    where
        B: Board + ?Sized,
    {
        let definition = self
            .catalog
            .definition_for(shape)
            .unwrap_or_else(|e| panic!("corrupt piece data: {e}"));
        let template = PieceTemplate::from_definition(definition, &mut self.rng);
        let id = PieceId(self.next_id);
        self.next_id += 1;
        trace!(piece = %id, %shape, name = definition.name(), "created piece");
        Piece::spawn(id, template, self.config.timing, board)
    }
}

fn build_pool(catalog: &ShapeCatalog, config: &FactoryConfig) -> Result<Vec<ShapeId>, ConfigError> {
    if config.lookahead == 0 {
        return Err(ConfigError::ZeroLookahead);
    }
    if config.max_same_in_row == 0 {
        return Err(ConfigError::ZeroMaxSameInRow);
    }
    let pool = catalog.shapes_in(&config.enabled_categories);
    if pool.is_empty() {
        return Err(ConfigError::EmptyShapePool(config.enabled_categories.clone()));
    }
    debug!(shapes = pool.len(), categories = ?config.enabled_categories, "built shape pool");
    Ok(pool)
}
