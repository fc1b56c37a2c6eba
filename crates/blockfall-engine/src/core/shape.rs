use std::collections::HashMap;

use arrayvec::ArrayVec;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CatalogError, DefinitionNotFound};

use super::block::{Block, CellPos};

/// Largest number of blocks a single piece may consist of.
pub const MAX_PIECE_BLOCKS: usize = 16;

/// Fixed-capacity block list of a piece.
pub type PieceBlocks = ArrayVec<Block, MAX_PIECE_BLOCKS>;

const EMBEDDED_CATALOG: &str = include_str!("../../data/shapes.json");

/// Identifier of a shape in the [`ShapeCatalog`].
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
#[serde(transparent)]
pub struct ShapeId(u16);

impl ShapeId {
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

/// Group a shape belongs to; random selection is restricted to enabled groups.
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
#[serde(rename_all = "kebab-case")]
pub enum ShapeCategory {
    Standard,
    NonStandard,
    Big,
    PiecesWithGaps,
    Random,
    Malicious,
    Test,
}

impl ShapeCategory {
    pub const ALL: [Self; 7] = [
        Self::Standard,
        Self::NonStandard,
        Self::Big,
        Self::PiecesWithGaps,
        Self::Random,
        Self::Malicious,
        Self::Test,
    ];

    /// Returns the kebab-case name used in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::NonStandard => "non-standard",
            Self::Big => "big",
            Self::PiecesWithGaps => "pieces-with-gaps",
            Self::Random => "random",
            Self::Malicious => "malicious",
            Self::Test => "test",
        }
    }

    /// Parses a kebab-case category name.
    ///
    /// ```
    /// use blockfall_engine::ShapeCategory;
    ///
    /// assert_eq!(ShapeCategory::from_name("big"), Some(ShapeCategory::Big));
    /// assert_eq!(ShapeCategory::from_name("huge"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Offset of one block relative to a shape's local origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOffset {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub origin: bool,
}

/// Where the blocks of a shape come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeBlocks {
    /// Fixed offsets, in definition order.
    Fixed(ArrayVec<BlockOffset, MAX_PIECE_BLOCKS>),
    /// `count` distinct cells drawn from a `side`×`side` square each time a
    /// piece is built; the first drawn cell is the origin.
    RandomSquare { side: u8, count: u8 },
}

/// Immutable catalog entry describing a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDefinition {
    id: ShapeId,
    name: String,
    category: ShapeCategory,
    blocks: ShapeBlocks,
    rotationally_symmetric: bool,
    wide_orientation_count: u8,
    thin_orientation_count: u8,
}

impl ShapeDefinition {
    #[must_use]
    pub fn id(&self) -> ShapeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn category(&self) -> ShapeCategory {
        self.category
    }

    #[must_use]
    pub fn blocks(&self) -> &ShapeBlocks {
        &self.blocks
    }

    #[must_use]
    pub fn is_rotationally_symmetric(&self) -> bool {
        self.rotationally_symmetric
    }

    /// Number of 90° rotations until the widest silhouette is shown.
    #[must_use]
    pub fn wide_orientation_count(&self) -> u8 {
        self.wide_orientation_count
    }

    /// Number of 90° rotations until the thinnest silhouette is shown.
    #[must_use]
    pub fn thin_orientation_count(&self) -> u8 {
        self.thin_orientation_count
    }

    /// Builds a fresh component template for a new piece of this shape.
    pub fn component_blocks<R>(&self, rng: &mut R) -> PieceBlocks
    where
        R: Rng + ?Sized,
    {
        match &self.blocks {
            ShapeBlocks::Fixed(offsets) => offsets
                .iter()
                .map(|o| Block::new(o.x, o.y, o.origin))
                .collect(),
            ShapeBlocks::RandomSquare { side, count } => {
                let side = usize::from(*side);
                rand::seq::index::sample(rng, side * side, usize::from(*count))
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| Block::at(square_cell(cell, side), i == 0))
                    .collect()
            }
        }
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn square_cell(index: usize, side: usize) -> CellPos {
    CellPos::new((index % side) as i32, (index / side) as i32)
}

/// Serialized form of a catalog entry.
///
/// Fixed shapes are drawn as rows of characters: `#` is a block, `O` is the
/// origin block and `.` or a space is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShapeRecord {
    id: ShapeId,
    name: String,
    category: ShapeCategory,
    #[serde(default)]
    rows: Option<Vec<String>>,
    #[serde(default)]
    random: Option<RandomSquareRecord>,
    #[serde(default)]
    symmetric: bool,
    #[serde(default)]
    wide_orientation_count: u8,
    #[serde(default)]
    thin_orientation_count: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RandomSquareRecord {
    side: u8,
    count: u8,
}

impl TryFrom<ShapeRecord> for ShapeDefinition {
    type Error = CatalogError;

    fn try_from(record: ShapeRecord) -> Result<Self, Self::Error> {
        let ShapeRecord {
            id,
            name,
            category,
            rows,
            random,
            symmetric,
            wide_orientation_count,
            thin_orientation_count,
        } = record;

        let blocks = match (rows, random) {
            (Some(rows), None) => ShapeBlocks::Fixed(parse_rows(&name, &rows)?),
            (None, Some(RandomSquareRecord { side, count })) => {
                if count == 0 {
                    return Err(CatalogError::NoBlocks { name });
                }
                if usize::from(count) > MAX_PIECE_BLOCKS {
                    return Err(CatalogError::TooManyBlocks {
                        name,
                        count: usize::from(count),
                        max: MAX_PIECE_BLOCKS,
                    });
                }
                if usize::from(count) > usize::from(side) * usize::from(side) {
                    return Err(CatalogError::RandomSquareTooSmall { name, side, count });
                }
                ShapeBlocks::RandomSquare { side, count }
            }
            _ => return Err(CatalogError::AmbiguousBlocks { name }),
        };

        Ok(Self {
            id,
            name,
            category,
            blocks,
            rotationally_symmetric: symmetric,
            wide_orientation_count,
            thin_orientation_count,
        })
    }
}

fn parse_rows(
    name: &str,
    rows: &[String],
) -> Result<ArrayVec<BlockOffset, MAX_PIECE_BLOCKS>, CatalogError> {
    let mut offsets = Vec::new();
    for (y, row) in (0..).zip(rows) {
        for (x, c) in (0..).zip(row.chars()) {
            match c {
                '#' => offsets.push(BlockOffset { x, y, origin: false }),
                'O' => offsets.push(BlockOffset { x, y, origin: true }),
                '.' | ' ' => {}
                found => {
                    return Err(CatalogError::InvalidCell {
                        name: name.to_owned(),
                        found,
                    });
                }
            }
        }
    }

    if offsets.is_empty() {
        return Err(CatalogError::NoBlocks {
            name: name.to_owned(),
        });
    }
    let origins = offsets.iter().filter(|o| o.origin).count();
    if origins > 1 {
        return Err(CatalogError::MultipleOrigins {
            name: name.to_owned(),
            count: origins,
        });
    }
    if offsets.len() > MAX_PIECE_BLOCKS {
        return Err(CatalogError::TooManyBlocks {
            name: name.to_owned(),
            count: offsets.len(),
            max: MAX_PIECE_BLOCKS,
        });
    }
    Ok(offsets.into_iter().collect())
}

/// Immutable table of shape definitions, looked up by id or name.
///
/// The table is loaded once (from the embedded JSON data or a caller-supplied
/// document) and shared read-only by every factory that draws from it.
///
/// # Example
///
/// ```
/// use blockfall_engine::{ShapeCatalog, ShapeCategory};
///
/// let catalog = ShapeCatalog::embedded();
/// let t = catalog.definition_by_name("T").unwrap();
/// assert_eq!(t.category(), ShapeCategory::Standard);
/// assert_eq!(catalog.group_of("T"), Some(ShapeCategory::Standard));
/// ```
#[derive(Debug, Clone)]
pub struct ShapeCatalog {
    shapes: Vec<ShapeDefinition>,
    by_id: HashMap<ShapeId, usize>,
    by_name: HashMap<String, usize>,
}

impl ShapeCatalog {
    /// Returns the built-in catalog.
    ///
    /// # Panics
    ///
    /// Panics if the embedded data is corrupt.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_json_str(EMBEDDED_CATALOG)
            .unwrap_or_else(|e| panic!("embedded shape catalog is corrupt: {e}"))
    }

    /// Parses and validates a JSON array of shape records.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let records: Vec<ShapeRecord> = serde_json::from_str(json).map_err(CatalogError::Parse)?;
        let shapes = records
            .into_iter()
            .map(ShapeDefinition::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_definitions(shapes)
    }

    fn from_definitions(shapes: Vec<ShapeDefinition>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(shapes.len());
        let mut by_name = HashMap::with_capacity(shapes.len());
        for (index, shape) in shapes.iter().enumerate() {
            if by_id.insert(shape.id, index).is_some() {
                return Err(CatalogError::DuplicateId(shape.id));
            }
            if by_name.insert(shape.name.clone(), index).is_some() {
                return Err(CatalogError::DuplicateName(shape.name.clone()));
            }
        }
        debug!(shapes = shapes.len(), "loaded shape catalog");
        Ok(Self {
            shapes,
            by_id,
            by_name,
        })
    }

    pub fn definition_for(&self, id: ShapeId) -> Result<&ShapeDefinition, DefinitionNotFound> {
        self.by_id
            .get(&id)
            .map(|&index| &self.shapes[index])
            .ok_or(DefinitionNotFound(id))
    }

    #[must_use]
    pub fn definition_by_name(&self, name: &str) -> Option<&ShapeDefinition> {
        self.by_name.get(name).map(|&index| &self.shapes[index])
    }

    /// Returns the category of the named shape, or `None` if it is unknown.
    #[must_use]
    pub fn group_of(&self, name: &str) -> Option<ShapeCategory> {
        self.definition_by_name(name).map(ShapeDefinition::category)
    }

    /// Returns the ids of every shape in one of `categories`, in catalog order.
    #[must_use]
    pub fn shapes_in(&self, categories: &[ShapeCategory]) -> Vec<ShapeId> {
        self.shapes
            .iter()
            .filter(|s| categories.contains(&s.category))
            .map(|s| s.id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShapeDefinition> + '_ {
        self.shapes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    fn offsets(def: &ShapeDefinition) -> Vec<(i32, i32, bool)> {
        let ShapeBlocks::Fixed(offsets) = def.blocks() else {
            panic!("{} is not a fixed shape", def.name());
        };
        offsets.iter().map(|o| (o.x, o.y, o.origin)).collect()
    }

    #[test]
    fn test_embedded_catalog_loads() {
        let catalog = ShapeCatalog::embedded();
        assert!(!catalog.is_empty());
        for category in ShapeCategory::ALL {
            assert!(
                !catalog.shapes_in(&[category]).is_empty(),
                "category {category} has no shapes"
            );
        }
    }

    #[test]
    fn test_embedded_standard_shapes_have_one_origin() {
        let catalog = ShapeCatalog::embedded();
        for id in catalog.shapes_in(&[ShapeCategory::Standard]) {
            let def = catalog.definition_for(id).unwrap();
            let origins = offsets(def).iter().filter(|o| o.2).count();
            assert_eq!(origins, 1, "{} should rotate about one origin", def.name());
        }
    }

    #[test]
    fn test_rows_are_parsed_in_reading_order() {
        let json = r##"[{ "id": 1, "name": "T", "category": "standard", "rows": [".#.", "#O#"] }]"##;
        let catalog = ShapeCatalog::from_json_str(json).unwrap();
        let def = catalog.definition_for(ShapeId::new(1)).unwrap();
        assert_eq!(
            offsets(def),
            vec![(1, 0, false), (0, 1, false), (1, 1, true), (2, 1, false)]
        );
    }

    #[test]
    fn test_lookup_unknown_shape() {
        let catalog = ShapeCatalog::embedded();
        let err = catalog.definition_for(ShapeId::new(u16::MAX)).unwrap_err();
        assert_eq!(err, DefinitionNotFound(ShapeId::new(u16::MAX)));
        assert!(catalog.definition_by_name("no such shape").is_none());
        assert_eq!(catalog.group_of("no such shape"), None);
    }

    #[test]
    fn test_group_of() {
        let catalog = ShapeCatalog::embedded();
        assert_eq!(catalog.group_of("I"), Some(ShapeCategory::Standard));
        assert_eq!(catalog.group_of("Random3x3"), Some(ShapeCategory::Random));
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            (
                r#"[{ "id": 1, "name": "A", "category": "test", "rows": ["O"] },
                    { "id": 1, "name": "B", "category": "test", "rows": ["O"] }]"#,
                "duplicate shape id",
            ),
            (
                r#"[{ "id": 1, "name": "A", "category": "test", "rows": ["O"] },
                    { "id": 2, "name": "A", "category": "test", "rows": ["O"] }]"#,
                "duplicate shape name",
            ),
            (
                r#"[{ "id": 1, "name": "A", "category": "test", "rows": ["..."] }]"#,
                "has no blocks",
            ),
            (
                r#"[{ "id": 1, "name": "A", "category": "test", "rows": ["OO"] }]"#,
                "origin blocks",
            ),
            (
                r##"[{ "id": 1, "name": "A", "category": "test", "rows": ["#x"] }]"##,
                "unexpected character",
            ),
            (
                r#"[{ "id": 1, "name": "A", "category": "test" }]"#,
                "exactly one of",
            ),
            (
                r#"[{ "id": 1, "name": "A", "category": "test", "random": { "side": 2, "count": 5 } }]"#,
                "cannot place",
            ),
            (
                r######"[{ "id": 1, "name": "A", "category": "test", "rows": ["O####", "#####", "#####", "#####"] }]"######,
                "at most 16",
            ),
            (r#"{ "id": 1 }"#, "failed to parse"),
        ];
        for (json, expected) in cases {
            let err = ShapeCatalog::from_json_str(json).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "expected {expected:?} in {err}"
            );
        }
    }

    #[test]
    fn test_random_square_blocks_are_distinct_and_bounded() {
        let catalog = ShapeCatalog::embedded();
        let mut rng = Pcg32::seed_from_u64(7);
        for name in ["Random2x2", "Random3x3", "Random4x4"] {
            let def = catalog.definition_by_name(name).unwrap();
            let ShapeBlocks::RandomSquare { side, count } = *def.blocks() else {
                panic!("{name} should be a random shape");
            };
            for _ in 0..50 {
                let blocks = def.component_blocks(&mut rng);
                assert_eq!(blocks.len(), usize::from(count));
                let cells: HashSet<_> = blocks.iter().map(Block::position).collect();
                assert_eq!(cells.len(), blocks.len(), "{name} drew a duplicate cell");
                assert!(cells.iter().all(|c| (0..i32::from(side)).contains(&c.x)
                    && (0..i32::from(side)).contains(&c.y)));
                assert!(blocks[0].is_origin());
                assert_eq!(blocks.iter().filter(|b| b.is_origin()).count(), 1);
            }
        }
    }

    #[test]
    fn test_category_names_round_trip() {
        for category in ShapeCategory::ALL {
            assert_eq!(ShapeCategory::from_name(category.name()), Some(category));
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.name()));
        }
    }
}
