use std::path::PathBuf;

use blockfall_engine::{BlockOffset, ShapeBlocks, ShapeCategory, ShapeDefinition};
use serde::Serialize;

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ShapesArg {
    /// Only list shapes of these categories
    #[arg(long = "category", value_parser = parse_category)]
    categories: Vec<ShapeCategory>,
    /// Shape catalog JSON file (defaults to the embedded catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn parse_category(name: &str) -> Result<ShapeCategory, String> {
    ShapeCategory::from_name(name).ok_or_else(|| {
        let names: Vec<_> = ShapeCategory::ALL.iter().map(|c| c.name()).collect();
        format!("unknown category {name:?}, expected one of {}", names.join(", "))
    })
}

#[derive(Debug, Serialize)]
struct ShapeSummary<'a> {
    id: u16,
    name: &'a str,
    category: ShapeCategory,
    symmetric: bool,
    wide_orientation_count: u8,
    thin_orientation_count: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    random: Option<(u8, u8)>,
}

impl<'a> ShapeSummary<'a> {
    fn new(definition: &'a ShapeDefinition) -> Self {
        let (rows, random) = match definition.blocks() {
            ShapeBlocks::Fixed(offsets) => (Some(render_rows(offsets)), None),
            ShapeBlocks::RandomSquare { side, count } => (None, Some((*side, *count))),
        };
        Self {
            id: definition.id().get(),
            name: definition.name(),
            category: definition.category(),
            symmetric: definition.is_rotationally_symmetric(),
            wide_orientation_count: definition.wide_orientation_count(),
            thin_orientation_count: definition.thin_orientation_count(),
            rows,
            random,
        }
    }
}

fn render_rows(offsets: &[BlockOffset]) -> Vec<String> {
    let left = offsets.iter().map(|o| o.x).min().unwrap_or(0);
    let top = offsets.iter().map(|o| o.y).min().unwrap_or(0);
    let right = offsets.iter().map(|o| o.x).max().unwrap_or(0);
    let bottom = offsets.iter().map(|o| o.y).max().unwrap_or(0);
    (top..=bottom)
        .map(|y| {
            (left..=right)
                .map(|x| match offsets.iter().find(|o| o.x == x && o.y == y) {
                    Some(o) if o.origin => 'O',
                    Some(_) => '#',
                    None => '.',
                })
                .collect()
        })
        .collect()
}

pub(crate) fn run(arg: &ShapesArg) -> anyhow::Result<()> {
    let ShapesArg {
        categories,
        catalog,
        output,
    } = arg;

    let catalog = util::load_catalog(catalog.as_deref())?;
    let shapes: Vec<_> = catalog
        .iter()
        .filter(|d| categories.is_empty() || categories.contains(&d.category()))
        .map(ShapeSummary::new)
        .collect();
    tracing::info!(count = shapes.len(), "listing shapes");
    Output::save_json(&shapes, output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_rows() {
        let offsets = [
            BlockOffset {
                x: 1,
                y: 0,
                origin: false,
            },
            BlockOffset {
                x: 0,
                y: 1,
                origin: false,
            },
            BlockOffset {
                x: 1,
                y: 1,
                origin: true,
            },
        ];
        assert_eq!(render_rows(&offsets), vec![".#", "#O"]);
    }

    #[test]
    fn test_parse_category() {
        assert_eq!(
            parse_category("pieces-with-gaps"),
            Ok(ShapeCategory::PiecesWithGaps)
        );
        assert!(parse_category("huge").unwrap_err().contains("non-standard"));
    }
}
