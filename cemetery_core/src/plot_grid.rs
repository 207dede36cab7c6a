//! Fixed-geometry overview grids per section type.
//!
//! The inspector's section panel draws these instead of the tomb layout. The
//! generic branch is randomised, but seeded from the section seed so it stays
//! stable across reloads.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::layout::section_seed;

pub const ALLEY_ROWS: u32 = 4;
pub const ALLEY_COLUMNS: u32 = 10;
pub const APARTMENT_ROWS: u32 = 5;
pub const APARTMENT_COLUMNS: u32 = 25;
pub const PERIMETER_TOP: u32 = 13;
pub const PERIMETER_RIGHT: u32 = 12;
pub const GENERIC_COLUMNS: u32 = 8;
pub const GENERIC_MAX_LEVELS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    Alley,
    Perimeter,
    Apartment,
    Generic,
}

impl GridKind {
    pub fn for_section(section_id: &str) -> Self {
        let id = section_id.to_ascii_lowercase();
        if id.contains("alley") {
            GridKind::Alley
        } else if id.contains("fetus") || id.contains("crematorium") {
            GridKind::Perimeter
        } else if id.contains("apartment") {
            GridKind::Apartment
        } else {
            GridKind::Generic
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotCell {
    pub label: String,
    pub column: u32,
    pub row: u32,
    pub level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotGrid {
    pub section: String,
    pub kind: GridKind,
    pub columns: u32,
    pub rows: u32,
    pub cells: Vec<PlotCell>,
}

impl PlotGrid {
    pub fn cell(&self, label: &str) -> Option<&PlotCell> {
        self.cells
            .iter()
            .find(|cell| cell.label.eq_ignore_ascii_case(label))
    }

    pub fn cell_at(&self, column: u32, row: u32) -> Option<&PlotCell> {
        self.cells
            .iter()
            .find(|cell| cell.column == column && cell.row == row)
    }
}

fn row_letter(index: u32) -> char {
    char::from(b'A' + (index % 26) as u8)
}

pub fn generate_plot_grid(section_id: &str) -> PlotGrid {
    let kind = GridKind::for_section(section_id);
    let (columns, rows, cells) = match kind {
        GridKind::Alley => (
            ALLEY_COLUMNS,
            ALLEY_ROWS,
            lettered_rows(ALLEY_COLUMNS, ALLEY_ROWS),
        ),
        GridKind::Apartment => (
            APARTMENT_COLUMNS,
            APARTMENT_ROWS,
            lettered_rows(APARTMENT_COLUMNS, APARTMENT_ROWS),
        ),
        GridKind::Perimeter => (PERIMETER_TOP, PERIMETER_RIGHT + 1, perimeter()),
        GridKind::Generic => {
            let cells = generic_columns(section_id);
            (GENERIC_COLUMNS, u32::from(GENERIC_MAX_LEVELS), cells)
        }
    };
    PlotGrid {
        section: section_id.to_string(),
        kind,
        columns,
        rows,
        cells,
    }
}

fn lettered_rows(columns: u32, rows: u32) -> Vec<PlotCell> {
    let mut cells = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            cells.push(PlotCell {
                label: format!("{}{}", row_letter(row), column + 1),
                column,
                row,
                level: None,
            });
        }
    }
    cells
}

/// `T1`..`T13` along the top edge, `R1`..`R12` down the right edge.
fn perimeter() -> Vec<PlotCell> {
    let mut cells = Vec::with_capacity((PERIMETER_TOP + PERIMETER_RIGHT) as usize);
    for column in 0..PERIMETER_TOP {
        cells.push(PlotCell {
            label: format!("T{}", column + 1),
            column,
            row: 0,
            level: None,
        });
    }
    for index in 0..PERIMETER_RIGHT {
        cells.push(PlotCell {
            label: format!("R{}", index + 1),
            column: PERIMETER_TOP - 1,
            row: index + 1,
            level: None,
        });
    }
    cells
}

fn level_cap(column: u32) -> u8 {
    if column == 0 || column == GENERIC_COLUMNS - 1 {
        2
    } else {
        GENERIC_MAX_LEVELS
    }
}

fn generic_columns(section_id: &str) -> Vec<PlotCell> {
    let mut rng = SmallRng::seed_from_u64(u64::from(section_seed(section_id).raw));
    let mut cells = Vec::new();
    for column in 0..GENERIC_COLUMNS {
        let levels = rng.gen_range(1..=GENERIC_MAX_LEVELS).min(level_cap(column));
        for level in 1..=levels {
            cells.push(PlotCell {
                label: format!("{}{}", row_letter(column), level),
                column,
                row: u32::from(level - 1),
                level: Some(level),
            });
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alley_grid_is_four_by_ten() {
        let grid = generate_plot_grid("alley-2");
        assert_eq!(grid.kind, GridKind::Alley);
        assert_eq!(grid.cells.len(), 40);
        assert_eq!(grid.cells.first().map(|c| c.label.as_str()), Some("A1"));
        assert_eq!(grid.cells.last().map(|c| c.label.as_str()), Some("D10"));
    }

    #[test]
    fn apartment_grid_labels_run_to_twenty_five() {
        let grid = generate_plot_grid("apartment-3");
        assert_eq!(grid.cells.len(), 125);
        assert!(grid.cell("a25").is_some());
        assert!(grid.cell("E25").is_some());
        assert!(grid.cell("A26").is_none());
    }

    #[test]
    fn perimeter_layout_has_top_and_right_edges() {
        let grid = generate_plot_grid("crematorium");
        assert_eq!(grid.kind, GridKind::Perimeter);
        assert_eq!(grid.cells.len(), 25);
        let t13 = grid.cell("T13").expect("T13");
        let r1 = grid.cell("R1").expect("R1");
        assert_eq!(t13.column, r1.column);
        assert_eq!(r1.row, 1);
        assert_eq!(grid.cell("R12").map(|c| c.row), Some(12));
        assert_eq!(generate_plot_grid("fetus-area").kind, GridKind::Perimeter);
    }

    #[test]
    fn generic_grid_respects_caps_and_is_stable() {
        let grid = generate_plot_grid("lb-4");
        assert_eq!(grid, generate_plot_grid("lb-4"));
        for column in 0..GENERIC_COLUMNS {
            let levels = grid.cells.iter().filter(|c| c.column == column).count();
            assert!(levels >= 1 && levels <= level_cap(column) as usize);
        }
        assert!(grid.cell("A1").is_some());
        assert!(grid.cell("H1").is_some());
        assert!(grid.cell("A3").is_none());
    }

    #[test]
    fn generic_grid_follows_the_section_seed() {
        let mut rng = SmallRng::seed_from_u64(u64::from(section_seed("chapel").raw));
        let first_column = rng.gen_range(1..=GENERIC_MAX_LEVELS).min(level_cap(0));
        let grid = generate_plot_grid("chapel");
        assert_eq!(grid.kind, GridKind::Generic);
        let drawn = grid.cells.iter().filter(|c| c.column == 0).count();
        assert_eq!(drawn, usize::from(first_column));
    }
}
