//! Deterministic tomb layout for a section.
//!
//! A section's level and tomb counts are derived from a seed computed over the
//! section id, so the same section renders identically across reloads.

use serde::Serialize;

use crate::identifier::format_plot_id;

pub const PLOT_WIDTH: f32 = 80.0;
pub const PLOT_HEIGHT: f32 = 100.0;
pub const PLOT_SPACING: f32 = 20.0;
pub const GRID_ORIGIN: f32 = 20.0;

const SEED_MULTIPLIER: u64 = 9301;
const SEED_INCREMENT: u64 = 49297;
const SEED_MODULUS: u64 = 233280;

/// Seed derived from a section id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectionSeed {
    pub raw: u32,
    pub normalized: f64,
}

/// `(sum of UTF-16 code units * 9301 + 49297) mod 233280`, scaled into [0, 1).
pub fn section_seed(section_id: &str) -> SectionSeed {
    let sum: u64 = section_id.encode_utf16().map(u64::from).sum();
    let raw = (sum.wrapping_mul(SEED_MULTIPLIER).wrapping_add(SEED_INCREMENT)) % SEED_MODULUS;
    SectionSeed {
        raw: raw as u32,
        normalized: raw as f64 / SEED_MODULUS as f64,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionPolicy {
    Block,
    Apartment,
    Special,
    Default,
}

impl SectionPolicy {
    pub fn for_section(section_id: &str) -> Self {
        let id = section_id.to_ascii_lowercase();
        if id.contains("lb-") || id.contains("rb-") {
            SectionPolicy::Block
        } else if id.contains("apartment") {
            SectionPolicy::Apartment
        } else if id.contains("veterans") || id.contains("office") || id.contains("eternal-tomb")
        {
            SectionPolicy::Special
        } else {
            SectionPolicy::Default
        }
    }

    pub fn level_count(self, normalized: f64) -> u8 {
        match self {
            SectionPolicy::Apartment => 3,
            SectionPolicy::Special => {
                if normalized > 0.5 {
                    3
                } else if normalized > 0.3 {
                    2
                } else {
                    1
                }
            }
            SectionPolicy::Block | SectionPolicy::Default => {
                if normalized > 0.3 {
                    2
                } else {
                    1
                }
            }
        }
    }

    pub fn tombs_on_level(self, level: u8) -> usize {
        let table: [usize; 3] = match self {
            SectionPolicy::Block => [6, 4, 3],
            SectionPolicy::Apartment => [8, 8, 8],
            SectionPolicy::Special | SectionPolicy::Default => [4, 3, 2],
        };
        level
            .checked_sub(1)
            .and_then(|index| table.get(index as usize))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// One tomb slot of a generated section layout. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TombDescriptor {
    pub id: String,
    pub level: u8,
    pub column: u32,
    pub row: u32,
    pub plot_number: u32,
    pub position: Rect,
}

impl TombDescriptor {
    /// Upper-case tomb letter (`A`..`H`).
    pub fn letter(&self) -> char {
        tomb_letter(self.column).to_ascii_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionLayout {
    pub section: String,
    pub policy: SectionPolicy,
    pub seed: SectionSeed,
    pub levels: u8,
    pub tombs: Vec<TombDescriptor>,
}

impl SectionLayout {
    pub fn tombs_on_level(&self, level: u8) -> impl Iterator<Item = &TombDescriptor> {
        self.tombs.iter().filter(move |tomb| tomb.level == level)
    }

    pub fn tomb(&self, id: &str) -> Option<&TombDescriptor> {
        self.tombs
            .iter()
            .find(|tomb| tomb.id.eq_ignore_ascii_case(id))
    }

    pub fn has_level(&self, level: u8) -> bool {
        level >= 1 && level <= self.levels
    }
}

fn tomb_letter(column: u32) -> char {
    char::from(b'a' + (column % 26) as u8)
}

/// Plot id of a tomb slot. Ground-level block tombs are the shapes drawn on
/// the map (`lb-10a`), so they share that id; upper levels are addressed as
/// `lb-10-level2-a`.
fn tomb_id(section_id: &str, policy: SectionPolicy, level: u8, letter: &str) -> String {
    match (policy, level) {
        (SectionPolicy::Block, 1) => format_plot_id(section_id, None, letter),
        _ => format_plot_id(section_id, Some(level), letter),
    }
}

/// Build the layout for a section. Pure; every section id yields a layout.
pub fn generate_layout(section_id: &str) -> SectionLayout {
    let seed = section_seed(section_id);
    let policy = SectionPolicy::for_section(section_id);
    let levels = policy.level_count(seed.normalized);

    let mut tombs = Vec::new();
    let mut plot_number = 1;
    for level in 1..=levels {
        let row = u32::from(level - 1);
        for column in 0..policy.tombs_on_level(level) as u32 {
            let letter = tomb_letter(column).to_string();
            tombs.push(TombDescriptor {
                id: tomb_id(section_id, policy, level, &letter),
                level,
                column,
                row,
                plot_number,
                position: Rect {
                    x: GRID_ORIGIN + column as f32 * (PLOT_WIDTH + PLOT_SPACING),
                    y: GRID_ORIGIN + row as f32 * (PLOT_HEIGHT + PLOT_SPACING),
                    width: PLOT_WIDTH,
                    height: PLOT_HEIGHT,
                },
            });
            plot_number += 1;
        }
    }

    SectionLayout {
        section: section_id.to_string(),
        policy,
        seed,
        levels,
        tombs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_matches_reference_arithmetic() {
        // "lb-1": 108 + 98 + 45 + 49 = 300
        let seed = section_seed("lb-1");
        assert_eq!(seed.raw, ((300 * 9301 + 49297) % 233280) as u32);
        assert!(seed.normalized >= 0.0 && seed.normalized < 1.0);
    }

    #[test]
    fn layout_is_deterministic() {
        for section in ["lb-10", "rb-3", "apartment-5", "veterans", "chapel"] {
            assert_eq!(generate_layout(section), generate_layout(section));
        }
    }

    #[test]
    fn apartments_always_have_three_levels_of_eight() {
        let layout = generate_layout("apartment-5");
        assert_eq!(layout.levels, 3);
        assert_eq!(layout.tombs.len(), 24);
        let letters: String = layout.tombs_on_level(2).map(|t| t.letter()).collect();
        assert_eq!(letters, "ABCDEFGH");
        assert!(layout.tomb("apartment-5-2h").is_some());
    }

    #[test]
    fn block_tomb_counts_follow_levels() {
        let layout = generate_layout("lb-10");
        assert_eq!(layout.policy, SectionPolicy::Block);
        let expected = match layout.levels {
            1 => 6,
            2 => 10,
            other => panic!("blocks never have {other} levels"),
        };
        assert_eq!(layout.tombs.len(), expected);
        assert_eq!(
            layout.levels,
            if layout.seed.normalized > 0.3 { 2 } else { 1 }
        );
    }

    #[test]
    fn ground_level_block_tombs_match_map_ids() {
        let layout = generate_layout("lb-10");
        let ids: Vec<&str> = layout.tombs_on_level(1).map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["lb-10a", "lb-10b", "lb-10c", "lb-10d", "lb-10e", "lb-10f"]);
        assert!(layout.tomb("LB-10A").is_some());
        if layout.has_level(2) {
            assert!(layout.tomb("lb-10-level2-a").is_some());
        }
        assert!(generate_layout("veterans").tomb("veterans-level1-a").is_some());
    }

    #[test]
    fn special_levels_follow_thresholds() {
        assert_eq!(SectionPolicy::Special.level_count(0.2), 1);
        assert_eq!(SectionPolicy::Special.level_count(0.4), 2);
        assert_eq!(SectionPolicy::Special.level_count(0.9), 3);
        assert_eq!(SectionPolicy::Default.level_count(0.9), 2);
        assert_eq!(SectionPolicy::Special.tombs_on_level(3), 2);
        assert_eq!(SectionPolicy::Block.tombs_on_level(3), 3);
        assert_eq!(SectionPolicy::Block.tombs_on_level(4), 0);
    }

    #[test]
    fn positions_use_fixed_offsets() {
        let layout = generate_layout("apartment-1");
        let second = &layout.tombs[1];
        assert_eq!(second.position.x, GRID_ORIGIN + PLOT_WIDTH + PLOT_SPACING);
        assert_eq!(second.position.width, PLOT_WIDTH);
        let level_two = layout.tombs_on_level(2).next().expect("level two exists");
        assert_eq!(level_two.position.y, GRID_ORIGIN + PLOT_HEIGHT + PLOT_SPACING);
        assert_eq!(level_two.plot_number, 9);
    }
}
