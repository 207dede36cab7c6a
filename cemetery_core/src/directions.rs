//! Walking directions from the main entrance to a plot.

use serde::Serialize;

use crate::identifier::{parse_identifier, BlockSide, PlotKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionStep {
    pub step: u32,
    pub instruction: String,
    pub location: String,
}

/// Walking directions from the main entrance to a plot.
///
/// Always starts with the entrance step; branches that do not apply to the
/// identifier are omitted rather than reported.
pub fn generate_directions(plot_id: &str) -> Vec<DirectionStep> {
    let parsed = parse_identifier(plot_id);
    let display_id = plot_id.trim().to_ascii_uppercase();
    let mut steps: Vec<(String, String)> = vec![(
        "Start at the main entrance".to_string(),
        "Main Entrance".to_string(),
    )];

    let approach = match parsed.kind {
        PlotKind::Block => parsed.block_side(),
        PlotKind::Apartment if parsed.section.starts_with("apartment-5") => Some(BlockSide::Right),
        PlotKind::Apartment => Some(BlockSide::Left),
        _ => None,
    };
    if let Some(side) = approach {
        steps.push((format!("Walk towards {}", side.label()), side.label().to_string()));
    } else if parsed.kind == PlotKind::Special && parsed.section == "veterans" {
        steps.push((
            "Walk towards Veterans section".to_string(),
            "Veterans Section".to_string(),
        ));
    }

    if parsed.kind == PlotKind::Apartment {
        let building = parsed.building().unwrap_or_default();
        steps.push((
            format!("Find the specific building, Apartment {building}"),
            format!("Apartment {building}"),
        ));
        if let (Some(level), Some(tomb)) = (parsed.level, parsed.tomb.as_deref()) {
            let tomb = tomb.to_ascii_uppercase();
            steps.push((
                format!("Go to Level {level} and look for Tomb {tomb}"),
                format!("Level {level}, Tomb {tomb}"),
            ));
        }
    } else {
        steps.push((format!("Look for plot {display_id}"), display_id));
    }

    steps
        .into_iter()
        .enumerate()
        .map(|(index, (instruction, location))| DirectionStep {
            step: index as u32 + 1,
            instruction,
            location,
        })
        .collect()
}

/// One line per step, `N. instruction (location)`.
pub fn render_directions(steps: &[DirectionStep]) -> String {
    steps
        .iter()
        .map(|step| format!("{}. {} ({})", step.step, step.instruction, step.location))
        .collect::<Vec<_>>()
        .join("\n")
}
