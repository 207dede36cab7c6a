//! Parsing of map element and plot identifiers.
//!
//! The map asset names its shapes after the plots they draw (`lb-10a`,
//! `apartment-5-3h`, `veterans`, ...). The same parser serves click handling,
//! painting and directions so the three never disagree about what an id means.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Special areas recognised by literal containment, in match order.
pub const SPECIAL_SECTIONS: [&str; 4] = ["veterans", "office", "eternal-tomb", "restos-bonecrypt"];

/// Element id prefixes that carry plot status colours on the map.
pub const PLOT_ELEMENT_PREFIXES: [&str; 5] = ["lb-", "rb-", "apartment-", "veterans", "eternal"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    Block,
    Apartment,
    Special,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSide {
    Left,
    Right,
}

impl BlockSide {
    pub fn label(self) -> &'static str {
        match self {
            BlockSide::Left => "Left Block",
            BlockSide::Right => "Right Block",
        }
    }
}

/// Structured form of a section or plot identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedIdentifier {
    pub kind: PlotKind,
    pub section: String,
    pub level: Option<u8>,
    pub tomb: Option<String>,
}

impl ParsedIdentifier {
    fn unknown(input: &str) -> Self {
        Self {
            kind: PlotKind::Unknown,
            section: input.to_string(),
            level: None,
            tomb: None,
        }
    }

    pub fn block_side(&self) -> Option<BlockSide> {
        if self.kind != PlotKind::Block {
            return None;
        }
        if self.section.starts_with("lb-") {
            Some(BlockSide::Left)
        } else if self.section.starts_with("rb-") {
            Some(BlockSide::Right)
        } else {
            None
        }
    }

    /// Building number of an apartment section (`apartment-5` -> `5`).
    pub fn building(&self) -> Option<&str> {
        if self.kind != PlotKind::Apartment {
            return None;
        }
        self.section.strip_prefix("apartment-")
    }

    /// Canonical plot id, or `None` when no tomb was named.
    pub fn plot_id(&self) -> Option<String> {
        self.tomb
            .as_deref()
            .map(|tomb| format_plot_id(&self.section, self.level, tomb))
    }
}

impl fmt::Display for ParsedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.plot_id() {
            Some(id) => f.write_str(&id),
            None => f.write_str(&self.section),
        }
    }
}

fn level_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+)-level(\d+)-([a-z0-9]+)$").expect("valid regex"))
}

fn block_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(lb|rb)-(\d+)([a-z])?$").expect("valid regex"))
}

fn apartment_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^apartment-(\d+)(?:-(\d+)([a-z]))?$").expect("valid regex"))
}

fn decorative_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(rect|path|layer|g|svg|text|tspan|circle|ellipse|polygon|polyline|line|defs|clippath|lineargradient|radialgradient|image|use|metadata|namedview|mask|pattern|marker|symbol|stop)\d*$",
        )
        .expect("valid regex")
    })
}

/// Parse a free-form identifier. Never fails; unmatched input is `Unknown`
/// with the input passed through as the section.
pub fn parse_identifier(input: &str) -> ParsedIdentifier {
    let id = input.trim().to_ascii_lowercase();
    if id.is_empty() {
        return ParsedIdentifier::unknown(input);
    }

    if let Some(caps) = level_form().captures(&id) {
        let section = parse_section(&caps[1]);
        if section.kind != PlotKind::Unknown && section.tomb.is_none() {
            return ParsedIdentifier {
                kind: section.kind,
                section: section.section,
                level: caps[2].parse().ok(),
                tomb: Some(caps[3].to_string()),
            };
        }
    }

    if let Some(caps) = block_form().captures(&id) {
        return ParsedIdentifier {
            kind: PlotKind::Block,
            section: format!("{}-{}", &caps[1], &caps[2]),
            level: None,
            tomb: caps.get(3).map(|m| m.as_str().to_string()),
        };
    }

    if let Some(caps) = apartment_form().captures(&id) {
        return ParsedIdentifier {
            kind: PlotKind::Apartment,
            section: format!("apartment-{}", &caps[1]),
            level: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            tomb: caps.get(3).map(|m| m.as_str().to_string()),
        };
    }

    if let Some(special) = SPECIAL_SECTIONS.iter().find(|name| id.contains(*name)) {
        return ParsedIdentifier {
            kind: PlotKind::Special,
            section: special.to_string(),
            level: None,
            tomb: None,
        };
    }

    ParsedIdentifier::unknown(input)
}

fn parse_section(section: &str) -> ParsedIdentifier {
    let parsed = parse_identifier(section);
    match parsed.kind {
        // Only the bare literal counts as a section prefix in the level form.
        PlotKind::Special if parsed.section != section => ParsedIdentifier::unknown(section),
        _ => parsed,
    }
}

/// Inverse of [`parse_identifier`] for plots inside a section.
pub fn format_plot_id(section: &str, level: Option<u8>, tomb: &str) -> String {
    let section = section.to_ascii_lowercase();
    let tomb = tomb.to_ascii_lowercase();
    let parsed = parse_identifier(&section);
    match (parsed.kind, level) {
        (PlotKind::Apartment, Some(level)) => format!("{}-{}{}", parsed.section, level, tomb),
        (PlotKind::Block, None) => format!("{}{}", parsed.section, tomb),
        (_, Some(level)) => format!("{section}-level{level}-{tomb}"),
        (_, None) => format!("{section}-{tomb}"),
    }
}

/// Section key for any identifier (`lb-10a` -> `lb-10`).
pub fn section_of(id: &str) -> String {
    parse_identifier(id).section
}

/// True for auto-generated ids of decorative shapes (`rect110`, `layer3`).
pub fn is_decorative(id: &str) -> bool {
    let id = id.trim().to_ascii_lowercase();
    id.is_empty() || decorative_form().is_match(&id)
}

/// True when the element id belongs to a coloured plot shape.
pub fn is_plot_element(id: &str) -> bool {
    let id = id.trim().to_ascii_lowercase();
    PLOT_ELEMENT_PREFIXES
        .iter()
        .any(|prefix| id.starts_with(prefix))
}
