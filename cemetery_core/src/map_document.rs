//! In-memory view of the cemetery map asset.
//!
//! Only elements carrying an `id` are tracked. Their attributes can be read
//! and rewritten, and the document can be rendered back to SVG text with the
//! rest of the source left untouched.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapElement {
    pub id: String,
    pub tag: String,
    attributes: BTreeMap<String, String>,
    span: Range<usize>,
    self_closing: bool,
}

impl MapElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes
            .insert(name.to_string(), value.replace('"', "&quot;"));
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapDocument {
    source: String,
    elements: Vec<MapElement>,
    index: HashMap<String, usize>,
    revision: u64,
}

fn start_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<([A-Za-z][\w:.-]*)((?:\s+[\w:.-]+\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#)
            .expect("valid regex")
    })
}

fn attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
    })
}

impl MapDocument {
    /// Scan SVG text for identified elements. Malformed markup is skipped,
    /// never rejected.
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut elements = Vec::new();
        let mut index = HashMap::new();

        for caps in start_tag().captures_iter(&source) {
            let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let mut attributes = BTreeMap::new();
            if let Some(raw) = caps.get(2) {
                for attr in attribute().captures_iter(raw.as_str()) {
                    let value = attr
                        .get(2)
                        .or_else(|| attr.get(3))
                        .map(|m| m.as_str())
                        .unwrap_or_default();
                    attributes.insert(attr[1].to_string(), value.to_string());
                }
            }
            let Some(id) = attributes.get("id").cloned() else {
                continue;
            };
            if index.contains_key(&id) {
                continue;
            }
            index.insert(id.clone(), elements.len());
            elements.push(MapElement {
                id,
                tag: tag.as_str().to_string(),
                attributes,
                span: whole.range(),
                self_closing: caps.get(3).is_some_and(|m| !m.as_str().is_empty()),
            });
        }

        Self {
            source,
            elements,
            index,
            revision: 0,
        }
    }

    /// Document shown while the map asset is unavailable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Bumped whenever the document is replaced from outside.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Swap in new source text, dropping any attributes applied in memory.
    pub fn replace_source(&mut self, source: impl Into<String>) {
        let revision = self.revision + 1;
        *self = Self::parse(source);
        self.revision = revision;
    }

    pub fn elements(&self) -> impl Iterator<Item = &MapElement> {
        self.elements.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|element| element.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&MapElement> {
        self.index.get(id).map(|&slot| &self.elements[slot])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MapElement> {
        match self.index.get(id) {
            Some(&slot) => self.elements.get_mut(slot),
            None => None,
        }
    }

    /// Lookup trying the id as given, then lower, upper and capitalised forms.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut MapElement> {
        let slot = id_variants(id)
            .into_iter()
            .find_map(|candidate| self.index.get(&candidate).copied())?;
        self.elements.get_mut(slot)
    }

    /// Render the document back to SVG with in-memory attribute changes applied.
    pub fn to_svg(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        let mut ordered: Vec<&MapElement> = self.elements.iter().collect();
        ordered.sort_by_key(|element| element.span.start);
        for element in ordered {
            out.push_str(&self.source[cursor..element.span.start]);
            out.push('<');
            out.push_str(&element.tag);
            for (key, value) in &element.attributes {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                out.push_str(value);
                out.push('"');
            }
            out.push_str(if element.self_closing { "/>" } else { ">" });
            cursor = element.span.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}

/// Exact, lowercase, uppercase, then first-letter-capitalised.
pub fn id_variants(id: &str) -> Vec<String> {
    let lower = id.to_lowercase();
    let mut capitalised = String::with_capacity(lower.len());
    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        capitalised.extend(first.to_uppercase());
        capitalised.push_str(chars.as_str());
    }
    let mut variants = vec![id.to_string()];
    for candidate in [lower, id.to_uppercase(), capitalised] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
  <g id="layer3">
    <rect id="rect110" x="0" y="0" width="5" height="5"/>
    <path id="LB-10a" d="M0 0h10v10z" fill="#ffffff"/>
    <rect id='veterans' x="1" y="2" width="3" height="4" />
    <rect x="9" y="9" width="1" height="1"/>
  </g>
</svg>"##;

    #[test]
    fn parses_identified_elements_only() {
        let doc = MapDocument::parse(SVG);
        let ids: Vec<&str> = doc.ids().collect();
        assert_eq!(ids, vec!["layer3", "rect110", "LB-10a", "veterans"]);
        assert_eq!(doc.get("veterans").and_then(|e| e.attribute("y")), Some("2"));
        assert_eq!(doc.get("LB-10a").map(|e| e.tag.as_str()), Some("path"));
    }

    #[test]
    fn find_tries_case_variants() {
        let mut doc = MapDocument::parse(SVG);
        assert!(doc.find_mut("lb-10a").is_none());
        assert!(doc.find_mut("Veterans").is_some());
        assert_eq!(
            id_variants("lb-10a"),
            vec!["lb-10a".to_string(), "LB-10A".to_string(), "Lb-10a".to_string()]
        );
    }

    #[test]
    fn render_applies_attribute_changes() {
        let mut doc = MapDocument::parse(SVG);
        if let Some(element) = doc.get_mut("LB-10a") {
            element.set_attribute("fill", "#dc2626");
            element.set_attribute("data-status", "occupied");
        }
        let svg = doc.to_svg();
        assert!(svg.contains(r##"data-status="occupied""##));
        assert!(svg.contains(r##"fill="#dc2626""##));
        assert!(!svg.contains("#ffffff"));
        assert!(svg.contains(r#"<rect x="9" y="9" width="1" height="1"/>"#));

        let reparsed = MapDocument::parse(svg);
        assert_eq!(reparsed.len(), doc.len());
    }

    #[test]
    fn replace_source_drops_paint_and_bumps_revision() {
        let mut doc = MapDocument::parse(SVG);
        if let Some(element) = doc.get_mut("veterans") {
            element.set_attribute("fill", "#16a34a");
        }
        doc.replace_source(SVG);
        assert_eq!(doc.revision(), 1);
        assert_eq!(doc.get("veterans").and_then(|e| e.attribute("fill")), None);
    }

    #[test]
    fn empty_document_has_no_elements() {
        let doc = MapDocument::parse("not svg at all");
        assert!(doc.is_empty());
        assert_eq!(doc.to_svg(), "not svg at all");
    }
}
