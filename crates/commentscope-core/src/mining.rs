//! Fallback entity mining over condensed analyses.
//!
//! Used when the store has no precomputed taxonomy. Each analysis contributes
//! its key points, its category, and any organization names found in its
//! detailed content. Counts increment once per occurrence, so a key point
//! repeated across three comments counts 3.
//!
//! Ranking is count-descending with ties kept in first-seen order, which is why
//! the accumulator preserves insertion order instead of using a plain hash map.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::normalize::parse_json_object;
use crate::{Entity, EntityType};

/// Trailing words that mark a capitalized phrase as an organization name.
pub const ORGANIZATION_SUFFIXES: &[&str] = &[
    "Health",
    "Medical",
    "Association",
    "Corp",
    "Inc",
    "LLC",
    "Company",
    "Group",
    "Systems",
    "Administration",
    "Institute",
    "Foundation",
    "Society",
    "Coalition",
    "Alliance",
    "Union",
    "Federation",
];

/// Key points of this many characters or fewer are ignored.
const MIN_KEYPOINT_CHARS: usize = 2;

static ORGANIZATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"\b(?:[A-Z][a-z]+ )+(?:{})\b",
        ORGANIZATION_SUFFIXES.join("|")
    );
    Regex::new(&pattern).expect("organization pattern is valid")
});

/// Organization names in `text`: one or more capitalized words followed by an
/// organizational suffix. Matches are trimmed and returned in text order,
/// duplicates included.
pub fn extract_organizations(text: &str) -> Vec<String> {
    ORGANIZATION_RE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Insertion-ordered entity counter keyed by trimmed name.
///
/// The name alone is the identity: the type is fixed by whichever source
/// recorded the name first.
#[derive(Debug, Default)]
pub struct EntityAccumulator {
    entries: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl EntityAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `name`. Blank names are ignored.
    pub fn record(&mut self, name: &str, entity_type: EntityType) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if let Some(&i) = self.index.get(name) {
            self.entries[i].count += 1;
            return;
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(Entity {
            name: name.to_string(),
            entity_type,
            count: 1,
        });
    }

    /// Record every entity carried by one analysis' structured sections.
    pub fn record_sections(&mut self, sections: &Map<String, Value>) {
        if let Some(points) = sections.get("keyPoints").and_then(Value::as_array) {
            for point in points.iter().filter_map(Value::as_str) {
                let point = point.trim();
                if point.chars().count() > MIN_KEYPOINT_CHARS {
                    self.record(point, EntityType::Keypoint);
                }
            }
        }

        if let Some(category) = sections.get("category").and_then(Value::as_str) {
            self.record(category, EntityType::Category);
        }

        if let Some(content) = sections.get("detailedContent").and_then(Value::as_str) {
            for org in extract_organizations(content) {
                self.record(&org, EntityType::Organization);
            }
        }
    }

    pub fn into_ranked(self) -> Vec<Entity> {
        rank_entities(self.entries)
    }
}

/// Drop zero counts and stable-sort by count, highest first.
pub fn rank_entities(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.retain(|e| e.count > 0);
    entities.sort_by(|a, b| b.count.cmp(&a.count));
    entities
}

/// Mine and rank entities from raw `structured_sections` JSON texts.
///
/// Blobs that do not parse to a JSON object are skipped.
pub fn mine_entities<'a, I>(sections: I) -> Vec<Entity>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut acc = EntityAccumulator::new();
    let mut skipped = 0usize;
    for raw in sections {
        match parse_json_object(Some(raw)) {
            Some(map) => acc.record_sections(&map),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "skipped malformed structured sections while mining");
    }
    acc.into_ranked()
}
