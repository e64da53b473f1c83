//! Record normaliser: one analysis row (plus its optional raw submission)
//! into a [`NormalizedComment`].
//!
//! Raw submissions come from several sources whose attribute keys differ, so
//! each logical field is resolved through a fixed priority chain of keys. The
//! first key holding a non-empty string wins.
//!
//! Malformed JSON never fails a read: a blob that does not parse to an object
//! degrades to an empty map and every field it would have supplied resolves
//! to the empty string.

use serde_json::{Map, Value};
use tracing::debug;

use crate::{AnalysisRow, ExportedComment, NormalizedComment};

type JsonMap = Map<String, Value>;

pub const TEXT_KEYS: &[&str] = &["comment", "commentText", "content"];
pub const ORGANIZATION_KEYS: &[&str] = &["organization", "organizationName"];
pub const DATE_KEYS: &[&str] = &["postedDate", "submissionDate", "datePosted"];
pub const URL_KEYS: &[&str] = &["commentURL", "url"];

/// Normalise a joined row for listing and single-comment lookups.
pub fn normalize_comment(row: &AnalysisRow) -> NormalizedComment {
    let sections = parse_object(row.structured_sections.as_deref(), "structured_sections", row);
    let attributes = parse_object(row.attributes_json.as_deref(), "attributes_json", row);

    NormalizedComment {
        id: row.comment_id.clone(),
        status: row.status.clone(),
        created_at: row.created_at.clone().unwrap_or_default(),
        original_text: resolve(&attributes, TEXT_KEYS),
        submitter_name: resolve_submitter(&attributes),
        organization_name: resolve(&attributes, ORGANIZATION_KEYS),
        submission_date: resolve(&attributes, DATE_KEYS),
        comment_url: resolve(&attributes, URL_KEYS),
        category: string_field(&sections, "category"),
        key_points: string_list(&sections, "keyPoints"),
        detailed_content: string_field(&sections, "detailedContent"),
        structured_sections: Value::Object(sections),
        raw_attributes: Value::Object(attributes),
    }
}

/// Normalise a joined row for bulk export: text, submitter, organization only.
pub fn normalize_for_export(row: &AnalysisRow) -> ExportedComment {
    let sections = parse_object(row.structured_sections.as_deref(), "structured_sections", row);
    let attributes = parse_object(row.attributes_json.as_deref(), "attributes_json", row);

    ExportedComment {
        id: row.comment_id.clone(),
        status: row.status.clone(),
        created_at: row.created_at.clone().unwrap_or_default(),
        original_text: resolve(&attributes, TEXT_KEYS),
        submitter_name: resolve_submitter(&attributes),
        organization_name: resolve(&attributes, ORGANIZATION_KEYS),
        structured_sections: Value::Object(sections),
    }
}

/// First non-empty string under `keys`, in order; empty when none match.
pub fn resolve(map: &JsonMap, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| non_empty_str(map, key))
        .map(str::to_string)
        .unwrap_or_default()
}

/// `submitterName`, else `firstName lastName`, else empty.
pub fn resolve_submitter(map: &JsonMap) -> String {
    if let Some(name) = non_empty_str(map, "submitterName") {
        return name.to_string();
    }
    let parts: Vec<&str> = ["firstName", "lastName"]
        .iter()
        .filter_map(|key| non_empty_str(map, key))
        .map(str::trim)
        .collect();
    parts.join(" ")
}

/// Parse a JSON blob into an object map, or an empty map on any failure.
pub fn parse_json_object(raw: Option<&str>) -> Option<JsonMap> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_object(raw: Option<&str>, column: &str, row: &AnalysisRow) -> JsonMap {
    match parse_json_object(raw) {
        Some(map) => map,
        None => {
            if raw.is_some_and(|r| !r.trim().is_empty()) {
                debug!(comment_id = %row.comment_id, column, "unparseable JSON blob, using empty map");
            }
            JsonMap::new()
        }
    }
}

fn non_empty_str<'a>(map: &'a JsonMap, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn string_field(map: &JsonMap, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list(map: &JsonMap, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
