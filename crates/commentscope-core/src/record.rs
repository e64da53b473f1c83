//! Records read from the store and the views derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Processing status of a condensed analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// One row of `analyses LEFT JOIN raw_submissions`, JSON blobs still as text.
///
/// `attributes_json` is `None` when the analysis has no matching raw submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisRow {
    pub comment_id: String,
    pub status: String,
    pub structured_sections: Option<String>,
    /// ISO 8601-ish timestamp text as rendered by the store.
    pub created_at: Option<String>,
    pub attributes_json: Option<String>,
}

/// Canonical view of a comment: resolved flat fields plus both parsed blobs.
///
/// Derived on every read, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedComment {
    pub id: String,
    pub status: String,
    pub created_at: String,
    pub original_text: String,
    pub submitter_name: String,
    pub organization_name: String,
    pub submission_date: String,
    pub comment_url: String,
    pub category: String,
    pub key_points: Vec<String>,
    pub detailed_content: String,
    pub structured_sections: Value,
    pub raw_attributes: Value,
}

/// Export projection: only text, submitter and organization are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedComment {
    pub id: String,
    pub status: String,
    pub created_at: String,
    pub original_text: String,
    pub submitter_name: String,
    pub organization_name: String,
    pub structured_sections: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Keypoint,
    Category,
    Organization,
    Taxonomy,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keypoint => "keypoint",
            Self::Category => "category",
            Self::Organization => "organization",
            Self::Taxonomy => "taxonomy",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A named, typed, frequency-counted mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub count: u64,
}

/// A theme from the precomputed taxonomy. There is no mined fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub description: String,
    pub count: u64,
}
