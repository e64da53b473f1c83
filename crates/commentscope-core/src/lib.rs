//! Core types and pure logic for commentscope: query building, comment
//! normalisation, and entity mining over condensed analyses.

mod error;
pub mod mining;
pub mod normalize;
pub mod query;
pub mod record;
pub mod schema;

pub use error::CoreError;
pub use mining::{extract_organizations, mine_entities, rank_entities, EntityAccumulator};
pub use normalize::{normalize_comment, normalize_for_export};
pub use query::{ListQuery, Pagination, QueryParam, QueryPlan};
pub use record::{
    AnalysisRow, AnalysisStatus, Entity, EntityType, ExportedComment, NormalizedComment, Theme,
};

/// Maximum number of completed analyses a single export may materialise.
pub const EXPORT_ROW_LIMIT: u64 = 100;
