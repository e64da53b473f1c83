//! DuckDB DDL for the comment store.
//!
//! `raw_submissions` and `analyses` are always created. The taxonomy and theme
//! tables are optional: deployments that precompute entities load them, and
//! the store probes for them instead of assuming they exist.

/// Core tables: raw submissions and their condensed analyses.
pub const CORE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS raw_submissions (
    id VARCHAR PRIMARY KEY,
    attributes_json VARCHAR
);
CREATE TABLE IF NOT EXISTS analyses (
    comment_id VARCHAR PRIMARY KEY,
    status VARCHAR NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
    structured_sections VARCHAR,
    created_at TIMESTAMP NOT NULL DEFAULT current_timestamp
);
";

/// Precomputed entity taxonomy and theme tables.
pub const TAXONOMY_TABLES: &str = "
CREATE TABLE IF NOT EXISTS taxonomy_entries (
    id VARCHAR PRIMARY KEY,
    name VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS entry_associations (
    entry_id VARCHAR NOT NULL,
    comment_id VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS theme_entries (
    id VARCHAR PRIMARY KEY,
    name VARCHAR NOT NULL,
    description VARCHAR
);
CREATE TABLE IF NOT EXISTS theme_associations (
    theme_id VARCHAR NOT NULL,
    comment_id VARCHAR NOT NULL
);
";

pub const RAW_SUBMISSIONS: &str = "raw_submissions";
pub const ANALYSES: &str = "analyses";
pub const TAXONOMY_ENTRIES: &str = "taxonomy_entries";
pub const ENTRY_ASSOCIATIONS: &str = "entry_associations";
pub const THEME_ENTRIES: &str = "theme_entries";
pub const THEME_ASSOCIATIONS: &str = "theme_associations";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_tables_declare_both_tables() {
        assert!(CORE_TABLES.contains(&format!("TABLE IF NOT EXISTS {RAW_SUBMISSIONS}")));
        assert!(CORE_TABLES.contains(&format!("TABLE IF NOT EXISTS {ANALYSES}")));
    }

    #[test]
    fn status_check_lists_three_values() {
        assert!(CORE_TABLES.contains("'pending', 'completed', 'failed'"));
    }

    #[test]
    fn taxonomy_tables_declare_all_four() {
        for table in [
            TAXONOMY_ENTRIES,
            ENTRY_ASSOCIATIONS,
            THEME_ENTRIES,
            THEME_ASSOCIATIONS,
        ] {
            assert!(
                TAXONOMY_TABLES.contains(&format!("TABLE IF NOT EXISTS {table}")),
                "missing {table}"
            );
        }
    }
}
