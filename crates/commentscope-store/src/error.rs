use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("source file not found: {0}")]
    SourceNotFound(std::path::PathBuf),

    #[error("unsupported source format: {0} (expected .parquet or .csv)")]
    UnsupportedFormat(std::path::PathBuf),

    #[error("no results for query")]
    NoResults,

    #[error("comment not found: {0}")]
    NotFound(String),

    #[error(
        "export is limited to {limit} comments but {count} are eligible; use the paginated listing instead"
    )]
    ExportTooLarge { count: u64, limit: u64 },

    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
