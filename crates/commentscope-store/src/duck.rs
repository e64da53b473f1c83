//! DuckDB comment store: listing, lookup, entity mining and export.

use std::path::Path;

use arrow::array::{Array, Int64Array, LargeStringArray, StringArray, StringViewArray};
use arrow::record_batch::RecordBatch;
use commentscope_core::query::COMMENT_SELECT;
use commentscope_core::schema::{self, ANALYSES, RAW_SUBMISSIONS};
use commentscope_core::{
    AnalysisRow, AnalysisStatus, EXPORT_ROW_LIMIT, Entity, EntityType, ExportedComment, ListQuery,
    NormalizedComment, Pagination, QueryParam, Theme, mine_entities, normalize_comment,
    normalize_for_export, rank_entities,
};
use duckdb::types::Value;
use duckdb::{Connection, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::StoreError;

const PRECOMPUTED_ENTITIES_SQL: &str = "
    SELECT t.name, count(e.comment_id)::BIGINT AS cnt
    FROM taxonomy_entries t
    JOIN entry_associations e ON e.entry_id = t.id
    GROUP BY t.id, t.name
    HAVING count(e.comment_id) > 0
    ORDER BY cnt DESC, t.name ASC";

const THEMES_SQL: &str = "
    SELECT t.id, t.name, t.description, count(a.comment_id)::BIGINT AS cnt
    FROM theme_entries t
    JOIN theme_associations a ON a.theme_id = t.id
    GROUP BY t.id, t.name, t.description
    HAVING count(a.comment_id) > 0
    ORDER BY cnt DESC, t.name ASC";

const MINING_SCAN_SQL: &str = "
    SELECT structured_sections
    FROM analyses
    WHERE status = ? AND structured_sections IS NOT NULL
    ORDER BY created_at ASC, comment_id ASC";

const TAXONOMY_PROBE_SQL: &str = "
    SELECT t.id FROM taxonomy_entries t
    JOIN entry_associations e ON e.entry_id = t.id LIMIT 0";

const THEME_PROBE_SQL: &str = "
    SELECT t.id FROM theme_entries t
    JOIN theme_associations a ON a.theme_id = t.id LIMIT 0";

/// Where the entity list comes from, decided once by [`DuckStore::probe_capabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitySource {
    /// `taxonomy_entries` / `entry_associations` are present.
    Precomputed,
    /// Mine entities from completed analyses.
    Fallback,
}

/// Optional schema detected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub entities: EntitySource,
    pub themes: bool,
}

/// One page of normalised comments.
#[derive(Debug, Clone, Serialize)]
pub struct CommentPage {
    pub comments: Vec<NormalizedComment>,
    pub pagination: Pagination,
}

/// A complete export of completed analyses.
#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub count: u64,
    pub comments: Vec<ExportedComment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub raw_submissions: u64,
    pub analyses: u64,
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
}

/// DuckDB store for raw submissions and their condensed analyses.
///
/// One `DuckStore` wraps one connection. Servers keep a root store and hand
/// each request its own clone via [`try_clone`](Self::try_clone); the clone is
/// closed when the request's store is dropped.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// A new connection to the same database.
    pub fn try_clone(&self) -> Result<Self, StoreError> {
        Ok(Self {
            conn: self.conn.try_clone()?,
        })
    }

    /// Create `raw_submissions` and `analyses` if missing.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(schema::CORE_TABLES)?;
        Ok(())
    }

    /// Create the optional taxonomy and theme tables if missing.
    pub fn init_taxonomy_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(schema::TAXONOMY_TABLES)?;
        Ok(())
    }

    /// Check whether both core tables exist.
    pub fn has_tables(&self) -> bool {
        self.raw_submission_count().is_ok() && self.analysis_count().is_ok()
    }

    // ── Import ──

    /// Append raw submissions from a Parquet or CSV file with columns
    /// `id, attributes_json`. Existing ids are replaced.
    pub fn load_raw_submissions(&self, path: &Path) -> Result<u64, StoreError> {
        let scan = source_scan(path)?;
        let sql = format!(
            "INSERT OR REPLACE INTO {RAW_SUBMISSIONS}
             SELECT CAST(id AS VARCHAR), CAST(attributes_json AS VARCHAR) FROM {scan}"
        );
        let inserted = self.conn.execute(&sql, [])?;
        let count = self.raw_submission_count()?;
        info!(inserted, count, "loaded raw_submissions");
        Ok(inserted as u64)
    }

    /// Append analyses from a Parquet or CSV file with columns
    /// `comment_id, status, structured_sections, created_at`. A blank
    /// `created_at` defaults to now, as in [`insert_analysis`](Self::insert_analysis).
    pub fn load_analyses(&self, path: &Path) -> Result<u64, StoreError> {
        let scan = source_scan(path)?;
        let sql = format!(
            "INSERT OR REPLACE INTO {ANALYSES}
             SELECT CAST(comment_id AS VARCHAR), CAST(status AS VARCHAR),
                    CAST(structured_sections AS VARCHAR),
                    COALESCE(CAST(NULLIF(CAST(created_at AS VARCHAR), '') AS TIMESTAMP),
                             CAST(current_timestamp AS TIMESTAMP))
             FROM {scan}"
        );
        let inserted = self.conn.execute(&sql, [])?;
        let count = self.analysis_count()?;
        info!(inserted, count, "loaded analyses");
        Ok(inserted as u64)
    }

    /// Load both tables from a directory containing `raw_submissions.*` and
    /// `analyses.*` (Parquet preferred over CSV).
    pub fn load_all(&self, data_dir: &Path) -> Result<(), StoreError> {
        self.load_raw_submissions(&find_source(data_dir, RAW_SUBMISSIONS)?)?;
        self.load_analyses(&find_source(data_dir, ANALYSES)?)?;
        Ok(())
    }

    pub fn insert_raw_submission(&self, id: &str, attributes_json: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO raw_submissions (id, attributes_json) VALUES (?, ?)",
            params![id, attributes_json],
        )?;
        Ok(())
    }

    /// Insert one analysis. `created_at` defaults to now when `None`.
    pub fn insert_analysis(
        &self,
        comment_id: &str,
        status: AnalysisStatus,
        structured_sections: Option<&str>,
        created_at: Option<&str>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO analyses (comment_id, status, structured_sections, created_at)
             VALUES (?, ?, ?, COALESCE(CAST(CAST(? AS VARCHAR) AS TIMESTAMP), CAST(current_timestamp AS TIMESTAMP)))",
            params![comment_id, status.as_str(), structured_sections, created_at],
        )?;
        Ok(())
    }

    // ── Counts ──

    /// Number of rows in the `raw_submissions` table.
    pub fn raw_submission_count(&self) -> Result<u64, StoreError> {
        self.count_table(RAW_SUBMISSIONS)
    }

    /// Number of rows in the `analyses` table.
    pub fn analysis_count(&self) -> Result<u64, StoreError> {
        self.count_table(ANALYSES)
    }

    fn count_table(&self, table: &str) -> Result<u64, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        query_count(&self.conn, &sql, &[])
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let by_status = |status: AnalysisStatus| {
            query_count(
                &self.conn,
                "SELECT count(*)::BIGINT AS cnt FROM analyses WHERE status = ?",
                &[QueryParam::Text(status.as_str().to_string())],
            )
        };
        Ok(StoreStats {
            raw_submissions: self.raw_submission_count()?,
            analyses: self.analysis_count()?,
            pending: by_status(AnalysisStatus::Pending)?,
            completed: by_status(AnalysisStatus::Completed)?,
            failed: by_status(AnalysisStatus::Failed)?,
        })
    }

    // ── Capabilities ──

    /// Detect the optional taxonomy and theme tables.
    ///
    /// One attempt per table pair; a failing probe selects the fallback.
    pub fn probe_capabilities(&self) -> Capabilities {
        let entities = match self.conn.prepare(TAXONOMY_PROBE_SQL) {
            Ok(_) => EntitySource::Precomputed,
            Err(e) => {
                debug!(error = %e, "taxonomy tables unavailable");
                EntitySource::Fallback
            }
        };
        let themes = match self.conn.prepare(THEME_PROBE_SQL) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "theme tables unavailable");
                false
            }
        };
        let caps = Capabilities { entities, themes };
        info!(entities = ?caps.entities, themes = caps.themes, "probed store capabilities");
        caps
    }

    // ── Listing ──

    /// One filtered page plus the total for the same filter.
    ///
    /// Count and page run in one transaction so they see the same snapshot.
    pub fn list_comments(&mut self, query: &ListQuery) -> Result<CommentPage, StoreError> {
        let plan = query.plan();
        let tx = self.conn.transaction()?;
        let total = query_count(&tx, &plan.count_sql(), plan.count_params())?;
        let rows = query_rows(&tx, &plan.page_sql(), &plan.page_params())?;
        tx.commit()?;

        debug!(total, returned = rows.len(), page = query.page, "listed comments");
        Ok(CommentPage {
            comments: rows.iter().map(normalize_comment).collect(),
            pagination: Pagination::new(query, total),
        })
    }

    /// A single comment by id, regardless of status.
    pub fn get_comment(&self, id: &str) -> Result<NormalizedComment, StoreError> {
        let sql = format!("{COMMENT_SELECT} WHERE a.comment_id = ?");
        let rows = query_rows(&self.conn, &sql, &[QueryParam::Text(id.to_string())])?;
        rows.first()
            .map(normalize_comment)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    // ── Entities & themes ──

    /// Ranked entities from whichever source the probe selected.
    pub fn entities(&self, source: EntitySource) -> Result<Vec<Entity>, StoreError> {
        match source {
            EntitySource::Precomputed => self.precomputed_entities(),
            EntitySource::Fallback => self.mine_entities(),
        }
    }

    /// Taxonomy entries with at least one associated comment.
    pub fn precomputed_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let batches = query_batches(&self.conn, PRECOMPUTED_ENTITIES_SQL, &[])?;
        let mut entities = Vec::new();
        for batch in &batches {
            let names = column(batch, "name")?;
            let counts = int64_column(batch, "cnt")?;
            for row in 0..batch.num_rows() {
                let Some(name) = get_string(names, row) else {
                    continue;
                };
                entities.push(Entity {
                    name: name.trim().to_string(),
                    entity_type: EntityType::Taxonomy,
                    count: counts.value(row).max(0) as u64,
                });
            }
        }
        Ok(rank_entities(entities))
    }

    /// Mine key points, categories and organizations from completed analyses.
    pub fn mine_entities(&self) -> Result<Vec<Entity>, StoreError> {
        let batches = query_batches(
            &self.conn,
            MINING_SCAN_SQL,
            &[QueryParam::Text(AnalysisStatus::Completed.as_str().to_string())],
        )?;
        let mut sections = Vec::new();
        for batch in &batches {
            let col = column(batch, "structured_sections")?;
            sections.extend((0..batch.num_rows()).filter_map(|row| get_string(col, row)));
        }
        let entities = mine_entities(sections.iter().map(String::as_str));
        info!(
            scanned = sections.len(),
            entities = entities.len(),
            "mined entities from analyses"
        );
        Ok(entities)
    }

    /// Precomputed themes, or an empty list when the theme tables are absent.
    pub fn themes(&self, available: bool) -> Result<Vec<Theme>, StoreError> {
        if !available {
            debug!("theme tables absent, returning no themes");
            return Ok(Vec::new());
        }
        let batches = query_batches(&self.conn, THEMES_SQL, &[])?;
        let mut themes = Vec::new();
        for batch in &batches {
            let ids = column(batch, "id")?;
            let names = column(batch, "name")?;
            let descriptions = column(batch, "description")?;
            let counts = int64_column(batch, "cnt")?;
            for row in 0..batch.num_rows() {
                themes.push(Theme {
                    id: get_string(ids, row).unwrap_or_default(),
                    name: get_string(names, row).unwrap_or_default(),
                    description: get_string(descriptions, row).unwrap_or_default(),
                    count: counts.value(row).max(0) as u64,
                });
            }
        }
        Ok(themes)
    }

    // ── Export ──

    /// Every completed analysis, refused outright above [`EXPORT_ROW_LIMIT`].
    pub fn export_completed(&mut self) -> Result<Export, StoreError> {
        let plan = ListQuery::default().plan();
        let tx = self.conn.transaction()?;
        let count = query_count(&tx, &plan.count_sql(), plan.count_params())?;
        if count > EXPORT_ROW_LIMIT {
            warn!(count, limit = EXPORT_ROW_LIMIT, "export refused");
            return Err(StoreError::ExportTooLarge {
                count,
                limit: EXPORT_ROW_LIMIT,
            });
        }
        let rows = query_rows(&tx, &plan.unpaged_sql(), plan.count_params())?;
        tx.commit()?;

        info!(count, "exported completed analyses");
        Ok(Export {
            count,
            comments: rows.iter().map(normalize_for_export).collect(),
        })
    }

    /// Access the underlying DuckDB connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

// ── Query helpers ──

fn bind(params: &[QueryParam]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            QueryParam::Text(s) => Value::Text(s.clone()),
            QueryParam::Int(i) => Value::BigInt(*i),
        })
        .collect()
}

fn query_batches(
    conn: &Connection,
    sql: &str,
    params: &[QueryParam],
) -> Result<Vec<RecordBatch>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let batches: Vec<RecordBatch> = stmt.query_arrow(params_from_iter(bind(params)))?.collect();
    Ok(batches)
}

fn query_count(conn: &Connection, sql: &str, params: &[QueryParam]) -> Result<u64, StoreError> {
    let batches = query_batches(conn, sql, params)?;
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or(StoreError::NoResults)?;
    let col = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
    Ok(col.value(0).max(0) as u64)
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    params: &[QueryParam],
) -> Result<Vec<AnalysisRow>, StoreError> {
    let batches = query_batches(conn, sql, params)?;
    let mut rows = Vec::new();
    for batch in &batches {
        let ids = column(batch, "comment_id")?;
        let statuses = column(batch, "status")?;
        let sections = column(batch, "structured_sections")?;
        let created = column(batch, "created_at")?;
        let attributes = column(batch, "attributes_json")?;
        for row in 0..batch.num_rows() {
            let comment_id = get_string(ids, row)
                .ok_or_else(|| StoreError::Other(format!("null comment_id at row {row}")))?;
            rows.push(AnalysisRow {
                comment_id,
                status: get_string(statuses, row).unwrap_or_default(),
                structured_sections: get_string(sections, row),
                created_at: get_string(created, row),
                attributes_json: get_string(attributes, row),
            });
        }
    }
    Ok(rows)
}

// ── Arrow extraction helpers ──

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a dyn Array, StoreError> {
    batch
        .column_by_name(name)
        .map(|c| c.as_ref())
        .ok_or_else(|| StoreError::Other(format!("missing '{name}' column")))
}

fn int64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array, StoreError> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| StoreError::Other(format!("'{name}' column not i64")))
}

/// Extract a string value from an Arrow array (Utf8, LargeUtf8 or Utf8View).
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        return Some(arr.value(row).to_string());
    }
    if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        return Some(arr.value(row).to_string());
    }
    any.downcast_ref::<StringViewArray>()
        .map(|arr| arr.value(row).to_string())
}

// ── Import helpers ──

/// DuckDB table function reading `path`, chosen by file extension.
fn source_scan(path: &Path) -> Result<String, StoreError> {
    if !path.exists() {
        return Err(StoreError::SourceNotFound(path.to_path_buf()));
    }
    let quoted = path.display().to_string().replace('\'', "''");
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => Ok(format!("read_parquet('{quoted}')")),
        Some("csv") => Ok(format!(
            "read_csv('{quoted}', header = true, all_varchar = true)"
        )),
        _ => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn find_source(data_dir: &Path, table: &str) -> Result<std::path::PathBuf, StoreError> {
    ["parquet", "csv"]
        .iter()
        .map(|ext| data_dir.join(format!("{table}.{ext}")))
        .find(|p| p.exists())
        .ok_or_else(|| StoreError::SourceNotFound(data_dir.join(format!("{table}.parquet"))))
}
