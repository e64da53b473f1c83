//! Filtered, paginated comment listing: predicate and positional parameters.
//!
//! A [`ListQuery`] compiles into a [`QueryPlan`] holding one `WHERE` clause and
//! its filter parameters. The page query and the count query are both rendered
//! from that single plan, so `total` is always computed with the predicate that
//! produced the page.
//!
//! DuckDB binds `?` placeholders positionally, so parameters are pushed in the
//! same order their fragments are appended to the clause.

use serde::Serialize;

use crate::AnalysisStatus;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

/// Columns of the analysis/raw-submission join, in [`crate::AnalysisRow`] order.
pub const COMMENT_SELECT: &str = "SELECT a.comment_id, a.status, a.structured_sections, \
     CAST(a.created_at AS VARCHAR) AS created_at, r.attributes_json \
     FROM analyses a LEFT JOIN raw_submissions r ON r.id = a.comment_id";

/// Newest first; comment id breaks timestamp ties.
pub const COMMENT_ORDER: &str = "ORDER BY a.created_at DESC, a.comment_id ASC";

const COUNT_SELECT: &str = "SELECT count(*)::BIGINT AS cnt \
     FROM analyses a LEFT JOIN raw_submissions r ON r.id = a.comment_id";

/// A positional SQL parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Text(String),
    Int(i64),
}

/// Listing request after coercion and clamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub limit: u64,
    pub search: Option<String>,
    pub entity: Option<String>,
    pub status: AnalysisStatus,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search: None,
            entity: None,
            status: AnalysisStatus::default(),
        }
    }
}

impl ListQuery {
    /// Build from untrusted request values.
    ///
    /// Non-numeric page/limit fall back to the defaults, `page` is clamped to
    /// at least 1 and `limit` to `1..=MAX_LIMIT`. Blank filters are dropped.
    pub fn from_raw(
        page: Option<&str>,
        limit: Option<&str>,
        search: Option<&str>,
        entity: Option<&str>,
        status: AnalysisStatus,
    ) -> Self {
        let page = page
            .and_then(coerce_int)
            .map_or(DEFAULT_PAGE, |p| p.max(1) as u64);
        let limit = limit
            .and_then(coerce_int)
            .map_or(DEFAULT_LIMIT, |l| l.clamp(1, MAX_LIMIT as i64) as u64);
        Self {
            page,
            limit,
            search: non_blank(search),
            entity: non_blank(entity),
            status,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1).saturating_mul(self.limit)
    }

    /// Compile the filters into a single predicate and its parameters.
    pub fn plan(&self) -> QueryPlan {
        let mut clause = String::from("a.status = ?");
        let mut params = vec![QueryParam::Text(self.status.as_str().to_string())];

        if let Some(search) = &self.search {
            let pattern = contains_pattern(search);
            clause.push_str(
                " AND (r.attributes_json ILIKE ? ESCAPE '\\' \
                 OR a.structured_sections ILIKE ? ESCAPE '\\')",
            );
            params.push(QueryParam::Text(pattern.clone()));
            params.push(QueryParam::Text(pattern));
        }

        if let Some(entity) = &self.entity {
            clause.push_str(" AND a.structured_sections LIKE ? ESCAPE '\\'");
            params.push(QueryParam::Text(contains_pattern(entity)));
        }

        QueryPlan {
            where_clause: clause,
            params,
            limit: to_i64(self.limit.max(1)),
            offset: to_i64(self.offset()),
        }
    }
}

/// One predicate rendered as page, count and unpaged queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub where_clause: String,
    /// Filter parameters only; pagination is appended by [`page_params`](Self::page_params).
    pub params: Vec<QueryParam>,
    pub limit: i64,
    pub offset: i64,
}

impl QueryPlan {
    pub fn page_sql(&self) -> String {
        format!(
            "{COMMENT_SELECT} WHERE {} {COMMENT_ORDER} LIMIT ? OFFSET ?",
            self.where_clause
        )
    }

    pub fn page_params(&self) -> Vec<QueryParam> {
        let mut params = self.params.clone();
        params.push(QueryParam::Int(self.limit));
        params.push(QueryParam::Int(self.offset));
        params
    }

    pub fn count_sql(&self) -> String {
        format!("{COUNT_SELECT} WHERE {}", self.where_clause)
    }

    pub fn count_params(&self) -> &[QueryParam] {
        &self.params
    }

    /// Every matching row, same ordering as the page query.
    pub fn unpaged_sql(&self) -> String {
        format!("{COMMENT_SELECT} WHERE {} {COMMENT_ORDER}", self.where_clause)
    }
}

/// Page metadata returned alongside a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(query: &ListQuery, total: u64) -> Self {
        let limit = query.limit.max(1);
        Self {
            page: query.page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// Parse an integer the way a lenient form field would: "3", " 3 ", "3.9".
fn coerce_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `%needle%` with LIKE metacharacters escaped so they match literally.
fn contains_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> QueryParam {
        QueryParam::Text(s.to_string())
    }

    #[test]
    fn defaults() {
        let q = ListQuery::from_raw(None, None, None, None, AnalysisStatus::default());
        assert_eq!(q, ListQuery::default());
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 20);
        assert_eq!(q.status, AnalysisStatus::Completed);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn status_only_predicate() {
        let plan = ListQuery::default().plan();
        assert_eq!(plan.where_clause, "a.status = ?");
        assert_eq!(plan.params, vec![text("completed")]);
        assert_eq!(plan.page_params().len(), 3);
    }

    #[test]
    fn search_and_entity_params_follow_clause_order() {
        let q = ListQuery {
            search: Some("medicare".into()),
            entity: Some("Cost concerns".into()),
            status: AnalysisStatus::Pending,
            ..ListQuery::default()
        };
        let plan = q.plan();

        let search_at = plan.where_clause.find("r.attributes_json ILIKE").unwrap();
        let entity_at = plan.where_clause.find("a.structured_sections LIKE").unwrap();
        assert!(search_at < entity_at);
        assert!(plan.where_clause.contains(" OR "));
        assert_eq!(plan.where_clause.matches('?').count(), plan.params.len());

        assert_eq!(
            plan.params,
            vec![
                text("pending"),
                text("%medicare%"),
                text("%medicare%"),
                text("%Cost concerns%"),
            ]
        );
    }

    #[test]
    fn count_params_strip_pagination() {
        let q = ListQuery {
            page: 3,
            limit: 10,
            search: Some("rural".into()),
            ..ListQuery::default()
        };
        let plan = q.plan();
        let page = plan.page_params();
        assert_eq!(&page[..page.len() - 2], plan.count_params());
        assert_eq!(page[page.len() - 2], QueryParam::Int(10));
        assert_eq!(page[page.len() - 1], QueryParam::Int(20));
    }

    #[test]
    fn page_and_count_share_predicate() {
        let q = ListQuery {
            search: Some("x".into()),
            entity: Some("y".into()),
            ..ListQuery::default()
        };
        let plan = q.plan();
        assert!(plan.page_sql().contains(&plan.where_clause));
        assert!(plan.count_sql().contains(&plan.where_clause));
        assert!(plan.unpaged_sql().contains(&plan.where_clause));
        assert!(plan.page_sql().ends_with("LIMIT ? OFFSET ?"));
        assert!(!plan.count_sql().contains("LIMIT"));
        assert!(plan.page_sql().contains("LEFT JOIN raw_submissions"));
    }

    #[test]
    fn ordering_has_tie_break() {
        let plan = ListQuery::default().plan();
        assert!(
            plan.page_sql()
                .contains("ORDER BY a.created_at DESC, a.comment_id ASC")
        );
    }

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        let q = ListQuery::from_raw(Some("4"), Some("25"), None, None, AnalysisStatus::Completed);
        assert_eq!(q.offset(), 75);
        assert_eq!(q.plan().offset, 75);
    }

    #[test]
    fn page_clamped_to_one() {
        for raw in ["0", "-3", "-100"] {
            let q = ListQuery::from_raw(Some(raw), None, None, None, AnalysisStatus::Completed);
            assert_eq!(q.page, 1, "page {raw}");
            assert_eq!(q.offset(), 0);
        }
    }

    #[test]
    fn limit_clamped_to_bounds() {
        let low = ListQuery::from_raw(None, Some("0"), None, None, AnalysisStatus::Completed);
        assert_eq!(low.limit, 1);
        let negative = ListQuery::from_raw(None, Some("-5"), None, None, AnalysisStatus::Completed);
        assert_eq!(negative.limit, 1);
        let high = ListQuery::from_raw(None, Some("5000"), None, None, AnalysisStatus::Completed);
        assert_eq!(high.limit, MAX_LIMIT);
    }

    #[test]
    fn non_numeric_falls_back_to_defaults() {
        let q = ListQuery::from_raw(Some("abc"), Some(""), None, None, AnalysisStatus::Completed);
        assert_eq!(q.page, DEFAULT_PAGE);
        assert_eq!(q.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn fractional_input_truncates() {
        let q = ListQuery::from_raw(Some("2.9"), Some(" 15 "), None, None, AnalysisStatus::Completed);
        assert_eq!(q.page, 2);
        assert_eq!(q.limit, 15);
    }

    #[test]
    fn blank_filters_are_ignored() {
        let q = ListQuery::from_raw(None, None, Some("   "), Some(""), AnalysisStatus::Completed);
        assert!(q.search.is_none());
        assert!(q.entity.is_none());
        assert_eq!(q.plan().params.len(), 1);
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn total_pages_is_ceiling() {
        let q = ListQuery {
            limit: 20,
            ..ListQuery::default()
        };
        assert_eq!(Pagination::new(&q, 0).total_pages, 0);
        assert_eq!(Pagination::new(&q, 1).total_pages, 1);
        assert_eq!(Pagination::new(&q, 20).total_pages, 1);
        assert_eq!(Pagination::new(&q, 21).total_pages, 2);
        assert_eq!(Pagination::new(&q, 101).total_pages, 6);
    }

    #[test]
    fn pagination_serializes_camel_case() {
        let json = serde_json::to_value(Pagination::new(&ListQuery::default(), 41)).unwrap();
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["total"], 41);
    }
}
