//! Request handlers. Each handler opens its own store session; nothing is
//! shared between requests besides the root connection and the probe result.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use commentscope_core::{AnalysisStatus, Entity, ListQuery, NormalizedComment, Theme};
use commentscope_store::{CommentPage, EntitySource, Export, StoreStats};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{ApiError, ApiResponse, AppState};

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Query params for `GET /api/comments`. Numbers arrive as text and are
/// coerced leniently by [`ListQuery::from_raw`].
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    #[serde(alias = "entityFilter")]
    pub entity: Option<String>,
    pub status: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<ListQuery, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => AnalysisStatus::default(),
            Some(raw) => raw.parse()?,
        };
        Ok(ListQuery::from_raw(
            self.page.as_deref(),
            self.limit.as_deref(),
            self.search.as_deref(),
            self.entity.as_deref(),
            status,
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EntityParams {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntityList {
    pub source: EntitySource,
    pub entities: Vec<Entity>,
}

#[derive(Debug, Serialize)]
pub struct ThemeList {
    pub themes: Vec<Theme>,
}

pub async fn health() -> ApiResponse<Value> {
    ApiResponse::ok(json!({ "status": "ok" }))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<StoreStats> {
    let stats = state.with_store(|store| store.stats()).await?;
    Ok(ApiResponse::ok(stats))
}

/// GET /api/comments?page=&limit=&search=&entity=&status=
pub async fn list_comments(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<CommentPage> {
    let Query(params) = params?;
    let query = params.into_query()?;
    let page = state
        .with_store(move |store| store.list_comments(&query))
        .await?;
    Ok(ApiResponse::ok(page))
}

/// GET /api/comments/:id
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NormalizedComment> {
    let comment = state.with_store(move |store| store.get_comment(&id)).await?;
    Ok(ApiResponse::ok(comment))
}

/// GET /api/entities?limit=
pub async fn entities(
    State(state): State<AppState>,
    params: Result<Query<EntityParams>, QueryRejection>,
) -> ApiResult<EntityList> {
    let Query(params) = params?;
    let source = state.capabilities().entities;
    let mut entities = state.with_store(move |store| store.entities(source)).await?;
    if let Some(limit) = params
        .limit
        .as_deref()
        .and_then(|l| l.trim().parse::<usize>().ok())
    {
        entities.truncate(limit);
    }
    Ok(ApiResponse::ok(EntityList { source, entities }))
}

/// GET /api/themes
pub async fn themes(State(state): State<AppState>) -> ApiResult<ThemeList> {
    let available = state.capabilities().themes;
    let themes = state
        .with_store(move |store| store.themes(available))
        .await?;
    Ok(ApiResponse::ok(ThemeList { themes }))
}

/// GET /api/export
pub async fn export(State(state): State<AppState>) -> ApiResult<Export> {
    let export = state.with_store(|store| store.export_completed()).await?;
    Ok(ApiResponse::ok(export))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use commentscope_store::DuckStore;
    use tower::ServiceExt;

    fn seeded_store() -> DuckStore {
        let store = DuckStore::open().unwrap();
        store.init_schema().unwrap();
        store
            .insert_raw_submission(
                "C-1",
                &json!({"comment": "Protect rural clinics", "organization": "Rural Health Coalition"})
                    .to_string(),
            )
            .unwrap();
        store
            .insert_analysis(
                "C-1",
                AnalysisStatus::Completed,
                Some(&json!({"category": "Access", "keyPoints": ["Rural access"]}).to_string()),
                Some("2025-01-01 00:00:01"),
            )
            .unwrap();
        store
            .insert_analysis(
                "C-2",
                AnalysisStatus::Completed,
                Some(&json!({"category": "Access"}).to_string()),
                Some("2025-01-01 00:00:02"),
            )
            .unwrap();
        store
            .insert_analysis("C-3", AnalysisStatus::Pending, None, Some("2025-01-01 00:00:03"))
            .unwrap();
        store
    }

    async fn get(store: DuckStore, uri: &str) -> (StatusCode, Value) {
        let app = crate::router(AppState::new(store));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get(seeded_store(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn list_uses_defaults_and_paginates() {
        let (status, body) = get(seeded_store(), "/api/comments?limit=1&page=2").await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["pagination"]["total"], 2);
        assert_eq!(data["pagination"]["totalPages"], 2);
        assert_eq!(data["pagination"]["page"], 2);
        assert_eq!(data["comments"].as_array().unwrap().len(), 1);
        assert_eq!(data["comments"][0]["id"], "C-1");
        assert_eq!(data["comments"][0]["originalText"], "Protect rural clinics");
        assert_eq!(data["comments"][0]["organizationName"], "Rural Health Coalition");
    }

    #[tokio::test]
    async fn list_clamps_bad_pagination() {
        let (status, body) = get(seeded_store(), "/api/comments?page=-4&limit=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pagination"]["page"], 1);
        assert_eq!(body["data"]["pagination"]["limit"], 20);
        assert_eq!(body["data"]["comments"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_filters_by_status_param() {
        let (_, body) = get(seeded_store(), "/api/comments?status=pending").await;
        assert_eq!(body["data"]["pagination"]["total"], 1);
        assert_eq!(body["data"]["comments"][0]["id"], "C-3");
    }

    #[tokio::test]
    async fn list_rejects_unknown_status() {
        let (status, body) = get(seeded_store(), "/api/comments?status=archived").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("archived"));
    }

    #[tokio::test]
    async fn malformed_query_string_is_enveloped_400() {
        let (status, body) = get(seeded_store(), "/api/comments?page=1&page=2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("page"));
        assert!(body["timestamp"].is_string());

        let (status, body) = get(seeded_store(), "/api/entities?limit=1&limit=2").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn list_with_no_matches_is_empty_not_404() {
        let (status, body) = get(seeded_store(), "/api/comments?search=nothing-matches-this").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["comments"], json!([]));
        assert_eq!(body["data"]["pagination"]["totalPages"], 0);
    }

    #[tokio::test]
    async fn get_comment_found_and_missing() {
        let (status, body) = get(seeded_store(), "/api/comments/C-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["category"], "Access");

        let (status, body) = get(seeded_store(), "/api/comments/NOPE").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn entities_fall_back_to_mining() {
        let (status, body) = get(seeded_store(), "/api/entities").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["source"], "fallback");
        let entities = body["data"]["entities"].as_array().unwrap();
        assert_eq!(entities[0]["name"], "Access");
        assert_eq!(entities[0]["type"], "category");
        assert_eq!(entities[0]["count"], 2);
        assert_eq!(entities[1]["name"], "Rural access");

        let (_, body) = get(seeded_store(), "/api/entities?limit=1").await;
        assert_eq!(body["data"]["entities"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn entities_use_precomputed_taxonomy_when_present() {
        let store = seeded_store();
        store.init_taxonomy_schema().unwrap();
        store
            .connection()
            .execute_batch(
                "INSERT INTO taxonomy_entries VALUES ('t1', 'Telehealth');
                 INSERT INTO entry_associations VALUES ('t1', 'C-1');",
            )
            .unwrap();
        let (_, body) = get(store, "/api/entities").await;
        assert_eq!(body["data"]["source"], "precomputed");
        assert_eq!(body["data"]["entities"][0]["name"], "Telehealth");
        assert_eq!(body["data"]["entities"][0]["type"], "taxonomy");
    }

    #[tokio::test]
    async fn themes_empty_without_tables() {
        let (status, body) = get(seeded_store(), "/api/themes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["themes"], json!([]));
    }

    #[tokio::test]
    async fn export_returns_completed_only() {
        let (status, body) = get(seeded_store(), "/api/export").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 2);
        let first = &body["data"]["comments"][0];
        assert_eq!(first["id"], "C-2");
        assert!(first.get("submissionDate").is_none());
    }

    #[tokio::test]
    async fn export_over_ceiling_is_bad_request() {
        let store = seeded_store();
        for i in 0..100 {
            store
                .insert_analysis(&format!("X-{i:03}"), AnalysisStatus::Completed, None, None)
                .unwrap();
        }
        let (status, body) = get(store, "/api/export").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("102"));
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn stats_counts_rows() {
        let (_, body) = get(seeded_store(), "/api/stats").await;
        assert_eq!(body["data"]["rawSubmissions"], 1);
        assert_eq!(body["data"]["analyses"], 3);
        assert_eq!(body["data"]["pending"], 1);
    }

    #[tokio::test]
    async fn unknown_route_is_404_envelope() {
        let (status, body) = get(seeded_store(), "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "route not found");
    }
}
