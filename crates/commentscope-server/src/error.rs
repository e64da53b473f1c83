use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commentscope_core::CoreError;
use commentscope_store::StoreError;
use thiserror::Error;
use tracing::{error, warn};

use crate::envelope::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::ExportTooLarge { .. } => Self::BadRequest(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        let mut response = ApiResponse::failure(self.to_string()).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_status_codes() {
        let not_found: ApiError = StoreError::NotFound("C-1".into()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let too_large: ApiError = StoreError::ExportTooLarge {
            count: 101,
            limit: 100,
        }
        .into();
        assert_eq!(too_large.status(), StatusCode::BAD_REQUEST);
        assert!(too_large.to_string().contains("101"));

        let other: ApiError = StoreError::Other("connection refused".into()).into();
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.to_string(), "connection refused");
    }

    #[test]
    fn unknown_status_is_bad_request() {
        let err: ApiError = CoreError::UnknownStatus("archived".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
