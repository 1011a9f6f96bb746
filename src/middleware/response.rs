use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;

/// Wrapper for API responses that adds the `{ "data": ... }` envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
    omit_body: bool,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
            omit_body: false,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
            omit_body: false,
        }
    }
}

impl ApiResponse<()> {
    /// 204 with no body
    pub fn no_content() -> Self {
        Self::with_status((), StatusCode::NO_CONTENT)
    }

    /// 200 with an empty body, as returned by relation mutations
    pub fn empty() -> Self {
        Self {
            data: (),
            status_code: None,
            omit_body: true,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        if status == StatusCode::NO_CONTENT || self.omit_body {
            return status.into_response();
        }

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return ApiError::internal_server_error("Failed to serialize response data")
                    .into_response();
            }
        };

        (status, Json(json!({ "data": data_value }))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn data_is_wrapped_without_success_flag() {
        let response = ApiResponse::success(vec!["a1", "a2"]).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "data": ["a1", "a2"] }));
    }

    #[tokio::test]
    async fn null_data_is_still_an_envelope() {
        let response = ApiResponse::success(Option::<u8>::None).into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "data": null }));
    }

    #[tokio::test]
    async fn empty_and_no_content_have_no_body() {
        let response = ApiResponse::empty().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(to_bytes(response.into_body(), usize::MAX).await.unwrap().is_empty());

        let response = ApiResponse::no_content().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
