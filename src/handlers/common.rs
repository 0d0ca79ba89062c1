use crate::{config::AppConfig, services::PageRequest, ApiResponse};
use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Acknowledgement for operations that return no entity
pub fn message_response(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse::message(message.into()))
}

/// Resolves optional `page`/`limit` query values against the configured
/// defaults; `limit` is clamped to the configured maximum.
pub fn page_request(page: Option<u64>, limit: Option<u64>, config: &AppConfig) -> PageRequest {
    let limit = limit
        .unwrap_or(config.api_default_page_size)
        .clamp(1, config.api_max_page_size);
    PageRequest::new(page.unwrap_or(1), limit)
}
