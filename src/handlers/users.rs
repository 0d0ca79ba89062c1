use super::common::{message_response, page_request, success_response};
use crate::{
    auth::{parse_user_role, AdminUser, AdminUserUpdate, UserFilter, UserView},
    errors::{ErrorResponse, ServiceError},
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn admin_user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// USER or ADMIN, case-insensitive
    pub role: Option<String>,
    pub is_active: Option<bool>,
    /// Matches name or email
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "users-admin",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts, newest first", body = ApiResponse<PaginatedResponse<UserView>>),
        (status = 400, description = "Unknown role filter", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<UserView>>>, ServiceError> {
    let page = page_request(query.page, query.limit, &state.config);
    let role = query
        .role
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_user_role)
        .transpose()?;
    let filter = UserFilter {
        role,
        is_active: query.is_active,
        search: query.search,
    };
    let users = state.services.auth.list_users(filter, page).await?;
    Ok(success_response(users))
}

/// Change name, phone, role or active flag
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}",
    tag = "users-admin",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AdminUserUpdate,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserView>),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<ApiResponse<UserView>>, ServiceError> {
    let user = state.services.auth.update_user(id, payload).await?;
    Ok(success_response(user))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    tag = "users-admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "User has orders or is the caller", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.auth.delete_user(&admin, id).await?;
    Ok(message_response("User deleted"))
}
