use super::common::{created_response, message_response, success_response};
use crate::{
    auth::AuthUser,
    errors::{ErrorResponse, ServiceError},
    services::commerce::{AddressInput, AddressUpdate, AddressView},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_addresses).post(create_address))
        .route("/:id", put(update_address).delete(delete_address))
        .route("/:id/default", post(set_default_address))
}

#[utoipa::path(
    get,
    path = "/api/v1/addresses",
    tag = "addresses",
    responses((status = 200, description = "Default address first, then newest", body = ApiResponse<Vec<AddressView>>)),
    security(("Bearer" = []))
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<AddressView>>>, ServiceError> {
    let addresses = state.services.addresses.list(user.id).await?;
    Ok(success_response(addresses))
}

#[utoipa::path(
    post,
    path = "/api/v1/addresses",
    tag = "addresses",
    request_body = AddressInput,
    responses(
        (status = 201, description = "Address saved", body = ApiResponse<AddressView>),
        (status = 400, description = "Invalid input", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddressInput>,
) -> Result<(StatusCode, Json<ApiResponse<AddressView>>), ServiceError> {
    let address = state.services.addresses.create(user.id, payload).await?;
    Ok(created_response(address))
}

#[utoipa::path(
    put,
    path = "/api/v1/addresses/{id}",
    tag = "addresses",
    params(("id" = Uuid, Path, description = "Address ID")),
    request_body = AddressUpdate,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<AddressView>),
        (status = 403, description = "Address belongs to another user", body = ErrorResponse),
        (status = 404, description = "Address not found", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddressUpdate>,
) -> Result<Json<ApiResponse<AddressView>>, ServiceError> {
    let address = state.services.addresses.update(user.id, id, payload).await?;
    Ok(success_response(address))
}

pub async fn set_default_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AddressView>>, ServiceError> {
    let address = state.services.addresses.set_default(user.id, id).await?;
    Ok(success_response(address))
}

#[utoipa::path(
    delete,
    path = "/api/v1/addresses/{id}",
    tag = "addresses",
    params(("id" = Uuid, Path, description = "Address ID")),
    responses(
        (status = 200, description = "Address deleted"),
        (status = 403, description = "Address belongs to another user", body = ErrorResponse),
        (status = 409, description = "Address is referenced by an order", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.addresses.delete(user.id, id).await?;
    Ok(message_response("Address deleted"))
}
