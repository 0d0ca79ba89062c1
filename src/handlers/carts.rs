use super::common::success_response;
use crate::{
    auth::AuthUser,
    errors::{ErrorResponse, ServiceError},
    services::commerce::{AddCartItemInput, CartView, UpdateCartItemInput},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

/// Routes for the caller's own cart; there is no cart id in the path.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:item_id", put(update_item).delete(remove_item))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    tag = "cart",
    responses(
        (status = 200, description = "Cart with computed subtotal", body = ApiResponse<CartView>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.get_or_create(user.id).await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    tag = "cart",
    request_body = AddCartItemInput,
    responses(
        (status = 200, description = "Item added or merged", body = ApiResponse<CartView>),
        (status = 400, description = "Quantity below 1", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 422, description = "Insufficient stock", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddCartItemInput>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.add_item(user.id, payload).await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{item_id}",
    tag = "cart",
    params(("item_id" = Uuid, Path, description = "Cart line ID")),
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartView>),
        (status = 400, description = "Quantity below 1", body = ErrorResponse),
        (status = 404, description = "Line not in caller's cart", body = ErrorResponse),
        (status = 422, description = "Insufficient stock", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemInput>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state
        .services
        .cart
        .update_quantity(user.id, item_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.remove_item(user.id, item_id).await?;
    Ok(success_response(cart))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.services.cart.clear(user.id).await?;
    Ok(success_response(cart))
}
