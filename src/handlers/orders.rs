use super::common::{created_response, page_request, success_response};
use crate::{
    auth::{AdminUser, AuthUser},
    errors::{ErrorResponse, ServiceError},
    services::orders::{
        CreateOrderInput, OrderFilter, OrderStats, OrderView, UpdateOrderStatusInput,
        UpdatePaymentStatusInput,
    },
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders).post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/cancel", post(cancel_order))
}

pub fn admin_order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/stats", get(order_stats))
        .route("/orders/by-number/:number", get(get_order_by_number))
        .route("/orders/:id/status", put(update_order_status))
        .route("/orders/:id/payment-status", put(update_payment_status))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AdminOrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Order status, case-insensitive
    pub status: Option<String>,
    /// Payment status, case-insensitive
    pub payment_status: Option<String>,
    /// Matches order number, customer name or email
    pub search: Option<String>,
}

/// Place an order from the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order placed; stock reserved and cart emptied", body = ApiResponse<OrderView>),
        (status = 400, description = "Cart is empty or input invalid", body = ErrorResponse),
        (status = 403, description = "Address belongs to another user", body = ErrorResponse),
        (status = 404, description = "Address or product not found", body = ErrorResponse),
        (status = 422, description = "Insufficient stock", body = ErrorResponse),
        (status = 503, description = "Transaction failed; safe to retry", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderView>>), ServiceError> {
    let order = state.services.orders.create_order(user.id, payload).await?;
    Ok(created_response(order))
}

/// The caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<PaginatedResponse<OrderView>>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderView>>>, ServiceError> {
    let page = page_request(query.page, query.limit, &state.config);
    let orders = state
        .services
        .orders
        .list_orders_for_user(user.id, page)
        .await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items and address", body = ApiResponse<OrderView>),
        (status = 403, description = "Order belongs to another user", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.get_order(&user, id).await?;
    Ok(success_response(order))
}

/// Cancel a PENDING or CONFIRMED order and restore its stock
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    tag = "orders",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderView>),
        (status = 403, description = "Order belongs to another user", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
        (status = 409, description = "Order can no longer be cancelled", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.cancel_order(&user, id).await?;
    Ok(success_response(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    tag = "orders-admin",
    params(AdminOrderListQuery),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<PaginatedResponse<OrderView>>),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminOrderListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderView>>>, ServiceError> {
    let page = page_request(query.page, query.limit, &state.config);
    let filter = OrderFilter {
        status: query.status,
        payment_status: query.payment_status,
        search: query.search,
    };
    let orders = state.services.orders.list_all_orders(filter, page).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/stats",
    tag = "orders-admin",
    responses(
        (status = 200, description = "Order counts by status", body = ApiResponse<OrderStats>),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn order_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<OrderStats>>, ServiceError> {
    let stats = state.services.orders.get_order_stats().await?;
    Ok(success_response(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/by-number/{number}",
    tag = "orders-admin",
    params(("number" = String, Path, description = "Order number, e.g. ORD-240307-0042")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(number): Path<String>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.get_order_by_number(&number).await?;
    Ok(success_response(order))
}

/// Set any order status; transitions are not validated
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    tag = "orders-admin",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusInput,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderView>),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusInput>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state
        .services
        .orders
        .update_order_status(id, &payload.status)
        .await?;
    Ok(success_response(order))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/payment-status",
    tag = "orders-admin",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdatePaymentStatusInput,
    responses(
        (status = 200, description = "Payment status updated", body = ApiResponse<OrderView>),
        (status = 400, description = "Unknown payment status", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_payment_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusInput>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state
        .services
        .orders
        .update_payment_status(id, &payload.payment_status)
        .await?;
    Ok(success_response(order))
}
