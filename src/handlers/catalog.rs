use super::common::{created_response, message_response, page_request, success_response};
use crate::{
    auth::AdminUser,
    errors::{ErrorResponse, ServiceError},
    services::commerce::{
        AdminProductFilter, CategoryInput, CategoryUpdate, CategoryView, ProductFilter,
        ProductInput, ProductUpdate, ProductView,
    },
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Storefront catalog: categories and active products.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/:id", get(get_category))
        .route("/products", get(list_products))
        .route("/products/featured", get(featured_products))
        .route("/products/:id", get(get_product))
}

/// Back-office catalog maintenance.
pub fn admin_catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(admin_list_categories).post(create_category),
        )
        .route(
            "/categories/:id",
            axum::routing::put(update_category).delete(delete_category),
        )
        .route("/products", get(admin_list_products).post(create_product))
        .route(
            "/products/:id",
            get(admin_get_product)
                .put(update_product)
                .delete(delete_product),
        )
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category_id: Option<Uuid>,
    /// Matches name or description, case-insensitively
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Comma-separated sizes; products offering any of them match
    pub sizes: Option<String>,
    /// Comma-separated colors; products offering any of them match
    pub colors: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AdminProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category_id: Option<Uuid>,
    /// Matches name or SKU, case-insensitively
    pub search: Option<String>,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "catalog",
    responses((status = 200, description = "Active categories", body = ApiResponse<Vec<CategoryView>>))
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CategoryView>>>, ServiceError> {
    let categories = state.services.catalog.list_categories(false).await?;
    Ok(success_response(categories))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = ApiResponse<CategoryView>),
        (status = 404, description = "Category not found", body = ErrorResponse),
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CategoryView>>, ServiceError> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(success_response(category))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "catalog",
    params(ProductListQuery),
    responses((status = 200, description = "Active products", body = ApiResponse<PaginatedResponse<ProductView>>))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProductView>>>, ServiceError> {
    let page = page_request(query.page, query.limit, &state.config);
    let filter = ProductFilter {
        category_id: query.category_id,
        search: query.search,
        min_price: query.min_price,
        max_price: query.max_price,
        sizes: split_list(query.sizes.as_deref()),
        colors: split_list(query.colors.as_deref()),
    };
    let products = state.services.catalog.list_products(filter, page).await?;
    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/featured",
    tag = "catalog",
    responses((status = 200, description = "Up to eight featured products", body = ApiResponse<Vec<ProductView>>))
)]
pub async fn featured_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProductView>>>, ServiceError> {
    let products = state.services.catalog.featured_products().await?;
    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found or inactive", body = ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    let product = state.services.catalog.get_product(id, false).await?;
    Ok(success_response(product))
}

pub async fn admin_list_categories(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<CategoryView>>>, ServiceError> {
    let categories = state.services.catalog.list_categories(true).await?;
    Ok(success_response(categories))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/categories",
    tag = "catalog-admin",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryView>),
        (status = 409, description = "Name already used", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryView>>), ServiceError> {
    let category = state.services.catalog.create_category(payload).await?;
    Ok(created_response(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<ApiResponse<CategoryView>>, ServiceError> {
    let category = state.services.catalog.update_category(id, payload).await?;
    Ok(success_response(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_category(id).await?;
    Ok(message_response("Category deleted"))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    tag = "catalog-admin",
    params(AdminProductListQuery),
    responses((status = 200, description = "All products including inactive", body = ApiResponse<PaginatedResponse<ProductView>>)),
    security(("Bearer" = []))
)]
pub async fn admin_list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminProductListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProductView>>>, ServiceError> {
    let page = page_request(query.page, query.limit, &state.config);
    let filter = AdminProductFilter {
        category_id: query.category_id,
        search: query.search,
    };
    let products = state
        .services
        .catalog
        .admin_list_products(filter, page)
        .await?;
    Ok(success_response(products))
}

pub async fn admin_get_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    let product = state.services.catalog.get_product(id, true).await?;
    Ok(success_response(product))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    tag = "catalog-admin",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductView>),
        (status = 400, description = "Invalid price or stock", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "SKU already used", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<ProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductView>>), ServiceError> {
    let product = state.services.catalog.create_product(payload).await?;
    Ok(created_response(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    tag = "catalog-admin",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductUpdate,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductView>),
        (status = 404, description = "Product not found", body = ErrorResponse),
        (status = 409, description = "SKU already used", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductUpdate>,
) -> Result<Json<ApiResponse<ProductView>>, ServiceError> {
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(message_response("Product deleted"))
}
