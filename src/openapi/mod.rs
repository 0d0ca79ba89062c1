use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("Opaque session token issued by POST /api/v1/auth/login"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Catalog, cart, address book and order workflow for an online store.

## Authentication

Obtain a token from `POST /api/v1/auth/login` and send it on every protected call:

```
Authorization: Bearer <token>
```

## Orders

`POST /api/v1/orders` converts the caller's cart into an order in one database
transaction: stock is checked and decremented, prices are snapshotted and the
cart is emptied. A `503` with `"retryable": true` means the transaction was
rolled back and the request can be repeated unchanged.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration and sessions"),
        (name = "catalog", description = "Storefront categories and products"),
        (name = "catalog-admin", description = "Catalog maintenance"),
        (name = "cart", description = "The caller's shopping cart"),
        (name = "addresses", description = "Shipping address book"),
        (name = "orders", description = "Order placement and history"),
        (name = "orders-admin", description = "Fulfillment and reporting"),
        (name = "users-admin", description = "Account management"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,
        crate::handlers::auth::update_profile,
        crate::handlers::auth::change_password,
        crate::handlers::catalog::list_categories,
        crate::handlers::catalog::get_category,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::featured_products,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::create_category,
        crate::handlers::catalog::admin_list_products,
        crate::handlers::catalog::create_product,
        crate::handlers::catalog::update_product,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::addresses::list_addresses,
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::list_all_orders,
        crate::handlers::orders::order_stats,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::update_payment_status,
        crate::handlers::users::list_users,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::health::health_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::services::pricing::OrderTotals,
            crate::entities::commerce::OrderStatus,
            crate::entities::commerce::PaymentStatus,
            crate::entities::UserRole,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_order_workflow() {
        let json = ApiDocV1::openapi()
            .to_json()
            .expect("openapi document serializes");
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/orders/{id}/cancel"));
        assert!(json.contains("/api/v1/admin/orders/stats"));
        assert!(json.contains("/api/v1/admin/users/{id}"));
        assert!(json.contains("/api/v1/auth/change-password"));
        assert!(json.contains("Bearer"));
    }
}
