use crate::{
    entities::commerce::{
        cart, cart_item,
        product::{self, string_list},
        Cart, CartItem, Product,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Per-user shopping cart.
///
/// Each user owns at most one cart, created lazily on first access and never
/// removed; checkout empties its lines. A line is identified by
/// `(product, size, color)` so adding the same combination twice bumps the
/// quantity instead of inserting a second row.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddCartItemInput {
    pub product_id: Uuid,
    /// Defaults to 1
    pub quantity: Option<i32>,
    #[validate(length(max = 50))]
    pub size: Option<String>,
    #[validate(length(max = 50))]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateCartItemInput {
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartProductSummary {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Absent when the product has since been deleted
    pub product: Option<CartProductSummary>,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<CartLineView>,
    pub subtotal: Decimal,
    /// Number of lines, not units
    pub item_count: usize,
}

fn require_positive(quantity: i32) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::InvalidQuantity(format!(
            "quantity must be at least 1, got {}",
            quantity
        )));
    }
    Ok(())
}

fn merged_quantity(current: i32, extra: i32) -> Result<i32, ServiceError> {
    current.checked_add(extra).ok_or_else(|| {
        ServiceError::InvalidQuantity(format!(
            "adding {} to a line of {} exceeds the largest quantity",
            extra, current
        ))
    })
}

fn ensure_stock(product: &product::Model, wanted: i32) -> Result<(), ServiceError> {
    if product.stock < wanted {
        return Err(ServiceError::InsufficientStock(format!(
            "{} has {} in stock, {} requested",
            product.name, product.stock, wanted
        )));
    }
    Ok(())
}

fn optional_eq(column: cart_item::Column, value: Option<&str>) -> Condition {
    match value {
        Some(v) => Condition::all().add(column.eq(v)),
        None => Condition::all().add(column.is_null()),
    }
}

fn line_view(item: cart_item::Model, product: Option<product::Model>) -> CartLineView {
    let line_total = product
        .as_ref()
        .map(|p| p.price * Decimal::from(item.quantity))
        .unwrap_or(Decimal::ZERO);
    CartLineView {
        id: item.id,
        product_id: item.product_id,
        product: product.map(|p| CartProductSummary {
            image: string_list(&p.images).into_iter().next(),
            id: p.id,
            name: p.name,
            sku: p.sku,
            price: p.price,
            stock: p.stock,
            is_active: p.is_active,
        }),
        quantity: item.quantity,
        size: item.size,
        color: item.color,
        line_total,
    }
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the user's cart with computed subtotal, creating it if absent.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.cart_for(user_id).await?;
        self.view(cart).await
    }

    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let quantity = input.quantity.unwrap_or(1);
        require_positive(quantity)?;

        let product = Product::find_by_id(input.product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;
        ensure_stock(&product, quantity)?;

        let cart = self.cart_for(user_id).await?;
        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .filter(optional_eq(cart_item::Column::Size, input.size.as_deref()))
            .filter(optional_eq(cart_item::Column::Color, input.color.as_deref()))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            Some(line) => {
                let merged = merged_quantity(line.quantity, quantity)?;
                ensure_stock(&product, merged)?;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(merged);
                active.updated_at = Set(now);
                active.update(&*self.db).await?;
                info!(cart_id = %cart.id, quantity = merged, "cart line merged");
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(quantity),
                    size: Set(input.size),
                    color: Set(input.color),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?;
                info!(cart_id = %cart.id, quantity, "cart line added");
            }
        }

        self.touch(cart).await
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        require_positive(quantity)?;
        let cart = self.cart_for(user_id).await?;

        let line = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let product = Product::find_by_id(line.product_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::ProductNotFound(line.product_id))?;
        ensure_stock(&product, quantity)?;

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.touch(cart).await
    }

    /// Removing a line that is already gone is not an error.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.cart_for(user_id).await?;
        CartItem::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;
        self.touch(cart).await
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.cart_for(user_id).await?;
        let removed = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;
        info!(cart_id = %cart.id, removed = removed.rows_affected, "cart cleared");
        self.touch(cart).await
    }

    async fn cart_for(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        {
            return Ok(cart);
        }

        let now = Utc::now();
        let created = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await;

        match created {
            Ok(cart) => Ok(cart),
            // Lost a creation race against another request for the same user
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Cart::find()
                    .filter(cart::Column::UserId.eq(user_id))
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| ServiceError::InternalError("cart creation failed".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn touch(&self, cart: cart::Model) -> Result<CartView, ServiceError> {
        let mut active: cart::ActiveModel = cart.into();
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;
        self.view(cart).await
    }

    async fn view(&self, cart: cart::Model) -> Result<CartView, ServiceError> {
        let rows = CartItem::find()
            .find_also_related(Product)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let items: Vec<CartLineView> = rows
            .into_iter()
            .map(|(item, product)| line_view(item, product))
            .collect();
        let subtotal = items.iter().map(|line| line.line_total).sum();

        Ok(CartView {
            id: cart.id,
            item_count: items.len(),
            items,
            subtotal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            name: "Tee".to_string(),
            description: None,
            price,
            compare_price: None,
            sku: "TEE-1".to_string(),
            stock,
            images: product::to_json_list(&["a.png".to_string()]),
            sizes: product::to_json_list(&[]),
            colors: product::to_json_list(&[]),
            category_id: Uuid::new_v4(),
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(product_id: Uuid, quantity: i32) -> cart_item::Model {
        let now = Utc::now();
        cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id,
            quantity,
            size: Some("M".to_string()),
            color: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn quantity_below_one_is_rejected() {
        assert_matches!(require_positive(0), Err(ServiceError::InvalidQuantity(_)));
        assert_matches!(require_positive(-3), Err(ServiceError::InvalidQuantity(_)));
        assert!(require_positive(1).is_ok());
    }

    #[test]
    fn merging_past_i32_max_is_rejected() {
        assert_eq!(merged_quantity(2, 3).unwrap(), 5);
        assert_matches!(
            merged_quantity(i32::MAX - 1, 2),
            Err(ServiceError::InvalidQuantity(_))
        );
    }

    #[test]
    fn stock_check_uses_requested_total() {
        let p = product(dec!(10), 3);
        assert!(ensure_stock(&p, 3).is_ok());
        assert_matches!(ensure_stock(&p, 4), Err(ServiceError::InsufficientStock(_)));
    }

    #[test]
    fn line_total_multiplies_price() {
        let p = product(dec!(12.50), 10);
        let view = line_view(line(p.id, 3), Some(p));
        assert_eq!(view.line_total, dec!(37.50));
        assert_eq!(view.product.and_then(|p| p.image).as_deref(), Some("a.png"));
    }

    #[test]
    fn orphaned_line_contributes_nothing() {
        let view = line_view(line(Uuid::new_v4(), 2), None);
        assert_eq!(view.line_total, Decimal::ZERO);
        assert!(view.product.is_none());
    }
}
