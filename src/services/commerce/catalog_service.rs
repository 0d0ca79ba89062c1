use crate::{
    entities::commerce::{
        category, order_item,
        product::{self, string_list, to_json_list},
        Category, OrderItem, Product,
    },
    errors::ServiceError,
    services::{contains_ci, PageRequest},
    PaginatedResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Alias, Expr},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const FEATURED_LIMIT: u64 = 8;

/// Categories and products: storefront reads and admin maintenance.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<category::Model> for CategoryView {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            image: model.image,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    /// Defaults to 0 when omitted
    pub stock: Option<i32>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub category_id: Uuid,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_price: Option<Decimal>,
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub category_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

/// Storefront listing filters; only active products are returned.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Products offering any of these sizes
    pub sizes: Vec<String>,
    /// Products offering any of these colors
    pub colors: Vec<String>,
}

/// Back-office listing filters; inactive products included.
#[derive(Debug, Clone, Default)]
pub struct AdminProductFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
    pub sku: String,
    pub stock: i32,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub category_id: Uuid,
    pub category: Option<CategorySummary>,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    pub fn from_parts(model: product::Model, category: Option<category::Model>) -> Self {
        Self {
            images: string_list(&model.images),
            sizes: string_list(&model.sizes),
            colors: string_list(&model.colors),
            category: category.map(|c| CategorySummary {
                id: c.id,
                name: c.name,
            }),
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            compare_price: model.compare_price,
            sku: model.sku,
            stock: model.stock,
            category_id: model.category_id,
            is_active: model.is_active,
            is_featured: model.is_featured,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn check_price(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::ValidationError(
            "price must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Matches rows whose JSON string array holds at least one of `wanted`.
/// `None` when there is nothing to filter on.
fn offers_any(column: product::Column, wanted: &[String]) -> Option<Condition> {
    let wanted: Vec<&str> = wanted
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if wanted.is_empty() {
        return None;
    }

    let mut any = Condition::any();
    for value in wanted {
        // The quoted JSON form only matches whole array elements.
        let element = serde_json::Value::String(value.to_string()).to_string();
        any = any.add(
            Expr::expr(Expr::col((Product, column)).cast_as(Alias::new("TEXT")))
                .like(format!("%{}%", element)),
        );
    }
    Some(any)
}

fn check_stock(stock: i32) -> Result<(), ServiceError> {
    if stock < 0 {
        return Err(ServiceError::InvalidQuantity(format!(
            "stock must not be negative, got {}",
            stock
        )));
    }
    Ok(())
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ---- categories -------------------------------------------------------

    pub async fn list_categories(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<CategoryView>, ServiceError> {
        let mut query = Category::find().order_by_asc(category::Column::Name);
        if !include_inactive {
            query = query.filter(category::Column::IsActive.eq(true));
        }
        let rows = query.all(&*self.db).await?;
        Ok(rows.into_iter().map(CategoryView::from).collect())
    }

    pub async fn get_category(&self, id: Uuid) -> Result<CategoryView, ServiceError> {
        self.find_category(id).await.map(CategoryView::from)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: CategoryInput) -> Result<CategoryView, ServiceError> {
        input.validate()?;
        self.ensure_category_name_free(&input.name, None).await?;

        let now = Utc::now();
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            image: Set(input.image),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = %model.id, "category created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: CategoryUpdate,
    ) -> Result<CategoryView, ServiceError> {
        input.validate()?;
        let existing = self.find_category(id).await?;
        if let Some(name) = &input.name {
            self.ensure_category_name_free(name, Some(id)).await?;
        }

        let mut active: category::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if input.description.is_some() {
            active.description = Set(input.description);
        }
        if input.image.is_some() {
            active.image = Set(input.image);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        self.find_category(id).await?;
        let in_use = Product::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(&*self.db)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category {} still has {} product(s)",
                id, in_use
            )));
        }
        Category::delete_by_id(id).exec(&*self.db).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn find_category(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        Category::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    async fn ensure_category_name_free(
        &self,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Category::find().filter(category::Column::Name.eq(name.trim()));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name.trim()
            )));
        }
        Ok(())
    }

    // ---- products ---------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<ProductView>, ServiceError> {
        let mut condition = Condition::all().add(product::Column::IsActive.eq(true));
        if let Some(category_id) = filter.category_id {
            condition = condition.add(product::Column::CategoryId.eq(category_id));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(contains_ci((Product, product::Column::Name), search))
                    .add(contains_ci((Product, product::Column::Description), search)),
            );
        }
        if let Some(min) = filter.min_price {
            condition = condition.add(product::Column::Price.gte(min));
        }
        if let Some(max) = filter.max_price {
            condition = condition.add(product::Column::Price.lte(max));
        }
        if let Some(any_size) = offers_any(product::Column::Sizes, &filter.sizes) {
            condition = condition.add(any_size);
        }
        if let Some(any_color) = offers_any(product::Column::Colors, &filter.colors) {
            condition = condition.add(any_color);
        }

        self.page_products(condition, page).await
    }

    pub async fn featured_products(&self) -> Result<Vec<ProductView>, ServiceError> {
        let rows = Product::find()
            .find_also_related(Category)
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::IsFeatured.eq(true))
            .order_by_desc(product::Column::CreatedAt)
            .limit(FEATURED_LIMIT)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(p, c)| ProductView::from_parts(p, c))
            .collect())
    }

    /// Storefront lookups hide inactive products; admin lookups see everything.
    pub async fn get_product(
        &self,
        id: Uuid,
        include_inactive: bool,
    ) -> Result<ProductView, ServiceError> {
        let found = Product::find_by_id(id)
            .find_also_related(Category)
            .one(&*self.db)
            .await?
            .filter(|(p, _)| include_inactive || p.is_active);
        found
            .map(|(p, c)| ProductView::from_parts(p, c))
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn admin_list_products(
        &self,
        filter: AdminProductFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<ProductView>, ServiceError> {
        let mut condition = Condition::all();
        if let Some(category_id) = filter.category_id {
            condition = condition.add(product::Column::CategoryId.eq(category_id));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(contains_ci((Product, product::Column::Name), search))
                    .add(contains_ci((Product, product::Column::Sku), search)),
            );
        }
        self.page_products(condition, page).await
    }

    async fn page_products(
        &self,
        condition: Condition,
        page: PageRequest,
    ) -> Result<PaginatedResponse<ProductView>, ServiceError> {
        let paginator = Product::find()
            .find_also_related(Category)
            .filter(condition)
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, page.limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.index()).await?;
        let items = rows
            .into_iter()
            .map(|(p, c)| ProductView::from_parts(p, c))
            .collect();
        Ok(PaginatedResponse::new(items, total, page))
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: ProductInput) -> Result<ProductView, ServiceError> {
        input.validate()?;
        check_price(input.price)?;
        let stock = input.stock.unwrap_or(0);
        check_stock(stock)?;
        let category = self.find_category(input.category_id).await?;
        self.ensure_sku_free(&input.sku, None).await?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            compare_price: Set(input.compare_price),
            sku: Set(input.sku.trim().to_string()),
            stock: Set(stock),
            images: Set(to_json_list(&input.images)),
            sizes: Set(to_json_list(&input.sizes)),
            colors: Set(to_json_list(&input.colors)),
            category_id: Set(category.id),
            is_active: Set(input.is_active.unwrap_or(true)),
            is_featured: Set(input.is_featured.unwrap_or(false)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = %model.id, stock = model.stock, "product created");
        Ok(ProductView::from_parts(model, Some(category)))
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: ProductUpdate,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;
        let existing = Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        if let Some(price) = input.price {
            check_price(price)?;
        }
        if let Some(stock) = input.stock {
            check_stock(stock)?;
        }
        if let Some(sku) = &input.sku {
            self.ensure_sku_free(sku, Some(id)).await?;
        }
        let category_id = match input.category_id {
            Some(category_id) => self.find_category(category_id).await?.id,
            None => existing.category_id,
        };

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if input.description.is_some() {
            active.description = Set(input.description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if input.compare_price.is_some() {
            active.compare_price = Set(input.compare_price);
        }
        if let Some(sku) = input.sku {
            active.sku = Set(sku.trim().to_string());
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(images) = input.images {
            active.images = Set(to_json_list(&images));
        }
        if let Some(sizes) = input.sizes {
            active.sizes = Set(to_json_list(&sizes));
        }
        if let Some(colors) = input.colors {
            active.colors = Set(to_json_list(&colors));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_featured) = input.is_featured {
            active.is_featured = Set(is_featured);
        }
        active.category_id = Set(category_id);
        active.updated_at = Set(Utc::now());

        active.update(&*self.db).await?;
        self.get_product(id, true).await
    }

    /// Products with order history cannot be removed; carts may still
    /// reference a deleted product and checkout reports it.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let ordered = OrderItem::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&*self.db)
            .await?;
        if ordered > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} appears on {} order line(s); deactivate it instead",
                id, ordered
            )));
        }

        Product::delete_by_id(id).exec(&*self.db).await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn ensure_sku_free(&self, sku: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Sku.eq(sku.trim()));
        if let Some(id) = except {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "SKU '{}' is already in use",
                sku.trim()
            )));
        }
        Ok(())
    }
}
