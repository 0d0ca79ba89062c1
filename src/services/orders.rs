use crate::{
    auth::AuthUser,
    db::{self, RetryConfig},
    entities::{
        commerce::{
            address, cart, cart_item, order, order_item, product, Address, Cart, CartItem, Order,
            OrderItem, OrderStatus, PaymentStatus, Product,
        },
        user,
    },
    errors::ServiceError,
    services::{
        commerce::{address_service::owned_address, AddressView},
        contains_ci,
        pricing::PricingPolicy,
        PageRequest,
    },
    PaginatedResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, FromQueryResult, JoinType, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, str::FromStr, sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Attempts at drawing an unused order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub address_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusInput {
    /// One of PENDING, CONFIRMED, PROCESSING, SHIPPED, DELIVERED, CANCELLED
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusInput {
    /// One of PENDING, PAID, FAILED, REFUNDED
    pub payment_status: String,
}

/// Back-office order filters. Status strings are parsed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub line_number: i32,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    /// Unit price at the time the order was placed
    pub price: Decimal,
    pub size: Option<String>,
    pub color: Option<String>,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub address: Option<AddressView>,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderStats {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

impl OrderStats {
    fn record(&mut self, status: OrderStatus, count: u64) {
        self.total += count;
        let slot = match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Confirmed => &mut self.confirmed,
            OrderStatus::Processing => &mut self.processing,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
    }
}

#[derive(Debug, FromQueryResult)]
struct StatusCount {
    status: OrderStatus,
    count: i64,
}

/// Formats `ORD-YYMMDD-NNNN` with a zero-padded random suffix.
pub fn generate_order_number<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> String {
    format!("ORD-{}-{:04}", date.format("%y%m%d"), rng.gen_range(0..10_000))
}

fn next_order_number() -> String {
    generate_order_number(Utc::now().date_naive(), &mut rand::thread_rng())
}

pub fn parse_order_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status '{}'", raw)))
}

pub fn parse_payment_status(raw: &str) -> Result<PaymentStatus, ServiceError> {
    PaymentStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown payment status '{}'", raw)))
}

/// Decrements stock only if enough remains. Concurrent checkouts serialize on
/// the row (or the database write lock) and the loser sees zero rows updated.
async fn take_stock<C: ConnectionTrait>(
    conn: &C,
    item: &product::Model,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(item.id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(ServiceError::InsufficientStock(format!(
            "{} no longer has {} in stock",
            item.name, quantity
        )));
    }
    Ok(())
}

async fn return_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn allocate_order_number<C: ConnectionTrait>(conn: &C) -> Result<String, ServiceError> {
    for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
        let candidate = next_order_number();
        let taken = Order::find()
            .filter(order::Column::OrderNumber.eq(candidate.as_str()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        warn!(attempt, order_number = %candidate, "order number collision");
    }
    Err(ServiceError::InternalError(
        "could not allocate a unique order number".to_string(),
    ))
}

/// Places orders and drives their status and payment lifecycle.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    pricing: PricingPolicy,
    txn_timeout: Duration,
    retry: RetryConfig,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, pricing: PricingPolicy, txn_timeout: Duration) -> Self {
        Self {
            db,
            pricing,
            txn_timeout,
            retry: RetryConfig::default(),
        }
    }

    /// Converts the user's cart into an order.
    ///
    /// Address resolution, cart lookup, stock checks, the guarded stock
    /// decrements, the order rows and the cart wipe all share one
    /// transaction; any failure leaves stock, cart and orders untouched.
    /// An attempt that loses a write-lock race is retried from the start, so
    /// it re-reads the stock the winner committed.
    #[instrument(skip(self, input), fields(address_id = %input.address_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<OrderView, ServiceError> {
        input.validate()?;

        let placed = db::with_timeout(
            self.txn_timeout,
            "create_order",
            db::with_retry(&self.retry, "create_order", || {
                self.place_order(user_id, input.clone())
            }),
        )
        .await
        .map_err(|err| {
            counter!("storefront.orders.failed", 1, "reason" => err.kind());
            err
        })?;

        counter!("storefront.orders.created", 1);
        info!(
            order_id = %placed.id,
            order_number = %placed.order_number,
            total = %placed.total,
            "order placed"
        );
        self.view_one(placed).await
    }

    /// One checkout attempt in its own transaction.
    async fn place_order(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let address = owned_address(&txn, user_id, input.address_id).await?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;
        let lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut subtotal = Decimal::ZERO;
        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            let item = Product::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or(ServiceError::ProductNotFound(line.product_id))?;
            if item.stock < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} has {} in stock, {} requested",
                    item.name, item.stock, line.quantity
                )));
            }
            subtotal += item.price * Decimal::from(line.quantity);
            take_stock(&txn, &item, line.quantity).await?;
            priced.push((line, item.price));
        }

        let totals = self.pricing.quote(subtotal);
        let order_number = allocate_order_number(&txn).await?;
        let now = Utc::now();

        let placed = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(order_number),
            user_id: Set(user_id),
            address_id: Set(address.id),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            payment_method: Set(input.payment_method),
            notes: Set(input.notes),
            subtotal: Set(totals.subtotal),
            shipping_cost: Set(totals.shipping_cost),
            tax: Set(totals.tax),
            total: Set(totals.total),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (index, (line, price)) in priced.into_iter().enumerate() {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(placed.id),
                product_id: Set(line.product_id),
                line_number: Set(index as i32 + 1),
                quantity: Set(line.quantity),
                price: Set(price),
                size: Set(line.size),
                color: Set(line.color),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(placed)
    }

    /// Cancels a PENDING or CONFIRMED order and puts its stock back, in one
    /// transaction.
    #[instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn cancel_order(
        &self,
        requester: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let cancelled = db::with_timeout(
            self.txn_timeout,
            "cancel_order",
            db::with_retry(&self.retry, "cancel_order", || {
                self.cancel_once(requester, order_id)
            }),
        )
        .await?;

        counter!("storefront.orders.cancelled", 1);
        info!(order_number = %cancelled.order_number, "order cancelled");
        self.view_one(cancelled).await
    }

    async fn cancel_once(
        &self,
        requester: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = find_order(&txn, order_id).await?;
        if !requester.can_access(existing.user_id) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another user".to_string(),
            ));
        }
        if !existing.status.is_cancellable() {
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} is {} and can no longer be cancelled",
                existing.order_number, existing.status
            )));
        }

        // Status guard in the WHERE clause so two racing cancels cannot
        // both restore stock.
        let flipped = Order::update_many()
            .col_expr(
                order::Column::Status,
                Expr::value(OrderStatus::Cancelled.to_value()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.is_in([
                OrderStatus::Pending.to_value(),
                OrderStatus::Confirmed.to_value(),
            ]))
            .exec(&txn)
            .await?;
        if flipped.rows_affected != 1 {
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} changed status concurrently",
                existing.order_number
            )));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        for item in &items {
            return_stock(&txn, item.product_id, item.quantity).await?;
        }

        let cancelled = find_order(&txn, order_id).await?;
        txn.commit().await?;
        Ok(cancelled)
    }

    /// Administrative override; any known status is accepted from any other.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        status: &str,
    ) -> Result<OrderView, ServiceError> {
        let status = parse_order_status(status)?;
        let existing = find_order(&*self.db, order_id).await?;
        let previous = existing.status;

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(order_number = %updated.order_number, from = %previous, to = %status, "order status set");
        self.view_one(updated).await
    }

    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        payment_status: &str,
    ) -> Result<OrderView, ServiceError> {
        let payment_status = parse_payment_status(payment_status)?;
        let existing = find_order(&*self.db, order_id).await?;

        let mut active: order::ActiveModel = existing.into();
        active.payment_status = Set(payment_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(order_number = %updated.order_number, payment_status = %payment_status, "payment status set");
        self.view_one(updated).await
    }

    pub async fn get_order_stats(&self) -> Result<OrderStats, ServiceError> {
        let rows = Order::find()
            .select_only()
            .column(order::Column::Status)
            .column_as(Expr::col(order::Column::Id).count(), "count")
            .group_by(order::Column::Status)
            .into_model::<StatusCount>()
            .all(&*self.db)
            .await?;

        let mut stats = OrderStats::default();
        for row in rows {
            stats.record(row.status, row.count.max(0) as u64);
        }
        Ok(stats)
    }

    pub async fn get_order(
        &self,
        requester: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let found = find_order(&*self.db, order_id).await?;
        if !requester.can_access(found.user_id) {
            return Err(ServiceError::Forbidden(
                "Order belongs to another user".to_string(),
            ));
        }
        self.view_one(found).await
    }

    pub async fn get_order_by_number(&self, order_number: &str) -> Result<OrderView, ServiceError> {
        let found = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number.trim()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        self.view_one(found).await
    }

    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<PaginatedResponse<OrderView>, ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, page.limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.index()).await?;
        let items = self.hydrate(rows).await?;
        Ok(PaginatedResponse::new(items, total, page))
    }

    /// Searches order number, customer name and customer email.
    #[instrument(skip(self))]
    pub async fn list_all_orders(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<OrderView>, ServiceError> {
        let mut condition = Condition::all();
        if let Some(raw) = filter.status.as_deref().filter(|s| !s.trim().is_empty()) {
            condition = condition.add(order::Column::Status.eq(parse_order_status(raw)?.to_value()));
        }
        if let Some(raw) = filter
            .payment_status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            condition =
                condition.add(order::Column::PaymentStatus.eq(parse_payment_status(raw)?.to_value()));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(contains_ci((Order, order::Column::OrderNumber), search))
                    .add(contains_ci((user::Entity, user::Column::Name), search))
                    .add(contains_ci((user::Entity, user::Column::Email), search)),
            );
        }

        let paginator = Order::find()
            .join(JoinType::LeftJoin, order::Relation::User.def())
            .filter(condition)
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, page.limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.index()).await?;
        let items = self.hydrate(rows).await?;
        Ok(PaginatedResponse::new(items, total, page))
    }

    async fn view_one(&self, found: order::Model) -> Result<OrderView, ServiceError> {
        self.hydrate(vec![found])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("order view missing".to_string()))
    }

    /// Attaches items, product names and the shipping address to each order.
    async fn hydrate(&self, orders: Vec<order::Model>) -> Result<Vec<OrderView>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let conn = &*self.db;

        let items = orders.load_many(OrderItem, conn).await?;
        let addresses = orders.load_one(Address, conn).await?;

        let product_ids: Vec<Uuid> = items.iter().flatten().map(|i| i.product_id).collect();
        let names: HashMap<Uuid, String> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|p| (p.id, p.name))
                .collect()
        };

        Ok(orders
            .into_iter()
            .zip(items)
            .zip(addresses)
            .map(|((order, mut lines), address)| {
                lines.sort_by_key(|line| line.line_number);
                order_view(order, lines, address, &names)
            })
            .collect())
    }
}

async fn find_order<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> Result<order::Model, ServiceError> {
    Order::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

fn order_view(
    order: order::Model,
    lines: Vec<order_item::Model>,
    address: Option<address::Model>,
    names: &HashMap<Uuid, String>,
) -> OrderView {
    let items = lines
        .into_iter()
        .map(|line| OrderItemView {
            line_total: line.price * Decimal::from(line.quantity),
            product_name: names.get(&line.product_id).cloned(),
            id: line.id,
            line_number: line.line_number,
            product_id: line.product_id,
            quantity: line.quantity,
            price: line.price,
            size: line.size,
            color: line.color,
        })
        .collect();

    OrderView {
        id: order.id,
        order_number: order.order_number,
        user_id: order.user_id,
        status: order.status,
        payment_status: order.payment_status,
        payment_method: order.payment_method,
        notes: order.notes,
        subtotal: order.subtotal,
        shipping_cost: order.shipping_cost,
        tax: order.tax,
        total: order.total,
        address: address.map(AddressView::from),
        items,
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}
