use crate::{
    db,
    entities::commerce::{address, order, Address, Order},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_COUNTRY: &str = "USA";

/// Address book with a single default address per user.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
    txn_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 30))]
    pub phone: String,
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub zip_code: String,
    #[validate(length(min = 1, max = 60))]
    pub country: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AddressUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub street: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub zip_code: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressView {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl From<address::Model> for AddressView {
    fn from(model: address::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            street: model.street,
            city: model.city,
            state: model.state,
            zip_code: model.zip_code,
            country: model.country,
            is_default: model.is_default,
            created_at: model.created_at,
        }
    }
}

/// Clears the default flag on every address the user owns.
async fn clear_defaults<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<(), ServiceError> {
    Address::update_many()
        .col_expr(address::Column::IsDefault, Expr::value(false))
        .filter(address::Column::UserId.eq(user_id))
        .filter(address::Column::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

/// Resolves an address for `user_id`: missing is `NotFound`, someone else's
/// is `Forbidden`.
pub(crate) async fn owned_address<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    address_id: Uuid,
) -> Result<address::Model, ServiceError> {
    let found = Address::find_by_id(address_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
    if found.user_id != user_id {
        return Err(ServiceError::Forbidden(
            "Address belongs to another user".to_string(),
        ));
    }
    Ok(found)
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>, txn_timeout: Duration) -> Self {
        Self { db, txn_timeout }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<AddressView>, ServiceError> {
        let rows = Address::find()
            .filter(address::Column::UserId.eq(user_id))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(AddressView::from).collect())
    }

    pub async fn get(&self, user_id: Uuid, address_id: Uuid) -> Result<AddressView, ServiceError> {
        owned_address(&*self.db, user_id, address_id)
            .await
            .map(AddressView::from)
    }

    /// The user's first address always becomes the default.
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<AddressView, ServiceError> {
        input.validate()?;

        let model = db::with_timeout(self.txn_timeout, "address_create", async {
            let txn = self.db.begin().await?;

            let existing = Address::find()
                .filter(address::Column::UserId.eq(user_id))
                .count(&txn)
                .await?;
            let make_default = existing == 0 || input.is_default;
            if make_default {
                clear_defaults(&txn, user_id).await?;
            }

            let now = Utc::now();
            let model = address::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                name: Set(input.name),
                phone: Set(input.phone),
                street: Set(input.street),
                city: Set(input.city),
                state: Set(input.state),
                zip_code: Set(input.zip_code),
                country: Set(input
                    .country
                    .unwrap_or_else(|| DEFAULT_COUNTRY.to_string())),
                is_default: Set(make_default),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;

            txn.commit().await?;
            Ok::<_, ServiceError>(model)
        })
        .await?;

        info!(address_id = %model.id, is_default = model.is_default, "address created");
        Ok(model.into())
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: AddressUpdate,
    ) -> Result<AddressView, ServiceError> {
        input.validate()?;

        let model = db::with_timeout(self.txn_timeout, "address_update", async {
            let txn = self.db.begin().await?;
            let existing = owned_address(&txn, user_id, address_id).await?;

            if input.is_default == Some(true) {
                clear_defaults(&txn, user_id).await?;
            }

            let mut active: address::ActiveModel = existing.into();
            if let Some(name) = input.name {
                active.name = Set(name);
            }
            if let Some(phone) = input.phone {
                active.phone = Set(phone);
            }
            if let Some(street) = input.street {
                active.street = Set(street);
            }
            if let Some(city) = input.city {
                active.city = Set(city);
            }
            if let Some(state) = input.state {
                active.state = Set(state);
            }
            if let Some(zip_code) = input.zip_code {
                active.zip_code = Set(zip_code);
            }
            if let Some(country) = input.country {
                active.country = Set(country);
            }
            if let Some(is_default) = input.is_default {
                active.is_default = Set(is_default);
            }
            active.updated_at = Set(Utc::now());
            let model = active.update(&txn).await?;

            txn.commit().await?;
            Ok::<_, ServiceError>(model)
        })
        .await?;

        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn set_default(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<AddressView, ServiceError> {
        self.update(
            user_id,
            address_id,
            AddressUpdate {
                is_default: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    /// Addresses referenced by an order are kept; orders read them by id.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, address_id: Uuid) -> Result<(), ServiceError> {
        owned_address(&*self.db, user_id, address_id).await?;

        let used = Order::find()
            .filter(order::Column::AddressId.eq(address_id))
            .count(&*self.db)
            .await?;
        if used > 0 {
            return Err(ServiceError::Conflict(format!(
                "Address {} is used by {} order(s)",
                address_id, used
            )));
        }

        Address::delete_by_id(address_id).exec(&*self.db).await?;
        info!(address_id = %address_id, "address deleted");
        Ok(())
    }
}
