/*!
 * # Authentication
 *
 * Opaque bearer tokens backed by the `sessions` table. The plaintext token is
 * handed to the client once at login; only its SHA-256 digest is stored.
 * Passwords are hashed with Argon2id.
 *
 * Handlers receive the caller through the [`AuthUser`] and [`AdminUser`]
 * extractors.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{str::FromStr, sync::Arc};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{commerce::order, session, user, UserRole},
    errors::ServiceError,
    services::{contains_ci, PageRequest},
    AppState, PaginatedResponse,
};

/// Authenticated caller as seen by the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Owners and administrators may act on a resource.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

/// Caller verified to hold the `ADMIN` role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Fields a user may change on their own account
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Back-office account edits
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AdminUserUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// Matches name or email, case-insensitive
    pub search: Option<String>,
}

/// Public projection of a user row
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserView {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            phone: model.phone,
            role: model.role,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResult {
    pub user: UserView,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Replacement session handed out after a password change
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    session_ttl: chrono::Duration,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, session_ttl: chrono::Duration) -> Self {
        Self { db, session_ttl }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserView, ServiceError> {
        self.create_user(input, UserRole::User).await
    }

    /// Creates a user with an explicit role. Used for administrator bootstrap.
    pub async fn create_user(
        &self,
        input: RegisterInput,
        role: UserRole,
    ) -> Result<UserView, ServiceError> {
        input.validate()?;
        let email = normalize_email(&input.email);

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "An account with email {} already exists",
                email
            )));
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(hash_password(&input.password)?),
            name: Set(input.name),
            phone: Set(input.phone),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %model.id, role = %model.role, "user registered");
        Ok(model.into())
    }

    /// Ensures an administrator account exists for the given credentials.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), ServiceError> {
        let email = normalize_email(email);
        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;

        match existing {
            Some(found) if found.role == UserRole::Admin => Ok(()),
            Some(found) => {
                let mut active: user::ActiveModel = found.into();
                active.role = Set(UserRole::Admin);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?;
                info!(%email, "existing user promoted to administrator");
                Ok(())
            }
            None => {
                self.create_user(
                    RegisterInput {
                        email,
                        password: password.to_string(),
                        name: Some("Administrator".to_string()),
                        phone: None,
                    },
                    UserRole::Admin,
                )
                .await
                .map(|_| ())
            }
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<LoginResult, ServiceError> {
        input.validate()?;
        let email = normalize_email(&input.email);

        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?
            .filter(|u| u.is_active);

        let Some(found) = found else {
            warn!("login rejected: unknown or inactive account");
            return Err(invalid_credentials());
        };
        if !verify_password(&input.password, &found.password_hash)? {
            warn!(user_id = %found.id, "login rejected: bad password");
            return Err(invalid_credentials());
        }

        let issued = self.issue_session(&*self.db, found.id).await?;
        Ok(LoginResult {
            user: found.into(),
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    async fn issue_session<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<SessionToken, ServiceError> {
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;
        session::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_hash: Set(hash_token(&token)),
            expires_at: Set(expires_at),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        info!(%user_id, "session issued");
        Ok(SessionToken { token, expires_at })
    }

    /// Revokes the session for `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        let result = session::Entity::delete_many()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .exec(&*self.db)
            .await?;
        if result.rows_affected > 0 {
            info!("session revoked");
        }
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let found = session::Entity::find()
            .filter(session::Column::TokenHash.eq(hash_token(token)))
            .find_also_related(user::Entity)
            .one(&*self.db)
            .await?;

        let Some((session, Some(owner))) = found else {
            return Err(ServiceError::Unauthorized("Invalid or expired token".into()));
        };

        if session.expires_at <= Utc::now() {
            session::Entity::delete_by_id(session.id)
                .exec(&*self.db)
                .await?;
            return Err(ServiceError::Unauthorized("Invalid or expired token".into()));
        }
        if !owner.is_active {
            return Err(ServiceError::Unauthorized("Account is disabled".into()));
        }

        Ok(AuthUser {
            id: owner.id,
            role: owner.role,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserView, ServiceError> {
        find_user(&*self.db, user_id).await.map(UserView::from)
    }

    /// Updates name and phone; omitted fields keep their value.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: ProfileUpdate,
    ) -> Result<UserView, ServiceError> {
        input.validate()?;
        let found = find_user(&*self.db, user_id).await?;

        let mut active: user::ActiveModel = found.into();
        if let Some(name) = input.name {
            active.name = Set(Some(name));
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(%user_id, "profile updated");
        Ok(updated.into())
    }

    /// Replaces the password, revokes every session of the account and
    /// returns a fresh one.
    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        input: ChangePasswordInput,
    ) -> Result<SessionToken, ServiceError> {
        input.validate()?;
        let found = find_user(&*self.db, user_id).await?;

        if !verify_password(&input.current_password, &found.password_hash)? {
            warn!(%user_id, "password change rejected: bad current password");
            return Err(ServiceError::ValidationError(
                "Current password is incorrect".into(),
            ));
        }
        if verify_password(&input.new_password, &found.password_hash)? {
            return Err(ServiceError::ValidationError(
                "New password must differ from the current password".into(),
            ));
        }
        let password_hash = hash_password(&input.new_password)?;

        let txn = self.db.begin().await?;
        let mut active: user::ActiveModel = found.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let revoked = revoke_sessions(&txn, user_id).await?;
        let issued = self.issue_session(&txn, user_id).await?;
        txn.commit().await?;

        info!(%user_id, revoked, "password changed");
        Ok(issued)
    }

    /// Accounts newest first, filtered by role, activity and name/email.
    pub async fn list_users(
        &self,
        filter: UserFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<UserView>, ServiceError> {
        let mut condition = Condition::all();
        if let Some(role) = filter.role {
            condition = condition.add(user::Column::Role.eq(role.to_value()));
        }
        if let Some(is_active) = filter.is_active {
            condition = condition.add(user::Column::IsActive.eq(is_active));
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(contains_ci(user::Column::Name, search))
                    .add(contains_ci(user::Column::Email, search)),
            );
        }

        let paginator = user::Entity::find()
            .filter(condition)
            .order_by_desc(user::Column::CreatedAt)
            .paginate(&*self.db, page.limit);

        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page.index())
            .await?
            .into_iter()
            .map(UserView::from)
            .collect();
        Ok(PaginatedResponse::new(items, total, page))
    }

    /// Deactivating an account also ends its sessions.
    #[instrument(skip(self, input))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        input: AdminUserUpdate,
    ) -> Result<UserView, ServiceError> {
        input.validate()?;
        let found = find_user(&*self.db, user_id).await?;

        let txn = self.db.begin().await?;
        let mut active: user::ActiveModel = found.into();
        if let Some(name) = input.name {
            active.name = Set(Some(name));
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        if !updated.is_active {
            revoke_sessions(&txn, user_id).await?;
        }
        txn.commit().await?;

        info!(%user_id, role = %updated.role, is_active = updated.is_active, "user updated");
        Ok(updated.into())
    }

    /// Removes an account with its sessions, cart and addresses. Accounts
    /// with order history are kept.
    #[instrument(skip(self, requester), fields(requester = %requester.id))]
    pub async fn delete_user(&self, requester: &AuthUser, user_id: Uuid) -> Result<(), ServiceError> {
        if requester.id == user_id {
            return Err(ServiceError::Conflict(
                "Administrators cannot delete their own account".into(),
            ));
        }
        find_user(&*self.db, user_id).await?;

        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .count(&*self.db)
            .await?;
        if orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "User {} has {} orders; deactivate the account instead",
                user_id, orders
            )));
        }

        user::Entity::delete_by_id(user_id).exec(&*self.db).await?;
        info!(%user_id, "user deleted");
        Ok(())
    }
}

async fn find_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<user::Model, ServiceError> {
    user::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
}

async fn revoke_sessions<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64, ServiceError> {
    let result = session::Entity::delete_many()
        .filter(session::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Parses `USER` / `ADMIN`, ignoring case.
pub fn parse_user_role(raw: &str) -> Result<UserRole, ServiceError> {
    UserRole::from_str(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Unknown role '{}'", raw)))
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthorized("Invalid email or password".into())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 of a bearer token, as stored in `sessions.token_hash`.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".into()))?;
        state.services.auth.authenticate(token).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ServiceError::Forbidden(
                "Administrator privileges required".into(),
            ));
        }
        Ok(AdminUser(user))
    }
}
