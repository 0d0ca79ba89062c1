use super::common::{created_response, message_response, success_response};
use crate::{
    auth::{
        bearer_token, AuthUser, ChangePasswordInput, LoginInput, LoginResult, ProfileUpdate,
        RegisterInput, SessionToken, UserView,
    },
    errors::{ErrorResponse, ServiceError},
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/change-password", post(change_password))
}

/// Register a customer account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserView>),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), ServiceError> {
    let user = state.services.auth.register(payload).await?;
    Ok(created_response(user))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Session issued", body = ApiResponse<LoginResult>),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> Result<Json<ApiResponse<LoginResult>>, ServiceError> {
    let result = state.services.auth.login(payload).await?;
    Ok(success_response(result))
}

/// Revoke the presented bearer token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Session revoked"),
        (status = 401, description = "Missing bearer token", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".into()))?;
    state.services.auth.logout(token).await?;
    Ok(message_response("Logged out"))
}

/// Current account profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<UserView>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<UserView>>, ServiceError> {
    let profile = state.services.auth.profile(user.id).await?;
    Ok(success_response(profile))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/profile",
    tag = "auth",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserView>),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<ApiResponse<UserView>>, ServiceError> {
    let profile = state.services.auth.update_profile(user.id, payload).await?;
    Ok(success_response(profile))
}

/// Change the password; every existing session is revoked and a new token issued
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordInput,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<SessionToken>),
        (status = 400, description = "Wrong current password or password reused", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordInput>,
) -> Result<Json<ApiResponse<SessionToken>>, ServiceError> {
    let session = state.services.auth.change_password(user.id, payload).await?;
    Ok(success_response(session))
}
