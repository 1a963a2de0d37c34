use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};
use tracing::instrument;

use crate::{
    accounts::{
        dto::{AccountView, LoginRequest, MessageResponse, RegisterRequest, UpdateRoleRequest},
        repo_types::Role,
        services::AccountService,
    },
    error::AppError,
    extractors::{AccountIdPath, JsonBody},
    pagination::Pagination,
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/auth/register", post(register))
        .route("/users/auth", post(login))
        .route("/users/auth/", post(login))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_accounts))
        .route("/users/", get(list_accounts))
        .route("/users/:id", get(get_account).delete(delete_account))
        .route("/users/:id/role", put(update_role))
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.trim()
        .to_lowercase()
        .parse::<Role>()
        .map_err(|e| AppError::validation(e.to_string()))
}

#[instrument(skip(accounts, payload))]
pub async fn register(
    State(accounts): State<AccountService>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<ApiResponse<AccountView>, AppError> {
    let role = match payload.role.as_deref() {
        Some(raw) => parse_role(raw)?,
        None => Role::Customer,
    };
    let view = accounts
        .register(&payload.email, &payload.password, role)
        .await?;
    Ok(ApiResponse::created(view))
}

#[instrument(skip(accounts, payload))]
pub async fn login(
    State(accounts): State<AccountService>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<ApiResponse<AccountView>, AppError> {
    let view = accounts
        .authenticate(&payload.email, &payload.password)
        .await?;
    Ok(ApiResponse::ok(view))
}

#[instrument(skip(accounts))]
pub async fn get_account(
    State(accounts): State<AccountService>,
    AccountIdPath(id): AccountIdPath,
) -> Result<ApiResponse<AccountView>, AppError> {
    Ok(ApiResponse::ok(accounts.get_by_id(id).await?))
}

#[instrument(skip(accounts, payload))]
pub async fn update_role(
    State(accounts): State<AccountService>,
    AccountIdPath(id): AccountIdPath,
    JsonBody(payload): JsonBody<UpdateRoleRequest>,
) -> Result<ApiResponse<AccountView>, AppError> {
    let role = parse_role(&payload.role)?;
    Ok(ApiResponse::ok(accounts.update_role(id, role).await?))
}

#[instrument(skip(accounts))]
pub async fn delete_account(
    State(accounts): State<AccountService>,
    AccountIdPath(id): AccountIdPath,
) -> Result<ApiResponse<MessageResponse>, AppError> {
    accounts.delete(id).await?;
    Ok(ApiResponse::ok(MessageResponse {
        message: "user deleted",
    }))
}

#[instrument(skip(accounts))]
pub async fn list_accounts(
    State(accounts): State<AccountService>,
    page: Pagination,
) -> Result<ApiResponse<Vec<AccountView>>, AppError> {
    Ok(ApiResponse::ok(accounts.list(page).await?))
}
