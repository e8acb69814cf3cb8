use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use mindful_core::{
    models::{Account, CreateUserInput, Role},
    CoreError,
};
use uuid::Uuid;

use super::{identity::CurrentUser, ApiJson, ApiResult, AppState};

/// Participants and researchers may register without a caller; admin
/// accounts can only be created by an existing admin.
async fn create_user(
    State(state): State<AppState>,
    caller: Option<CurrentUser>,
    ApiJson(input): ApiJson<CreateUserInput>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    if input.role == Role::Admin && !caller.is_some_and(|c| c.is_admin()) {
        tracing::warn!(username = %input.username, "admin signup refused");
        return Err(CoreError::forbidden("only admins can create admin accounts").into());
    }
    let account = state.db.create_user(input)?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn list_users(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<Account>>> {
    if !user.is_admin() {
        return Err(CoreError::forbidden("only admins can list users").into());
    }
    Ok(Json(state.db.list_accounts()?))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Account>> {
    get_or_404(&state, user.user_id).map(Json)
}

async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Account>> {
    if !user.is_admin() && user.user_id != user_id {
        return Err(CoreError::forbidden("users can only read their own account").into());
    }
    get_or_404(&state, user_id).map(Json)
}

fn get_or_404(state: &AppState, user_id: Uuid) -> ApiResult<Account> {
    state
        .db
        .get_account(user_id)?
        .ok_or_else(|| CoreError::not_found("user", user_id).into())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(me))
        .route("/users/{user_id}", get(get_user))
}
