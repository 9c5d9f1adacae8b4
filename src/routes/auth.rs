// Account signup, login, and admin account management.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::auth::AuthUser;
use crate::models::{
    AppState, ChangeRoleRequest, DeleteUserRequest, LoginRequest, SignupRequest, TokenResponse,
};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/change_role", post(change_role))
        .route("/delete_user", post(delete_user))
        .with_state(state)
}

async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user = state
        .identity
        .create_user(&request.email, &request.name, &request.password)
        .await?;
    let token = state
        .identity
        .issue_token(&user.id.to_string(), &user.email, &user.role, Default::default())?;
    info!(email = %user.email, "signup complete");
    Ok(Json(TokenResponse { token, role: user.role }))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let (token, role) = state.identity.login(&request.email, &request.password).await?;
    Ok(Json(TokenResponse { token, role }))
}

async fn change_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ChangeRoleRequest>,
) -> AppResult<Json<&'static str>> {
    user.require_admin()?;
    state.identity.change_role(&request.user_id, &request.role).await?;
    info!(user_id = %request.user_id, role = %request.role, by = %user.user_id, "role changed");
    Ok(Json("Role updated"))
}

async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<DeleteUserRequest>,
) -> AppResult<Json<&'static str>> {
    user.require_admin()?;
    state.identity.delete_user(&request.user_id).await?;
    info!(user_id = %request.user_id, by = %user.user_id, "user deleted");
    Ok(Json("User deleted"))
}
