//! Authentication route handlers
//!
//! Login, session verification and staff account management.

use crate::auth::{CurrentUser, Identity};
use crate::error::ApiResult;
use crate::models::{parse_id, MessageResponse, ValidatedJson};
use crate::state::SharedState;
use crate::users::{CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest, UserResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::debug;

// ============================================
// Response Types
// ============================================

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub authenticated: bool,
    pub user: Identity,
    pub message: String,
}

// ============================================
// Route Handlers
// ============================================

/// POST /api/auth/login
///
/// Authenticate with username and password, receive a JWT.
pub async fn login(
    State(state): State<SharedState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = state.users.login(&req.username, &req.password).await?;
    Ok(Json(response))
}

/// GET /api/auth/verify
pub async fn verify(CurrentUser(identity): CurrentUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        authenticated: true,
        user: identity,
        message: "Token is valid".to_string(),
    })
}

/// GET /api/auth/users
pub async fn list_users(State(state): State<SharedState>) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.users.list_users().await?;
    Ok(Json(users))
}

/// POST /api/auth/users
pub async fn create_user(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserEnvelope>)> {
    debug!(actor = %actor.user_id, username = %req.username, "Creating user");
    let user = state
        .users
        .create_user(&req.username, &req.password, req.role)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            success: true,
            message: "User created successfully".to_string(),
            user,
        }),
    ))
}

/// PUT /api/auth/users/{id}
pub async fn update_user(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<UserEnvelope>> {
    let id = parse_id(&id, "user")?;
    let user = state.users.update_user(&actor, id, req).await?;

    Ok(Json(UserEnvelope {
        success: true,
        message: "User updated successfully".to_string(),
        user,
    }))
}

/// DELETE /api/auth/users/{id}
pub async fn delete_user(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "user")?;
    let message = state.users.delete_user(&actor, id).await?;
    Ok(Json(MessageResponse::new(message)))
}
