//! Achievement route handlers
//!
//! One public listing for the website, CRUD for the dashboard.

use crate::auth::CurrentUser;
use crate::error::{not_found_error, ApiResult};
use crate::models::{
    parse_id, Achievement, CreateAchievementRequest, MessageResponse, SuccessResponse,
    UpdateAchievementRequest, ValidatedJson,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

/// GET /api/logros (public) and GET /api/dashboard/logros
///
/// Active achievements by display order.
pub async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<Achievement>>> {
    let achievements = state.achievements.list_active().await?;
    Ok(Json(achievements))
}

/// GET /api/dashboard/logro/{id}
///
/// Inactive achievements are returned too.
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Achievement>> {
    let id = parse_id(&id, "achievement")?;
    let achievement = state
        .achievements
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found_error("Achievement not found"))?;
    Ok(Json(achievement))
}

/// POST /api/dashboard/logro
pub async fn create(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateAchievementRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Achievement>>)> {
    let achievement = state.achievements.insert(req.into_new()).await?;
    info!(actor = %actor.user_id, achievement_id = %achievement.id, order = achievement.order, "Achievement created");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Achievement created successfully", achievement)),
    ))
}

/// PUT /api/dashboard/logro/{id}
pub async fn update(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateAchievementRequest>,
) -> ApiResult<Json<SuccessResponse<Achievement>>> {
    let id = parse_id(&id, "achievement")?;
    let achievement = state.achievements.update(id, req.into_changes()).await?;
    info!(actor = %actor.user_id, achievement_id = %id, "Achievement updated");

    Ok(Json(SuccessResponse::with_data("Achievement updated successfully", achievement)))
}

/// DELETE /api/dashboard/logro/{id}
///
/// Soft delete: the record stays, hidden from listings.
pub async fn deactivate(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "achievement")?;
    state.achievements.deactivate(id).await?;
    info!(actor = %actor.user_id, achievement_id = %id, "Achievement deactivated");

    Ok(Json(MessageResponse::new("Achievement deleted successfully")))
}
