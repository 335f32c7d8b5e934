//! Student route handlers

use crate::auth::CurrentUser;
use crate::error::{not_found_error, ApiResult};
use crate::models::{
    parse_id, CreateStudentRequest, MessageResponse, Student, SuccessResponse,
    UpdateStudentRequest, ValidatedJson,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

/// GET /api/dashboard/alumnos
pub async fn list(State(state): State<SharedState>) -> ApiResult<Json<Vec<Student>>> {
    let students = state.students.list().await?;
    Ok(Json(students))
}

/// GET /api/dashboard/alumno/{id}
pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Student>> {
    let id = parse_id(&id, "student")?;
    let student = state
        .students
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found_error("Student not found"))?;
    Ok(Json(student))
}

/// POST /api/dashboard/alumno
pub async fn create(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateStudentRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Student>>)> {
    let student = state.students.insert(req.into_new()).await?;
    info!(actor = %actor.user_id, student_id = %student.id, "Student created");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Student created successfully", student)),
    ))
}

/// PUT /api/dashboard/alumno/{id}
pub async fn update(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateStudentRequest>,
) -> ApiResult<Json<SuccessResponse<Student>>> {
    let id = parse_id(&id, "student")?;
    let student = state.students.update(id, req.into_changes()).await?;
    info!(actor = %actor.user_id, student_id = %id, "Student updated");

    Ok(Json(SuccessResponse::with_data("Student updated successfully", student)))
}

/// DELETE /api/dashboard/alumno/{id}
pub async fn delete(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id, "student")?;
    let removed = state.students.delete(id).await?;
    info!(actor = %actor.user_id, student_id = %id, name = %removed.full_name, "Student deleted");

    Ok(Json(MessageResponse::new("Student deleted successfully")))
}
