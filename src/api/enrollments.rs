use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use mindful_core::models::{Enrollment, EnrollmentProgress, Program};
use serde::Serialize;
use uuid::Uuid;

use super::{identity::CurrentUser, ApiResult, AppState};

#[derive(Debug, Serialize)]
struct CurrentProgram {
    enrollment: Enrollment,
    program: Program,
}

async fn enroll(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let enrollment = state.db.enroll(&user, program_id, Utc::now())?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

async fn program_enrollments(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    Ok(Json(state.db.list_program_enrollments(&user, program_id)?))
}

async fn own_enrollments(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<Enrollment>>> {
    Ok(Json(state.db.list_own_enrollments(&user)?))
}

/// `null` when the caller has nothing in progress.
async fn current(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Option<CurrentProgram>>> {
    let current = state
        .db
        .current_program(&user)?
        .map(|(enrollment, program)| CurrentProgram { enrollment, program });
    Ok(Json(current))
}

async fn get_enrollment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> ApiResult<Json<Enrollment>> {
    Ok(Json(state.db.get_enrollment(&user, enrollment_id)?))
}

async fn abandon(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> ApiResult<Json<Enrollment>> {
    Ok(Json(state.db.abandon(&user, enrollment_id, Utc::now())?))
}

async fn progress(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> ApiResult<Json<EnrollmentProgress>> {
    Ok(Json(state.db.enrollment_progress(&user, enrollment_id, Utc::now())?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/programs/{program_id}/enrollments",
            get(program_enrollments).post(enroll),
        )
        .route("/enrollments", get(own_enrollments))
        .route("/enrollments/current", get(current))
        .route("/enrollments/{enrollment_id}", get(get_enrollment))
        .route("/enrollments/{enrollment_id}/abandon", post(abandon))
        .route("/enrollments/{enrollment_id}/progress", get(progress))
}
