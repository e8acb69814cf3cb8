use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use mindful_core::models::{CreateProgramInput, Program, ProgramDetail, UpdateProgramInput};
use uuid::Uuid;

use super::{identity::CurrentUser, ApiJson, ApiResult, AppState};

async fn list_programs(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<Program>>> {
    Ok(Json(state.db.list_programs(&user)?))
}

async fn create_program(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<CreateProgramInput>,
) -> ApiResult<(StatusCode, Json<Program>)> {
    let program = state.db.create_program(&user, input)?;
    Ok((StatusCode::CREATED, Json(program)))
}

async fn get_program(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Program>> {
    Ok(Json(state.db.get_program(&user, program_id)?))
}

async fn program_detail(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<ProgramDetail>> {
    Ok(Json(state.db.get_program_detail(&user, program_id)?))
}

async fn update_program(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
    ApiJson(input): ApiJson<UpdateProgramInput>,
) -> ApiResult<Json<Program>> {
    Ok(Json(state.db.update_program(&user, program_id, input)?))
}

async fn delete_program(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_program(&user, program_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn publish_program(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Program>> {
    Ok(Json(state.db.publish_program(&user, program_id, Utc::now())?))
}

async fn duplicate_program(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ProgramDetail>)> {
    let copy = state.db.duplicate_program(&user, program_id)?;
    Ok((StatusCode::CREATED, Json(copy)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/programs", get(list_programs).post(create_program))
        .route(
            "/programs/{program_id}",
            get(get_program).patch(update_program).delete(delete_program),
        )
        .route("/programs/{program_id}/detail", get(program_detail))
        .route("/programs/{program_id}/publish", post(publish_program))
        .route("/programs/{program_id}/duplicate", post(duplicate_program))
}
