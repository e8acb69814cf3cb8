use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use mindful_core::models::{
    CreateDiaryEntryInput, CreateSessionInput, DiaryEntry, Session, SessionAvailability,
    UpdateSessionInput,
};
use uuid::Uuid;

use super::{identity::CurrentUser, ApiJson, ApiResult, AppState};

async fn list_sessions(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Session>>> {
    Ok(Json(state.db.list_sessions(&user, program_id)?))
}

async fn add_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
    ApiJson(input): ApiJson<CreateSessionInput>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = state.db.add_session(&user, program_id, input)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.db.get_session(&user, session_id)?))
}

async fn update_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
    ApiJson(input): ApiJson<UpdateSessionInput>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.db.update_session(&user, session_id, input)?))
}

async fn delete_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_session(&user, session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn availability(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionAvailability>> {
    Ok(Json(state.db.session_availability(&user, session_id, Utc::now())?))
}

async fn submit_diary_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
    ApiJson(input): ApiJson<CreateDiaryEntryInput>,
) -> ApiResult<(StatusCode, Json<DiaryEntry>)> {
    let entry = state.db.submit_diary_entry(&user, session_id, input, Utc::now())?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn session_diary_entries(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<DiaryEntry>>> {
    Ok(Json(state.db.list_session_diary_entries(&user, session_id)?))
}

async fn own_diary_entries(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<Vec<DiaryEntry>>> {
    Ok(Json(state.db.list_own_diary_entries(&user, program_id)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/programs/{program_id}/sessions",
            get(list_sessions).post(add_session),
        )
        .route("/programs/{program_id}/diary", get(own_diary_entries))
        .route(
            "/sessions/{session_id}",
            get(get_session).patch(update_session).delete(delete_session),
        )
        .route("/sessions/{session_id}/availability", get(availability))
        .route(
            "/sessions/{session_id}/diary",
            get(session_diary_entries).post(submit_diary_entry),
        )
}
