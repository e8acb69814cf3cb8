use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use mindful_core::models::{
    CreateQuestionnaireInput, Questionnaire, QuestionnaireResponse, SubmissionOutcome,
    SubmitResponseInput, UpdateQuestionnaireInput,
};
use uuid::Uuid;

use super::{identity::CurrentUser, ApiJson, ApiResult, AppState};

async fn create_questionnaire(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
    ApiJson(input): ApiJson<CreateQuestionnaireInput>,
) -> ApiResult<(StatusCode, Json<Questionnaire>)> {
    let questionnaire = state.db.create_questionnaire(&user, program_id, input)?;
    Ok((StatusCode::CREATED, Json(questionnaire)))
}

async fn get_questionnaire(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(questionnaire_id): Path<Uuid>,
) -> ApiResult<Json<Questionnaire>> {
    Ok(Json(state.db.get_questionnaire(&user, questionnaire_id)?))
}

async fn update_questionnaire(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(questionnaire_id): Path<Uuid>,
    ApiJson(input): ApiJson<UpdateQuestionnaireInput>,
) -> ApiResult<Json<Questionnaire>> {
    Ok(Json(state.db.update_questionnaire(&user, questionnaire_id, input)?))
}

async fn delete_questionnaire(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(questionnaire_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_questionnaire(&user, questionnaire_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_response(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(questionnaire_id): Path<Uuid>,
    ApiJson(input): ApiJson<SubmitResponseInput>,
) -> ApiResult<(StatusCode, Json<SubmissionOutcome>)> {
    let outcome = state
        .db
        .submit_response(&user, questionnaire_id, input, Utc::now())?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn list_responses(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(questionnaire_id): Path<Uuid>,
) -> ApiResult<Json<Vec<QuestionnaireResponse>>> {
    Ok(Json(state.db.list_responses(&user, questionnaire_id)?))
}

async fn own_response(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(questionnaire_id): Path<Uuid>,
) -> ApiResult<Json<Option<QuestionnaireResponse>>> {
    Ok(Json(state.db.get_own_response(&user, questionnaire_id)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/programs/{program_id}/questionnaires",
            post(create_questionnaire),
        )
        .route(
            "/questionnaires/{questionnaire_id}",
            get(get_questionnaire)
                .patch(update_questionnaire)
                .delete(delete_questionnaire),
        )
        .route(
            "/questionnaires/{questionnaire_id}/responses",
            get(list_responses).post(submit_response),
        )
        .route(
            "/questionnaires/{questionnaire_id}/responses/me",
            get(own_response),
        )
}
