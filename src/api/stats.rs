use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use mindful_core::{
    export::{self, ExportFormat, ExportKind},
    models::{ProgramStats, ResearcherOverview},
};
use serde::Deserialize;
use uuid::Uuid;

use super::{identity::CurrentUser, ApiResult, AppState};

#[derive(Debug, Deserialize)]
struct ExportQuery {
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default = "default_format")]
    format: String,
}

fn default_kind() -> String {
    "stats".to_string()
}

fn default_format() -> String {
    "csv".to_string()
}

async fn program_stats(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
) -> ApiResult<Json<ProgramStats>> {
    Ok(Json(state.db.program_stats(&user, program_id)?))
}

async fn overview(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<ResearcherOverview>> {
    Ok(Json(state.db.researcher_overview(&user)?))
}

async fn export_program(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(program_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let kind: ExportKind = query.kind.parse()?;
    let format: ExportFormat = query.format.parse()?;
    let body = export::render(&state.db, &user, program_id, kind, format)?;

    let disposition = format!(
        "attachment; filename=\"{}-{}.{}\"",
        program_id,
        query.kind.to_ascii_lowercase(),
        format.extension()
    );
    tracing::info!(%program_id, kind = ?kind, format = ?format, "export rendered");

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/programs/{program_id}/stats", get(program_stats))
        .route("/programs/{program_id}/export", get(export_program))
        .route("/stats/overview", get(overview))
}
