//! HTTP surface over the core library.
//!
//! Every route under `/api` identifies its caller through the
//! [`identity::CurrentUser`] extractor; `/health` is open.

mod body;
mod enrollments;
mod error;
pub mod identity;
mod programs;
mod questionnaires;
mod sessions;
mod stats;
mod users;

use axum::{extract::State, routing::get, Json, Router};
use mindful_core::Database;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use body::ApiJson;
pub use error::{ApiError, ApiResult, ErrorBody};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

pub fn create_router(db: Database) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .merge(users::router())
        .merge(programs::router())
        .merge(sessions::router())
        .merge(questionnaires::router())
        .merge(enrollments::router())
        .merge(stats::router());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(AppState { db })
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthStatus>> {
    state.db.with_connection(|conn| {
        conn.execute_batch("SELECT 1")?;
        Ok(())
    })?;

    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
