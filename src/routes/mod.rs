//! Routers HTTP
//!
//! Cada superficie (ciudadano, conductor, administración) tiene su router;
//! `create_router` los monta y aplica las capas comunes.

pub mod admin_routes;
pub mod change_routes;
pub mod driver_routes;
pub mod request_routes;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::middleware::cors_layer;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Router completo de la aplicación, con el estado ya aplicado
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/requests", request_routes::create_request_router(state.clone()))
        .nest("/api/driver", driver_routes::create_driver_router(state.clone()))
        .nest("/api/admin", admin_routes::create_admin_router(state.clone()))
        .nest("/api/changes", change_routes::create_change_router(state.clone()))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = if state.config.database_url.is_some() {
        "postgres"
    } else {
        "memory"
    };

    Json(json!({
        "status": "ok",
        "service": "ambulance_dispatch",
        "store": store,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Cuerpos JSON mal formados se responden como 400
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
