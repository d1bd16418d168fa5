use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};

use crate::controllers::request_controller::RequestController;
use crate::dto::request_dto::{CreateEmergencyRequest, SubmissionResponse, TrackingResponse};
use crate::dto::ApiResponse;
use crate::middleware::rate_limit_middleware;
use crate::routes::{change_routes, json_body};
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Superficie pública: envío y seguimiento sin autenticación
pub fn create_request_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(submit_request).layer(middleware::from_fn_with_state(
                state,
                rate_limit_middleware,
            )),
        )
        .route("/track/:code", get(track_request))
        .route("/track/:code/events", get(change_routes::tracking_events))
}

async fn submit_request(
    State(state): State<AppState>,
    payload: Result<Json<CreateEmergencyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SubmissionResponse>>), AppError> {
    let request = json_body(payload)?;
    let controller = RequestController::new(state);
    let response = controller.submit(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn track_request(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<TrackingResponse>, AppError> {
    let controller = RequestController::new(state);
    let response = controller.track(&code).await?;
    Ok(Json(response))
}
