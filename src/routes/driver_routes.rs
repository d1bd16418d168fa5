use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::controllers::driver_controller::{DriverAssignment, DriverController};
use crate::dto::fleet_dto::LocationUpdateRequest;
use crate::dto::request_dto::StatusUpdateRequest;
use crate::dto::ApiResponse;
use crate::middleware::require_driver;
use crate::models::{Actor, Ambulance, EmergencyRequest};
use crate::routes::json_body;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Vista del conductor: solo su trabajo actual
pub fn create_driver_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/assignment", get(current_assignment))
        .route("/requests/:id/status", post(update_request_status))
        .route("/location", post(report_location))
        .route_layer(middleware::from_fn_with_state(state, require_driver))
}

async fn current_assignment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<DriverAssignment>>, AppError> {
    let controller = DriverController::new(state);
    let response = controller.assignment(&actor).await?;
    Ok(Json(response))
}

async fn update_request_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<EmergencyRequest>>, AppError> {
    let update = json_body(payload)?;
    let controller = DriverController::new(state);
    let response = controller.update_status(&actor, id, update).await?;
    Ok(Json(response))
}

async fn report_location(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<LocationUpdateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Ambulance>>, AppError> {
    let update = json_body(payload)?;
    let controller = DriverController::new(state);
    let response = controller.report_location(&actor, update).await?;
    Ok(Json(response))
}
