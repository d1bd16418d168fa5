use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::controllers::admin_controller::AdminController;
use crate::dto::fleet_dto::{
    CreateAmbulanceRequest, CreateDriverRequest, SetAmbulanceStatusRequest, SetDriverRequest,
};
use crate::dto::request_dto::{AssignAmbulanceRequest, SubmissionResponse};
use crate::dto::ApiResponse;
use crate::middleware::require_admin;
use crate::models::{Actor, Ambulance, DriverProfile, EmergencyRequest, RequestFilters};
use crate::routes::json_body;
use crate::services::DashboardSnapshot;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Consola de administración
pub fn create_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/ambulances", get(list_ambulances).post(create_ambulance))
        .route("/ambulances/:id", get(get_ambulance))
        .route("/ambulances/:id/driver", put(set_ambulance_driver))
        .route("/ambulances/:id/status", put(set_ambulance_status))
        .route("/ambulances/:id/reset-location", post(reset_ambulance_location))
        .route("/drivers", get(list_drivers).post(create_driver))
        .route("/requests", get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/assign", post(assign_request))
        .route("/requests/:id/cancel", post(cancel_request))
        .route("/requests/:id/dispatch", post(dispatch_request))
        .route("/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

async fn list_ambulances(
    State(state): State<AppState>,
) -> Result<Json<Vec<Ambulance>>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.list_ambulances().await?))
}

async fn get_ambulance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ambulance>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.get_ambulance(id).await?))
}

async fn create_ambulance(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateAmbulanceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Ambulance>>), AppError> {
    let request = json_body(payload)?;
    let controller = AdminController::new(state);
    let response = controller.create_ambulance(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn set_ambulance_driver(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SetDriverRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Ambulance>>, AppError> {
    let request = json_body(payload)?;
    let controller = AdminController::new(state);
    Ok(Json(controller.set_driver(&actor, id, request).await?))
}

async fn set_ambulance_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SetAmbulanceStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Ambulance>>, AppError> {
    let request = json_body(payload)?;
    let controller = AdminController::new(state);
    Ok(Json(controller.set_status(&actor, id, request).await?))
}

async fn reset_ambulance_location(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Ambulance>>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.reset_location(&actor, id).await?))
}

async fn list_drivers(
    State(state): State<AppState>,
) -> Result<Json<Vec<DriverProfile>>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.list_drivers().await?))
}

async fn create_driver(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateDriverRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<DriverProfile>>), AppError> {
    let request = json_body(payload)?;
    let controller = AdminController::new(state);
    let response = controller.create_driver(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_requests(
    State(state): State<AppState>,
    Query(filters): Query<RequestFilters>,
) -> Result<Json<Vec<EmergencyRequest>>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.list_requests(filters).await?))
}

async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmergencyRequest>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.get_request(id).await?))
}

async fn assign_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AssignAmbulanceRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SubmissionResponse>>, AppError> {
    let request = json_body(payload)?;
    let controller = AdminController::new(state);
    Ok(Json(controller.assign(&actor, id, request).await?))
}

async fn cancel_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EmergencyRequest>>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.cancel(&actor, id).await?))
}

async fn dispatch_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SubmissionResponse>>, AppError> {
    let controller = AdminController::new(state);
    Ok(Json(controller.dispatch(&actor, id).await?))
}

async fn stats(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    let controller = AdminController::new(state);
    Json(controller.stats().await)
}
