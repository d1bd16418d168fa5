use serde::Serialize;
use uuid::Uuid;

use crate::dto::fleet_dto::LocationUpdateRequest;
use crate::dto::request_dto::StatusUpdateRequest;
use crate::dto::ApiResponse;
use crate::models::{Actor, Ambulance, EmergencyRequest};
use crate::services::{FleetService, LifecycleService, RequestService};
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation::validate_coordinates;

/// Trabajo actual del conductor
#[derive(Debug, Serialize)]
pub struct DriverAssignment {
    pub request: Option<EmergencyRequest>,
    pub ambulance: Option<Ambulance>,
}

pub struct DriverController {
    state: AppState,
    requests: RequestService,
    lifecycle: LifecycleService,
    fleet: FleetService,
}

impl DriverController {
    pub fn new(state: AppState) -> Self {
        Self {
            requests: state.request_service(),
            lifecycle: state.lifecycle_service(),
            fleet: state.fleet_service(),
            state,
        }
    }

    pub async fn assignment(&self, actor: &Actor) -> Result<ApiResponse<DriverAssignment>, AppError> {
        let request = self.requests.current_assignment(actor).await?;
        let ambulance = match actor.driver_id() {
            Some(driver_id) => self.state.store.find_ambulance_by_driver(driver_id).await?,
            None => None,
        };

        let message = if request.is_some() {
            "Active assignment"
        } else {
            "No active assignment"
        };
        Ok(ApiResponse::success_with_message(
            DriverAssignment { request, ambulance },
            message,
        ))
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        request_id: Uuid,
        update: StatusUpdateRequest,
    ) -> Result<ApiResponse<EmergencyRequest>, AppError> {
        let request = self
            .lifecycle
            .transition(request_id, actor, update.status)
            .await?;
        let message = format!("Request {} is now {}", request.tracking_code, request.status);
        Ok(ApiResponse::success_with_message(request, message))
    }

    pub async fn report_location(
        &self,
        actor: &Actor,
        update: LocationUpdateRequest,
    ) -> Result<ApiResponse<Ambulance>, AppError> {
        let mut errors = validator::ValidationErrors::new();
        let location = validate_coordinates(update.latitude, update.longitude, &mut errors)
            .ok_or(AppError::Validation(errors))?;

        let ambulance = self.fleet.report_location(actor, location).await?;
        Ok(ApiResponse::success(ambulance))
    }
}
