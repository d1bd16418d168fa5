use uuid::Uuid;

use crate::dto::fleet_dto::{
    CreateAmbulanceRequest, CreateDriverRequest, SetAmbulanceStatusRequest, SetDriverRequest,
};
use crate::dto::request_dto::{AssignAmbulanceRequest, SubmissionResponse};
use crate::dto::ApiResponse;
use crate::models::{Actor, Ambulance, DriverProfile, EmergencyRequest, RequestFilters};
use crate::services::{
    DashboardSnapshot, DispatchService, FleetService, LifecycleService, RequestService,
};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct AdminController {
    state: AppState,
    requests: RequestService,
    dispatch: DispatchService,
    lifecycle: LifecycleService,
    fleet: FleetService,
}

impl AdminController {
    pub fn new(state: AppState) -> Self {
        Self {
            requests: state.request_service(),
            dispatch: state.dispatch_service(),
            lifecycle: state.lifecycle_service(),
            fleet: state.fleet_service(),
            state,
        }
    }

    // ---- Ambulancias ----

    pub async fn list_ambulances(&self) -> Result<Vec<Ambulance>, AppError> {
        self.fleet.list_ambulances().await
    }

    pub async fn get_ambulance(&self, id: Uuid) -> Result<Ambulance, AppError> {
        self.fleet.get_ambulance(id).await
    }

    pub async fn create_ambulance(
        &self,
        actor: &Actor,
        request: CreateAmbulanceRequest,
    ) -> Result<ApiResponse<Ambulance>, AppError> {
        let new = request.into_new_ambulance()?;
        let ambulance = self.fleet.create_ambulance(new, actor).await?;
        Ok(ApiResponse::success_with_message(ambulance, "Ambulance created"))
    }

    pub async fn set_driver(
        &self,
        actor: &Actor,
        id: Uuid,
        request: SetDriverRequest,
    ) -> Result<ApiResponse<Ambulance>, AppError> {
        let ambulance = self.fleet.set_driver(id, request.driver_id, actor).await?;
        Ok(ApiResponse::success(ambulance))
    }

    pub async fn set_status(
        &self,
        actor: &Actor,
        id: Uuid,
        request: SetAmbulanceStatusRequest,
    ) -> Result<ApiResponse<Ambulance>, AppError> {
        let ambulance = self.fleet.set_status(id, request.status, actor).await?;
        Ok(ApiResponse::success(ambulance))
    }

    pub async fn reset_location(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<ApiResponse<Ambulance>, AppError> {
        let ambulance = self.fleet.reset_to_base(id, actor).await?;
        Ok(ApiResponse::success_with_message(ambulance, "Ambulance returned to base"))
    }

    // ---- Conductores ----

    pub async fn list_drivers(&self) -> Result<Vec<DriverProfile>, AppError> {
        self.fleet.list_drivers().await
    }

    pub async fn create_driver(
        &self,
        actor: &Actor,
        request: CreateDriverRequest,
    ) -> Result<ApiResponse<DriverProfile>, AppError> {
        let new = request.into_new_driver()?;
        let driver = self.fleet.create_driver(new, actor).await?;
        Ok(ApiResponse::success_with_message(driver, "Driver created"))
    }

    // ---- Solicitudes ----

    pub async fn list_requests(
        &self,
        filters: RequestFilters,
    ) -> Result<Vec<EmergencyRequest>, AppError> {
        self.requests.list(&filters).await
    }

    pub async fn get_request(&self, id: Uuid) -> Result<EmergencyRequest, AppError> {
        self.requests.get(id).await
    }

    pub async fn assign(
        &self,
        actor: &Actor,
        id: Uuid,
        request: AssignAmbulanceRequest,
    ) -> Result<ApiResponse<SubmissionResponse>, AppError> {
        let outcome = self
            .dispatch
            .assign_manually(id, request.ambulance_id, actor)
            .await?;
        Ok(ApiResponse::success_with_message(
            SubmissionResponse::from(outcome),
            "Ambulance assigned",
        ))
    }

    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<ApiResponse<EmergencyRequest>, AppError> {
        let request = self.lifecycle.cancel(id, actor).await?;
        Ok(ApiResponse::success_with_message(request, "Request cancelled"))
    }

    /// Reintentar el despacho automático de una solicitud aún pendiente
    pub async fn dispatch(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<ApiResponse<SubmissionResponse>, AppError> {
        let outcome = self.dispatch.dispatch_by_id(id, actor).await?;
        let response = SubmissionResponse::from(outcome);
        let message = response.message();
        Ok(ApiResponse::success_with_message(response, message))
    }

    pub async fn stats(&self) -> DashboardSnapshot {
        self.state.dashboard.snapshot().await
    }
}
