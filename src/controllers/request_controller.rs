use tracing::info;

use crate::dto::request_dto::{CreateEmergencyRequest, SubmissionResponse, TrackingResponse};
use crate::dto::ApiResponse;
use crate::models::{Ambulance, EmergencyRequest};
use crate::services::RequestService;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct RequestController {
    state: AppState,
    requests: RequestService,
}

impl RequestController {
    pub fn new(state: AppState) -> Self {
        Self {
            requests: state.request_service(),
            state,
        }
    }

    /// Envío público: valida, persiste y lanza el despacho
    pub async fn submit(
        &self,
        request: CreateEmergencyRequest,
    ) -> Result<ApiResponse<SubmissionResponse>, AppError> {
        let new = request.into_new_request()?;

        let outcome = self.requests.submit(new).await?;
        let response = SubmissionResponse::from(outcome);
        info!(
            "🆘 Solicitud {} recibida ({})",
            response.tracking_code, response.request.status
        );

        let message = response.message();
        Ok(ApiResponse::success_with_message(response, message))
    }

    /// Seguimiento por código, sin autenticación
    pub async fn track(&self, code: &str) -> Result<TrackingResponse, AppError> {
        let request = self.requests.track(code).await?;
        let ambulance = self.assigned_ambulance(&request).await?;
        Ok(TrackingResponse::new(&request, ambulance.as_ref()))
    }

    async fn assigned_ambulance(
        &self,
        request: &EmergencyRequest,
    ) -> Result<Option<Ambulance>, AppError> {
        match request.assigned_ambulance_id {
            Some(id) => self.state.store.find_ambulance(id).await,
            None => Ok(None),
        }
    }
}
