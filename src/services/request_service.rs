//! Solicitudes de emergencia
//!
//! Alta pública (con despacho síncrono) y consultas.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    Actor, ChangeEvent, Coordinates, EmergencyRequest, NewEmergencyRequest, RequestFilters,
};
use crate::repositories::DispatchStore;
use crate::services::change_feed::ChangeFeed;
use crate::services::dispatch_service::{DispatchOutcome, DispatchService};
use crate::services::tracking_code;
use crate::utils::errors::{forbidden_error, not_found_error, AppError, AppResult};

/// Intentos de inserción ante colisión del código de seguimiento
const TRACKING_CODE_ATTEMPTS: usize = 5;

pub struct RequestService {
    store: Arc<dyn DispatchStore>,
    feed: ChangeFeed,
    fallback: Coordinates,
}

impl RequestService {
    pub fn new(store: Arc<dyn DispatchStore>, feed: ChangeFeed, fallback: Coordinates) -> Self {
        Self {
            store,
            feed,
            fallback,
        }
    }

    /// Insertar la solicitud y ejecutar el disparador de despacho.
    /// `tracking_code` vacío en `new` = generar uno.
    pub async fn submit(&self, mut new: NewEmergencyRequest) -> AppResult<DispatchOutcome> {
        let generate = new.tracking_code.is_empty();
        let mut attempt = 0;

        let request = loop {
            attempt += 1;
            if generate {
                new.tracking_code = tracking_code::generate();
            }
            match self.store.insert_request(new.clone()).await {
                Ok(request) => break request,
                Err(AppError::Conflict(msg)) if generate && attempt < TRACKING_CODE_ATTEMPTS => {
                    warn!("🔁 Colisión de código de seguimiento ({}), reintentando", msg);
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            "🆘 Nueva solicitud {} ({}) en ({:.5}, {:.5})",
            request.tracking_code, request.emergency_type, request.latitude, request.longitude
        );
        self.feed.publish(ChangeEvent::request(None, request.clone())).await;

        DispatchService::new(self.store.clone(), self.feed.clone(), self.fallback)
            .dispatch(&request)
            .await
    }

    /// Búsqueda pública por código, sin distinguir mayúsculas
    pub async fn track(&self, code: &str) -> AppResult<EmergencyRequest> {
        let normalized = tracking_code::normalize(code);
        if !tracking_code::is_well_formed(&normalized) {
            return Err(AppError::BadRequest(format!(
                "'{}' is not a valid tracking code",
                code
            )));
        }

        self.store
            .find_request_by_tracking_code(&normalized)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No request with tracking code '{}'", normalized)))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<EmergencyRequest> {
        self.store
            .find_request(id)
            .await?
            .ok_or_else(|| not_found_error("Emergency request", &id.to_string()))
    }

    pub async fn list(&self, filters: &RequestFilters) -> AppResult<Vec<EmergencyRequest>> {
        self.store.list_requests(filters).await
    }

    /// Solicitud activa del conductor autenticado
    pub async fn current_assignment(&self, actor: &Actor) -> AppResult<Option<EmergencyRequest>> {
        let driver_id = actor
            .driver_id()
            .ok_or_else(|| forbidden_error("view assignment", "driver role required"))?;

        self.store.find_active_request_for_driver(driver_id).await
    }
}
