//! Gobernador del ciclo de vida
//!
//! Grafo de estados de una solicitud:
//!
//! ```text
//! pending -> assigned -> en_route -> arrived -> completed
//!    \           \           \          \
//!     +-----------+-----------+----------+--> cancelled
//! ```
//!
//! `pending -> assigned` solo ocurre por despacho (automático o manual).
//! El conductor asignado avanza el resto del camino; el administrador puede
//! cancelar antes de completar. Cada paso arrastra el estado de la ambulancia.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    Actor, AmbulanceChange, AmbulanceStatus, AmbulanceStatusChange, ChangeEvent, EmergencyRequest,
    RequestStatus, TransitionOutcome, TransitionPlan,
};
use crate::repositories::DispatchStore;
use crate::services::change_feed::ChangeFeed;
use crate::utils::errors::{forbidden_error, not_found_error, AppError, AppResult};

/// Siguiente estado en el camino del conductor
pub fn driver_next(status: RequestStatus) -> Option<RequestStatus> {
    match status {
        RequestStatus::Assigned => Some(RequestStatus::EnRoute),
        RequestStatus::EnRoute => Some(RequestStatus::Arrived),
        RequestStatus::Arrived => Some(RequestStatus::Completed),
        _ => None,
    }
}

/// Estado de ambulancia que acompaña a cada estado de solicitud
pub fn ambulance_status_for(status: RequestStatus) -> AmbulanceStatus {
    match status {
        RequestStatus::Assigned => AmbulanceStatus::Busy,
        RequestStatus::EnRoute => AmbulanceStatus::EnRoute,
        RequestStatus::Arrived => AmbulanceStatus::Arrived,
        RequestStatus::Pending | RequestStatus::Completed | RequestStatus::Cancelled => {
            AmbulanceStatus::Available
        }
    }
}

/// Validar actor y arista, y construir el plan sin tocar nada.
pub fn plan_transition(
    request: &EmergencyRequest,
    actor: &Actor,
    target: RequestStatus,
    now: DateTime<Utc>,
) -> AppResult<TransitionPlan> {
    let from = request.status;

    if from.is_terminal() {
        return Err(AppError::IllegalTransition(format!(
            "Request {} is {} and can no longer change",
            request.tracking_code, from
        )));
    }

    if target == RequestStatus::Cancelled {
        if !actor.is_admin() {
            return Err(forbidden_error(
                "cancel request",
                "only an administrator may cancel",
            ));
        }
        // la ambulancia retenida vuelve a estar libre
        let ambulance = match request.assigned_ambulance_id {
            Some(ambulance_id) if from.holds_ambulance() => Some(AmbulanceChange {
                ambulance_id,
                status: AmbulanceStatus::Available,
                location: None,
            }),
            _ => None,
        };
        return Ok(TransitionPlan {
            request_id: request.id,
            from,
            to: target,
            ambulance,
            completed_at: None,
        });
    }

    if driver_next(from) != Some(target) {
        return Err(AppError::IllegalTransition(format!(
            "Request {} cannot go from {} to {}",
            request.tracking_code, from, target
        )));
    }

    match (actor.driver_id(), request.assigned_driver_id) {
        (Some(driver_id), Some(assigned)) if driver_id == assigned => {}
        _ => {
            return Err(forbidden_error(
                &format!("move request {} to {}", request.tracking_code, target),
                "only the assigned driver may advance this request",
            ))
        }
    }

    let ambulance_id = request.assigned_ambulance_id.ok_or_else(|| {
        AppError::Internal(format!(
            "Request {} has a driver but no ambulance",
            request.tracking_code
        ))
    })?;

    let location = match target {
        RequestStatus::Arrived => Some(request.location()),
        _ => None,
    };

    Ok(TransitionPlan {
        request_id: request.id,
        from,
        to: target,
        ambulance: Some(AmbulanceChange {
            ambulance_id,
            status: ambulance_status_for(target),
            location,
        }),
        completed_at: (target == RequestStatus::Completed).then_some(now),
    })
}

/// Cambio administrativo del estado de una ambulancia.
///
/// `offline` se acepta siempre. `available` solo desde `offline` y sin
/// solicitudes activas que la referencien. El resto de estados los fija el
/// ciclo de vida de la solicitud.
pub fn plan_ambulance_status_change(
    ambulance_id: Uuid,
    target: AmbulanceStatus,
    actor: &Actor,
) -> AppResult<AmbulanceStatusChange> {
    if !actor.is_admin() {
        return Err(forbidden_error(
            "change ambulance status",
            "administrator role required",
        ));
    }

    match target {
        AmbulanceStatus::Offline => Ok(AmbulanceStatusChange {
            ambulance_id,
            status: target,
            allowed_from: Vec::new(),
            require_no_active_request: false,
        }),
        AmbulanceStatus::Available => Ok(AmbulanceStatusChange {
            ambulance_id,
            status: target,
            allowed_from: vec![AmbulanceStatus::Offline, AmbulanceStatus::Available],
            require_no_active_request: true,
        }),
        other => Err(AppError::IllegalTransition(format!(
            "Ambulance status {} is set by the request lifecycle, not manually",
            other
        ))),
    }
}

pub struct LifecycleService {
    store: Arc<dyn DispatchStore>,
    feed: ChangeFeed,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn DispatchStore>, feed: ChangeFeed) -> Self {
        Self { store, feed }
    }

    /// Aplicar una transición. Los rechazos no mutan nada.
    pub async fn transition(
        &self,
        request_id: Uuid,
        actor: &Actor,
        target: RequestStatus,
    ) -> AppResult<EmergencyRequest> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| not_found_error("Emergency request", &request_id.to_string()))?;

        let plan = plan_transition(&request, actor, target, Utc::now())?;
        let outcome = self.store.apply_transition(&plan).await?;

        info!(
            "🔄 {}: {} -> {} ({})",
            outcome.request.tracking_code, outcome.previous_status, outcome.request.status, actor
        );
        self.publish(&outcome).await;
        Ok(outcome.request)
    }

    pub async fn cancel(&self, request_id: Uuid, actor: &Actor) -> AppResult<EmergencyRequest> {
        self.transition(request_id, actor, RequestStatus::Cancelled)
            .await
    }

    async fn publish(&self, outcome: &TransitionOutcome) {
        let mut events = vec![ChangeEvent::request(
            Some(outcome.previous_status),
            outcome.request.clone(),
        )];
        if let Some((previous, ambulance)) = &outcome.ambulance {
            events.push(ChangeEvent::ambulance(Some(*previous), ambulance.clone()));
        }
        self.feed.publish_all(events).await;
    }
}
