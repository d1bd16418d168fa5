//! Planes de mutación que el almacén aplica de forma atómica
//!
//! El gobernador del ciclo de vida decide *qué* cambia; el almacén
//! solo aplica el plan si la fila sigue en el estado esperado.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ambulance::{Ambulance, AmbulanceStatus};
use super::emergency_request::{EmergencyRequest, RequestStatus};
use super::geo::Coordinates;

/// Cambio de estado de una solicitud ya validado
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub request_id: Uuid,
    /// Guardia optimista: el estado desde el que se calculó el plan
    pub from: RequestStatus,
    pub to: RequestStatus,
    /// Ambulancia correlacionada y su nuevo estado
    pub ambulance: Option<AmbulanceChange>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbulanceChange {
    pub ambulance_id: Uuid,
    pub status: AmbulanceStatus,
    /// Sobrescribe la posición actual (llegada al lugar)
    pub location: Option<Coordinates>,
}

/// Resultado de aplicar un `TransitionPlan`
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub request: EmergencyRequest,
    pub previous_status: RequestStatus,
    pub ambulance: Option<(AmbulanceStatus, Ambulance)>,
}

/// Resultado de intentar reclamar una ambulancia para una solicitud
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed {
        request: EmergencyRequest,
        ambulance: Ambulance,
        previous_ambulance_status: AmbulanceStatus,
    },
    /// Otra operación se llevó la ambulancia (o ya no es candidata)
    AmbulanceUnavailable,
    /// La solicitud ya no está `pending` sin asignar
    RequestNotPending(EmergencyRequest),
}

/// Condiciones para que el almacén acepte un cambio de estado de ambulancia
#[derive(Debug, Clone, PartialEq)]
pub struct AmbulanceStatusChange {
    pub ambulance_id: Uuid,
    pub status: AmbulanceStatus,
    /// Vacío = cualquier estado de origen
    pub allowed_from: Vec<AmbulanceStatus>,
    /// Rechazar si alguna solicitud activa referencia la ambulancia
    pub require_no_active_request: bool,
}
