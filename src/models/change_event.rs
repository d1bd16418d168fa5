//! Eventos de cambio a nivel de fila
//!
//! Se publican después de cada operación confirmada para que los
//! observadores externos (vistas de conductor, admin y ciudadano) reaccionen
//! sin hacer polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ambulance::{Ambulance, AmbulanceStatus};
use super::emergency_request::{EmergencyRequest, RequestStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum ChangeEvent {
    EmergencyRequests {
        /// `None` para inserciones
        previous_status: Option<RequestStatus>,
        record: EmergencyRequest,
        at: DateTime<Utc>,
    },
    Ambulances {
        previous_status: Option<AmbulanceStatus>,
        record: Ambulance,
        at: DateTime<Utc>,
    },
}

impl ChangeEvent {
    pub fn request(previous_status: Option<RequestStatus>, record: EmergencyRequest) -> Self {
        ChangeEvent::EmergencyRequests {
            previous_status,
            record,
            at: Utc::now(),
        }
    }

    pub fn ambulance(previous_status: Option<AmbulanceStatus>, record: Ambulance) -> Self {
        ChangeEvent::Ambulances {
            previous_status,
            record,
            at: Utc::now(),
        }
    }

    /// Nombre del evento SSE
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::EmergencyRequests { previous_status: None, .. } => "request_inserted",
            ChangeEvent::EmergencyRequests { .. } => "request_updated",
            ChangeEvent::Ambulances { previous_status: None, .. } => "ambulance_inserted",
            ChangeEvent::Ambulances { .. } => "ambulance_updated",
        }
    }
}
