//! Modelo de EmergencyRequest
//!
//! Solicitud de emergencia enviada por un ciudadano. Mapea a la tabla
//! `emergency_requests`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::geo::Coordinates;

/// Estado de la solicitud - mapea al CHECK de `emergency_requests.status`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Assigned,
    EnRoute,
    Arrived,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Pending,
        RequestStatus::Assigned,
        RequestStatus::EnRoute,
        RequestStatus::Arrived,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Assigned => "assigned",
            RequestStatus::EnRoute => "en_route",
            RequestStatus::Arrived => "arrived",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// `completed` y `cancelled` no cambian nunca más
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }

    /// Una solicitud activa retiene su ambulancia asignada
    pub fn holds_ambulance(&self) -> bool {
        matches!(
            self,
            RequestStatus::Assigned | RequestStatus::EnRoute | RequestStatus::Arrived
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown request status '{}'", s))
    }
}

/// Tipo de emergencia - conjunto fijo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    Medical,
    Accident,
    Fire,
    Maternity,
    Cardiac,
    Respiratory,
    Trauma,
    Other,
}

impl EmergencyType {
    pub const ALL: [EmergencyType; 8] = [
        EmergencyType::Medical,
        EmergencyType::Accident,
        EmergencyType::Fire,
        EmergencyType::Maternity,
        EmergencyType::Cardiac,
        EmergencyType::Respiratory,
        EmergencyType::Trauma,
        EmergencyType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyType::Medical => "medical",
            EmergencyType::Accident => "accident",
            EmergencyType::Fire => "fire",
            EmergencyType::Maternity => "maternity",
            EmergencyType::Cardiac => "cardiac",
            EmergencyType::Respiratory => "respiratory",
            EmergencyType::Trauma => "trauma",
            EmergencyType::Other => "other",
        }
    }
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmergencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        EmergencyType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown emergency type '{}'", s))
    }
}

/// EmergencyRequest principal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyRequest {
    pub id: Uuid,
    pub tracking_code: String,
    pub requester_name: Option<String>,
    pub requester_phone: String,
    pub emergency_type: EmergencyType,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub status: RequestStatus,
    pub assigned_ambulance_id: Option<Uuid>,
    pub assigned_driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EmergencyRequest {
    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Solo las solicitudes `pending` sin ambulancia disparan el despacho automático
    pub fn awaits_dispatch(&self) -> bool {
        self.status == RequestStatus::Pending && self.assigned_ambulance_id.is_none()
    }

    /// Comprueba los invariantes de la fila
    pub fn is_consistent(&self) -> bool {
        let assignment_paired =
            self.assigned_ambulance_id.is_some() == self.assigned_driver_id.is_some();
        let completion_paired =
            self.completed_at.is_some() == (self.status == RequestStatus::Completed);
        assignment_paired && completion_paired
    }
}

/// Datos validados para insertar una nueva solicitud
#[derive(Debug, Clone)]
pub struct NewEmergencyRequest {
    pub tracking_code: String,
    pub requester_name: Option<String>,
    pub requester_phone: String,
    pub emergency_type: EmergencyType,
    pub description: Option<String>,
    pub location: Coordinates,
    pub address: Option<String>,
}

/// Filtros para listar solicitudes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilters {
    pub status: Option<RequestStatus>,
    pub limit: Option<i64>,
}
