use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Ambulance, EmergencyRequest, EmergencyType, NewEmergencyRequest, RequestStatus};
use crate::services::DispatchOutcome;
use crate::utils::validation::{
    collect_errors, non_empty, validate_coordinates, validate_emergency_type,
};

pub const SEARCHING_MESSAGE: &str = "Request received. It is pending while we search for an available ambulance.";
pub const ASSIGNED_MESSAGE: &str = "Request received. An ambulance has been assigned.";

// Envío público de una emergencia
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEmergencyRequest {
    #[validate(length(max = 120))]
    pub requester_name: Option<String>,
    #[serde(default)]
    #[validate(regex(path = "crate::utils::validation::PHONE_REGEX", message = "Invalid phone number"))]
    pub requester_phone: String,
    #[serde(default)]
    #[validate(custom = "validate_emergency_type")]
    pub emergency_type: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

impl CreateEmergencyRequest {
    /// Validar todos los campos a la vez y construir la solicitud.
    ///
    /// El código de seguimiento queda vacío: lo genera el servicio.
    pub fn into_new_request(mut self) -> Result<NewEmergencyRequest, validator::ValidationErrors> {
        self.requester_phone = self.requester_phone.trim().to_string();
        let mut errors = collect_errors(self.validate());
        let location = validate_coordinates(self.latitude, self.longitude, &mut errors);

        let emergency_type = self.emergency_type.parse::<EmergencyType>().ok();

        match (location, emergency_type) {
            (Some(location), Some(emergency_type)) if errors.errors().is_empty() => Ok(NewEmergencyRequest {
                tracking_code: String::new(),
                requester_name: non_empty(self.requester_name),
                requester_phone: self.requester_phone,
                emergency_type,
                description: non_empty(self.description),
                location,
                address: non_empty(self.address),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: RequestStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignAmbulanceRequest {
    pub ambulance_id: Uuid,
}

// Resumen público de la ambulancia asignada
#[derive(Debug, Clone, Serialize)]
pub struct AssignedAmbulance {
    pub id: Uuid,
    pub plate_number: String,
    pub status: String,
}

impl From<&Ambulance> for AssignedAmbulance {
    fn from(ambulance: &Ambulance) -> Self {
        Self {
            id: ambulance.id,
            plate_number: ambulance.plate_number.clone(),
            status: ambulance.status.to_string(),
        }
    }
}

// Respuesta al envío
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub tracking_code: String,
    pub request: EmergencyRequest,
    pub ambulance: Option<AssignedAmbulance>,
    pub distance_km: Option<f64>,
}

impl SubmissionResponse {
    pub fn message(&self) -> String {
        if self.ambulance.is_some() {
            ASSIGNED_MESSAGE.to_string()
        } else if self.request.status == RequestStatus::Pending {
            SEARCHING_MESSAGE.to_string()
        } else {
            format!("Request is {}; nothing to dispatch", self.request.status)
        }
    }
}

impl From<DispatchOutcome> for SubmissionResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Assigned {
                request,
                ambulance,
                distance_km,
            } => Self {
                tracking_code: request.tracking_code.clone(),
                request,
                ambulance: Some(AssignedAmbulance::from(&ambulance)),
                distance_km,
            },
            DispatchOutcome::NoCandidate { request } | DispatchOutcome::Skipped { request } => Self {
                tracking_code: request.tracking_code.clone(),
                request,
                ambulance: None,
                distance_km: None,
            },
        }
    }
}

// Vista pública del seguimiento: sin datos personales del solicitante
#[derive(Debug, Clone, Serialize)]
pub struct TrackingResponse {
    pub tracking_code: String,
    pub status: RequestStatus,
    pub emergency_type: EmergencyType,
    pub address: Option<String>,
    pub ambulance: Option<AssignedAmbulance>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TrackingResponse {
    pub fn new(request: &EmergencyRequest, ambulance: Option<&Ambulance>) -> Self {
        Self {
            tracking_code: request.tracking_code.clone(),
            status: request.status,
            emergency_type: request.emergency_type,
            address: request.address.clone(),
            ambulance: ambulance.map(AssignedAmbulance::from),
            created_at: request.created_at,
            updated_at: request.updated_at,
            completed_at: request.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateEmergencyRequest {
        CreateEmergencyRequest {
            requester_name: Some("  Amina ".to_string()),
            requester_phone: "+234 803 555 0101".to_string(),
            emergency_type: "Cardiac".to_string(),
            description: Some(String::new()),
            latitude: Some(9.07),
            longitude: Some(7.40),
            address: None,
        }
    }

    #[test]
    fn test_valid_submission_is_normalized() {
        let new = valid().into_new_request().unwrap();
        assert_eq!(new.requester_name.as_deref(), Some("Amina"));
        assert_eq!(new.emergency_type, EmergencyType::Cardiac);
        assert!(new.description.is_none());
        assert!(new.tracking_code.is_empty());
    }

    #[test]
    fn test_all_invalid_fields_are_reported() {
        let mut dto = valid();
        dto.requester_phone = "abc".to_string();
        dto.emergency_type = "alien".to_string();
        dto.latitude = Some(91.0);
        dto.longitude = None;

        let errors = dto.into_new_request().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("requester_phone"));
        assert!(fields.contains_key("emergency_type"));
        assert!(fields.contains_key("latitude"));
        assert!(fields.contains_key("longitude"));
    }

    #[test]
    fn test_phone_is_trimmed_before_validation() {
        let mut dto = valid();
        dto.requester_phone = "  08035550101 ".to_string();
        let new = dto.into_new_request().unwrap();
        assert_eq!(new.requester_phone, "08035550101");
    }

    #[test]
    fn test_missing_phone_is_rejected() {
        let mut dto = valid();
        dto.requester_phone = String::new();
        let errors = dto.into_new_request().unwrap_err();
        assert!(errors.field_errors().contains_key("requester_phone"));
    }
}
