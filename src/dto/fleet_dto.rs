use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AmbulanceStatus, NewAmbulance, NewDriverProfile};
use crate::utils::validation::{collect_errors, validate_coordinates};

// Request para aprovisionar una ambulancia
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAmbulanceRequest {
    #[validate(length(min = 1, max = 20, message = "Plate number is required"))]
    pub plate_number: String,
    pub driver_id: Option<Uuid>,
    pub base_latitude: Option<f64>,
    pub base_longitude: Option<f64>,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
}

impl CreateAmbulanceRequest {
    pub fn into_new_ambulance(mut self) -> Result<NewAmbulance, validator::ValidationErrors> {
        self.plate_number = self.plate_number.trim().to_uppercase();
        let mut errors = collect_errors(self.validate());
        let base = validate_coordinates(self.base_latitude, self.base_longitude, &mut errors);

        // La posición actual es opcional; si falta se parte de la base
        let current = match (self.current_latitude, self.current_longitude) {
            (None, None) => None,
            (lat, lng) => {
                let mut current_errors = validator::ValidationErrors::new();
                let location = validate_coordinates(lat, lng, &mut current_errors);
                for (field, field_errors) in current_errors.field_errors() {
                    let name = if field == "latitude" {
                        "current_latitude"
                    } else {
                        "current_longitude"
                    };
                    for error in field_errors {
                        errors.add(name, error.clone());
                    }
                }
                location
            }
        };

        match base {
            Some(base_station) if errors.errors().is_empty() => Ok(NewAmbulance {
                plate_number: self.plate_number,
                driver_id: self.driver_id,
                base_station,
                current_location: current,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetDriverRequest {
    pub driver_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SetAmbulanceStatusRequest {
    pub status: AmbulanceStatus,
}

#[derive(Debug, Deserialize)]
pub struct LocationUpdateRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// Request para registrar el perfil de un conductor
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDriverRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 120, message = "Full name is required"))]
    pub full_name: String,
    #[serde(default)]
    #[validate(regex(path = "crate::utils::validation::PHONE_REGEX", message = "Invalid phone number"))]
    pub phone: String,
}

impl CreateDriverRequest {
    pub fn into_new_driver(mut self) -> Result<NewDriverProfile, validator::ValidationErrors> {
        self.full_name = self.full_name.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.validate()?;

        Ok(NewDriverProfile {
            user_id: self.user_id,
            full_name: self.full_name,
            phone: self.phone,
        })
    }
}
