//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos de
//! entrada que no cubren los atributos de `validator`.

use lazy_static::lazy_static;
use regex::Regex;
use validator::{ValidationError, ValidationErrors};

use crate::models::{Coordinates, EmergencyType};

lazy_static! {
    /// Teléfono: dígitos con separadores habituales y prefijo `+` opcional
    pub static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").unwrap();
}

/// Validar que el tipo de emergencia pertenece al conjunto fijo
pub fn validate_emergency_type(value: &str) -> Result<(), ValidationError> {
    value.parse::<EmergencyType>().map(|_| ()).map_err(|_| {
        let mut error = ValidationError::new("emergency_type");
        error.add_param("value".into(), &value.to_string());
        error.message = Some("Unrecognized emergency type".into());
        error
    })
}

/// Validar un número opcional dentro de `[min, max]`
pub fn validate_bounded(value: Option<f64>, min: f64, max: f64) -> Result<f64, ValidationError> {
    match value {
        None => {
            let mut error = ValidationError::new("required");
            error.message = Some("This field is required".into());
            Err(error)
        }
        Some(v) if !v.is_finite() || v < min || v > max => {
            let mut error = ValidationError::new("range");
            error.add_param("min".into(), &min);
            error.add_param("max".into(), &max);
            error.add_param("value".into(), &v);
            Err(error)
        }
        Some(v) => Ok(v),
    }
}

/// Validar un par latitud/longitud y acumular los errores en `errors`
pub fn validate_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
    errors: &mut ValidationErrors,
) -> Option<Coordinates> {
    let lat = validate_bounded(latitude, -90.0, 90.0)
        .map_err(|e| errors.add("latitude", e))
        .ok();
    let lng = validate_bounded(longitude, -180.0, 180.0)
        .map_err(|e| errors.add("longitude", e))
        .ok();

    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
        _ => None,
    }
}

/// Convertir el resultado de `Validate::validate` en un acumulador
pub fn collect_errors(result: Result<(), ValidationErrors>) -> ValidationErrors {
    result.err().unwrap_or_else(ValidationErrors::new)
}

/// Recortar y descartar cadenas vacías
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
