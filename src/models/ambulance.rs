//! Modelo de Ambulance
//!
//! Mapea a la tabla `ambulances`. Las coordenadas de base se fijan al
//! aprovisionar la ambulancia y no cambian nunca.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::geo::Coordinates;

/// Estado de la ambulancia - mapea al CHECK de `ambulances.status`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AmbulanceStatus {
    Available,
    EnRoute,
    Arrived,
    Busy,
    Offline,
}

impl AmbulanceStatus {
    pub const ALL: [AmbulanceStatus; 5] = [
        AmbulanceStatus::Available,
        AmbulanceStatus::EnRoute,
        AmbulanceStatus::Arrived,
        AmbulanceStatus::Busy,
        AmbulanceStatus::Offline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AmbulanceStatus::Available => "available",
            AmbulanceStatus::EnRoute => "en_route",
            AmbulanceStatus::Arrived => "arrived",
            AmbulanceStatus::Busy => "busy",
            AmbulanceStatus::Offline => "offline",
        }
    }

    /// Estados que implican un viaje en curso
    pub fn is_on_trip(&self) -> bool {
        matches!(
            self,
            AmbulanceStatus::Busy | AmbulanceStatus::EnRoute | AmbulanceStatus::Arrived
        )
    }
}

impl fmt::Display for AmbulanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmbulanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AmbulanceStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown ambulance status '{}'", s))
    }
}

/// Ambulance principal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ambulance {
    pub id: Uuid,
    pub plate_number: String,
    pub driver_id: Option<Uuid>,
    pub status: AmbulanceStatus,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub base_latitude: f64,
    pub base_longitude: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ambulance {
    /// Candidata al despacho: disponible y con conductor
    pub fn is_candidate(&self) -> bool {
        self.status == AmbulanceStatus::Available && self.driver_id.is_some()
    }

    /// Posición actual, o `fallback` si la ambulancia no ha reportado ninguna
    pub fn position_or(&self, fallback: Coordinates) -> Coordinates {
        match (self.current_latitude, self.current_longitude) {
            (Some(latitude), Some(longitude)) => Coordinates::new(latitude, longitude),
            _ => fallback,
        }
    }

    pub fn base_station(&self) -> Coordinates {
        Coordinates::new(self.base_latitude, self.base_longitude)
    }
}

/// Datos para aprovisionar una ambulancia
#[derive(Debug, Clone)]
pub struct NewAmbulance {
    pub plate_number: String,
    pub driver_id: Option<Uuid>,
    pub base_station: Coordinates,
    pub current_location: Option<Coordinates>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambulance(status: AmbulanceStatus, driver_id: Option<Uuid>) -> Ambulance {
        Ambulance {
            id: Uuid::new_v4(),
            plate_number: "ABJ-001".to_string(),
            driver_id,
            status,
            current_latitude: None,
            current_longitude: None,
            base_latitude: 9.0,
            base_longitude: 7.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_candidate_requires_driver_and_availability() {
        assert!(ambulance(AmbulanceStatus::Available, Some(Uuid::new_v4())).is_candidate());
        assert!(!ambulance(AmbulanceStatus::Available, None).is_candidate());
        assert!(!ambulance(AmbulanceStatus::Busy, Some(Uuid::new_v4())).is_candidate());
        assert!(!ambulance(AmbulanceStatus::Offline, Some(Uuid::new_v4())).is_candidate());
    }

    #[test]
    fn test_position_falls_back_when_missing() {
        let fallback = Coordinates::new(1.0, 2.0);
        let mut amb = ambulance(AmbulanceStatus::Available, None);
        assert_eq!(amb.position_or(fallback), fallback);

        amb.current_latitude = Some(9.5);
        assert_eq!(amb.position_or(fallback), fallback);

        amb.current_longitude = Some(7.5);
        assert_eq!(amb.position_or(fallback), Coordinates::new(9.5, 7.5));
    }
}
