//! Modelos del sistema
//!
//! Este módulo contiene los modelos de dominio que mapean a las tablas
//! `emergency_requests`, `ambulances` y `driver_profiles`.

pub mod ambulance;
pub mod auth;
pub mod change_event;
pub mod driver;
pub mod emergency_request;
pub mod geo;
pub mod transition;

pub use ambulance::{Ambulance, AmbulanceStatus, NewAmbulance};
pub use auth::{Actor, JwtClaims, UserRole};
pub use change_event::ChangeEvent;
pub use driver::{DriverProfile, NewDriverProfile};
pub use emergency_request::{
    EmergencyRequest, EmergencyType, NewEmergencyRequest, RequestFilters, RequestStatus,
};
pub use geo::{haversine_distance, Coordinates};
pub use transition::{
    AmbulanceChange, AmbulanceStatusChange, ClaimOutcome, TransitionOutcome, TransitionPlan,
};
