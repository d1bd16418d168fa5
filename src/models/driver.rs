//! Modelo de DriverProfile
//!
//! Perfil de conductor, uno a uno con una identidad del proveedor externo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDriverProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: String,
}
