//! Modelos de autenticación
//!
//! Los tokens los emite el proveedor de identidad externo; aquí solo se
//! describen sus claims y el actor resultante.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Rol declarado en el token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Driver => "driver",
        }
    }
}

/// Claims del JWT emitido por el proveedor de identidad
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub role: UserRole,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Quién ejecuta una operación sobre el ciclo de vida
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin { user_id: Uuid },
    Driver { user_id: Uuid, driver_id: Uuid },
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    pub fn driver_id(&self) -> Option<Uuid> {
        match self {
            Actor::Driver { driver_id, .. } => Some(*driver_id),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Admin { user_id } => write!(f, "admin:{}", user_id),
            Actor::Driver { driver_id, .. } => write!(f, "driver:{}", driver_id),
        }
    }
}
