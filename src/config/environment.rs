//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::models::Coordinates;

/// Punto por defecto para ambulancias sin posición reportada (Abuja)
pub const DEFAULT_LATITUDE: f64 = 9.0765;
pub const DEFAULT_LONGITUDE: f64 = 7.3986;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    /// Sin URL se usa el almacén en memoria
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window: u64,
    pub default_latitude: f64,
    pub default_longitude: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            database_url: None,
            redis_url: None,
            jwt_secret: "dev-secret-change-in-production".to_string(),
            cors_origins: Vec::new(),
            rate_limit_requests: 30,
            rate_limit_window: 60,
            default_latitude: DEFAULT_LATITUDE,
            default_longitude: DEFAULT_LONGITUDE,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid value, got '{}'", key, raw)),
        None => Ok(default),
    }
}

impl EnvironmentConfig {
    /// Leer la configuración del entorno; las variables ausentes toman el valor por defecto
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            environment: optional("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parsed("PORT", defaults.port)?,
            host: optional("HOST").unwrap_or(defaults.host),
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            jwt_secret: optional("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            cors_origins: optional("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            rate_limit_window: parsed("RATE_LIMIT_WINDOW", defaults.rate_limit_window)?,
            default_latitude: parsed("DEFAULT_LATITUDE", defaults.default_latitude)?,
            default_longitude: parsed("DEFAULT_LONGITUDE", defaults.default_longitude)?,
        };

        if !config.fallback_location().is_valid() {
            anyhow::bail!("DEFAULT_LATITUDE/DEFAULT_LONGITUDE are out of range");
        }
        if config.is_production() && config.jwt_secret == defaults_secret() {
            anyhow::bail!("JWT_SECRET must be set in production");
        }

        Ok(config)
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Posición usada para ambulancias sin coordenadas actuales
    pub fn fallback_location(&self) -> Coordinates {
        Coordinates::new(self.default_latitude, self.default_longitude)
    }
}

fn defaults_secret() -> String {
    EnvironmentConfig::default().jwt_secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::default();
        assert!(config.is_development());
        assert_eq!(config.server_url(), "0.0.0.0:3000");
        assert_eq!(
            config.fallback_location(),
            Coordinates::new(DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
        );
    }

    #[test]
    fn test_parsed_reports_bad_numbers() {
        env::set_var("AMBULANCE_TEST_BAD_PORT", "not-a-port");
        let err = parsed::<u16>("AMBULANCE_TEST_BAD_PORT", 3000).unwrap_err();
        assert!(err.to_string().contains("AMBULANCE_TEST_BAD_PORT"));
        env::remove_var("AMBULANCE_TEST_BAD_PORT");

        assert_eq!(parsed::<u16>("AMBULANCE_TEST_MISSING", 8080).unwrap(), 8080);
    }
}
