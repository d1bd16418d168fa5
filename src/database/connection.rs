//! Conexión a PostgreSQL
//!
//! Crea el pool y aplica las migraciones del esquema de despacho.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Conectar y migrar
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("🗄️ Conectando a PostgreSQL: {}", mask_database_url(database_url));

        let pool = DatabaseConfig::new(database_url)
            .create_pool()
            .await
            .context("Error conectando a la base de datos")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Error ejecutando migraciones")?;

        info!("✅ Base de datos lista");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Función helper para enmascarar la URL de la base de datos en logs
fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at_pos)) if at_pos > scheme_end => {
            format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}
