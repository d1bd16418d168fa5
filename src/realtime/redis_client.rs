use anyhow::Result;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use serde::Serialize;
use tracing::{debug, info};

/// Configuración de Redis
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub redis_url: String,
    pub key_prefix: String,
}

impl RedisConfig {
    pub fn new(redis_url: String) -> Self {
        Self {
            redis_url,
            key_prefix: "ambulance_dispatch".to_string(),
        }
    }
}

/// Cliente Redis con connection manager, usado para reenviar los eventos de cambio
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: RedisConfig,
}

impl RedisClient {
    /// Crear nuevo cliente Redis
    pub async fn new(config: RedisConfig) -> Result<Self> {
        info!("🔗 Conectando a Redis: {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.clone())?;
        let manager = ConnectionManager::new(client).await?;

        // Test de conexión usando un comando simple
        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("✅ Redis conectado exitosamente");

        Ok(Self { manager, config })
    }

    /// Generar nombre de canal con prefijo
    fn make_key(&self, name: &str) -> String {
        format!("{}:{}", self.config.key_prefix, name)
    }

    /// Canal donde se publican los eventos de cambio de filas
    pub fn changes_channel(&self) -> String {
        self.make_key("changes")
    }

    /// Publicar un valor serializado como JSON. Devuelve el número de suscriptores.
    pub async fn publish<T: Serialize + Sync>(&self, channel: &str, value: &T) -> Result<i64> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(value)?;

        let result: RedisResult<i64> = conn.publish(channel, payload).await;
        let receivers = result.map_err(|e| anyhow::anyhow!("Error de Redis: {}", e))?;

        debug!("📡 PUBLISH {} ({} suscriptores)", channel, receivers);
        Ok(receivers)
    }
}
