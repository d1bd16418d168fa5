use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ambulance_dispatch::config::EnvironmentConfig;
use ambulance_dispatch::database::connection::DatabaseConnection;
use ambulance_dispatch::realtime::{RedisClient, RedisConfig};
use ambulance_dispatch::repositories::{DispatchStore, MemoryDispatchStore, PgDispatchStore};
use ambulance_dispatch::services::ChangeFeed;
use ambulance_dispatch::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ambulance_dispatch=debug,tower_http=info")),
        )
        .init();

    info!("🚑 Ambulance Dispatch - API");
    info!("================================================");

    let config = EnvironmentConfig::from_env()?;
    info!("⚙️ Entorno: {}", config.environment);

    // Almacén: PostgreSQL si hay DATABASE_URL, memoria en caso contrario
    let store: Arc<dyn DispatchStore> = match &config.database_url {
        Some(url) => {
            let connection = DatabaseConnection::connect(url).await.map_err(|e| {
                error!("❌ Error conectando a la base de datos: {}", e);
                e
            })?;
            Arc::new(PgDispatchStore::new(connection.pool().clone()))
        }
        None => {
            warn!("⚠️ DATABASE_URL no definida, usando almacén en memoria");
            Arc::new(MemoryDispatchStore::new())
        }
    };

    // Redis es opcional: solo replica el feed de cambios
    let mut feed = ChangeFeed::default();
    if let Some(redis_url) = &config.redis_url {
        match RedisClient::new(RedisConfig::new(redis_url.clone())).await {
            Ok(client) => feed = feed.with_redis(client),
            Err(e) => warn!("⚠️ Redis no disponible, el feed queda solo en proceso: {}", e),
        }
    }

    let addr = config.server_url();
    let state = AppState::new(store, config, feed);
    let dashboard_task = state.start_dashboard().await?;

    let app = create_router(state);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health");
    info!("   POST /api/requests - Enviar emergencia");
    info!("   GET  /api/requests/track/:code - Seguimiento");
    info!("   GET  /api/driver/assignment - Trabajo actual del conductor");
    info!("   POST /api/driver/requests/:id/status - Avanzar estado");
    info!("   *    /api/admin/... - Consola de administración");
    info!("   GET  /api/changes - Feed de cambios (SSE)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    dashboard_task.abort();
    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
