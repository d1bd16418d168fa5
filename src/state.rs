//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::EnvironmentConfig;
use crate::middleware::rate_limit::RateLimitState;
use crate::repositories::DispatchStore;
use crate::utils::errors::AppResult;
use crate::services::{
    ChangeFeed, DashboardService, DispatchService, FleetService, JwtService, LifecycleService,
    RequestService,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DispatchStore>,
    pub config: Arc<EnvironmentConfig>,
    pub feed: ChangeFeed,
    pub dashboard: DashboardService,
    pub jwt: Arc<JwtService>,
    pub rate_limit: RateLimitState,
}

impl AppState {
    pub fn new(store: Arc<dyn DispatchStore>, config: EnvironmentConfig, feed: ChangeFeed) -> Self {
        let rate_limit = RateLimitState::new(&config);
        let jwt = Arc::new(JwtService::new(&config.jwt_secret));
        let dashboard = DashboardService::new(store.clone());

        Self {
            store,
            config: Arc::new(config),
            feed,
            dashboard,
            jwt,
            rate_limit,
        }
    }

    pub fn request_service(&self) -> RequestService {
        RequestService::new(
            self.store.clone(),
            self.feed.clone(),
            self.config.fallback_location(),
        )
    }

    pub fn dispatch_service(&self) -> DispatchService {
        DispatchService::new(
            self.store.clone(),
            self.feed.clone(),
            self.config.fallback_location(),
        )
    }

    pub fn lifecycle_service(&self) -> LifecycleService {
        LifecycleService::new(self.store.clone(), self.feed.clone())
    }

    pub fn fleet_service(&self) -> FleetService {
        FleetService::new(self.store.clone(), self.feed.clone())
    }

    /// Cargar los contadores y mantenerlos al día con el feed.
    ///
    /// La suscripción se abre antes de la recarga para no perder eventos; los
    /// ya encolados se descartan porque la recarga los incluye.
    pub async fn start_dashboard(&self) -> AppResult<JoinHandle<()>> {
        let mut receiver = self.feed.subscribe();
        self.dashboard.resync(&mut receiver).await?;

        let dashboard = self.dashboard.clone();
        Ok(tokio::spawn(dashboard.run(receiver)))
    }
}
