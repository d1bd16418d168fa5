//! Modelo de lectura del dashboard
//!
//! Contadores en vivo por estado de solicitud y de ambulancia. Se cargan una
//! vez desde el almacén y después se parchean de forma incremental con cada
//! `ChangeEvent`; solo se recargan completos si el suscriptor se retrasa.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::models::{AmbulanceStatus, ChangeEvent, RequestFilters, RequestStatus};
use crate::repositories::DispatchStore;
use crate::utils::errors::AppResult;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DashboardStats {
    pub requests_by_status: HashMap<RequestStatus, i64>,
    pub ambulances_by_status: HashMap<AmbulanceStatus, i64>,
}

impl DashboardStats {
    pub fn requests(&self, status: RequestStatus) -> i64 {
        self.requests_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn ambulances(&self, status: AmbulanceStatus) -> i64 {
        self.ambulances_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn active_requests(&self) -> i64 {
        RequestStatus::ALL
            .iter()
            .filter(|s| !s.is_terminal())
            .map(|s| self.requests(*s))
            .sum()
    }

    /// Parchear los contadores con un evento ya confirmado
    pub fn apply(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::EmergencyRequests {
                previous_status,
                record,
                ..
            } => shift(&mut self.requests_by_status, *previous_status, record.status),
            ChangeEvent::Ambulances {
                previous_status,
                record,
                ..
            } => shift(&mut self.ambulances_by_status, *previous_status, record.status),
        }
    }
}

fn shift<K: std::hash::Hash + Eq + Copy>(counts: &mut HashMap<K, i64>, from: Option<K>, to: K) {
    if from == Some(to) {
        return;
    }
    if let Some(from) = from {
        let entry = counts.entry(from).or_insert(0);
        *entry = (*entry - 1).max(0);
    }
    *counts.entry(to).or_insert(0) += 1;
}

/// Snapshot de estadísticas que se envía al cliente
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub active_requests: i64,
    pub available_ambulances: i64,
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn DispatchStore>,
    stats: Arc<RwLock<DashboardStats>>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn DispatchStore>) -> Self {
        Self {
            store,
            stats: Arc::new(RwLock::new(DashboardStats::default())),
        }
    }

    /// Recalcular todos los contadores desde el almacén
    pub async fn reload(&self) -> AppResult<()> {
        let requests = self.store.list_requests(&RequestFilters::default()).await?;
        let ambulances = self.store.list_ambulances().await?;

        let mut fresh = DashboardStats::default();
        for request in &requests {
            *fresh.requests_by_status.entry(request.status).or_insert(0) += 1;
        }
        for ambulance in &ambulances {
            *fresh.ambulances_by_status.entry(ambulance.status).or_insert(0) += 1;
        }

        *self.stats.write().await = fresh;
        info!(
            "📊 Dashboard recargado: {} solicitudes, {} ambulancias",
            requests.len(),
            ambulances.len()
        );
        Ok(())
    }

    pub async fn apply(&self, event: &ChangeEvent) {
        self.stats.write().await.apply(event);
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let stats = self.stats.read().await.clone();
        DashboardSnapshot {
            active_requests: stats.active_requests(),
            available_ambulances: stats.ambulances(AmbulanceStatus::Available),
            stats,
        }
    }

    /// Recargar y descartar los eventos ya encolados en `receiver`.
    ///
    /// Todo evento encolado antes de terminar la recarga corresponde a un
    /// cambio ya confirmado y por tanto ya contado. Un cambio concurrente con
    /// la lectura puede quedar contado dos veces o ninguna hasta la próxima
    /// recarga.
    pub async fn resync(&self, receiver: &mut broadcast::Receiver<ChangeEvent>) -> AppResult<()> {
        self.reload().await?;

        let mut skipped = 0usize;
        loop {
            match receiver.try_recv() {
                Ok(_) => skipped += 1,
                Err(broadcast::error::TryRecvError::Lagged(n)) => skipped += n as usize,
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        if skipped > 0 {
            debug!("📊 {} eventos ya incluidos en la recarga", skipped);
        }
        Ok(())
    }

    /// Consumir el feed hasta que se cierre
    pub async fn run(self, mut receiver: broadcast::Receiver<ChangeEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.apply(&event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("⚠️ Dashboard retrasado {} eventos, recargando", skipped);
                    if let Err(e) = self.resync(&mut receiver).await {
                        warn!("⚠️ No se pudo recargar el dashboard: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
