//! Gestión de flota
//!
//! Operaciones de la consola de administración sobre ambulancias y
//! conductores, y el reporte de posición del conductor.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    Actor, Ambulance, AmbulanceStatus, ChangeEvent, Coordinates, DriverProfile, NewAmbulance,
    NewDriverProfile,
};
use crate::repositories::DispatchStore;
use crate::services::change_feed::ChangeFeed;
use crate::services::lifecycle_service::plan_ambulance_status_change;
use crate::utils::errors::{forbidden_error, not_found_error, AppResult};

pub struct FleetService {
    store: Arc<dyn DispatchStore>,
    feed: ChangeFeed,
}

fn require_admin(actor: &Actor, operation: &str) -> AppResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(forbidden_error(operation, "administrator role required"))
    }
}

impl FleetService {
    pub fn new(store: Arc<dyn DispatchStore>, feed: ChangeFeed) -> Self {
        Self { store, feed }
    }

    pub async fn create_ambulance(&self, new: NewAmbulance, actor: &Actor) -> AppResult<Ambulance> {
        require_admin(actor, "create ambulance")?;

        let ambulance = self.store.insert_ambulance(new).await?;
        info!("🚑 Ambulancia {} aprovisionada", ambulance.plate_number);

        self.feed.publish(ChangeEvent::ambulance(None, ambulance.clone())).await;
        Ok(ambulance)
    }

    pub async fn get_ambulance(&self, id: Uuid) -> AppResult<Ambulance> {
        self.store
            .find_ambulance(id)
            .await?
            .ok_or_else(|| not_found_error("Ambulance", &id.to_string()))
    }

    pub async fn list_ambulances(&self) -> AppResult<Vec<Ambulance>> {
        self.store.list_ambulances().await
    }

    /// Reasignar o retirar el conductor de una ambulancia fuera de servicio activo
    pub async fn set_driver(
        &self,
        ambulance_id: Uuid,
        driver_id: Option<Uuid>,
        actor: &Actor,
    ) -> AppResult<Ambulance> {
        require_admin(actor, "reassign driver")?;

        let ambulance = self.store.set_ambulance_driver(ambulance_id, driver_id).await?;
        info!(
            "🧑‍✈️ Ambulancia {}: conductor {:?}",
            ambulance.plate_number, ambulance.driver_id
        );

        self.feed
            .publish(ChangeEvent::ambulance(Some(ambulance.status), ambulance.clone()))
            .await;
        Ok(ambulance)
    }

    pub async fn set_status(
        &self,
        ambulance_id: Uuid,
        status: AmbulanceStatus,
        actor: &Actor,
    ) -> AppResult<Ambulance> {
        let change = plan_ambulance_status_change(ambulance_id, status, actor)?;
        let previous = self.get_ambulance(ambulance_id).await?.status;

        let ambulance = self.store.set_ambulance_status(&change).await?;
        info!(
            "🔧 Ambulancia {}: {} -> {}",
            ambulance.plate_number, previous, ambulance.status
        );

        self.feed
            .publish(ChangeEvent::ambulance(Some(previous), ambulance.clone()))
            .await;
        Ok(ambulance)
    }

    /// Devolver la posición actual a la base. Acción explícita de reparación;
    /// completar un viaje no la ejecuta.
    pub async fn reset_to_base(&self, ambulance_id: Uuid, actor: &Actor) -> AppResult<Ambulance> {
        require_admin(actor, "reset ambulance location")?;

        let current = self.get_ambulance(ambulance_id).await?;
        let ambulance = self
            .store
            .set_ambulance_location(ambulance_id, current.base_station())
            .await?;
        info!("🏠 Ambulancia {} devuelta a su base", ambulance.plate_number);

        self.feed
            .publish(ChangeEvent::ambulance(Some(ambulance.status), ambulance.clone()))
            .await;
        Ok(ambulance)
    }

    /// Posición reportada por el conductor de su propia ambulancia
    pub async fn report_location(&self, actor: &Actor, location: Coordinates) -> AppResult<Ambulance> {
        let driver_id = actor
            .driver_id()
            .ok_or_else(|| forbidden_error("report location", "driver role required"))?;

        let ambulance = self
            .store
            .find_ambulance_by_driver(driver_id)
            .await?
            .ok_or_else(|| not_found_error("Ambulance for driver", &driver_id.to_string()))?;

        let ambulance = self.store.set_ambulance_location(ambulance.id, location).await?;
        self.feed
            .publish(ChangeEvent::ambulance(Some(ambulance.status), ambulance.clone()))
            .await;
        Ok(ambulance)
    }

    pub async fn create_driver(&self, new: NewDriverProfile, actor: &Actor) -> AppResult<DriverProfile> {
        require_admin(actor, "create driver")?;

        let driver = self.store.insert_driver(new).await?;
        info!("🧑‍✈️ Conductor {} registrado", driver.full_name);
        Ok(driver)
    }

    pub async fn list_drivers(&self) -> AppResult<Vec<DriverProfile>> {
        self.store.list_drivers().await
    }
}
