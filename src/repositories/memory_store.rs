//! Almacén en memoria
//!
//! Implementación de `DispatchStore` sobre tablas protegidas por un único
//! `RwLock`: cada operación de escritura toma el lock completo, de modo que
//! la selección y el reclamo son atómicos. Se usa en desarrollo (sin
//! `DATABASE_URL`) y en los tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::DispatchStore;
use crate::models::{
    Ambulance, AmbulanceStatus, AmbulanceStatusChange, ClaimOutcome, Coordinates, DriverProfile,
    EmergencyRequest, NewAmbulance, NewDriverProfile, NewEmergencyRequest, RequestFilters,
    RequestStatus, TransitionOutcome, TransitionPlan,
};
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};

#[derive(Debug, Default)]
struct Tables {
    requests: Vec<EmergencyRequest>,
    ambulances: Vec<Ambulance>,
    drivers: Vec<DriverProfile>,
}

impl Tables {
    fn request_index(&self, id: Uuid) -> AppResult<usize> {
        self.requests
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| not_found_error("Emergency request", &id.to_string()))
    }

    fn ambulance_index(&self, id: Uuid) -> AppResult<usize> {
        self.ambulances
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| not_found_error("Ambulance", &id.to_string()))
    }

    fn has_active_request(&self, ambulance_id: Uuid) -> bool {
        self.requests
            .iter()
            .any(|r| r.status.holds_ambulance() && r.assigned_ambulance_id == Some(ambulance_id))
    }

    fn check_driver_free(&self, driver_id: Uuid, except: Option<Uuid>) -> AppResult<()> {
        if !self.drivers.iter().any(|d| d.id == driver_id) {
            return Err(not_found_error("Driver", &driver_id.to_string()));
        }
        let taken = self
            .ambulances
            .iter()
            .any(|a| a.driver_id == Some(driver_id) && Some(a.id) != except);
        if taken {
            return Err(AppError::Conflict(format!(
                "Driver '{}' already drives another ambulance",
                driver_id
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryDispatchStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDispatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchStore for MemoryDispatchStore {
    async fn insert_request(&self, new: NewEmergencyRequest) -> AppResult<EmergencyRequest> {
        let mut tables = self.tables.write().await;

        if tables.requests.iter().any(|r| r.tracking_code == new.tracking_code) {
            return Err(conflict_error(
                "Emergency request",
                "tracking_code",
                &new.tracking_code,
            ));
        }

        let now = Utc::now();
        let request = EmergencyRequest {
            id: Uuid::new_v4(),
            tracking_code: new.tracking_code,
            requester_name: new.requester_name,
            requester_phone: new.requester_phone,
            emergency_type: new.emergency_type,
            description: new.description,
            latitude: new.location.latitude,
            longitude: new.location.longitude,
            address: new.address,
            status: RequestStatus::Pending,
            assigned_ambulance_id: None,
            assigned_driver_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        tables.requests.push(request.clone());
        Ok(request)
    }

    async fn find_request(&self, id: Uuid) -> AppResult<Option<EmergencyRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn find_request_by_tracking_code(
        &self,
        code: &str,
    ) -> AppResult<Option<EmergencyRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .iter()
            .find(|r| r.tracking_code == code)
            .cloned())
    }

    async fn list_requests(&self, filters: &RequestFilters) -> AppResult<Vec<EmergencyRequest>> {
        let tables = self.tables.read().await;
        let limit = filters.limit.unwrap_or(i64::MAX).max(0) as usize;

        Ok(tables
            .requests
            .iter()
            .rev()
            .filter(|r| filters.status.map_or(true, |s| r.status == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_active_request_for_driver(
        &self,
        driver_id: Uuid,
    ) -> AppResult<Option<EmergencyRequest>> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .iter()
            .find(|r| r.status.holds_ambulance() && r.assigned_driver_id == Some(driver_id))
            .cloned())
    }

    async fn insert_ambulance(&self, new: NewAmbulance) -> AppResult<Ambulance> {
        let mut tables = self.tables.write().await;

        if tables.ambulances.iter().any(|a| a.plate_number == new.plate_number) {
            return Err(conflict_error("Ambulance", "plate_number", &new.plate_number));
        }
        if let Some(driver_id) = new.driver_id {
            tables.check_driver_free(driver_id, None)?;
        }

        let now = Utc::now();
        let ambulance = Ambulance {
            id: Uuid::new_v4(),
            plate_number: new.plate_number,
            driver_id: new.driver_id,
            status: AmbulanceStatus::Available,
            current_latitude: new.current_location.map(|c| c.latitude),
            current_longitude: new.current_location.map(|c| c.longitude),
            base_latitude: new.base_station.latitude,
            base_longitude: new.base_station.longitude,
            created_at: now,
            updated_at: now,
        };
        tables.ambulances.push(ambulance.clone());
        Ok(ambulance)
    }

    async fn find_ambulance(&self, id: Uuid) -> AppResult<Option<Ambulance>> {
        let tables = self.tables.read().await;
        Ok(tables.ambulances.iter().find(|a| a.id == id).cloned())
    }

    async fn find_ambulance_by_driver(&self, driver_id: Uuid) -> AppResult<Option<Ambulance>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ambulances
            .iter()
            .find(|a| a.driver_id == Some(driver_id))
            .cloned())
    }

    async fn list_ambulances(&self) -> AppResult<Vec<Ambulance>> {
        let tables = self.tables.read().await;
        Ok(tables.ambulances.clone())
    }

    async fn set_ambulance_driver(
        &self,
        ambulance_id: Uuid,
        driver_id: Option<Uuid>,
    ) -> AppResult<Ambulance> {
        let mut tables = self.tables.write().await;
        let idx = tables.ambulance_index(ambulance_id)?;

        if tables.ambulances[idx].status.is_on_trip() || tables.has_active_request(ambulance_id) {
            return Err(AppError::Conflict(format!(
                "Ambulance '{}' is on an active trip",
                ambulance_id
            )));
        }
        if let Some(driver_id) = driver_id {
            tables.check_driver_free(driver_id, Some(ambulance_id))?;
        }

        let ambulance = &mut tables.ambulances[idx];
        ambulance.driver_id = driver_id;
        ambulance.updated_at = Utc::now();
        Ok(ambulance.clone())
    }

    async fn set_ambulance_status(&self, change: &AmbulanceStatusChange) -> AppResult<Ambulance> {
        let mut tables = self.tables.write().await;
        let idx = tables.ambulance_index(change.ambulance_id)?;

        let current = tables.ambulances[idx].status;
        if !change.allowed_from.is_empty() && !change.allowed_from.contains(&current) {
            return Err(AppError::Conflict(format!(
                "Ambulance '{}' is {} and cannot become {}",
                change.ambulance_id, current, change.status
            )));
        }
        if change.require_no_active_request && tables.has_active_request(change.ambulance_id) {
            return Err(AppError::Conflict(format!(
                "Ambulance '{}' is still referenced by an active request",
                change.ambulance_id
            )));
        }

        let ambulance = &mut tables.ambulances[idx];
        ambulance.status = change.status;
        ambulance.updated_at = Utc::now();
        Ok(ambulance.clone())
    }

    async fn set_ambulance_location(
        &self,
        ambulance_id: Uuid,
        location: Coordinates,
    ) -> AppResult<Ambulance> {
        let mut tables = self.tables.write().await;
        let idx = tables.ambulance_index(ambulance_id)?;

        let ambulance = &mut tables.ambulances[idx];
        ambulance.current_latitude = Some(location.latitude);
        ambulance.current_longitude = Some(location.longitude);
        ambulance.updated_at = Utc::now();
        Ok(ambulance.clone())
    }

    async fn claim_ambulance(
        &self,
        request_id: Uuid,
        ambulance_id: Uuid,
    ) -> AppResult<ClaimOutcome> {
        let mut tables = self.tables.write().await;
        let req_idx = tables.request_index(request_id)?;
        let amb_idx = tables.ambulance_index(ambulance_id)?;

        if !tables.requests[req_idx].awaits_dispatch() {
            return Ok(ClaimOutcome::RequestNotPending(
                tables.requests[req_idx].clone(),
            ));
        }
        if !tables.ambulances[amb_idx].is_candidate() || tables.has_active_request(ambulance_id) {
            return Ok(ClaimOutcome::AmbulanceUnavailable);
        }

        let now = Utc::now();
        let ambulance = &mut tables.ambulances[amb_idx];
        let previous_ambulance_status = ambulance.status;
        ambulance.status = AmbulanceStatus::Busy;
        ambulance.updated_at = now;
        let ambulance = ambulance.clone();

        let request = &mut tables.requests[req_idx];
        request.status = RequestStatus::Assigned;
        request.assigned_ambulance_id = Some(ambulance.id);
        request.assigned_driver_id = ambulance.driver_id;
        request.updated_at = now;

        Ok(ClaimOutcome::Claimed {
            request: request.clone(),
            ambulance,
            previous_ambulance_status,
        })
    }

    async fn apply_transition(&self, plan: &TransitionPlan) -> AppResult<TransitionOutcome> {
        let mut tables = self.tables.write().await;
        let req_idx = tables.request_index(plan.request_id)?;

        let current = &tables.requests[req_idx];
        if current.status != plan.from {
            return Err(AppError::Conflict(format!(
                "Request '{}' is no longer {} (now {})",
                plan.request_id, plan.from, current.status
            )));
        }

        let amb_idx = match &plan.ambulance {
            Some(change) => {
                if current.assigned_ambulance_id != Some(change.ambulance_id) {
                    return Err(AppError::Conflict(format!(
                        "Request '{}' is no longer assigned to ambulance '{}'",
                        plan.request_id, change.ambulance_id
                    )));
                }
                Some(tables.ambulance_index(change.ambulance_id)?)
            }
            None => None,
        };

        let now = Utc::now();
        let ambulance = match (amb_idx, &plan.ambulance) {
            (Some(idx), Some(change)) => {
                let ambulance = &mut tables.ambulances[idx];
                let previous = ambulance.status;
                // `offline` lo fija el administrador y el ciclo de vida no lo pisa
                if previous != AmbulanceStatus::Offline {
                    ambulance.status = change.status;
                }
                if let Some(location) = change.location {
                    ambulance.current_latitude = Some(location.latitude);
                    ambulance.current_longitude = Some(location.longitude);
                }
                ambulance.updated_at = now;
                Some((previous, ambulance.clone()))
            }
            _ => None,
        };

        let request = &mut tables.requests[req_idx];
        let previous_status = request.status;
        request.status = plan.to;
        request.updated_at = now;
        if plan.completed_at.is_some() {
            request.completed_at = plan.completed_at;
        }

        Ok(TransitionOutcome {
            request: request.clone(),
            previous_status,
            ambulance,
        })
    }

    async fn insert_driver(&self, new: NewDriverProfile) -> AppResult<DriverProfile> {
        let mut tables = self.tables.write().await;

        if tables.drivers.iter().any(|d| d.user_id == new.user_id) {
            return Err(conflict_error("Driver", "user_id", &new.user_id.to_string()));
        }

        let driver = DriverProfile {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            full_name: new.full_name,
            phone: new.phone,
            created_at: Utc::now(),
        };
        tables.drivers.push(driver.clone());
        Ok(driver)
    }

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<DriverProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.drivers.iter().find(|d| d.id == id).cloned())
    }

    async fn find_driver_by_user(&self, user_id: Uuid) -> AppResult<Option<DriverProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.drivers.iter().find(|d| d.user_id == user_id).cloned())
    }

    async fn list_drivers(&self) -> AppResult<Vec<DriverProfile>> {
        let tables = self.tables.read().await;
        Ok(tables.drivers.clone())
    }
}
