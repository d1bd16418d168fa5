//! Motor de despacho
//!
//! Decide, al crear una solicitud, si se le asigna inmediatamente la
//! ambulancia candidata más cercana. El reclamo es atómico en el almacén;
//! si otra operación se lleva la candidata se vuelve a seleccionar entre
//! las restantes.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    Actor, Ambulance, AmbulanceStatus, ChangeEvent, ClaimOutcome, Coordinates, EmergencyRequest,
    RequestStatus,
};
use crate::repositories::DispatchStore;
use crate::services::change_feed::ChangeFeed;
use crate::utils::errors::{forbidden_error, not_found_error, AppError, AppResult};

/// Resultado de un intento de despacho
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Assigned {
        request: EmergencyRequest,
        ambulance: Ambulance,
        distance_km: Option<f64>,
    },
    /// No hay candidatas: la solicitud sigue `pending`
    NoCandidate { request: EmergencyRequest },
    /// La solicitud ya no esperaba despacho (ya asignada, cancelada...)
    Skipped { request: EmergencyRequest },
}

impl DispatchOutcome {
    pub fn request(&self) -> &EmergencyRequest {
        match self {
            DispatchOutcome::Assigned { request, .. }
            | DispatchOutcome::NoCandidate { request }
            | DispatchOutcome::Skipped { request } => request,
        }
    }

    pub fn into_request(self) -> EmergencyRequest {
        match self {
            DispatchOutcome::Assigned { request, .. }
            | DispatchOutcome::NoCandidate { request }
            | DispatchOutcome::Skipped { request } => request,
        }
    }
}

/// Elegir la candidata más cercana a `target`.
///
/// Solo cuentan ambulancias `available` con conductor y fuera de `excluded`.
/// Las posiciones ausentes se sustituyen por `fallback`. En caso de empate
/// gana la primera del pool.
pub fn select_nearest<'a>(
    pool: &'a [Ambulance],
    target: Coordinates,
    fallback: Coordinates,
    excluded: &HashSet<Uuid>,
) -> Option<(&'a Ambulance, f64)> {
    pool.iter()
        .filter(|a| a.is_candidate() && !excluded.contains(&a.id))
        .map(|a| (a, a.position_or(fallback).distance_to(&target)))
        .fold(None, |best, (ambulance, distance)| match best {
            Some((_, best_distance)) if best_distance <= distance => best,
            _ => Some((ambulance, distance)),
        })
}

pub struct DispatchService {
    store: Arc<dyn DispatchStore>,
    feed: ChangeFeed,
    fallback: Coordinates,
}

impl DispatchService {
    pub fn new(store: Arc<dyn DispatchStore>, feed: ChangeFeed, fallback: Coordinates) -> Self {
        Self {
            store,
            feed,
            fallback,
        }
    }

    /// Disparador automático. No-op si la solicitud ya no está `pending` sin asignar.
    pub async fn dispatch(&self, request: &EmergencyRequest) -> AppResult<DispatchOutcome> {
        if !request.awaits_dispatch() {
            return Ok(DispatchOutcome::Skipped {
                request: request.clone(),
            });
        }

        let target = request.location();
        let mut excluded = HashSet::new();

        loop {
            let pool = self.store.list_ambulances().await?;
            let (candidate_id, distance) = match select_nearest(&pool, target, self.fallback, &excluded)
            {
                Some((candidate, distance)) => (candidate.id, distance),
                None => {
                    info!(
                        "🔎 Sin ambulancias candidatas para {}, queda pendiente",
                        request.tracking_code
                    );
                    return Ok(DispatchOutcome::NoCandidate {
                        request: request.clone(),
                    });
                }
            };

            match self.store.claim_ambulance(request.id, candidate_id).await? {
                ClaimOutcome::Claimed {
                    request,
                    ambulance,
                    previous_ambulance_status,
                } => {
                    info!(
                        "🚑 {} asignada a la ambulancia {} ({:.2} km)",
                        request.tracking_code, ambulance.plate_number, distance
                    );
                    self.publish_claim(&request, &ambulance, previous_ambulance_status)
                        .await;
                    return Ok(DispatchOutcome::Assigned {
                        request,
                        ambulance,
                        distance_km: Some(distance),
                    });
                }
                ClaimOutcome::AmbulanceUnavailable => {
                    warn!(
                        "🔁 Ambulancia {} reclamada por otra operación, reintentando",
                        candidate_id
                    );
                    excluded.insert(candidate_id);
                }
                ClaimOutcome::RequestNotPending(current) => {
                    return Ok(DispatchOutcome::Skipped { request: current });
                }
            }
        }
    }

    /// Reintento explícito del despacho automático sobre una solicitud existente
    pub async fn dispatch_by_id(&self, request_id: Uuid, actor: &Actor) -> AppResult<DispatchOutcome> {
        if !actor.is_admin() {
            return Err(forbidden_error("dispatch request", "administrator role required"));
        }
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or_else(|| not_found_error("Emergency request", &request_id.to_string()))?;

        self.dispatch(&request).await
    }

    /// Asignación manual: el administrador elige la ambulancia, sin comparar distancias
    pub async fn assign_manually(
        &self,
        request_id: Uuid,
        ambulance_id: Uuid,
        actor: &Actor,
    ) -> AppResult<DispatchOutcome> {
        if !actor.is_admin() {
            return Err(forbidden_error("assign ambulance", "administrator role required"));
        }

        match self.store.claim_ambulance(request_id, ambulance_id).await? {
            ClaimOutcome::Claimed {
                request,
                ambulance,
                previous_ambulance_status,
            } => {
                info!(
                    "🧑‍💼 {} asignada manualmente a {} por {}",
                    request.tracking_code, ambulance.plate_number, actor
                );
                self.publish_claim(&request, &ambulance, previous_ambulance_status)
                    .await;
                Ok(DispatchOutcome::Assigned {
                    request,
                    ambulance,
                    distance_km: None,
                })
            }
            ClaimOutcome::AmbulanceUnavailable => Err(AppError::Conflict(format!(
                "Ambulance '{}' is not available or has no driver",
                ambulance_id
            ))),
            ClaimOutcome::RequestNotPending(current) => Err(AppError::IllegalTransition(format!(
                "Request '{}' is {}; only unassigned pending requests can be assigned",
                current.tracking_code, current.status
            ))),
        }
    }

    async fn publish_claim(
        &self,
        request: &EmergencyRequest,
        ambulance: &Ambulance,
        previous_ambulance_status: AmbulanceStatus,
    ) {
        self.feed
            .publish_all([
                ChangeEvent::request(Some(RequestStatus::Pending), request.clone()),
                ChangeEvent::ambulance(Some(previous_ambulance_status), ambulance.clone()),
            ])
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmergencyType, NewAmbulance, NewDriverProfile, NewEmergencyRequest};
    use crate::repositories::MemoryDispatchStore;
    use chrono::Utc;

    const FALLBACK: Coordinates = Coordinates {
        latitude: 9.0765,
        longitude: 7.3986,
    };

    fn ambulance_at(status: AmbulanceStatus, driver: bool, lat: f64, lng: f64) -> Ambulance {
        Ambulance {
            id: Uuid::new_v4(),
            plate_number: format!("ABJ-{}", &Uuid::new_v4().to_string()[..4]),
            driver_id: driver.then(Uuid::new_v4),
            status,
            current_latitude: Some(lat),
            current_longitude: Some(lng),
            base_latitude: lat,
            base_longitude: lng,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_select_nearest_picks_minimum_distance() {
        let pool = vec![
            ambulance_at(AmbulanceStatus::Available, true, 9.00, 7.50),
            ambulance_at(AmbulanceStatus::Available, true, 9.08, 7.40),
            ambulance_at(AmbulanceStatus::Available, true, 6.52, 3.37),
        ];
        let target = Coordinates::new(9.081, 7.401);

        let (chosen, distance) = select_nearest(&pool, target, FALLBACK, &HashSet::new()).unwrap();
        assert_eq!(chosen.id, pool[1].id);
        assert!(distance < 0.5);
    }

    #[test]
    fn test_select_nearest_ignores_non_candidates() {
        let pool = vec![
            ambulance_at(AmbulanceStatus::Busy, true, 9.081, 7.401),
            ambulance_at(AmbulanceStatus::Available, false, 9.081, 7.401),
            ambulance_at(AmbulanceStatus::Offline, true, 9.081, 7.401),
        ];
        let target = Coordinates::new(9.081, 7.401);
        assert!(select_nearest(&pool, target, FALLBACK, &HashSet::new()).is_none());
    }

    #[test]
    fn test_select_nearest_ties_go_to_first() {
        let pool = vec![
            ambulance_at(AmbulanceStatus::Available, true, 9.0, 7.0),
            ambulance_at(AmbulanceStatus::Available, true, 9.0, 7.0),
        ];
        let (chosen, _) =
            select_nearest(&pool, Coordinates::new(9.1, 7.1), FALLBACK, &HashSet::new()).unwrap();
        assert_eq!(chosen.id, pool[0].id);
    }

    #[test]
    fn test_select_nearest_uses_fallback_for_missing_position() {
        let mut unknown = ambulance_at(AmbulanceStatus::Available, true, 0.0, 0.0);
        unknown.current_latitude = None;
        unknown.current_longitude = None;
        let far = ambulance_at(AmbulanceStatus::Available, true, 6.52, 3.37);
        let pool = vec![far, unknown];

        // objetivo junto al punto por defecto: gana la ambulancia sin posición
        let (chosen, _) = select_nearest(&pool, FALLBACK, FALLBACK, &HashSet::new()).unwrap();
        assert_eq!(chosen.id, pool[1].id);
    }

    #[test]
    fn test_select_nearest_respects_exclusions() {
        let pool = vec![
            ambulance_at(AmbulanceStatus::Available, true, 9.08, 7.40),
            ambulance_at(AmbulanceStatus::Available, true, 9.00, 7.50),
        ];
        let excluded: HashSet<Uuid> = [pool[0].id].into_iter().collect();
        let (chosen, _) =
            select_nearest(&pool, Coordinates::new(9.081, 7.401), FALLBACK, &excluded).unwrap();
        assert_eq!(chosen.id, pool[1].id);
    }

    async fn seed(store: &MemoryDispatchStore, plate: &str, location: Coordinates) -> Ambulance {
        let driver = store
            .insert_driver(NewDriverProfile {
                user_id: Uuid::new_v4(),
                full_name: format!("Driver {}", plate),
                phone: "+2348000000000".to_string(),
            })
            .await
            .unwrap();
        store
            .insert_ambulance(NewAmbulance {
                plate_number: plate.to_string(),
                driver_id: Some(driver.id),
                base_station: location,
                current_location: Some(location),
            })
            .await
            .unwrap()
    }

    async fn pending(store: &MemoryDispatchStore, code: &str) -> EmergencyRequest {
        store
            .insert_request(NewEmergencyRequest {
                tracking_code: code.to_string(),
                requester_name: None,
                requester_phone: "+2348031234567".to_string(),
                emergency_type: EmergencyType::Medical,
                description: None,
                location: Coordinates::new(9.081, 7.401),
                address: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_is_idempotent_on_assigned_requests() {
        let store = Arc::new(MemoryDispatchStore::new());
        seed(&store, "ABJ-001", Coordinates::new(9.08, 7.40)).await;
        seed(&store, "ABJ-002", Coordinates::new(9.00, 7.50)).await;
        let service = DispatchService::new(store.clone(), ChangeFeed::default(), FALLBACK);

        let request = pending(&store, "SC-AAAA0001").await;
        let assigned = service.dispatch(&request).await.unwrap().into_request();
        assert_eq!(assigned.status, RequestStatus::Assigned);

        let again = service.dispatch(&assigned).await.unwrap();
        assert!(matches!(again, DispatchOutcome::Skipped { .. }));

        // la segunda ambulancia sigue libre
        let available = store
            .list_ambulances()
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.status == AmbulanceStatus::Available)
            .count();
        assert_eq!(available, 1);
    }

    #[tokio::test]
    async fn test_stale_request_snapshot_is_skipped_by_claim() {
        let store = Arc::new(MemoryDispatchStore::new());
        seed(&store, "ABJ-001", Coordinates::new(9.08, 7.40)).await;
        seed(&store, "ABJ-002", Coordinates::new(9.00, 7.50)).await;
        let service = DispatchService::new(store.clone(), ChangeFeed::default(), FALLBACK);

        let request = pending(&store, "SC-AAAA0002").await;
        service.dispatch(&request).await.unwrap();

        // la copia local aún dice `pending`, pero el almacén no
        let outcome = service.dispatch(&request).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Skipped { .. }));
        assert_eq!(outcome.request().status, RequestStatus::Assigned);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_never_double_assigns() {
        let store = Arc::new(MemoryDispatchStore::new());
        let only = seed(&store, "ABJ-001", Coordinates::new(9.08, 7.40)).await;
        let first = pending(&store, "SC-AAAA0003").await;
        let second = pending(&store, "SC-AAAA0004").await;

        let a = DispatchService::new(store.clone(), ChangeFeed::default(), FALLBACK);
        let b = DispatchService::new(store.clone(), ChangeFeed::default(), FALLBACK);
        let (ra, rb) = tokio::join!(a.dispatch(&first), b.dispatch(&second));
        let outcomes = [ra.unwrap(), rb.unwrap()];

        let assigned: Vec<_> = outcomes
            .iter()
            .filter(|o| matches!(o, DispatchOutcome::Assigned { .. }))
            .collect();
        assert_eq!(assigned.len(), 1);
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, DispatchOutcome::NoCandidate { .. })));

        let ambulance = store.find_ambulance(only.id).await.unwrap().unwrap();
        assert_eq!(ambulance.status, AmbulanceStatus::Busy);
    }

    #[tokio::test]
    async fn test_manual_assignment_requires_admin_and_candidate() {
        let store = Arc::new(MemoryDispatchStore::new());
        let service = DispatchService::new(store.clone(), ChangeFeed::default(), FALLBACK);
        let ambulance = store
            .insert_ambulance(NewAmbulance {
                plate_number: "ABJ-009".to_string(),
                driver_id: None,
                base_station: Coordinates::new(9.0, 7.4),
                current_location: None,
            })
            .await
            .unwrap();
        let request = pending(&store, "SC-AAAA0005").await;
        let admin = Actor::Admin {
            user_id: Uuid::new_v4(),
        };

        let err = service
            .assign_manually(
                request.id,
                ambulance.id,
                &Actor::Driver {
                    user_id: Uuid::new_v4(),
                    driver_id: Uuid::new_v4(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // sin conductor no es candidata
        let err = service
            .assign_manually(request.id, ambulance.id, &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let staffed = seed(&store, "ABJ-010", Coordinates::new(6.5, 3.3)).await;
        let outcome = service
            .assign_manually(request.id, staffed.id, &admin)
            .await
            .unwrap();
        let request = outcome.into_request();
        assert_eq!(request.assigned_ambulance_id, Some(staffed.id));
        assert_eq!(request.assigned_driver_id, staffed.driver_id);
    }
}
