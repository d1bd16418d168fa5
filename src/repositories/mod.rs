//! Repositorios
//!
//! `DispatchStore` es la frontera con el backend gestionado (base de datos
//! relacional). Todas las escrituras sobre `status`, `assigned_ambulance_id`
//! y `assigned_driver_id` pasan por `claim_ambulance` y `apply_transition`,
//! que son atómicas respecto a otras operaciones concurrentes.

pub mod memory_store;
pub mod pg_store;

pub use memory_store::MemoryDispatchStore;
pub use pg_store::PgDispatchStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Ambulance, AmbulanceStatusChange, ClaimOutcome, Coordinates, DriverProfile, EmergencyRequest,
    NewAmbulance, NewDriverProfile, NewEmergencyRequest, RequestFilters, TransitionOutcome,
    TransitionPlan,
};
use crate::utils::errors::AppResult;

#[async_trait]
pub trait DispatchStore: Send + Sync {
    // --- emergency_requests ---

    /// Insertar una solicitud `pending`. `Conflict` si el código ya existe.
    async fn insert_request(&self, new: NewEmergencyRequest) -> AppResult<EmergencyRequest>;

    async fn find_request(&self, id: Uuid) -> AppResult<Option<EmergencyRequest>>;

    /// `code` debe llegar ya normalizado a mayúsculas
    async fn find_request_by_tracking_code(&self, code: &str)
        -> AppResult<Option<EmergencyRequest>>;

    /// Más recientes primero
    async fn list_requests(&self, filters: &RequestFilters) -> AppResult<Vec<EmergencyRequest>>;

    async fn find_active_request_for_driver(
        &self,
        driver_id: Uuid,
    ) -> AppResult<Option<EmergencyRequest>>;

    // --- ambulances ---

    /// `Conflict` si la matrícula ya existe o el conductor ya conduce otra ambulancia
    async fn insert_ambulance(&self, new: NewAmbulance) -> AppResult<Ambulance>;

    async fn find_ambulance(&self, id: Uuid) -> AppResult<Option<Ambulance>>;

    async fn find_ambulance_by_driver(&self, driver_id: Uuid) -> AppResult<Option<Ambulance>>;

    /// Orden estable: `created_at`, luego `id`
    async fn list_ambulances(&self) -> AppResult<Vec<Ambulance>>;

    /// Reasignar (o quitar) el conductor. `Conflict` si la ambulancia está en un
    /// viaje o si el conductor ya conduce otra ambulancia.
    async fn set_ambulance_driver(
        &self,
        ambulance_id: Uuid,
        driver_id: Option<Uuid>,
    ) -> AppResult<Ambulance>;

    /// Cambio administrativo de estado, sujeto a las guardias de `change`
    async fn set_ambulance_status(&self, change: &AmbulanceStatusChange) -> AppResult<Ambulance>;

    /// Sobrescribir solo la posición actual; nunca toca el estado
    async fn set_ambulance_location(
        &self,
        ambulance_id: Uuid,
        location: Coordinates,
    ) -> AppResult<Ambulance>;

    // --- operaciones atómicas del núcleo ---

    /// Reclamar `ambulance_id` para `request_id` en una sola transacción:
    /// la ambulancia debe seguir disponible y con conductor, y la solicitud
    /// `pending` sin asignar.
    async fn claim_ambulance(&self, request_id: Uuid, ambulance_id: Uuid)
        -> AppResult<ClaimOutcome>;

    /// Aplicar un plan del gobernador. `Conflict` si la solicitud ya no está en
    /// `plan.from` o ya no referencia la ambulancia del plan.
    async fn apply_transition(&self, plan: &TransitionPlan) -> AppResult<TransitionOutcome>;

    // --- driver_profiles ---

    /// `Conflict` si ya existe un perfil para `user_id`
    async fn insert_driver(&self, new: NewDriverProfile) -> AppResult<DriverProfile>;

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<DriverProfile>>;

    async fn find_driver_by_user(&self, user_id: Uuid) -> AppResult<Option<DriverProfile>>;

    async fn list_drivers(&self) -> AppResult<Vec<DriverProfile>>;
}
