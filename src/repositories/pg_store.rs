//! Almacén PostgreSQL
//!
//! Implementación de `DispatchStore` con SQLx. El reclamo de ambulancia y
//! las transiciones se ejecutan en una transacción con `SELECT ... FOR UPDATE`
//! sobre la solicitud y un `UPDATE` condicionado al estado de la ambulancia.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::DispatchStore;
use crate::models::{
    Ambulance, AmbulanceStatus, AmbulanceStatusChange, ClaimOutcome, Coordinates, DriverProfile,
    EmergencyRequest, NewAmbulance, NewDriverProfile, NewEmergencyRequest, RequestFilters,
    TransitionOutcome, TransitionPlan,
};
use crate::utils::errors::{not_found_error, AppError, AppResult};

const ACTIVE_STATUSES: &str = "('assigned', 'en_route', 'arrived')";

/// Fila cruda de `emergency_requests`
#[derive(Debug, sqlx::FromRow)]
struct EmergencyRequestRow {
    id: Uuid,
    tracking_code: String,
    requester_name: Option<String>,
    requester_phone: String,
    emergency_type: String,
    description: Option<String>,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    status: String,
    assigned_ambulance_id: Option<Uuid>,
    assigned_driver_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<EmergencyRequestRow> for EmergencyRequest {
    type Error = AppError;

    fn try_from(row: EmergencyRequestRow) -> Result<Self, Self::Error> {
        Ok(EmergencyRequest {
            id: row.id,
            tracking_code: row.tracking_code,
            requester_name: row.requester_name,
            requester_phone: row.requester_phone,
            emergency_type: row.emergency_type.parse().map_err(AppError::Internal)?,
            description: row.description,
            latitude: row.latitude,
            longitude: row.longitude,
            address: row.address,
            status: row.status.parse().map_err(AppError::Internal)?,
            assigned_ambulance_id: row.assigned_ambulance_id,
            assigned_driver_id: row.assigned_driver_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Fila cruda de `ambulances`
#[derive(Debug, sqlx::FromRow)]
struct AmbulanceRow {
    id: Uuid,
    plate_number: String,
    driver_id: Option<Uuid>,
    status: String,
    current_latitude: Option<f64>,
    current_longitude: Option<f64>,
    base_latitude: f64,
    base_longitude: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AmbulanceRow> for Ambulance {
    type Error = AppError;

    fn try_from(row: AmbulanceRow) -> Result<Self, Self::Error> {
        Ok(Ambulance {
            id: row.id,
            plate_number: row.plate_number,
            driver_id: row.driver_id,
            status: row.status.parse().map_err(AppError::Internal)?,
            current_latitude: row.current_latitude,
            current_longitude: row.current_longitude,
            base_latitude: row.base_latitude,
            base_longitude: row.base_longitude,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DriverProfileRow {
    id: Uuid,
    user_id: Uuid,
    full_name: String,
    phone: String,
    created_at: DateTime<Utc>,
}

impl From<DriverProfileRow> for DriverProfile {
    fn from(row: DriverProfileRow) -> Self {
        DriverProfile {
            id: row.id,
            user_id: row.user_id,
            full_name: row.full_name,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

/// Convertir violaciones de unicidad (23505) en `Conflict`
fn map_write_error(e: sqlx::Error, resource: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
            return AppError::Conflict(format!("{} violates {}", resource, constraint));
        }
    }
    AppError::Database(e)
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Clone)]
pub struct PgDispatchStore {
    pool: PgPool,
}

impl PgDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_request(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<EmergencyRequest> {
        let row = sqlx::query_as::<_, EmergencyRequestRow>(
            "SELECT * FROM emergency_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| not_found_error("Emergency request", &id.to_string()))?;

        row.try_into()
    }

    async fn lock_ambulance(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<Ambulance> {
        let row = sqlx::query_as::<_, AmbulanceRow>(
            "SELECT * FROM ambulances WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| not_found_error("Ambulance", &id.to_string()))?;

        row.try_into()
    }

    async fn ensure_driver_exists(
        tx: &mut Transaction<'_, Postgres>,
        driver_id: Uuid,
    ) -> AppResult<()> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM driver_profiles WHERE id = $1)")
                .bind(driver_id)
                .fetch_one(&mut **tx)
                .await?;

        if !exists {
            return Err(not_found_error("Driver", &driver_id.to_string()));
        }
        Ok(())
    }

    async fn has_active_request(
        tx: &mut Transaction<'_, Postgres>,
        ambulance_id: Uuid,
    ) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS(SELECT 1 FROM emergency_requests \
             WHERE assigned_ambulance_id = $1 AND status IN {})",
            ACTIVE_STATUSES
        ))
        .bind(ambulance_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn insert_request(&self, new: NewEmergencyRequest) -> AppResult<EmergencyRequest> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, EmergencyRequestRow>(
            r#"
            INSERT INTO emergency_requests (
                id, tracking_code, requester_name, requester_phone, emergency_type,
                description, latitude, longitude, address, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.tracking_code)
        .bind(new.requester_name)
        .bind(new.requester_phone)
        .bind(new.emergency_type.as_str())
        .bind(new.description)
        .bind(new.location.latitude)
        .bind(new.location.longitude)
        .bind(new.address)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Emergency request"))?;

        row.try_into()
    }

    async fn find_request(&self, id: Uuid) -> AppResult<Option<EmergencyRequest>> {
        sqlx::query_as::<_, EmergencyRequestRow>("SELECT * FROM emergency_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(EmergencyRequest::try_from)
            .transpose()
    }

    async fn find_request_by_tracking_code(
        &self,
        code: &str,
    ) -> AppResult<Option<EmergencyRequest>> {
        sqlx::query_as::<_, EmergencyRequestRow>(
            "SELECT * FROM emergency_requests WHERE tracking_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .map(EmergencyRequest::try_from)
        .transpose()
    }

    async fn list_requests(&self, filters: &RequestFilters) -> AppResult<Vec<EmergencyRequest>> {
        let rows = sqlx::query_as::<_, EmergencyRequestRow>(
            r#"
            SELECT * FROM emergency_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(filters.status.map(|s| s.as_str()))
        .bind(filters.limit.unwrap_or(i64::MAX).max(0))
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn find_active_request_for_driver(
        &self,
        driver_id: Uuid,
    ) -> AppResult<Option<EmergencyRequest>> {
        sqlx::query_as::<_, EmergencyRequestRow>(&format!(
            "SELECT * FROM emergency_requests \
             WHERE assigned_driver_id = $1 AND status IN {} \
             ORDER BY created_at DESC LIMIT 1",
            ACTIVE_STATUSES
        ))
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?
        .map(EmergencyRequest::try_from)
        .transpose()
    }

    async fn insert_ambulance(&self, new: NewAmbulance) -> AppResult<Ambulance> {
        let mut tx = self.pool.begin().await?;
        if let Some(driver_id) = new.driver_id {
            Self::ensure_driver_exists(&mut tx, driver_id).await?;
        }

        let now = Utc::now();
        let row = sqlx::query_as::<_, AmbulanceRow>(
            r#"
            INSERT INTO ambulances (
                id, plate_number, driver_id, status, current_latitude, current_longitude,
                base_latitude, base_longitude, created_at, updated_at
            )
            VALUES ($1, $2, $3, 'available', $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.plate_number)
        .bind(new.driver_id)
        .bind(new.current_location.map(|c| c.latitude))
        .bind(new.current_location.map(|c| c.longitude))
        .bind(new.base_station.latitude)
        .bind(new.base_station.longitude)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Ambulance"))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_ambulance(&self, id: Uuid) -> AppResult<Option<Ambulance>> {
        sqlx::query_as::<_, AmbulanceRow>("SELECT * FROM ambulances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Ambulance::try_from)
            .transpose()
    }

    async fn find_ambulance_by_driver(&self, driver_id: Uuid) -> AppResult<Option<Ambulance>> {
        sqlx::query_as::<_, AmbulanceRow>("SELECT * FROM ambulances WHERE driver_id = $1")
            .bind(driver_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Ambulance::try_from)
            .transpose()
    }

    async fn list_ambulances(&self) -> AppResult<Vec<Ambulance>> {
        let rows = sqlx::query_as::<_, AmbulanceRow>(
            "SELECT * FROM ambulances ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn set_ambulance_driver(
        &self,
        ambulance_id: Uuid,
        driver_id: Option<Uuid>,
    ) -> AppResult<Ambulance> {
        let mut tx = self.pool.begin().await?;
        let ambulance = Self::lock_ambulance(&mut tx, ambulance_id).await?;

        if ambulance.status.is_on_trip() || Self::has_active_request(&mut tx, ambulance_id).await? {
            return Err(AppError::Conflict(format!(
                "Ambulance '{}' is on an active trip",
                ambulance_id
            )));
        }
        if let Some(driver_id) = driver_id {
            Self::ensure_driver_exists(&mut tx, driver_id).await?;
        }

        let row = sqlx::query_as::<_, AmbulanceRow>(
            "UPDATE ambulances SET driver_id = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(ambulance_id)
        .bind(driver_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Ambulance driver"))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn set_ambulance_status(&self, change: &AmbulanceStatusChange) -> AppResult<Ambulance> {
        let mut tx = self.pool.begin().await?;
        let ambulance = Self::lock_ambulance(&mut tx, change.ambulance_id).await?;

        if !change.allowed_from.is_empty() && !change.allowed_from.contains(&ambulance.status) {
            return Err(AppError::Conflict(format!(
                "Ambulance '{}' is {} and cannot become {}",
                change.ambulance_id, ambulance.status, change.status
            )));
        }
        if change.require_no_active_request
            && Self::has_active_request(&mut tx, change.ambulance_id).await?
        {
            return Err(AppError::Conflict(format!(
                "Ambulance '{}' is still referenced by an active request",
                change.ambulance_id
            )));
        }

        let row = sqlx::query_as::<_, AmbulanceRow>(
            "UPDATE ambulances SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(change.ambulance_id)
        .bind(change.status.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn set_ambulance_location(
        &self,
        ambulance_id: Uuid,
        location: Coordinates,
    ) -> AppResult<Ambulance> {
        sqlx::query_as::<_, AmbulanceRow>(
            r#"
            UPDATE ambulances
            SET current_latitude = $2, current_longitude = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ambulance_id)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found_error("Ambulance", &ambulance_id.to_string()))?
        .try_into()
    }

    async fn claim_ambulance(
        &self,
        request_id: Uuid,
        ambulance_id: Uuid,
    ) -> AppResult<ClaimOutcome> {
        let mut tx = self.pool.begin().await?;
        let request = Self::lock_request(&mut tx, request_id).await?;

        if !request.awaits_dispatch() {
            return Ok(ClaimOutcome::RequestNotPending(request));
        }

        let now = Utc::now();
        // La guardia sobre `status` serializa los reclamos concurrentes sobre la fila
        let claimed = sqlx::query_as::<_, AmbulanceRow>(&format!(
            r#"
            UPDATE ambulances SET status = 'busy', updated_at = $2
            WHERE id = $1
              AND status = 'available'
              AND driver_id IS NOT NULL
              AND NOT EXISTS (
                  SELECT 1 FROM emergency_requests
                  WHERE assigned_ambulance_id = $1 AND status IN {}
              )
            RETURNING *
            "#,
            ACTIVE_STATUSES
        ))
        .bind(ambulance_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let ambulance: Ambulance = match claimed {
            Some(row) => row.try_into()?,
            None => {
                // distinguir "no existe" de "ya reclamada"
                Self::lock_ambulance(&mut tx, ambulance_id).await?;
                debug!("🔁 Ambulancia {} ya no es candidata", ambulance_id);
                return Ok(ClaimOutcome::AmbulanceUnavailable);
            }
        };

        let row = sqlx::query_as::<_, EmergencyRequestRow>(
            r#"
            UPDATE emergency_requests
            SET status = 'assigned', assigned_ambulance_id = $2, assigned_driver_id = $3,
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(ambulance.id)
        .bind(ambulance.driver_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Emergency request assignment"))?;

        tx.commit().await?;

        Ok(ClaimOutcome::Claimed {
            request: row.try_into()?,
            ambulance,
            previous_ambulance_status: AmbulanceStatus::Available,
        })
    }

    async fn apply_transition(&self, plan: &TransitionPlan) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_request(&mut tx, plan.request_id).await?;

        if current.status != plan.from {
            return Err(AppError::Conflict(format!(
                "Request '{}' is no longer {} (now {})",
                plan.request_id, plan.from, current.status
            )));
        }

        let now = Utc::now();
        let ambulance = match &plan.ambulance {
            Some(change) => {
                if current.assigned_ambulance_id != Some(change.ambulance_id) {
                    return Err(AppError::Conflict(format!(
                        "Request '{}' is no longer assigned to ambulance '{}'",
                        plan.request_id, change.ambulance_id
                    )));
                }
                let previous = Self::lock_ambulance(&mut tx, change.ambulance_id).await?.status;
                let row = sqlx::query_as::<_, AmbulanceRow>(
                    r#"
                    UPDATE ambulances
                    SET status = CASE WHEN status = 'offline' THEN status ELSE $2 END,
                        current_latitude = COALESCE($3, current_latitude),
                        current_longitude = COALESCE($4, current_longitude),
                        updated_at = $5
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(change.ambulance_id)
                .bind(change.status.as_str())
                .bind(change.location.map(|c| c.latitude))
                .bind(change.location.map(|c| c.longitude))
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                Some((previous, Ambulance::try_from(row)?))
            }
            None => None,
        };

        let row = sqlx::query_as::<_, EmergencyRequestRow>(
            r#"
            UPDATE emergency_requests
            SET status = $2, updated_at = $3, completed_at = COALESCE($4, completed_at)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(plan.request_id)
        .bind(plan.to.as_str())
        .bind(now)
        .bind(plan.completed_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TransitionOutcome {
            request: row.try_into()?,
            previous_status: current.status,
            ambulance,
        })
    }

    async fn insert_driver(&self, new: NewDriverProfile) -> AppResult<DriverProfile> {
        let row = sqlx::query_as::<_, DriverProfileRow>(
            r#"
            INSERT INTO driver_profiles (id, user_id, full_name, phone, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.full_name)
        .bind(new.phone)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Driver"))?;

        Ok(row.into())
    }

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<DriverProfile>> {
        let row = sqlx::query_as::<_, DriverProfileRow>("SELECT * FROM driver_profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(DriverProfile::from))
    }

    async fn find_driver_by_user(&self, user_id: Uuid) -> AppResult<Option<DriverProfile>> {
        let row = sqlx::query_as::<_, DriverProfileRow>(
            "SELECT * FROM driver_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(DriverProfile::from))
    }

    async fn list_drivers(&self) -> AppResult<Vec<DriverProfile>> {
        let rows = sqlx::query_as::<_, DriverProfileRow>(
            "SELECT * FROM driver_profiles ORDER BY full_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DriverProfile::from).collect())
    }
}
