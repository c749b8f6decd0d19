// src/store/mod.rs

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentRow, AppointmentServiceRow, AppointmentStatus};
use crate::scheduling::context::retain_active_orders;
use crate::scheduling::{PackageContext, PatientOrder, ServiceInfo, SessionOperations};

pub mod pg;

#[cfg(test)]
pub mod memory;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_employee_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub priority: i16,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub deleted: usize,
    pub created: usize,
    pub new_orders: usize,
    pub price_updates: usize,
}

impl CommitSummary {
    pub fn of(ops: &SessionOperations) -> Self {
        Self {
            deleted: ops.to_delete.len(),
            created: ops.to_create.len(),
            new_orders: ops.new_orders.len(),
            price_updates: ops.order_price_updates.len(),
        }
    }
}

/// Persistence the scheduling engine relies on: catalog and order lookups,
/// and the transactional replay of a [`SessionOperations`] diff.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn active_services(&self) -> StoreResult<Vec<ServiceInfo>>;

    /// Every order of the patient with its non-deleted sessions.
    async fn patient_orders(&self, patient_id: Uuid) -> StoreResult<Vec<PatientOrder>>;

    async fn appointment(&self, appointment_id: Uuid) -> StoreResult<AppointmentRow>;

    /// Non-deleted sessions booked on the appointment.
    async fn appointment_sessions(
        &self,
        appointment_id: Uuid,
    ) -> StoreResult<Vec<AppointmentServiceRow>>;

    /// Insert the appointment (reserved) and its sessions in one transaction.
    async fn create_appointment(
        &self,
        appointment: NewAppointment,
        ops: &SessionOperations,
        actor: Uuid,
    ) -> StoreResult<Uuid>;

    /// Deletes, new orders, sessions, price updates; all or nothing.
    async fn apply_operations(
        &self,
        appointment_id: Uuid,
        ops: &SessionOperations,
        actor: Uuid,
    ) -> StoreResult<CommitSummary>;

    async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        actor: Uuid,
    ) -> StoreResult<()>;
}

/// Engine context for a patient, plus the edited appointment's sessions.
pub struct LoadedContext {
    pub ctx: PackageContext,
    pub sessions: Vec<AppointmentServiceRow>,
}

pub async fn load_context(
    store: &dyn SessionStore,
    patient_id: Uuid,
    appointment_id: Option<Uuid>,
) -> StoreResult<LoadedContext> {
    let sessions = match appointment_id {
        Some(id) => {
            let appointment = store.appointment(id).await?;
            if appointment.patient_id != patient_id {
                return Err(StoreError::Invalid(format!(
                    "appointment {id} does not belong to patient {patient_id}"
                )));
            }
            store.appointment_sessions(id).await?
        }
        None => Vec::new(),
    };

    let services = store.active_services().await?;
    let mut orders = store.patient_orders(patient_id).await?;
    let referenced: HashSet<Uuid> = sessions.iter().filter_map(|s| s.order_id).collect();
    retain_active_orders(&mut orders, &referenced);

    debug!(
        %patient_id,
        ?appointment_id,
        orders = orders.len(),
        sessions = sessions.len(),
        "loaded package context"
    );

    Ok(LoadedContext {
        ctx: PackageContext::new(appointment_id, services, orders),
        sessions,
    })
}
