// src/store/pg.rs

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AppointmentRow, AppointmentServiceRow, AppointmentStatus, OrderSessionRow, ServiceCatalogRow,
    ServiceOrderRow,
};
use crate::scheduling::entry::TempPackageId;
use crate::scheduling::{PatientOrder, PersistedSession, ServiceInfo, SessionOperations};

use super::{CommitSummary, NewAppointment, SessionStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/* ============================================================
   Commit helpers (run inside one transaction)
   ============================================================ */

/// Order id of each `to_create` entry, with temp ids mapped to the orders
/// created earlier in the same commit.
fn resolve_order_ids(
    ops: &SessionOperations,
    minted: &HashMap<&TempPackageId, Uuid>,
) -> StoreResult<Vec<Uuid>> {
    ops.to_create
        .iter()
        .map(|create| match (create.order_id, &create.temp_package_id) {
            (Some(id), _) => Ok(id),
            (None, Some(temp)) => minted
                .get(temp)
                .copied()
                .ok_or_else(|| StoreError::Invalid(format!("unknown new order {temp}"))),
            (None, None) => Err(StoreError::Invalid("session without order".into())),
        })
        .collect()
}

/// Distinct order ids, ascending. Commits that touch the same orders lock
/// them in the same sequence.
fn lock_order(order_ids: &[Uuid]) -> Vec<Uuid> {
    order_ids
        .iter()
        .copied()
        .collect::<BTreeSet<Uuid>>()
        .into_iter()
        .collect()
}

async fn apply_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    appointment_id: Uuid,
    patient_id: Uuid,
    ops: &SessionOperations,
    actor: Uuid,
) -> StoreResult<CommitSummary> {
    // 1. soft-delete
    for id in &ops.to_delete {
        let done = sqlx::query(
            r#"
            UPDATE appointment_service
            SET deleted_at = now()
            WHERE appointment_service_id = $1
              AND appointment_id = $2
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(appointment_id)
        .execute(&mut **tx)
        .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("appointment service {id}")));
        }
    }

    // 2. new orders, temp id -> real id
    let mut minted: HashMap<&TempPackageId, Uuid> = HashMap::new();
    for order in &ops.new_orders {
        let order_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO service_order (
              patient_id,
              service_id,
              total_sessions,
              final_price_cents,
              created_by_user_id
            )
            VALUES ($1,$2,$3,$4,$5)
            RETURNING order_id
            "#,
        )
        .bind(patient_id)
        .bind(order.service_id)
        .bind(order.total_sessions)
        .bind(order.final_price)
        .bind(actor)
        .fetch_one(&mut **tx)
        .await?;

        debug!(temp = %order.temp_package_id, %order_id, "created order");
        minted.insert(&order.temp_package_id, order_id);
    }

    // 3. sessions; order rows are locked once each, in id order
    let order_ids = resolve_order_ids(ops, &minted)?;
    let mut locked: HashMap<Uuid, (i32, Uuid)> = HashMap::new();
    for order_id in lock_order(&order_ids) {
        let order: Option<(i32, Uuid)> = sqlx::query_as(
            r#"
            SELECT total_sessions, service_id
            FROM service_order
            WHERE order_id = $1 AND patient_id = $2
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .bind(patient_id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(order) = order else {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        };
        locked.insert(order_id, order);
    }

    for (create, order_id) in ops.to_create.iter().zip(order_ids) {
        let Some(&(total_sessions, service_id)) = locked.get(&order_id) else {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        };
        if service_id != create.service_id {
            return Err(StoreError::Invalid(format!(
                "order {order_id} is not for service {}",
                create.service_id
            )));
        }
        if create.session_number > total_sessions {
            return Err(StoreError::Invalid(format!(
                "session {} exceeds order size {total_sessions}",
                create.session_number
            )));
        }

        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
              SELECT 1
              FROM appointment_service s
              JOIN appointment a ON a.appointment_id = s.appointment_id
              WHERE s.order_id = $1
                AND s.session_number = $2
                AND s.deleted_at IS NULL
                AND a.status <> $3
            )
            "#,
        )
        .bind(order_id)
        .bind(create.session_number)
        .bind(AppointmentStatus::Cancelled)
        .fetch_one(&mut **tx)
        .await?;

        if taken {
            return Err(StoreError::Conflict(format!(
                "session {} of order {order_id} is already booked",
                create.session_number
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO appointment_service (appointment_id, order_id, service_id, session_number)
            VALUES ($1,$2,$3,$4)
            "#,
        )
        .bind(appointment_id)
        .bind(order_id)
        .bind(create.service_id)
        .bind(create.session_number)
        .execute(&mut **tx)
        .await?;
    }

    // 4. price overrides
    for update in &ops.order_price_updates {
        let done = sqlx::query(
            r#"
            UPDATE service_order
            SET final_price_cents = $2
            WHERE order_id = $1 AND patient_id = $3
            "#,
        )
        .bind(update.order_id)
        .bind(update.final_price)
        .bind(patient_id)
        .execute(&mut **tx)
        .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {}", update.order_id)));
        }
    }

    // 5. touch appointment
    sqlx::query(
        r#"
        UPDATE appointment
        SET updated_at = now(), updated_by_user_id = $2
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(actor)
    .execute(&mut **tx)
    .await?;

    Ok(CommitSummary::of(ops))
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn active_services(&self) -> StoreResult<Vec<ServiceInfo>> {
        let rows: Vec<ServiceCatalogRow> = sqlx::query_as::<_, ServiceCatalogRow>(
            r#"
            SELECT
              service_id,
              service_type,
              display_number,
              display_name,
              default_duration_min,
              default_sessions,
              price_cents,
              is_active,
              created_at,
              updated_at
            FROM service_catalog
            WHERE is_active = true
            ORDER BY display_number ASC, service_type ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ServiceInfo {
                service_id: r.service_id,
                display_name: r.display_name,
                base_price: r.price_cents,
                default_sessions: r.default_sessions,
            })
            .collect())
    }

    async fn patient_orders(&self, patient_id: Uuid) -> StoreResult<Vec<PatientOrder>> {
        let orders: Vec<ServiceOrderRow> = sqlx::query_as::<_, ServiceOrderRow>(
            r#"
            SELECT order_id, service_id, total_sessions, final_price_cents
            FROM service_order
            WHERE patient_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.db)
        .await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.order_id).collect();
        let sessions: Vec<OrderSessionRow> = sqlx::query_as::<_, OrderSessionRow>(
            r#"
            SELECT
              s.appointment_service_id,
              s.order_id,
              s.appointment_id,
              s.session_number,
              a.status
            FROM appointment_service s
            JOIN appointment a ON a.appointment_id = s.appointment_id
            WHERE s.order_id = ANY($1)
              AND s.deleted_at IS NULL
            ORDER BY s.session_number ASC
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<PersistedSession>> = HashMap::new();
        for s in sessions {
            by_order.entry(s.order_id).or_default().push(PersistedSession {
                appointment_service_id: s.appointment_service_id,
                appointment_id: s.appointment_id,
                session_number: s.session_number,
                appointment_status: s.status,
            });
        }

        Ok(orders
            .into_iter()
            .map(|o| PatientOrder {
                sessions: by_order.remove(&o.order_id).unwrap_or_default(),
                order_id: o.order_id,
                service_id: o.service_id,
                total_sessions: o.total_sessions,
                final_price: o.final_price_cents,
            })
            .collect())
    }

    async fn appointment(&self, appointment_id: Uuid) -> StoreResult<AppointmentRow> {
        sqlx::query_as::<_, AppointmentRow>(
            r#"
            SELECT
              appointment_id,
              patient_id,
              doctor_employee_id,
              start_at,
              end_at,
              status,
              priority,
              note
            FROM appointment
            WHERE appointment_id = $1
            "#,
        )
        .bind(appointment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("appointment {appointment_id}")))
    }

    async fn appointment_sessions(
        &self,
        appointment_id: Uuid,
    ) -> StoreResult<Vec<AppointmentServiceRow>> {
        let rows = sqlx::query_as::<_, AppointmentServiceRow>(
            r#"
            SELECT appointment_service_id, order_id, service_id, session_number
            FROM appointment_service
            WHERE appointment_id = $1
              AND deleted_at IS NULL
            ORDER BY order_id NULLS LAST, session_number ASC
            "#,
        )
        .bind(appointment_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create_appointment(
        &self,
        appointment: NewAppointment,
        ops: &SessionOperations,
        actor: Uuid,
    ) -> StoreResult<Uuid> {
        let mut tx = self.db.begin().await?;

        let appointment_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO appointment (
              patient_id,
              doctor_employee_id,
              start_at,
              end_at,
              status,
              priority,
              note,
              created_by_user_id,
              updated_by_user_id
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
            RETURNING appointment_id
            "#,
        )
        .bind(appointment.patient_id)
        .bind(appointment.doctor_employee_id)
        .bind(appointment.start_at)
        .bind(appointment.end_at)
        .bind(AppointmentStatus::Reserved)
        .bind(appointment.priority)
        .bind(appointment.note)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        let summary = apply_in_tx(&mut tx, appointment_id, appointment.patient_id, ops, actor).await?;
        tx.commit().await?;

        info!(%appointment_id, ?summary, "appointment created");
        Ok(appointment_id)
    }

    async fn apply_operations(
        &self,
        appointment_id: Uuid,
        ops: &SessionOperations,
        actor: Uuid,
    ) -> StoreResult<CommitSummary> {
        let mut tx = self.db.begin().await?;

        let patient_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT patient_id
            FROM appointment
            WHERE appointment_id = $1
            FOR UPDATE
            "#,
        )
        .bind(appointment_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(patient_id) = patient_id else {
            return Err(StoreError::NotFound(format!("appointment {appointment_id}")));
        };

        let summary = apply_in_tx(&mut tx, appointment_id, patient_id, ops, actor).await?;
        tx.commit().await?;

        info!(%appointment_id, ?summary, "session operations applied");
        Ok(summary)
    }

    async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        actor: Uuid,
    ) -> StoreResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE appointment
            SET status = $2,
                updated_at = now(),
                updated_by_user_id = $3
            WHERE appointment_id = $1
            "#,
        )
        .bind(appointment_id)
        .bind(status)
        .bind(actor)
        .execute(&self.db)
        .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("appointment {appointment_id}")));
        }
        Ok(())
    }
}
