// In-memory SessionStore for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::{AppointmentRow, AppointmentServiceRow, AppointmentStatus};
use crate::scheduling::{PatientOrder, PersistedSession, ServiceInfo, SessionOperations};

use super::{CommitSummary, NewAppointment, SessionStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct OrderRecord {
    patient_id: Uuid,
    service_id: Uuid,
    total_sessions: i32,
    final_price: Option<i32>,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    appointment_id: Uuid,
    order_id: Option<Uuid>,
    service_id: Uuid,
    session_number: i32,
    deleted: bool,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    services: Vec<ServiceInfo>,
    orders: Vec<(Uuid, OrderRecord)>,
    appointments: HashMap<Uuid, AppointmentRow>,
    sessions: Vec<(Uuid, SessionRecord)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&self, name: &str, base_price: i32, default_sessions: i32) -> Uuid {
        let service_id = Uuid::new_v4();
        self.tables.lock().unwrap().services.push(ServiceInfo {
            service_id,
            display_name: name.to_string(),
            base_price,
            default_sessions,
        });
        service_id
    }

    pub fn sample_appointment(&self, patient_id: Uuid) -> NewAppointment {
        let start_at = Utc::now() + Duration::days(1);
        NewAppointment {
            patient_id,
            doctor_employee_id: Uuid::new_v4(),
            start_at,
            end_at: start_at + Duration::minutes(45),
            priority: 0,
            note: None,
        }
    }
}

impl Tables {
    fn apply(
        &mut self,
        appointment_id: Uuid,
        patient_id: Uuid,
        ops: &SessionOperations,
    ) -> StoreResult<()> {
        for id in &ops.to_delete {
            let row = self
                .sessions
                .iter_mut()
                .find(|(sid, s)| sid == id && s.appointment_id == appointment_id && !s.deleted)
                .ok_or_else(|| StoreError::NotFound(format!("appointment service {id}")))?;
            row.1.deleted = true;
        }

        let mut minted = HashMap::new();
        for order in &ops.new_orders {
            let order_id = Uuid::new_v4();
            self.orders.push((
                order_id,
                OrderRecord {
                    patient_id,
                    service_id: order.service_id,
                    total_sessions: order.total_sessions,
                    final_price: order.final_price,
                },
            ));
            minted.insert(order.temp_package_id.clone(), order_id);
        }

        for create in &ops.to_create {
            let order_id = match (create.order_id, &create.temp_package_id) {
                (Some(id), _) => id,
                (None, Some(temp)) => *minted
                    .get(temp)
                    .ok_or_else(|| StoreError::Invalid(format!("unknown new order {temp}")))?,
                (None, None) => return Err(StoreError::Invalid("session without order".into())),
            };
            let order = self
                .orders
                .iter()
                .find(|(id, o)| *id == order_id && o.patient_id == patient_id)
                .map(|(_, o)| o.clone())
                .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
            if create.session_number > order.total_sessions {
                return Err(StoreError::Invalid(format!(
                    "session {} exceeds order size {}",
                    create.session_number, order.total_sessions
                )));
            }
            let taken = self.sessions.iter().any(|(_, s)| {
                s.order_id == Some(order_id)
                    && s.session_number == create.session_number
                    && !s.deleted
                    && self
                        .appointments
                        .get(&s.appointment_id)
                        .is_some_and(|a| a.status.holds_session_number())
            });
            if taken {
                return Err(StoreError::Conflict(format!(
                    "session {} of order {order_id} is already booked",
                    create.session_number
                )));
            }
            self.sessions.push((
                Uuid::new_v4(),
                SessionRecord {
                    appointment_id,
                    order_id: Some(order_id),
                    service_id: create.service_id,
                    session_number: create.session_number,
                    deleted: false,
                },
            ));
        }

        for update in &ops.order_price_updates {
            let (_, order) = self
                .orders
                .iter_mut()
                .find(|(id, o)| *id == update.order_id && o.patient_id == patient_id)
                .ok_or_else(|| StoreError::NotFound(format!("order {}", update.order_id)))?;
            order.final_price = Some(update.final_price);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn active_services(&self) -> StoreResult<Vec<ServiceInfo>> {
        Ok(self.tables.lock().unwrap().services.clone())
    }

    async fn patient_orders(&self, patient_id: Uuid) -> StoreResult<Vec<PatientOrder>> {
        let tables = self.tables.lock().unwrap();
        let orders = tables
            .orders
            .iter()
            .filter(|(_, o)| o.patient_id == patient_id)
            .map(|(order_id, o)| PatientOrder {
                order_id: *order_id,
                service_id: o.service_id,
                total_sessions: o.total_sessions,
                final_price: o.final_price,
                sessions: tables
                    .sessions
                    .iter()
                    .filter(|(_, s)| s.order_id == Some(*order_id) && !s.deleted)
                    .map(|(sid, s)| PersistedSession {
                        appointment_service_id: *sid,
                        appointment_id: s.appointment_id,
                        session_number: s.session_number,
                        appointment_status: tables.appointments[&s.appointment_id].status,
                    })
                    .collect(),
            })
            .collect();
        Ok(orders)
    }

    async fn appointment(&self, appointment_id: Uuid) -> StoreResult<AppointmentRow> {
        self.tables
            .lock()
            .unwrap()
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("appointment {appointment_id}")))
    }

    async fn appointment_sessions(
        &self,
        appointment_id: Uuid,
    ) -> StoreResult<Vec<AppointmentServiceRow>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<AppointmentServiceRow> = tables
            .sessions
            .iter()
            .filter(|(_, s)| s.appointment_id == appointment_id && !s.deleted)
            .map(|(sid, s)| AppointmentServiceRow {
                appointment_service_id: *sid,
                order_id: s.order_id,
                service_id: s.service_id,
                session_number: s.session_number,
            })
            .collect();
        rows.sort_by_key(|r| (r.order_id, r.session_number));
        Ok(rows)
    }

    async fn create_appointment(
        &self,
        appointment: NewAppointment,
        ops: &SessionOperations,
        _actor: Uuid,
    ) -> StoreResult<Uuid> {
        let mut tables = self.tables.lock().unwrap();
        let mut staged = tables.clone();
        let appointment_id = Uuid::new_v4();
        staged.appointments.insert(
            appointment_id,
            AppointmentRow {
                appointment_id,
                patient_id: appointment.patient_id,
                doctor_employee_id: appointment.doctor_employee_id,
                start_at: appointment.start_at,
                end_at: appointment.end_at,
                status: AppointmentStatus::Reserved,
                priority: appointment.priority,
                note: appointment.note,
            },
        );
        staged.apply(appointment_id, appointment.patient_id, ops)?;
        *tables = staged;
        Ok(appointment_id)
    }

    async fn apply_operations(
        &self,
        appointment_id: Uuid,
        ops: &SessionOperations,
        _actor: Uuid,
    ) -> StoreResult<CommitSummary> {
        let mut tables = self.tables.lock().unwrap();
        let patient_id = tables
            .appointments
            .get(&appointment_id)
            .map(|a| a.patient_id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {appointment_id}")))?;
        let mut staged = tables.clone();
        staged.apply(appointment_id, patient_id, ops)?;
        *tables = staged;
        Ok(CommitSummary::of(ops))
    }

    async fn set_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        _actor: Uuid,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let appointment = tables
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {appointment_id}")))?;
        appointment.status = status;
        Ok(())
    }
}
