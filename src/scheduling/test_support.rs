// Shared fixtures for engine tests.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::AppointmentStatus;

use super::context::{PackageContext, PatientOrder, PersistedSession, ServiceInfo};
use super::entry::{GroupKey, NewPackage, SessionEntry, TempPackageId};

pub struct Fixture {
    /// 3 sessions, 100.00
    pub service_a: Uuid,
    /// 2 sessions, 50.00
    pub service_b: Uuid,
    pub appointment: Uuid,
    pub other_appointment: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            service_a: Uuid::new_v4(),
            service_b: Uuid::new_v4(),
            appointment: Uuid::new_v4(),
            other_appointment: Uuid::new_v4(),
        }
    }

    pub fn services(&self) -> Vec<ServiceInfo> {
        vec![
            ServiceInfo {
                service_id: self.service_a,
                display_name: "Physio".into(),
                base_price: 10_000,
                default_sessions: 3,
            },
            ServiceInfo {
                service_id: self.service_b,
                display_name: "Massage".into(),
                base_price: 5_000,
                default_sessions: 2,
            },
        ]
    }

    pub fn order(&self, total: i32, sessions: Vec<(i32, Uuid, AppointmentStatus)>) -> PatientOrder {
        self.order_for(self.service_a, total, sessions)
    }

    pub fn order_for(
        &self,
        service_id: Uuid,
        total: i32,
        sessions: Vec<(i32, Uuid, AppointmentStatus)>,
    ) -> PatientOrder {
        PatientOrder {
            order_id: Uuid::new_v4(),
            service_id,
            total_sessions: total,
            final_price: None,
            sessions: sessions
                .into_iter()
                .map(|(session_number, appointment_id, appointment_status)| PersistedSession {
                    appointment_service_id: Uuid::new_v4(),
                    appointment_id,
                    session_number,
                    appointment_status,
                })
                .collect(),
        }
    }

    pub fn context(&self, appointment_id: Option<Uuid>, orders: Vec<PatientOrder>) -> PackageContext {
        PackageContext::new(appointment_id, self.services(), orders)
    }

    /// Draft entries mirroring the order's sessions held by the edited appointment.
    pub fn existing_entries(&self, order: &PatientOrder) -> Vec<SessionEntry> {
        order
            .sessions
            .iter()
            .filter(|s| s.appointment_id == self.appointment)
            .map(|s| {
                SessionEntry::existing(
                    s.appointment_service_id,
                    Some(order.order_id),
                    order.service_id,
                    s.session_number,
                )
            })
            .collect()
    }
}

pub fn new_on_order(service_id: Uuid, order_id: Uuid, number: i32) -> SessionEntry {
    SessionEntry::new_session(service_id, NewPackage::Order(order_id), number)
}

pub fn new_on_temp(service_id: Uuid, temp: &TempPackageId, number: i32) -> SessionEntry {
    SessionEntry::new_session(service_id, NewPackage::Temp(temp.clone()), number)
}

pub fn no_overrides() -> BTreeMap<GroupKey, i32> {
    BTreeMap::new()
}

/// Numbers of kept entries under `key`, sorted.
pub fn active_numbers(entries: &[SessionEntry], key: &GroupKey) -> Vec<i32> {
    let mut numbers: Vec<i32> = entries
        .iter()
        .filter(|e| e.is_active() && &e.group_key() == key)
        .map(|e| e.session_number)
        .collect();
    numbers.sort_unstable();
    numbers
}
