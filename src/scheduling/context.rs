// src/scheduling/context.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::models::AppointmentStatus;

use super::entry::GroupKey;
use super::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service_id: Uuid,
    pub display_name: String,
    /// cents
    pub base_price: i32,
    pub default_sessions: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistedSession {
    pub appointment_service_id: Uuid,
    pub appointment_id: Uuid,
    pub session_number: i32,
    pub appointment_status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientOrder {
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub total_sessions: i32,
    pub final_price: Option<i32>,
    pub sessions: Vec<PersistedSession>,
}

impl PatientOrder {
    pub fn completed_sessions(&self) -> i32 {
        self.sessions
            .iter()
            .filter(|s| s.appointment_status.is_completed())
            .count() as i32
    }

    pub fn is_fully_completed(&self) -> bool {
        self.completed_sessions() >= self.total_sessions
    }
}

/// Keep orders that still have sessions left, plus any order the edited
/// appointment already references.
pub fn retain_active_orders(orders: &mut Vec<PatientOrder>, referenced: &HashSet<Uuid>) {
    orders.retain(|o| !o.is_fully_completed() || referenced.contains(&o.order_id));
}

/// Everything the engine needs to know about the outside world while a draft
/// is being edited.
#[derive(Debug, Clone, Default)]
pub struct PackageContext {
    /// Appointment being edited; `None` in create mode.
    pub appointment_id: Option<Uuid>,
    pub services: HashMap<Uuid, ServiceInfo>,
    pub orders: HashMap<Uuid, PatientOrder>,
}

impl PackageContext {
    pub fn new(
        appointment_id: Option<Uuid>,
        services: Vec<ServiceInfo>,
        orders: Vec<PatientOrder>,
    ) -> Self {
        Self {
            appointment_id,
            services: services.into_iter().map(|s| (s.service_id, s)).collect(),
            orders: orders.into_iter().map(|o| (o.order_id, o)).collect(),
        }
    }

    pub fn service(&self, service_id: Uuid) -> SessionResult<&ServiceInfo> {
        self.services
            .get(&service_id)
            .ok_or(SessionError::UnknownService(service_id))
    }

    pub fn order(&self, order_id: Uuid) -> SessionResult<&PatientOrder> {
        self.orders
            .get(&order_id)
            .ok_or(SessionError::UnknownOrder(order_id))
    }

    /// Session numbers of the order held by other appointments. The edited
    /// appointment's own sessions live in the draft instead.
    pub fn external_numbers(&self, order_id: Uuid) -> BTreeSet<i32> {
        let Some(order) = self.orders.get(&order_id) else {
            return BTreeSet::new();
        };
        order
            .sessions
            .iter()
            .filter(|s| s.appointment_status.holds_session_number())
            .filter(|s| Some(s.appointment_id) != self.appointment_id)
            .map(|s| s.session_number)
            .collect()
    }

    pub fn has_pending_reservations(&self, key: &GroupKey) -> bool {
        let Some(order) = key.order_id().and_then(|id| self.orders.get(&id)) else {
            return false;
        };
        order.sessions.iter().any(|s| {
            s.appointment_status == AppointmentStatus::Reserved
                && Some(s.appointment_id) != self.appointment_id
        })
    }

    pub fn completed_sessions(&self, key: &GroupKey) -> i32 {
        key.order_id()
            .and_then(|id| self.orders.get(&id))
            .map(PatientOrder::completed_sessions)
            .unwrap_or(0)
    }

    /// Configured package size: the order's total for persisted packages,
    /// the service default for temp packages. Standalone sessions have none.
    pub fn package_total(&self, key: &GroupKey, service_id: Uuid) -> Option<i32> {
        match key {
            GroupKey::Order(order_id) => match self.orders.get(order_id) {
                Some(order) => Some(order.total_sessions),
                None => self.services.get(&service_id).map(|s| s.default_sessions),
            },
            GroupKey::Temp(_) => self.services.get(&service_id).map(|s| s.default_sessions),
            GroupKey::Standalone(_) => None,
        }
    }

    /// Price before any override, in cents.
    pub fn base_price(&self, key: &GroupKey, service_id: Uuid) -> i32 {
        let order_price = key
            .order_id()
            .and_then(|id| self.orders.get(&id))
            .and_then(|o| o.final_price);
        order_price
            .or_else(|| self.services.get(&service_id).map(|s| s.base_price))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::test_support::*;

    #[test]
    fn external_numbers_skip_cancelled_and_current_appointment() {
        let fx = Fixture::new();
        let order = fx.order(
            5,
            vec![
                (1, fx.other_appointment, AppointmentStatus::Dismissed),
                (2, fx.other_appointment, AppointmentStatus::Cancelled),
                (3, fx.appointment, AppointmentStatus::Confirmed),
                (4, Uuid::new_v4(), AppointmentStatus::Reserved),
            ],
        );
        let ctx = fx.context(Some(fx.appointment), vec![order.clone()]);

        let numbers: Vec<i32> = ctx.external_numbers(order.order_id).into_iter().collect();
        assert_eq!(numbers, vec![1, 4]);
        assert!(ctx.has_pending_reservations(&GroupKey::Order(order.order_id)));
        assert_eq!(ctx.completed_sessions(&GroupKey::Order(order.order_id)), 1);
    }

    #[test]
    fn reservation_on_the_edited_appointment_is_not_pending() {
        let fx = Fixture::new();
        let order = fx.order(3, vec![(1, fx.appointment, AppointmentStatus::Reserved)]);
        let ctx = fx.context(Some(fx.appointment), vec![order.clone()]);
        assert!(!ctx.has_pending_reservations(&GroupKey::Order(order.order_id)));
    }

    #[test]
    fn fully_completed_orders_are_dropped_unless_referenced() {
        let fx = Fixture::new();
        let done = fx.order(1, vec![(1, fx.other_appointment, AppointmentStatus::Dismissed)]);
        let done_but_referenced =
            fx.order(1, vec![(1, fx.appointment, AppointmentStatus::Dismissed)]);
        let open = fx.order(3, vec![]);

        let mut orders = vec![done.clone(), done_but_referenced.clone(), open.clone()];
        let referenced = HashSet::from([done_but_referenced.order_id]);
        retain_active_orders(&mut orders, &referenced);

        let ids: Vec<Uuid> = orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![done_but_referenced.order_id, open.order_id]);
    }

    #[test]
    fn order_price_wins_over_catalog_price() {
        let fx = Fixture::new();
        let mut order = fx.order(3, vec![]);
        order.final_price = Some(9_000);
        let ctx = fx.context(None, vec![order.clone()]);

        assert_eq!(ctx.base_price(&GroupKey::Order(order.order_id), fx.service_a), 9_000);
        assert_eq!(ctx.base_price(&GroupKey::Standalone(fx.service_a), fx.service_a), 10_000);
        assert_eq!(ctx.package_total(&GroupKey::Standalone(fx.service_a), fx.service_a), None);
    }
}
