// src/scheduling/draft.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::AppointmentServiceRow;

use super::compensation::reconcile;
use super::context::PackageContext;
use super::entry::{GroupKey, NewPackage, SessionEntry, SessionState, TempPackageId};
use super::error::{SessionError, SessionResult};
use super::grouping::{PackageGroup, group_sessions};
use super::numbering::{compute_next_session_number, is_package_complete};
use super::operations::{SessionOperations, build_operations};

/// Where a newly added session should go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PackageTarget {
    /// Start a fresh package for the service.
    NewPackage,
    Order { order_id: Uuid },
    Temp { temp_package_id: TempPackageId },
}

/// A package a session may still be attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailablePackage {
    pub key: GroupKey,
    pub service_id: Uuid,
    pub next_session_number: i32,
    pub total_sessions: i32,
}

/// Authoring state of one appointment form. Lives for one editing session
/// and is round-tripped by the client between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    #[serde(default)]
    entries: Vec<SessionEntry>,
    #[serde(default)]
    price_overrides: BTreeMap<GroupKey, i32>,
    #[serde(default)]
    next_temp_counter: u32,
}

impl SessionDraft {
    /// Create mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit mode: one existing entry per persisted session of the appointment.
    pub fn for_appointment(rows: &[AppointmentServiceRow]) -> Self {
        let mut entries: Vec<SessionEntry> = rows
            .iter()
            .map(|r| {
                SessionEntry::existing(
                    r.appointment_service_id,
                    r.order_id,
                    r.service_id,
                    r.session_number,
                )
            })
            .collect();
        entries.sort_by_key(|e| (e.group_key(), e.session_number));
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn price_overrides(&self) -> &BTreeMap<GroupKey, i32> {
        &self.price_overrides
    }

    pub fn add_session(
        &mut self,
        service_id: Uuid,
        target: PackageTarget,
        ctx: &PackageContext,
    ) -> SessionResult<&[SessionEntry]> {
        ctx.service(service_id)?;

        let mut next_counter = None;
        let package = match target {
            PackageTarget::NewPackage => {
                let temp = TempPackageId::new(service_id, self.next_temp_counter);
                if self.has_entries_for(&GroupKey::Temp(temp.clone())) {
                    return Err(SessionError::InvalidDraft(format!(
                        "temp counter {} is already in use",
                        self.next_temp_counter
                    )));
                }
                next_counter = Some(self.next_temp_counter.checked_add(1).ok_or_else(|| {
                    SessionError::InvalidDraft("temp counter exhausted".into())
                })?);
                NewPackage::Temp(temp)
            }
            PackageTarget::Order { order_id } => {
                let order = ctx.order(order_id)?;
                if order.service_id != service_id {
                    return Err(SessionError::ServiceMismatch {
                        key: GroupKey::Order(order_id),
                        expected: order.service_id,
                        actual: service_id,
                    });
                }
                NewPackage::Order(order_id)
            }
            PackageTarget::Temp { temp_package_id } => {
                let Some(owner) = self
                    .entries
                    .iter()
                    .find(|e| e.temp_package_id() == Some(&temp_package_id))
                else {
                    return Err(SessionError::UnknownTempPackage(temp_package_id));
                };
                if owner.service_id != service_id {
                    return Err(SessionError::ServiceMismatch {
                        expected: owner.service_id,
                        key: GroupKey::Temp(temp_package_id),
                        actual: service_id,
                    });
                }
                NewPackage::Temp(temp_package_id)
            }
        };

        let key = match &package {
            NewPackage::Order(id) => GroupKey::Order(*id),
            NewPackage::Temp(temp) => GroupKey::Temp(temp.clone()),
        };
        if ctx.has_pending_reservations(&key) {
            return Err(SessionError::PendingReservation(key));
        }

        let session_number = compute_next_session_number(&self.entries, &key, ctx);
        if let Some(total) = ctx.package_total(&key, service_id) {
            if session_number > total {
                return Err(SessionError::PackageComplete { key, total });
            }
        }

        if let Some(counter) = next_counter {
            self.next_temp_counter = counter;
        }
        debug!(package = %key, session_number, "adding session");
        self.entries
            .push(SessionEntry::new_session(service_id, package, session_number));
        self.reconcile(ctx);
        Ok(&self.entries)
    }

    /// New sessions are dropped; existing ones toggle their deletion mark.
    pub fn remove_session(
        &mut self,
        index: usize,
        ctx: &PackageContext,
    ) -> SessionResult<&[SessionEntry]> {
        let len = self.entries.len();
        let Some(entry) = self.entries.get_mut(index) else {
            return Err(SessionError::IndexOutOfRange { index, len });
        };

        if entry.is_new() {
            debug!(package = %entry.group_key(), index, "dropping new session");
            self.entries.remove(index);
        } else {
            let marked = !entry.is_marked_for_deletion();
            debug!(package = %entry.group_key(), index, marked, "toggling deletion mark");
            entry.set_marked_for_deletion(marked);
        }

        self.reconcile(ctx);
        Ok(&self.entries)
    }

    /// `None` clears the override. The key must name a package that has
    /// sessions in this draft.
    pub fn set_price_override(&mut self, key: GroupKey, price: Option<i32>) -> SessionResult<()> {
        match &key {
            GroupKey::Standalone(_) => return Err(SessionError::PriceNotEditable(key)),
            GroupKey::Order(order_id) if !self.has_entries_for(&key) => {
                return Err(SessionError::UnknownOrder(*order_id));
            }
            GroupKey::Temp(temp) if !self.has_entries_for(&key) => {
                return Err(SessionError::UnknownTempPackage(temp.clone()));
            }
            _ => {}
        }
        match price {
            Some(p) if p < 0 => Err(SessionError::InvalidPrice(p)),
            Some(p) => {
                self.price_overrides.insert(key, p);
                Ok(())
            }
            None => {
                self.price_overrides.remove(&key);
                Ok(())
            }
        }
    }

    pub fn groups(&self, ctx: &PackageContext) -> Vec<PackageGroup> {
        group_sessions(&self.entries, ctx, &self.price_overrides)
    }

    pub fn operations(&self, ctx: &PackageContext) -> SessionResult<SessionOperations> {
        let ops = build_operations(&self.entries, ctx, &self.price_overrides)?;
        info!(
            deletes = ops.to_delete.len(),
            creates = ops.to_create.len(),
            new_orders = ops.new_orders.len(),
            price_updates = ops.order_price_updates.len(),
            "built session operations"
        );
        Ok(ops)
    }

    /// Re-checks a client-built draft before it creates an appointment: only
    /// new sessions, each on a package that can still take it.
    pub fn check_for_new_appointment(&self, ctx: &PackageContext) -> SessionResult<()> {
        for entry in &self.entries {
            let package = match &entry.state {
                SessionState::Existing { .. } => {
                    return Err(SessionError::InvalidDraft(
                        "a new appointment cannot carry existing sessions".into(),
                    ));
                }
                SessionState::New { package } => package,
            };
            ctx.service(entry.service_id)?;
            let NewPackage::Order(order_id) = package else {
                continue;
            };

            let order = ctx.order(*order_id)?;
            let key = GroupKey::Order(*order_id);
            if order.service_id != entry.service_id {
                return Err(SessionError::ServiceMismatch {
                    key,
                    expected: order.service_id,
                    actual: entry.service_id,
                });
            }
            if ctx.has_pending_reservations(&key) {
                return Err(SessionError::PendingReservation(key));
            }
            if entry.session_number > order.total_sessions {
                return Err(SessionError::PackageComplete {
                    key,
                    total: order.total_sessions,
                });
            }
            if ctx.external_numbers(*order_id).contains(&entry.session_number) {
                return Err(SessionError::InvalidDraft(format!(
                    "session {} of {key} is already booked",
                    entry.session_number
                )));
            }
        }
        Ok(())
    }

    /// Orders of the patient and temp packages of this draft that can take
    /// one more session.
    pub fn available_packages(&self, ctx: &PackageContext) -> Vec<AvailablePackage> {
        let mut candidates: Vec<(GroupKey, Uuid)> = ctx
            .orders
            .values()
            .map(|o| (GroupKey::Order(o.order_id), o.service_id))
            .collect();
        candidates.sort_by_key(|(key, _)| key.clone());

        for entry in &self.entries {
            if let Some(temp) = entry.temp_package_id() {
                let key = GroupKey::Temp(temp.clone());
                if !candidates.iter().any(|(k, _)| k == &key) {
                    candidates.push((key, entry.service_id));
                }
            }
        }

        candidates
            .into_iter()
            .filter(|(key, _)| !ctx.has_pending_reservations(key))
            .filter(|(key, service_id)| !is_package_complete(&self.entries, key, *service_id, ctx))
            .filter_map(|(key, service_id)| {
                let total_sessions = ctx.package_total(&key, service_id)?;
                let next_session_number = compute_next_session_number(&self.entries, &key, ctx);
                Some(AvailablePackage {
                    key,
                    service_id,
                    next_session_number,
                    total_sessions,
                })
            })
            .collect()
    }

    fn has_entries_for(&self, key: &GroupKey) -> bool {
        self.entries.iter().any(|e| &e.group_key() == key)
    }

    fn reconcile(&mut self, ctx: &PackageContext) {
        reconcile(&mut self.entries, ctx);

        let entries = &self.entries;
        self.price_overrides
            .retain(|key, _| entries.iter().any(|e| &e.group_key() == key));
    }
}
