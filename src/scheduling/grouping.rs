// src/scheduling/grouping.rs

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use super::context::PackageContext;
use super::entry::{GroupKey, SessionEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// Backed by a persisted order.
    Existing,
    /// Temp package or standalone session.
    New,
}

impl GroupKind {
    fn of(key: &GroupKey) -> Self {
        match key {
            GroupKey::Order(_) => GroupKind::Existing,
            GroupKey::Temp(_) | GroupKey::Standalone(_) => GroupKind::New,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedSession {
    /// Position in the draft's flat list.
    pub index: usize,
    pub entry: SessionEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageGroup {
    pub key: GroupKey,
    pub kind: GroupKind,
    pub service_id: Uuid,
    pub service_name: String,
    pub sessions: Vec<GroupedSession>,
    pub total_sessions: i32,
    pub completed_sessions: i32,
    pub has_pending_reservations: bool,
    pub base_price: i32,
    pub custom_price: Option<i32>,
    pub final_price: i32,
}

/// Indices of `entries` per group key, groups in order of first appearance.
pub fn partition(entries: &[SessionEntry]) -> Vec<(GroupKey, Vec<usize>)> {
    let mut position: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<usize>)> = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let key = entry.group_key();
        match position.get(&key) {
            Some(&at) => groups[at].1.push(index),
            None => {
                position.insert(key.clone(), groups.len());
                groups.push((key, vec![index]));
            }
        }
    }
    groups
}

pub fn group_sessions(
    entries: &[SessionEntry],
    ctx: &PackageContext,
    price_overrides: &BTreeMap<GroupKey, i32>,
) -> Vec<PackageGroup> {
    partition(entries)
        .into_iter()
        .map(|(key, indices)| {
            let mut sessions: Vec<GroupedSession> = indices
                .into_iter()
                .map(|index| GroupedSession {
                    index,
                    entry: entries[index].clone(),
                })
                .collect();
            sessions.sort_by_key(|s| (s.entry.session_number, s.index));

            let service_id = sessions[0].entry.service_id;
            let service_name = ctx
                .services
                .get(&service_id)
                .map(|s| s.display_name.clone())
                .unwrap_or_else(|| service_id.to_string());

            let total_sessions = ctx
                .package_total(&key, service_id)
                .unwrap_or_else(|| sessions.len().max(1) as i32);

            let base_price = ctx.base_price(&key, service_id);
            let custom_price = price_overrides.get(&key).copied();

            PackageGroup {
                kind: GroupKind::of(&key),
                service_id,
                service_name,
                total_sessions,
                completed_sessions: ctx.completed_sessions(&key),
                has_pending_reservations: ctx.has_pending_reservations(&key),
                base_price,
                custom_price,
                final_price: custom_price.unwrap_or(base_price),
                sessions,
                key,
            }
        })
        .collect()
}
