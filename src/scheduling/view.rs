// src/scheduling/view.rs

use serde::Serialize;
use uuid::Uuid;

use super::context::PackageContext;
use super::draft::{AvailablePackage, SessionDraft};
use super::entry::GroupKey;
use super::grouping::{GroupKind, PackageGroup};
use super::numbering::is_package_complete;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRowState {
    Existing,
    MarkedForDeletion,
    New,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRowView {
    /// Index to send back with `remove_session`.
    pub index: usize,
    pub session_number: i32,
    pub state: SessionRowState,
    pub appointment_service_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceControl {
    pub base_price: i32,
    pub custom_price: Option<i32>,
    pub final_price: i32,
    pub editable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageGroupView {
    pub key: GroupKey,
    pub kind: GroupKind,
    pub service_id: Uuid,
    pub service_name: String,
    pub rows: Vec<SessionRowView>,
    pub total_sessions: i32,
    pub completed_sessions: i32,
    pub has_pending_reservations: bool,
    pub is_complete: bool,
    pub price: PriceControl,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub groups: Vec<PackageGroupView>,
    pub available_packages: Vec<AvailablePackage>,
}

impl PackageGroupView {
    fn from_group(group: PackageGroup, is_complete: bool) -> Self {
        let rows = group
            .sessions
            .iter()
            .map(|s| SessionRowView {
                index: s.index,
                session_number: s.entry.session_number,
                state: if s.entry.is_new() {
                    SessionRowState::New
                } else if s.entry.is_marked_for_deletion() {
                    SessionRowState::MarkedForDeletion
                } else {
                    SessionRowState::Existing
                },
                appointment_service_id: s.entry.appointment_service_id(),
            })
            .collect();

        let editable = !matches!(group.key, GroupKey::Standalone(_));
        Self {
            kind: group.kind,
            service_id: group.service_id,
            service_name: group.service_name,
            rows,
            total_sessions: group.total_sessions,
            completed_sessions: group.completed_sessions,
            has_pending_reservations: group.has_pending_reservations,
            is_complete,
            price: PriceControl {
                base_price: group.base_price,
                custom_price: group.custom_price,
                final_price: group.final_price,
                editable,
            },
            key: group.key,
        }
    }
}

pub fn render(draft: &SessionDraft, ctx: &PackageContext) -> DraftView {
    let groups = draft
        .groups(ctx)
        .into_iter()
        .map(|group| {
            let complete = is_package_complete(draft.entries(), &group.key, group.service_id, ctx);
            PackageGroupView::from_group(group, complete)
        })
        .collect();

    DraftView {
        groups,
        available_packages: draft.available_packages(ctx),
    }
}
