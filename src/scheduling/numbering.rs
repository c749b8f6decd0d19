// src/scheduling/numbering.rs

use std::collections::BTreeSet;

use super::context::PackageContext;
use super::entry::{GroupKey, SessionEntry};

/// Smallest positive integer not in `occupied`.
/// Linear scan; packages are small.
pub fn smallest_free(occupied: &BTreeSet<i32>) -> i32 {
    let mut candidate = 1;
    while occupied.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

/// Numbers taken in package `key`: sessions of the order held by other
/// appointments plus every kept draft entry of the same package.
pub fn occupied_numbers(
    entries: &[SessionEntry],
    key: &GroupKey,
    ctx: &PackageContext,
) -> BTreeSet<i32> {
    let mut occupied = key
        .order_id()
        .map(|order_id| ctx.external_numbers(order_id))
        .unwrap_or_default();

    occupied.extend(
        entries
            .iter()
            .filter(|e| e.is_active() && &e.group_key() == key)
            .map(|e| e.session_number),
    );
    occupied
}

pub fn compute_next_session_number(
    entries: &[SessionEntry],
    key: &GroupKey,
    ctx: &PackageContext,
) -> i32 {
    smallest_free(&occupied_numbers(entries, key, ctx))
}

/// A package is complete once its next free number would exceed its size.
/// Standalone sessions have no size and are never offered for additions.
pub fn is_package_complete(
    entries: &[SessionEntry],
    key: &GroupKey,
    service_id: uuid::Uuid,
    ctx: &PackageContext,
) -> bool {
    match ctx.package_total(key, service_id) {
        Some(total) => compute_next_session_number(entries, key, ctx) > total,
        None => true,
    }
}
