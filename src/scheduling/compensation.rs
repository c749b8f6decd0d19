// src/scheduling/compensation.rs

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use super::context::PackageContext;
use super::entry::SessionEntry;
use super::grouping::partition;
use super::numbering::smallest_free;

/// Pair off deleted existing sessions against new sessions of the same
/// package. Each pair keeps the existing session (lowest numbers first) and
/// drops the new one (highest numbers first). Returns the number of pairs.
pub fn compensate(entries: &mut Vec<SessionEntry>) -> usize {
    let mut to_remove: HashSet<usize> = HashSet::new();
    let mut to_restore: Vec<usize> = Vec::new();

    for (key, indices) in partition(entries) {
        let mut marked: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| entries[i].is_marked_for_deletion())
            .collect();
        if marked.is_empty() {
            continue;
        }
        marked.sort_by_key(|&i| entries[i].session_number);

        let mut fresh: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| entries[i].is_new())
            .collect();
        fresh.sort_by_key(|&i| std::cmp::Reverse(entries[i].session_number));

        let pairs = marked.len().min(fresh.len());
        if pairs > 0 {
            debug!(package = %key, pairs, "compensating deleted sessions against new ones");
        }
        to_restore.extend(marked.into_iter().take(pairs));
        to_remove.extend(fresh.into_iter().take(pairs));
    }

    for index in to_restore {
        entries[index].set_marked_for_deletion(false);
    }

    let pairs = to_remove.len();
    if pairs > 0 {
        let mut index = 0;
        entries.retain(|_| {
            let keep = !to_remove.contains(&index);
            index += 1;
            keep
        });
    }
    pairs
}

/// Give every new session the smallest number not held by a kept existing
/// session or by another appointment, in list order.
pub fn renumber(entries: &mut [SessionEntry], ctx: &PackageContext) {
    for (key, indices) in partition(entries) {
        let mut occupied: BTreeSet<i32> = key
            .order_id()
            .map(|order_id| ctx.external_numbers(order_id))
            .unwrap_or_default();
        occupied.extend(
            indices
                .iter()
                .map(|&i| &entries[i])
                .filter(|e| e.is_existing() && e.is_active())
                .map(|e| e.session_number),
        );

        for &i in &indices {
            if !entries[i].is_new() {
                continue;
            }
            let number = smallest_free(&occupied);
            occupied.insert(number);
            entries[i].session_number = number;
        }
    }
}

pub fn reconcile(entries: &mut Vec<SessionEntry>, ctx: &PackageContext) {
    compensate(entries);
    renumber(entries, ctx);
}
