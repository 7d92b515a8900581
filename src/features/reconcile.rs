//! Diff a fresh [`PageSnapshot`] against the last persisted visit.
//!
//! `new_count` policy: when both the snapshot count and the persisted count
//! are known and the snapshot count is larger, the numeric delta wins. In
//! every other case with a prior record the count is the number of new ids.
//! On a first visit the snapshot count wins when known.

use crate::types::{PageSnapshot, PersistedProfileState, ReconciliationResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;

pub fn reconcile(
    snapshot: &PageSnapshot,
    persisted: Option<&PersistedProfileState>,
) -> ReconciliationResult {
    let Some(prev) = persisted else {
        let new_item_ids = snapshot.item_ids.clone();
        let new_count = snapshot
            .total_count
            .unwrap_or(new_item_ids.len() as u64);
        return ReconciliationResult {
            new_count,
            new_item_ids,
        };
    };

    let new_item_ids = match prev.seen_item_ids.as_deref() {
        Some(seen) if !snapshot.item_ids.is_empty() => {
            let seen: HashSet<&str> = seen.iter().map(String::as_str).collect();
            snapshot
                .item_ids
                .iter()
                .filter(|id| !seen.contains(id.as_str()))
                .cloned()
                .collect()
        }
        _ => snapshot.item_ids.clone(),
    };

    let id_count = new_item_ids.len() as u64;
    let new_count = match snapshot.total_count {
        Some(total) if total > prev.last_seen_count => total - prev.last_seen_count,
        _ => id_count,
    };

    ReconciliationResult {
        new_count,
        new_item_ids,
    }
}

/// The record to persist after this cycle, or `None` when the snapshot has
/// no count and the stored state must stay untouched.
pub fn next_state(snapshot: &PageSnapshot, now: DateTime<Utc>) -> Option<PersistedProfileState> {
    let count = snapshot.total_count?;
    Some(PersistedProfileState {
        last_seen_count: count,
        last_visit_timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        seen_item_ids: Some(snapshot.item_ids.clone()),
    })
}
