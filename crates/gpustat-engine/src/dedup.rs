//! Conflict resolver for duplicate GPU observations
//!
//! A physical GPU is simultaneously advertised by its primary slot and,
//! when idle, by a backfill slot, so one `(timestamp, machine, gpu)` can
//! appear under several slot names. For primary-capacity ("real slot")
//! accounting those duplicates must collapse to a single authoritative
//! record; backfill accounting never collapses, because an Unclaimed
//! backfill record is itself evidence the GPU is available for backfill.

use chrono::{DateTime, Utc};
use gpustat_core::{SlotRecord, SlotState};
use std::collections::HashMap;

/// Rank of a slot record when resolving duplicates. Highest rank wins:
/// a Claimed primary observation dominates everything, a Claimed backfill
/// observation dominates idle primaries, and an Unclaimed backfill
/// observation never wins.
pub fn slot_rank(record: &SlotRecord) -> u8 {
    match (&record.state, record.is_backfill()) {
        (SlotState::Claimed, false) => 3,
        (SlotState::Claimed, true) => 2,
        (SlotState::Unclaimed, false) => 1,
        _ => 0,
    }
}

/// Collapse duplicate `(timestamp, machine, assigned_gpu)` observations to
/// the single highest-ranked record each. Ties keep the earliest row, so
/// the result is deterministic and input order is preserved. Records with
/// no assigned GPU pass through untouched.
///
/// Idempotent: applying it to an already-collapsed set changes nothing.
pub fn dedup_primary_view(records: &[SlotRecord]) -> Vec<&SlotRecord> {
    let mut winner: HashMap<(DateTime<Utc>, &str, &str), usize> = HashMap::new();
    let mut unassigned: Vec<usize> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let Some((machine, gpu)) = record.gpu_key() else {
            unassigned.push(idx);
            continue;
        };
        let key = (record.timestamp, machine, gpu);
        match winner.get(&key) {
            Some(&current) if slot_rank(&records[current]) >= slot_rank(record) => {}
            _ => {
                winner.insert(key, idx);
            }
        }
    }

    let mut kept: Vec<usize> = winner.into_values().chain(unassigned).collect();
    kept.sort_unstable();
    kept.into_iter().map(|idx| &records[idx]).collect()
}
