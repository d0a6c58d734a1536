//! Category membership queries
//!
//! Maps a slice of slot records to the records belonging to one category,
//! applying the category-specific deduplication rule and the backfill
//! union rule.
//!
//! For the real-slot categories (both Priority classes and Shared) the
//! duplicates are collapsed first, then:
//! - `Claimed` membership is every collapsed record in a Claimed state
//!   whose primary-slot classification lands in the category. This
//!   includes a GPU whose only claim is via its backfill slot: such a GPU
//!   is still in use and is attributed back to its owning category rather
//!   than silently disappearing.
//! - `Unclaimed` membership is the idle primary-slot records of the
//!   category.
//! - `Any` is the plain non-backfill primary-slot view.
//!
//! Backfill categories never collapse duplicates: an Unclaimed backfill
//! record is meaningful backfill capacity even when a primary-slot
//! duplicate exists.

use crate::dedup::dedup_primary_view;
use gpustat_core::{SlotCategory, SlotRecord, SlotState};
use std::collections::HashSet;

/// State selector for a membership query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    /// No state constraint
    Any,
    /// GPUs in use, attributed to the category that owns them
    Claimed,
    /// GPUs idle and available to the category
    Unclaimed,
}

fn host_matches(record: &SlotRecord, host_pattern: Option<&str>) -> bool {
    match host_pattern {
        Some(pattern) => record.slot_name.contains(pattern),
        None => true,
    }
}

/// Records belonging to `category` under the given state filter.
///
/// `host_pattern` optionally restricts membership to slot names containing
/// the given substring.
pub fn category_members<'a>(
    records: &'a [SlotRecord],
    category: SlotCategory,
    state: StateFilter,
    hosted: &HashSet<String>,
    host_pattern: Option<&str>,
) -> Vec<&'a SlotRecord> {
    if category.is_backfill_class() {
        backfill_members(records, category, state, hosted, host_pattern)
    } else {
        real_slot_members(records, category, state, hosted, host_pattern)
    }
}

fn real_slot_members<'a>(
    records: &'a [SlotRecord],
    category: SlotCategory,
    state: StateFilter,
    hosted: &HashSet<String>,
    host_pattern: Option<&str>,
) -> Vec<&'a SlotRecord> {
    let collapsed = dedup_primary_view(records);

    collapsed
        .into_iter()
        .filter(|r| host_matches(r, host_pattern))
        .filter(|r| match state {
            StateFilter::Claimed => {
                r.state == SlotState::Claimed
                    && SlotCategory::classify_primary(r, hosted) == category
            }
            StateFilter::Unclaimed => {
                r.state == SlotState::Unclaimed
                    && !r.is_backfill()
                    && SlotCategory::classify(r, hosted) == category
            }
            StateFilter::Any => {
                !r.is_backfill() && SlotCategory::classify(r, hosted) == category
            }
        })
        .collect()
}

fn backfill_members<'a>(
    records: &'a [SlotRecord],
    category: SlotCategory,
    state: StateFilter,
    hosted: &HashSet<String>,
    host_pattern: Option<&str>,
) -> Vec<&'a SlotRecord> {
    records
        .iter()
        .filter(|r| r.is_backfill() && host_matches(r, host_pattern))
        .filter(|r| SlotCategory::classify(r, hosted) == category)
        .filter(|r| match state {
            StateFilter::Any => true,
            StateFilter::Claimed => r.state == SlotState::Claimed,
            StateFilter::Unclaimed => r.state == SlotState::Unclaimed,
        })
        .collect()
}
