//! Utilization categories and the slot classification decision table

use crate::model::SlotRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The six utilization categories a GPU slot can belong to.
///
/// Classification is a pure function of three signals: whether the slot is a
/// backfill slot, whether it carries a prioritized-project tag, and whether
/// its machine belongs to the hosted-capacity (CHTC-owned) host set. Slot
/// state never participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotCategory {
    #[serde(rename = "Priority-ResearcherOwned")]
    PriorityResearcherOwned,
    #[serde(rename = "Priority-CHTCOwned")]
    PriorityChtcOwned,
    #[serde(rename = "Shared")]
    Shared,
    #[serde(rename = "Backfill-ResearcherOwned")]
    BackfillResearcherOwned,
    #[serde(rename = "Backfill-CHTCOwned")]
    BackfillChtcOwned,
    #[serde(rename = "Backfill-OpenCapacity")]
    BackfillOpenCapacity,
}

impl SlotCategory {
    /// All categories, in report order.
    pub const ALL: [SlotCategory; 6] = [
        SlotCategory::PriorityResearcherOwned,
        SlotCategory::PriorityChtcOwned,
        SlotCategory::Shared,
        SlotCategory::BackfillResearcherOwned,
        SlotCategory::BackfillChtcOwned,
        SlotCategory::BackfillOpenCapacity,
    ];

    /// Categories defined over primary ("real") slots.
    pub const REAL_SLOT: [SlotCategory; 3] = [
        SlotCategory::PriorityResearcherOwned,
        SlotCategory::PriorityChtcOwned,
        SlotCategory::Shared,
    ];

    /// Categories defined over backfill slots.
    pub const BACKFILL_SLOT: [SlotCategory; 3] = [
        SlotCategory::BackfillResearcherOwned,
        SlotCategory::BackfillChtcOwned,
        SlotCategory::BackfillOpenCapacity,
    ];

    /// Classify a record. Total and exclusive: every record with a valid
    /// slot name and machine lands in exactly one category.
    pub fn classify(record: &SlotRecord, hosted: &HashSet<String>) -> SlotCategory {
        Self::from_signals(
            record.is_backfill(),
            record.has_priority_project(),
            hosted.contains(&record.machine),
        )
    }

    /// Classify a record as if it were a primary slot, ignoring
    /// backfill-ness. Used to attribute a backfill observation of a GPU back
    /// to the category that owns the GPU.
    pub fn classify_primary(record: &SlotRecord, hosted: &HashSet<String>) -> SlotCategory {
        Self::from_signals(
            false,
            record.has_priority_project(),
            hosted.contains(&record.machine),
        )
    }

    /// The decision table. Exhaustive over the three booleans, checked by
    /// the compiler.
    pub fn from_signals(is_backfill: bool, has_priority: bool, is_chtc_owned: bool) -> SlotCategory {
        match (is_backfill, has_priority, is_chtc_owned) {
            (false, true, false) => SlotCategory::PriorityResearcherOwned,
            (false, true, true) => SlotCategory::PriorityChtcOwned,
            (false, false, _) => SlotCategory::Shared,
            (true, true, false) => SlotCategory::BackfillResearcherOwned,
            (true, _, true) => SlotCategory::BackfillChtcOwned,
            (true, false, false) => SlotCategory::BackfillOpenCapacity,
        }
    }

    /// Whether this category is defined over backfill slots.
    pub fn is_backfill_class(&self) -> bool {
        matches!(
            self,
            SlotCategory::BackfillResearcherOwned
                | SlotCategory::BackfillChtcOwned
                | SlotCategory::BackfillOpenCapacity
        )
    }

    /// Human-readable name for reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            SlotCategory::PriorityResearcherOwned => "Prioritized (Researcher Owned)",
            SlotCategory::PriorityChtcOwned => "Prioritized (CHTC Owned)",
            SlotCategory::Shared => "Open Capacity",
            SlotCategory::BackfillResearcherOwned => "Backfill (Researcher Owned)",
            SlotCategory::BackfillChtcOwned => "Backfill (CHTC Owned)",
            SlotCategory::BackfillOpenCapacity => "Backfill (Open Capacity)",
        }
    }
}

impl std::fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SlotCategory::PriorityResearcherOwned => "Priority-ResearcherOwned",
            SlotCategory::PriorityChtcOwned => "Priority-CHTCOwned",
            SlotCategory::Shared => "Shared",
            SlotCategory::BackfillResearcherOwned => "Backfill-ResearcherOwned",
            SlotCategory::BackfillChtcOwned => "Backfill-CHTCOwned",
            SlotCategory::BackfillOpenCapacity => "Backfill-OpenCapacity",
        };
        write!(f, "{}", name)
    }
}
