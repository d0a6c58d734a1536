//! Slot record model: the normalized representation of one snapshot row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduler state of a slot at snapshot time.
///
/// Only `Claimed` and `Unclaimed` participate in classification; `Drained`
/// and unrecognized states mean the GPU is temporarily out of the pool and
/// contribute to neither claimed nor total counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Claimed,
    Unclaimed,
    Drained,
    Other(String),
}

impl SlotState {
    /// Parse the raw state string from a snapshot row.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Claimed" => SlotState::Claimed,
            "Unclaimed" => SlotState::Unclaimed,
            "Drained" => SlotState::Drained,
            other => SlotState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Claimed => write!(f, "Claimed"),
            SlotState::Unclaimed => write!(f, "Unclaimed"),
            SlotState::Drained => write!(f, "Drained"),
            SlotState::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One row of a scheduler snapshot: a single GPU-slot observation.
///
/// The same physical GPU can appear under several slot definitions at one
/// timestamp (a primary slot and a backfill slot advertise the same
/// hardware). `(machine, assigned_gpu)` identifies the physical GPU; the
/// conflict resolver in `gpustat-engine` collapses the duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRecord {
    /// Instant the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Slot identifier, e.g. `slot1@host` or `slot1_backfill@host`
    pub slot_name: String,
    /// Hostname owning the physical GPU
    pub machine: String,
    /// Opaque GPU identifier; `None` when the slot is currently unassigned
    pub assigned_gpu: Option<String>,
    /// Scheduler state at snapshot time
    pub state: SlotState,
    /// Prioritized-project tag; `None` means open/shared capacity
    pub prioritized_projects: Option<String>,
    /// GPU model string, used only for display grouping
    pub device_name: Option<String>,
    /// Owner of the running job (populated when claimed)
    pub remote_owner: Option<String>,
    /// Global job id of the running job (populated when claimed)
    pub global_job_id: Option<String>,
    /// Live utilization of the GPU, 0.0..=1.0 (populated when claimed)
    pub average_usage_fraction: Option<f64>,
}

impl SlotRecord {
    /// Whether this is a backfill slot. The substring `backfill` in the
    /// slot name (case-insensitive) is the sole signal.
    pub fn is_backfill(&self) -> bool {
        self.slot_name.to_ascii_lowercase().contains("backfill")
    }

    /// Whether the slot is reserved for a named project.
    pub fn has_priority_project(&self) -> bool {
        self.prioritized_projects.is_some()
    }

    /// Physical-GPU key, when a GPU is assigned.
    pub fn gpu_key(&self) -> Option<(&str, &str)> {
        self.assigned_gpu
            .as_deref()
            .map(|gpu| (self.machine.as_str(), gpu))
    }
}

/// Normalize a free-text tag field: trim whitespace, coerce empty to `None`.
///
/// Applied once at ingestion so every downstream comparison can assume a
/// canonical empty-vs-non-empty representation.
pub fn normalize_tag(raw: Option<String>) -> Option<String> {
    match raw {
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(slot_name: &str, projects: Option<&str>) -> SlotRecord {
        SlotRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap(),
            slot_name: slot_name.to_string(),
            machine: "host1.example.org".to_string(),
            assigned_gpu: Some("GPU-001".to_string()),
            state: SlotState::Claimed,
            prioritized_projects: normalize_tag(projects.map(String::from)),
            device_name: None,
            remote_owner: None,
            global_job_id: None,
            average_usage_fraction: None,
        }
    }

    #[test]
    fn test_backfill_detection() {
        assert!(!record("slot1@host1", None).is_backfill());
        assert!(record("slot1_backfill@host1", None).is_backfill());
        assert!(record("slot1_Backfill@host1", None).is_backfill());
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag(None), None);
        assert_eq!(normalize_tag(Some("".to_string())), None);
        assert_eq!(normalize_tag(Some("   ".to_string())), None);
        assert_eq!(
            normalize_tag(Some(" proj1 ".to_string())),
            Some("proj1".to_string())
        );
    }

    #[test]
    fn test_whitespace_projects_are_open_capacity() {
        let r = record("slot1@host1", Some("  "));
        assert!(!r.has_priority_project());
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(SlotState::parse("Claimed"), SlotState::Claimed);
        assert_eq!(SlotState::parse("Drained"), SlotState::Drained);
        assert_eq!(
            SlotState::parse("Matched"),
            SlotState::Other("Matched".to_string())
        );
    }
}
