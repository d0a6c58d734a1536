//! Per-user GPU-hour attribution
//!
//! Charges each claimed, deduplicated GPU-interval to the job owner on the
//! winning slot record. A GPU claimed for one whole bucket contributes the
//! bucket width in hours.

use crate::aggregate::bucket_start;
use chrono::{DateTime, Utc};
use gpustat_core::{GpustatError, GpustatResult, SlotCategory, SlotRecord, SlotState};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Hours one user spent in one slot category, with their share of the
/// user's total.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CategoryHours {
    pub gpu_hours: f64,
    pub percentage: f64,
}

/// One user's GPU-hour total and per-category breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct UserHours {
    pub total_gpu_hours: f64,
    pub slot_breakdown: BTreeMap<SlotCategory, CategoryHours>,
}

/// Attribute claimed GPU-intervals to job owners.
///
/// Each claimed record is charged under the category of the slot it ran
/// on, so a backfill claim lands in its backfill category and nowhere
/// else. Within a bucket a GPU is charged at most once per category.
/// Records without an owner are skipped; they hold claimed capacity but
/// cannot be attributed.
pub fn user_gpu_hours(
    records: &[SlotRecord],
    bucket_minutes: u32,
    hosted: &HashSet<String>,
    host_pattern: Option<&str>,
) -> GpustatResult<BTreeMap<String, UserHours>> {
    if bucket_minutes == 0 {
        return Err(GpustatError::InvalidRange(
            "bucket width must be positive".to_string(),
        ));
    }
    let hours_per_bucket = f64::from(bucket_minutes) / 60.0;

    let mut buckets: BTreeMap<DateTime<Utc>, Vec<SlotRecord>> = BTreeMap::new();
    for record in records {
        buckets
            .entry(bucket_start(record.timestamp, bucket_minutes))
            .or_default()
            .push(record.clone());
    }

    let mut raw_hours: BTreeMap<String, BTreeMap<SlotCategory, f64>> = BTreeMap::new();
    for bucket_records in buckets.values() {
        // One charge per (gpu, category) per bucket, to the first
        // attributable owner.
        let mut charged: HashMap<((&str, &str), SlotCategory), &str> = HashMap::new();
        for record in bucket_records {
            if record.state != SlotState::Claimed {
                continue;
            }
            if let Some(pattern) = host_pattern {
                if !record.slot_name.contains(pattern) {
                    continue;
                }
            }
            let (Some(key), Some(owner)) = (record.gpu_key(), record.remote_owner.as_deref())
            else {
                continue;
            };
            charged
                .entry((key, SlotCategory::classify(record, hosted)))
                .or_insert(owner);
        }
        for ((_, category), owner) in &charged {
            *raw_hours
                .entry((*owner).to_string())
                .or_default()
                .entry(*category)
                .or_insert(0.0) += hours_per_bucket;
        }
    }

    let mut report = BTreeMap::new();
    for (user, by_category) in raw_hours {
        let total_gpu_hours: f64 = by_category.values().sum();
        let slot_breakdown = by_category
            .into_iter()
            .map(|(category, gpu_hours)| {
                let percentage = if total_gpu_hours > 0.0 {
                    (gpu_hours / total_gpu_hours) * 100.0
                } else {
                    0.0
                };
                (
                    category,
                    CategoryHours {
                        gpu_hours,
                        percentage,
                    },
                )
            })
            .collect();
        report.insert(
            user,
            UserHours {
                total_gpu_hours,
                slot_breakdown,
            },
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gpustat_core::{normalize_tag, SlotState};

    fn claimed_at(
        minute: u32,
        slot_name: &str,
        machine: &str,
        gpu: &str,
        owner: Option<&str>,
        projects: Option<&str>,
    ) -> SlotRecord {
        SlotRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 7, 1, 10, minute, 0).unwrap(),
            slot_name: slot_name.to_string(),
            machine: machine.to_string(),
            assigned_gpu: Some(gpu.to_string()),
            state: SlotState::Claimed,
            prioritized_projects: normalize_tag(projects.map(String::from)),
            device_name: None,
            remote_owner: owner.map(String::from),
            global_job_id: None,
            average_usage_fraction: None,
        }
    }

    fn no_hosted() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_zero_bucket_width_rejected() {
        assert!(matches!(
            user_gpu_hours(&[], 0, &no_hosted(), None),
            Err(GpustatError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_bucket_width_sets_hours() {
        let records = vec![claimed_at(0, "slot1@h1", "h1", "GPU-A", Some("alice"), None)];
        let report = user_gpu_hours(&records, 15, &no_hosted(), None).unwrap();
        let alice = &report["alice"];
        assert!((alice.total_gpu_hours - 0.25).abs() < 1e-9);
        let shared = alice.slot_breakdown[&SlotCategory::Shared];
        assert!((shared.percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_hours_accumulate_across_buckets() {
        let records = vec![
            claimed_at(0, "slot1@h1", "h1", "GPU-A", Some("alice"), Some("p1")),
            claimed_at(20, "slot1@h1", "h1", "GPU-A", Some("alice"), Some("p1")),
            claimed_at(40, "slot1@h1", "h1", "GPU-A", Some("alice"), Some("p1")),
        ];
        let report = user_gpu_hours(&records, 15, &no_hosted(), None).unwrap();
        assert!((report["alice"].total_gpu_hours - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_gpu_charged_once_per_bucket_per_category() {
        // Two records for the same GPU in one bucket charge it once.
        let records = vec![
            claimed_at(0, "slot1@h1", "h1", "GPU-A", Some("alice"), None),
            claimed_at(5, "slot1@h1", "h1", "GPU-A", Some("alice"), None),
        ];
        let report = user_gpu_hours(&records, 15, &no_hosted(), None).unwrap();
        assert!((report["alice"].total_gpu_hours - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_ownerless_claims_are_not_attributed() {
        let records = vec![claimed_at(0, "slot1@h1", "h1", "GPU-A", None, None)];
        let report = user_gpu_hours(&records, 15, &no_hosted(), None).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_backfill_claim_charges_backfill_category_only() {
        let records = vec![claimed_at(
            0,
            "slot1_backfill@h1",
            "h1",
            "GPU-A",
            Some("carol"),
            None,
        )];
        let report = user_gpu_hours(&records, 15, &no_hosted(), None).unwrap();
        let carol = &report["carol"];
        assert!((carol.total_gpu_hours - 0.25).abs() < 1e-9);
        assert_eq!(carol.slot_breakdown.len(), 1);
        assert!(carol
            .slot_breakdown
            .contains_key(&SlotCategory::BackfillOpenCapacity));
    }

    #[test]
    fn test_breakdown_percentages_sum_to_total() {
        let records = vec![
            claimed_at(0, "slot1@h1", "h1", "GPU-A", Some("bob"), Some("p1")),
            claimed_at(0, "slot2@h2", "h2", "GPU-B", Some("bob"), None),
        ];
        let report = user_gpu_hours(&records, 15, &no_hosted(), None).unwrap();
        let bob = &report["bob"];
        assert!((bob.total_gpu_hours - 0.5).abs() < 1e-9);
        let percent_sum: f64 = bob.slot_breakdown.values().map(|c| c.percentage).sum();
        assert!((percent_sum - 100.0).abs() < 1e-9);
    }
}
