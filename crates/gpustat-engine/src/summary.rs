//! Range summaries over bucket series
//!
//! Collapses a per-bucket series into per-category averages, with optional
//! grouping by device model or memory tier. Averages always divide by the
//! distinct-bucket count of the whole range, so a category that was absent
//! for part of the range is weighted down accordingly. The allocation
//! percentage is the mean of per-bucket percentages over buckets where the
//! category had capacity, which is not the same as avg_claimed/avg_total.

use crate::aggregate::{bucket_start, compute_series, BucketSeries};
use chrono::{DateTime, Utc};
use gpustat_core::{AnalysisConfig, GpustatError, GpustatResult, SlotCategory, SlotRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Range-level averages for one category.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CategorySummary {
    pub avg_claimed: f64,
    pub avg_total_available: f64,
    pub allocation_usage_percent: f64,
    pub num_intervals: usize,
}

/// Per-category summary over one analysis range.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub categories: BTreeMap<SlotCategory, CategorySummary>,
}

/// Summed group totals with the percentage recomputed from the sums.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GroupTotals {
    pub avg_claimed: f64,
    pub avg_total_available: f64,
    pub usage_percent: f64,
}

/// Average a series into per-category summaries for the whole range.
pub fn summarize(
    series: &BucketSeries,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> GpustatResult<UsageSummary> {
    if series.rows.is_empty() {
        return Err(GpustatError::MissingData { start, end });
    }
    Ok(UsageSummary {
        start,
        end,
        categories: summarize_with_divisor(series, series.rows.len()),
    })
}

/// Sum category averages into group totals, recomputing the percentage.
pub fn group_totals(
    categories: &BTreeMap<SlotCategory, CategorySummary>,
    members: &[SlotCategory],
) -> GroupTotals {
    let mut avg_claimed = 0.0;
    let mut avg_total_available = 0.0;
    for category in members {
        if let Some(summary) = categories.get(category) {
            avg_claimed += summary.avg_claimed;
            avg_total_available += summary.avg_total_available;
        }
    }
    let usage_percent = if avg_total_available > 0.0 {
        (avg_claimed / avg_total_available) * 100.0
    } else {
        0.0
    };
    GroupTotals {
        avg_claimed,
        avg_total_available,
        usage_percent,
    }
}

/// Per-device summaries keyed by display name.
///
/// Every device group divides by the distinct-bucket count of the whole
/// range, so device averages stay comparable. Legacy models are dropped
/// unless `include_legacy` is set.
pub fn summarize_by_device(
    records: &[SlotRecord],
    bucket_minutes: u32,
    config: &AnalysisConfig,
    hosted: &HashSet<String>,
    host_pattern: Option<&str>,
    include_legacy: bool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> GpustatResult<BTreeMap<String, BTreeMap<SlotCategory, CategorySummary>>> {
    let num_intervals = range_intervals(records, bucket_minutes)?;
    if num_intervals == 0 {
        return Err(GpustatError::MissingData { start, end });
    }

    let mut by_device: BTreeMap<String, Vec<SlotRecord>> = BTreeMap::new();
    for record in records {
        let Some(device) = record.device_name.as_deref() else {
            continue;
        };
        if !include_legacy && config.is_legacy_device(device) {
            debug!(device, "skipping legacy device");
            continue;
        }
        by_device
            .entry(config.display_device_name(device).to_string())
            .or_default()
            .push(record.clone());
    }

    let mut report = BTreeMap::new();
    for (device, device_records) in by_device {
        let series = compute_series(&device_records, bucket_minutes, hosted, host_pattern)?;
        report.insert(device, summarize_with_divisor(&series, num_intervals));
    }
    Ok(report)
}

/// Memory-tier summaries for the real-slot categories, keyed by tier label.
///
/// Devices with no configured memory size are left out of every tier.
pub fn summarize_by_memory_tier(
    records: &[SlotRecord],
    bucket_minutes: u32,
    config: &AnalysisConfig,
    hosted: &HashSet<String>,
    host_pattern: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> GpustatResult<BTreeMap<String, BTreeMap<SlotCategory, CategorySummary>>> {
    let num_intervals = range_intervals(records, bucket_minutes)?;
    if num_intervals == 0 {
        return Err(GpustatError::MissingData { start, end });
    }

    let mut by_tier: BTreeMap<String, Vec<SlotRecord>> = BTreeMap::new();
    for record in records {
        let Some(device) = record.device_name.as_deref() else {
            continue;
        };
        let Some(memory_mb) = config.device_memory_mb.get(device) else {
            debug!(device, "no memory size configured, skipping for tiers");
            continue;
        };
        by_tier
            .entry(config.memory_tiers.tier_label(*memory_mb))
            .or_default()
            .push(record.clone());
    }

    let mut report = BTreeMap::new();
    for (tier, tier_records) in by_tier {
        let series = compute_series(&tier_records, bucket_minutes, hosted, host_pattern)?;
        let mut categories = summarize_with_divisor(&series, num_intervals);
        categories.retain(|category, _| !category.is_backfill_class());
        report.insert(tier, categories);
    }
    Ok(report)
}

/// Distinct bucket count over the whole record set.
fn range_intervals(records: &[SlotRecord], bucket_minutes: u32) -> GpustatResult<usize> {
    if bucket_minutes == 0 {
        return Err(GpustatError::InvalidRange(
            "bucket width must be positive".to_string(),
        ));
    }
    let buckets: HashSet<DateTime<Utc>> = records
        .iter()
        .map(|r| bucket_start(r.timestamp, bucket_minutes))
        .collect();
    Ok(buckets.len())
}

fn summarize_with_divisor(
    series: &BucketSeries,
    num_intervals: usize,
) -> BTreeMap<SlotCategory, CategorySummary> {
    let mut categories = BTreeMap::new();
    for category in SlotCategory::ALL {
        let mut claimed_sum = 0u64;
        let mut total_sum = 0u64;
        let mut percent_sum = 0.0;
        let mut buckets_with_capacity = 0usize;
        for row in &series.rows {
            if let Some(stats) = row.categories.get(&category) {
                claimed_sum += stats.claimed;
                total_sum += stats.total;
                if stats.total > 0 {
                    percent_sum += stats.usage_percent;
                    buckets_with_capacity += 1;
                }
            }
        }
        let allocation_usage_percent = if buckets_with_capacity > 0 {
            percent_sum / buckets_with_capacity as f64
        } else {
            0.0
        };
        categories.insert(
            category,
            CategorySummary {
                avg_claimed: claimed_sum as f64 / num_intervals as f64,
                avg_total_available: total_sum as f64 / num_intervals as f64,
                allocation_usage_percent,
                num_intervals,
            },
        );
    }
    categories
}
