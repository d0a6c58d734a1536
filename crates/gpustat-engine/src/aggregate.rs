//! Interval aggregator
//!
//! Buckets records into fixed-width time windows and counts, per
//! (bucket, category), the distinct GPUs claimed and the distinct GPUs
//! available. Only buckets actually present in the data are emitted.

use crate::membership::{category_members, StateFilter};
use chrono::{DateTime, Duration, Utc};
use gpustat_core::{GpustatError, GpustatResult, SlotCategory, SlotRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Claimed/total counts for one category in one bucket.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BucketStats {
    pub claimed: u64,
    pub total: u64,
    pub usage_percent: f64,
}

impl BucketStats {
    fn new(claimed: u64, total: u64) -> Self {
        let usage_percent = if total > 0 {
            (claimed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            claimed,
            total,
            usage_percent,
        }
    }
}

/// One emitted time bucket with stats for every category.
#[derive(Debug, Clone, Serialize)]
pub struct BucketRow {
    pub timestamp: DateTime<Utc>,
    pub categories: BTreeMap<SlotCategory, BucketStats>,
}

/// Ordered per-bucket series over one analysis range.
#[derive(Debug, Clone, Serialize)]
pub struct BucketSeries {
    pub bucket_minutes: u32,
    pub rows: Vec<BucketRow>,
}

impl BucketSeries {
    /// Number of distinct buckets observed in the range.
    pub fn num_intervals(&self) -> usize {
        self.rows.len()
    }
}

/// Truncate a timestamp to the start of its bucket.
pub fn bucket_start(timestamp: DateTime<Utc>, bucket_minutes: u32) -> DateTime<Utc> {
    let width_secs = i64::from(bucket_minutes) * 60;
    let rem = timestamp.timestamp().rem_euclid(width_secs);
    timestamp
        - Duration::seconds(rem)
        - Duration::nanoseconds(i64::from(timestamp.timestamp_subsec_nanos()))
}

/// Compute the per-bucket series for all six categories.
///
/// GPUs without an assigned identifier contribute to no count. A GPU
/// claimed only via its backfill slot counts as claimed in its owning
/// real-slot category (and independently in its backfill category), never
/// as extra capacity.
pub fn compute_series(
    records: &[SlotRecord],
    bucket_minutes: u32,
    hosted: &HashSet<String>,
    host_pattern: Option<&str>,
) -> GpustatResult<BucketSeries> {
    if bucket_minutes == 0 {
        return Err(GpustatError::InvalidRange(
            "bucket width must be positive".to_string(),
        ));
    }

    let mut buckets: BTreeMap<DateTime<Utc>, Vec<&SlotRecord>> = BTreeMap::new();
    for record in records {
        buckets
            .entry(bucket_start(record.timestamp, bucket_minutes))
            .or_default()
            .push(record);
    }

    let mut rows = Vec::with_capacity(buckets.len());
    for (bucket, bucket_records) in buckets {
        let owned: Vec<SlotRecord> = bucket_records.iter().map(|r| (*r).clone()).collect();
        let mut categories = BTreeMap::new();

        for category in SlotCategory::ALL {
            let claimed = distinct_gpus(category_members(
                &owned,
                category,
                StateFilter::Claimed,
                hosted,
                host_pattern,
            ));
            let idle = distinct_gpus(category_members(
                &owned,
                category,
                StateFilter::Unclaimed,
                hosted,
                host_pattern,
            ));
            let total = claimed + idle;
            categories.insert(category, BucketStats::new(claimed, total));
        }

        rows.push(BucketRow {
            timestamp: bucket,
            categories,
        });
    }

    Ok(BucketSeries {
        bucket_minutes,
        rows,
    })
}

fn distinct_gpus(members: Vec<&SlotRecord>) -> u64 {
    let gpus: HashSet<(&str, &str)> = members.iter().filter_map(|r| r.gpu_key()).collect();
    gpus.len() as u64
}
