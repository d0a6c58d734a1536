//! CLI report implementations

use crate::RangeArgs;
use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use gpustat_core::{AnalysisConfig, SlotCategory, SlotRecord};
use gpustat_engine::{
    compute_series, group_totals, summarize, summarize_by_device, summarize_by_memory_tier,
    user_gpu_hours, CategorySummary, HostExclusionFilter,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

const END_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared report context: where the data lives and how to interpret it.
pub struct Context {
    data_dir: PathBuf,
    config: AnalysisConfig,
    json: bool,
}

impl Context {
    pub fn load(data_dir: PathBuf, config_path: Option<&Path>, json: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => AnalysisConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };
        Ok(Self {
            data_dir,
            config,
            json,
        })
    }

    /// Resolve the analysis range: explicit end time, or the newest
    /// snapshot on disk.
    fn resolve_range(&self, args: &RangeArgs) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let end = match &args.end_time {
            Some(raw) => {
                let naive = NaiveDateTime::parse_from_str(raw, END_TIME_FORMAT)
                    .with_context(|| format!("invalid --end-time {:?}", raw))?;
                Utc.from_utc_datetime(&naive)
            }
            None => gpustat_store::latest_timestamp(&self.data_dir)?.ok_or_else(|| {
                anyhow!(
                    "no snapshot partitions found in {}",
                    self.data_dir.display()
                )
            })?,
        };
        let start = end - Duration::hours(i64::from(args.hours_back));
        Ok((start, end))
    }

    /// Read the range from disk and apply the configured host exclusions.
    fn load_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SlotRecord>> {
        let records = gpustat_store::read_merged(&self.data_dir, start, end)?;
        let filter = HostExclusionFilter::compile(&self.config.excluded_hosts)?;
        let (kept, audit) = filter.apply(records);
        info!(
            total = audit.total_records,
            removed = audit.removed,
            "loaded snapshot records"
        );
        Ok(kept)
    }
}

/// Per-category allocation summary with real-slot and backfill totals.
pub fn summary(ctx: &Context, args: &RangeArgs) -> Result<()> {
    let (start, end) = ctx.resolve_range(args)?;
    let records = ctx.load_records(start, end)?;
    let series = compute_series(
        &records,
        args.bucket_minutes,
        &ctx.config.hosted_hosts,
        args.host.as_deref(),
    )?;
    let summary = summarize(&series, start, end)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "GPU allocation {} - {} ({} intervals of {} min)\n",
        start.format(END_TIME_FORMAT),
        end.format(END_TIME_FORMAT),
        series.num_intervals(),
        args.bucket_minutes
    );
    print_category_table(&summary.categories);

    let real = group_totals(&summary.categories, &SlotCategory::REAL_SLOT);
    let backfill = group_totals(&summary.categories, &SlotCategory::BACKFILL_SLOT);
    println!();
    print_totals_row("Real slots total", real.avg_claimed, real.avg_total_available, real.usage_percent);
    print_totals_row(
        "Backfill total",
        backfill.avg_claimed,
        backfill.avg_total_available,
        backfill.usage_percent,
    );
    Ok(())
}

/// Per-device summary, with cluster grand totals across devices.
pub fn devices(ctx: &Context, args: &RangeArgs, all_devices: bool) -> Result<()> {
    let (start, end) = ctx.resolve_range(args)?;
    let records = ctx.load_records(start, end)?;
    let report = summarize_by_device(
        &records,
        args.bucket_minutes,
        &ctx.config,
        &ctx.config.hosted_hosts,
        args.host.as_deref(),
        all_devices,
        start,
        end,
    )?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut cluster_claimed = 0.0;
    let mut cluster_total = 0.0;
    for (device, categories) in &report {
        println!("{}", device);
        print_category_table(categories);
        let real = group_totals(categories, &SlotCategory::REAL_SLOT);
        let backfill = group_totals(categories, &SlotCategory::BACKFILL_SLOT);
        cluster_claimed += real.avg_claimed + backfill.avg_claimed;
        cluster_total += real.avg_total_available + backfill.avg_total_available;
        println!();
    }

    let cluster_percent = if cluster_total > 0.0 {
        (cluster_claimed / cluster_total) * 100.0
    } else {
        0.0
    };
    print_totals_row("Cluster total", cluster_claimed, cluster_total, cluster_percent);
    Ok(())
}

/// Memory-tier summary over the real-slot categories.
pub fn tiers(ctx: &Context, args: &RangeArgs) -> Result<()> {
    let (start, end) = ctx.resolve_range(args)?;
    let records = ctx.load_records(start, end)?;
    let report = summarize_by_memory_tier(
        &records,
        args.bucket_minutes,
        &ctx.config,
        &ctx.config.hosted_hosts,
        args.host.as_deref(),
        start,
        end,
    )?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // Follow configured tier order instead of label sort order.
    for tier in ctx.config.memory_tiers.tier_order() {
        let Some(categories) = report.get(&tier) else {
            continue;
        };
        println!("{}", tier);
        print_category_table(categories);
        let real = group_totals(categories, &SlotCategory::REAL_SLOT);
        print_totals_row("Tier total", real.avg_claimed, real.avg_total_available, real.usage_percent);
        println!();
    }
    Ok(())
}

/// Per-bucket utilization rows.
pub fn timeseries(ctx: &Context, args: &RangeArgs) -> Result<()> {
    let (start, end) = ctx.resolve_range(args)?;
    let records = ctx.load_records(start, end)?;
    let series = compute_series(
        &records,
        args.bucket_minutes,
        &ctx.config.hosted_hosts,
        args.host.as_deref(),
    )?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&series)?);
        return Ok(());
    }

    for row in &series.rows {
        print!("{}", row.timestamp.format(END_TIME_FORMAT));
        for category in SlotCategory::ALL {
            if let Some(stats) = row.categories.get(&category) {
                print!("  {} {}/{}", category, stats.claimed, stats.total);
            }
        }
        println!();
    }
    Ok(())
}

/// Per-user GPU-hour breakdown, heaviest users first.
pub fn users(ctx: &Context, args: &RangeArgs) -> Result<()> {
    let (start, end) = ctx.resolve_range(args)?;
    let records = ctx.load_records(start, end)?;
    let report = user_gpu_hours(
        &records,
        args.bucket_minutes,
        &ctx.config.hosted_hosts,
        args.host.as_deref(),
    )?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut users: Vec<_> = report.iter().collect();
    users.sort_by(|a, b| {
        b.1.total_gpu_hours
            .partial_cmp(&a.1.total_gpu_hours)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for (user, hours) in users {
        println!("{:<24}{:>10.1} GPU-hours", user, hours.total_gpu_hours);
        for (category, breakdown) in &hours.slot_breakdown {
            println!(
                "    {:<34}{:>8.1}h  {:>5.1}%",
                category.display_name(),
                breakdown.gpu_hours,
                breakdown.percentage
            );
        }
    }
    Ok(())
}

fn print_category_table(categories: &BTreeMap<SlotCategory, CategorySummary>) {
    println!(
        "  {:<34}{:>12}{:>12}{:>10}",
        "Category", "Avg Claimed", "Avg Avail", "Usage"
    );
    for category in SlotCategory::ALL {
        let Some(summary) = categories.get(&category) else {
            continue;
        };
        println!(
            "  {:<34}{:>12.2}{:>12.2}{:>9.1}%",
            category.display_name(),
            summary.avg_claimed,
            summary.avg_total_available,
            summary.allocation_usage_percent
        );
    }
}

fn print_totals_row(label: &str, claimed: f64, total: f64, percent: f64) {
    println!("  {:<34}{:>12.2}{:>12.2}{:>9.1}%", label, claimed, total, percent);
}
