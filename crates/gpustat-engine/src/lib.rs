//! gpustat-engine: classification and aggregation over slot snapshots
//!
//! The pipeline runs strictly downward:
//! raw rows -> host-filtered rows -> per-timestamp deduplicated rows ->
//! category membership -> per-bucket counts -> range-level averages.
//!
//! Everything here is a pure, synchronous computation over an in-memory
//! table; the only shared state is the read-only configuration passed in.

pub mod aggregate;
pub mod dedup;
pub mod filter;
pub mod hours;
pub mod membership;
pub mod summary;

pub use aggregate::{compute_series, BucketRow, BucketSeries, BucketStats};
pub use dedup::{dedup_primary_view, slot_rank};
pub use filter::{FilterAudit, HostExclusionFilter};
pub use hours::{user_gpu_hours, CategoryHours, UserHours};
pub use membership::{category_members, StateFilter};
pub use summary::{
    group_totals, summarize, summarize_by_device, summarize_by_memory_tier, CategorySummary,
    GroupTotals, UsageSummary,
};
