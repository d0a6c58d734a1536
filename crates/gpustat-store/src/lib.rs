//! Snapshot storage for gpustat
//!
//! Scheduler snapshots live in monthly SQLite partitions named
//! `gpu_state_YYYY-MM.db`, each holding one `gpu_state` table. This crate
//! locates the partitions a time range touches and reads them back into
//! normalized slot records. All access is read-only.

pub mod partition;
pub mod reader;

pub use partition::{latest_timestamp, most_recent_partition, partition_paths};
pub use reader::{read_merged, read_range};
