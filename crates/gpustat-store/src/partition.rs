//! Partition discovery
//!
//! Walks the months a query range touches and resolves them to existing
//! partition files. Missing months are normal (collection gaps, the
//! current month before its first snapshot) and are skipped quietly.

use crate::reader;
use chrono::{DateTime, Datelike, Utc};
use gpustat_core::GpustatResult;
use std::path::{Path, PathBuf};
use tracing::debug;

const PARTITION_PREFIX: &str = "gpu_state_";
const PARTITION_SUFFIX: &str = ".db";

/// File name of the partition covering the given month.
pub fn partition_name(year: i32, month: u32) -> String {
    format!("{}{:04}-{:02}{}", PARTITION_PREFIX, year, month, PARTITION_SUFFIX)
}

/// Existing partition files for every month the range touches, in
/// chronological order.
pub fn partition_paths(
    base_dir: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    let stop = (end.year(), end.month());

    while (year, month) <= stop {
        let path = base_dir.join(partition_name(year, month));
        if path.exists() {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "no partition for month");
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    paths
}

/// The newest partition file in the data directory, by month.
pub fn most_recent_partition(base_dir: &Path) -> GpustatResult<Option<PathBuf>> {
    let mut newest: Option<(String, PathBuf)> = None;
    for entry in std::fs::read_dir(base_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_partition_name(&name) {
            continue;
        }
        // Zero-padded YYYY-MM sorts chronologically as text.
        match &newest {
            Some((best, _)) if *best >= name => {}
            _ => newest = Some((name, entry.path())),
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Timestamp of the newest snapshot on disk, from the newest partition.
pub fn latest_timestamp(base_dir: &Path) -> GpustatResult<Option<DateTime<Utc>>> {
    let Some(path) = most_recent_partition(base_dir)? else {
        return Ok(None);
    };
    reader::max_timestamp(&path)
}

fn is_partition_name(name: &str) -> bool {
    let Some(stem) = name
        .strip_prefix(PARTITION_PREFIX)
        .and_then(|rest| rest.strip_suffix(PARTITION_SUFFIX))
    else {
        return false;
    };
    let bytes = stem.as_bytes();
    bytes.len() == 7
        && bytes[4] == b'-'
        && stem
            .bytes()
            .enumerate()
            .all(|(i, b)| i == 4 || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::File;

    #[test]
    fn test_partition_name() {
        assert_eq!(partition_name(2025, 7), "gpu_state_2025-07.db");
    }

    #[test]
    fn test_is_partition_name() {
        assert!(is_partition_name("gpu_state_2025-07.db"));
        assert!(!is_partition_name("gpu_state_2025-07.db-journal"));
        assert!(!is_partition_name("gpu_state_backup.db"));
        assert!(!is_partition_name("notes.txt"));
    }

    #[test]
    fn test_partition_paths_walk_year_boundary() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["gpu_state_2024-11.db", "gpu_state_2025-01.db"] {
            File::create(dir.path().join(name)).unwrap();
        }
        // 2024-12 is in range but absent on disk.
        let start = Utc.with_ymd_and_hms(2024, 11, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let paths = partition_paths(dir.path(), start, end);
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["gpu_state_2024-11.db", "gpu_state_2025-01.db"]);
    }

    #[test]
    fn test_most_recent_partition() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "gpu_state_2025-06.db",
            "gpu_state_2025-07.db",
            "gpu_state_2024-12.db",
            "readme.txt",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }
        let newest = most_recent_partition(dir.path()).unwrap().unwrap();
        assert_eq!(newest.file_name().unwrap(), "gpu_state_2025-07.db");
    }

    #[test]
    fn test_most_recent_partition_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(most_recent_partition(dir.path()).unwrap().is_none());
    }
}
