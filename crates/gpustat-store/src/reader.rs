//! Partition readers
//!
//! Read-only queries over the `gpu_state` table. Timestamps are stored as
//! `YYYY-MM-DD HH:MM:SS(.ffffff)` text; a row whose timestamp does not
//! parse aborts the whole query, since a broken clock poisons every count
//! downstream. An unreadable partition, by contrast, only costs the rows
//! it held and is skipped with a warning during merges.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use gpustat_core::{normalize_tag, GpustatError, GpustatResult, SlotRecord, SlotState};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const SELECT_RANGE: &str = "SELECT timestamp, Name, Machine, AssignedGPUs, State, \
     PrioritizedProjects, GPUs_DeviceName, RemoteOwner, GlobalJobId, GPUsAverageUsage \
     FROM gpu_state WHERE timestamp BETWEEN ?1 AND ?2 ORDER BY timestamp";

/// Read all snapshot rows in `[start, end]` from one partition.
pub fn read_range(
    path: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> GpustatResult<Vec<SlotRecord>> {
    let conn = open_read_only(path)?;
    let mut stmt = conn.prepare(SELECT_RANGE).map_err(storage)?;

    let rows = stmt
        .query_map(
            params![
                start.format(TIMESTAMP_FORMAT).to_string(),
                end.format(TIMESTAMP_FORMAT).to_string()
            ],
            RawRow::from_row,
        )
        .map_err(storage)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(storage)?.into_record()?);
    }
    Ok(records)
}

/// Read every partition the range touches and merge into one
/// time-ordered table.
pub fn read_merged(
    base_dir: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> GpustatResult<Vec<SlotRecord>> {
    if end < start {
        return Err(GpustatError::InvalidRange(format!(
            "end {} precedes start {}",
            end, start
        )));
    }

    let mut records = Vec::new();
    for path in crate::partition::partition_paths(base_dir, start, end) {
        match read_range(&path, start, end) {
            Ok(mut part) => {
                debug!(path = %path.display(), rows = part.len(), "read partition");
                records.append(&mut part);
            }
            Err(err @ GpustatError::MalformedRecord(_)) => return Err(err),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable partition");
            }
        }
    }

    records.sort_by_key(|r| r.timestamp);
    records.retain(|r| r.timestamp >= start && r.timestamp <= end);
    Ok(records)
}

/// Newest snapshot timestamp in one partition.
pub(crate) fn max_timestamp(path: &Path) -> GpustatResult<Option<DateTime<Utc>>> {
    let conn = open_read_only(path)?;
    let raw: Option<String> = conn
        .query_row("SELECT MAX(timestamp) FROM gpu_state", [], |row| row.get(0))
        .map_err(storage)?;
    raw.as_deref().map(parse_timestamp).transpose()
}

fn open_read_only(path: &Path) -> GpustatResult<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(storage)
}

fn storage(err: rusqlite::Error) -> GpustatError {
    GpustatError::Storage(err.to_string())
}

fn parse_timestamp(raw: &str) -> GpustatResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| GpustatError::MalformedRecord(format!("unparseable timestamp {:?}", raw)))
}

/// One `gpu_state` row as stored, before normalization.
struct RawRow {
    timestamp: String,
    name: Option<String>,
    machine: Option<String>,
    assigned_gpu: Option<String>,
    state: Option<String>,
    prioritized_projects: Option<String>,
    device_name: Option<String>,
    remote_owner: Option<String>,
    global_job_id: Option<String>,
    average_usage: Option<f64>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            timestamp: row.get(0)?,
            name: row.get(1)?,
            machine: row.get(2)?,
            assigned_gpu: row.get(3)?,
            state: row.get(4)?,
            prioritized_projects: row.get(5)?,
            device_name: row.get(6)?,
            remote_owner: row.get(7)?,
            global_job_id: row.get(8)?,
            average_usage: row.get(9)?,
        })
    }

    fn into_record(self) -> GpustatResult<SlotRecord> {
        Ok(SlotRecord {
            timestamp: parse_timestamp(&self.timestamp)?,
            slot_name: self.name.unwrap_or_default(),
            machine: self.machine.unwrap_or_default(),
            assigned_gpu: normalize_tag(self.assigned_gpu),
            state: SlotState::parse(self.state.as_deref().unwrap_or("")),
            prioritized_projects: normalize_tag(self.prioritized_projects),
            device_name: normalize_tag(self.device_name),
            remote_owner: normalize_tag(self.remote_owner),
            global_job_id: normalize_tag(self.global_job_id),
            average_usage_fraction: self.average_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    const CREATE_TABLE: &str = "CREATE TABLE gpu_state (
            timestamp TEXT, Name TEXT, Machine TEXT, AssignedGPUs TEXT,
            State TEXT, PrioritizedProjects TEXT, GPUs_DeviceName TEXT,
            RemoteOwner TEXT, GlobalJobId TEXT, GPUsAverageUsage REAL)";

    fn create_partition(dir: &Path, month: &str, rows: &[(&str, &str, &str, &str)]) {
        let conn = Connection::open(dir.join(format!("gpu_state_{}.db", month))).unwrap();
        conn.execute(CREATE_TABLE, []).unwrap();
        for (ts, name, machine, state) in rows {
            conn.execute(
                "INSERT INTO gpu_state (timestamp, Name, Machine, AssignedGPUs, State, \
                 PrioritizedProjects, GPUs_DeviceName, RemoteOwner, GlobalJobId, \
                 GPUsAverageUsage) VALUES (?1, ?2, ?3, 'GPU-A', ?4, '  ', 'A100', \
                 'alice', 'job#1', 0.5)",
                params![ts, name, machine, state],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_read_range_filters_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        create_partition(
            dir.path(),
            "2025-07",
            &[
                ("2025-07-01 10:00:00", "slot1@h1", "h1", "Claimed"),
                ("2025-07-01 10:05:00.123456", "slot2@h1", "h1", "Unclaimed"),
                ("2025-07-02 10:00:00", "slot1@h1", "h1", "Claimed"),
            ],
        );
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 23, 59, 59).unwrap();
        let records =
            read_range(&dir.path().join("gpu_state_2025-07.db"), start, end).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].state, SlotState::Claimed);
        // Whitespace-only project list normalizes to None.
        assert_eq!(records[0].prioritized_projects, None);
        assert_eq!(records[0].assigned_gpu.as_deref(), Some("GPU-A"));
        assert_eq!(records[1].timestamp.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn test_malformed_timestamp_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // Month 13 sorts inside the BETWEEN bounds but cannot parse.
        create_partition(
            dir.path(),
            "2025-07",
            &[("2025-13-01 10:00:00", "slot1@h1", "h1", "Claimed")],
        );
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let result = read_range(&dir.path().join("gpu_state_2025-07.db"), start, end);
        assert!(matches!(result, Err(GpustatError::MalformedRecord(_))));

        // The merge surfaces it too instead of skipping the partition.
        let merged = read_merged(dir.path(), start, end);
        assert!(matches!(merged, Err(GpustatError::MalformedRecord(_))));
    }

    #[test]
    fn test_read_merged_orders_across_partitions() {
        let dir = tempfile::tempdir().unwrap();
        create_partition(
            dir.path(),
            "2025-06",
            &[("2025-06-30 23:45:00", "slot1@h1", "h1", "Claimed")],
        );
        create_partition(
            dir.path(),
            "2025-07",
            &[("2025-07-01 00:15:00", "slot1@h1", "h1", "Unclaimed")],
        );
        let start = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let records = read_merged(dir.path(), start, end).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].timestamp < records[1].timestamp);
    }

    #[test]
    fn test_read_merged_rejects_inverted_range() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utc.with_ymd_and_hms(2025, 7, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            read_merged(dir.path(), start, end),
            Err(GpustatError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_read_merged_skips_unreadable_partition() {
        let dir = tempfile::tempdir().unwrap();
        create_partition(
            dir.path(),
            "2025-06",
            &[("2025-06-15 12:00:00", "slot1@h1", "h1", "Claimed")],
        );
        let mut garbage =
            std::fs::File::create(dir.path().join("gpu_state_2025-07.db")).unwrap();
        garbage.write_all(b"not a database").unwrap();

        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 31, 0, 0, 0).unwrap();
        let records = read_merged(dir.path(), start, end).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_latest_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        create_partition(
            dir.path(),
            "2025-07",
            &[
                ("2025-07-01 10:00:00", "slot1@h1", "h1", "Claimed"),
                ("2025-07-03 08:30:00", "slot1@h1", "h1", "Unclaimed"),
            ],
        );
        let latest = crate::partition::latest_timestamp(dir.path()).unwrap().unwrap();
        assert_eq!(latest, Utc.with_ymd_and_hms(2025, 7, 3, 8, 30, 0).unwrap());
    }
}
