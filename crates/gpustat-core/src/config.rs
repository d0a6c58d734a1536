//! Analysis configuration
//!
//! All classification inputs that live outside the snapshot data: excluded
//! hosts, the hosted-capacity host set, device display names, device memory
//! sizes, and memory-tier breakpoints. Loaded once and held read-only for
//! the life of the process; never reloaded mid-query.

use crate::error::{GpustatError, GpustatResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A host exclusion rule: records whose machine matches `pattern`
/// (case-insensitive regex) are dropped before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostExclusion {
    /// Regex matched against the machine name
    pub pattern: String,
    /// Why the host is excluded, for audit reporting
    pub reason: String,
}

/// Memory-tier breakpoints in GB for the per-tier report grouping.
///
/// `breaks_gb = [48, 80]` yields the tiers `<48GB`, `48GB`, `80GB` and
/// `>80GB`. The exact thresholds are a report detail, not an invariant,
/// but stay fixed within one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTierConfig {
    pub breaks_gb: Vec<u32>,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self {
            breaks_gb: vec![48, 80],
        }
    }
}

impl MemoryTierConfig {
    /// Label for the tier a GPU with the given memory capacity falls into.
    pub fn tier_label(&self, memory_mb: u64) -> String {
        let gb = ((memory_mb as f64) / 1024.0).round() as u32;
        match self.breaks_gb.as_slice() {
            [] => format!("{}GB", gb),
            [first, ..] if gb < *first => format!("<{}GB", first),
            breaks => {
                for window in breaks.windows(2) {
                    if gb < window[1] {
                        return format!("{}GB", window[0]);
                    }
                }
                match breaks.last() {
                    Some(&last) if gb > last => format!(">{}GB", last),
                    Some(&last) => format!("{}GB", last),
                    None => format!("{}GB", gb),
                }
            }
        }
    }

    /// All tier labels in ascending order, for stable report layout.
    pub fn tier_order(&self) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.breaks_gb.len() + 2);
        if let Some(first) = self.breaks_gb.first() {
            labels.push(format!("<{}GB", first));
        }
        for b in &self.breaks_gb {
            labels.push(format!("{}GB", b));
        }
        if let Some(last) = self.breaks_gb.last() {
            labels.push(format!(">{}GB", last));
        }
        labels
    }
}

/// Full analysis configuration, loadable from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hosts removed from every analysis, with reasons
    pub excluded_hosts: Vec<HostExclusion>,
    /// Hosted-capacity (CHTC-owned) hostnames, exact match
    pub hosted_hosts: HashSet<String>,
    /// Optional plain-text file of hosted hostnames, one per line,
    /// merged into `hosted_hosts` at load time
    pub hosted_hosts_file: Option<String>,
    /// Technical device name to human-readable display name
    pub device_names: HashMap<String, String>,
    /// Technical device name to memory capacity in MB, for tier grouping
    pub device_memory_mb: HashMap<String, u64>,
    /// Memory-tier breakpoints
    pub memory_tiers: MemoryTierConfig,
    /// Older/uncommon device models hidden from device reports by default
    pub legacy_devices: Vec<String>,
}

impl AnalysisConfig {
    /// Load configuration from a TOML file, then merge the hosted-hosts
    /// file if one is configured.
    pub fn from_file(path: &Path) -> GpustatResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GpustatError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config: AnalysisConfig = toml::from_str(&content)?;

        if let Some(hosts_file) = config.hosted_hosts_file.clone() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let hosts = load_hosted_hosts(&base.join(&hosts_file))?;
            config.hosted_hosts.extend(hosts);
        }

        Ok(config)
    }

    /// Human-readable name for a device, falling back to the raw name.
    pub fn display_device_name<'a>(&'a self, device: &'a str) -> &'a str {
        self.device_names
            .get(device)
            .map(String::as_str)
            .unwrap_or(device)
    }

    /// Whether a device model is hidden from the default device report.
    pub fn is_legacy_device(&self, device: &str) -> bool {
        self.legacy_devices.iter().any(|old| device.contains(old))
    }
}

/// Load a plain-text hosted-capacity host list, one hostname per line.
/// Blank lines and `#` comments are skipped.
pub fn load_hosted_hosts(path: &Path) -> GpustatResult<HashSet<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GpustatError::Config(format!(
            "failed to read hosted hosts file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}
