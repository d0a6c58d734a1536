//! Host exclusion filter
//!
//! Removes records for administratively-excluded hosts before any
//! deduplication or classification, so excluded machines never influence
//! counts. Runs exactly once per analysis.

use gpustat_core::{GpustatError, GpustatResult, HostExclusion, SlotRecord};
use regex::RegexSetBuilder;
use tracing::{debug, info};

/// Per-rule audit information from one filter pass.
#[derive(Debug, Clone)]
pub struct FilterAudit {
    /// Records seen before filtering
    pub total_records: usize,
    /// Records removed
    pub removed: usize,
    /// (pattern, reason, records removed) per configured rule
    pub per_rule: Vec<(String, String, usize)>,
}

/// Compiled host exclusion rules.
pub struct HostExclusionFilter {
    rules: Vec<HostExclusion>,
    patterns: regex::RegexSet,
}

impl HostExclusionFilter {
    /// Compile the configured exclusion rules. Patterns match the machine
    /// name case-insensitively.
    pub fn compile(rules: &[HostExclusion]) -> GpustatResult<Self> {
        let patterns = RegexSetBuilder::new(rules.iter().map(|r| r.pattern.as_str()))
            .case_insensitive(true)
            .build()
            .map_err(|e| GpustatError::Config(format!("bad host exclusion pattern: {}", e)))?;

        Ok(Self {
            rules: rules.to_vec(),
            patterns,
        })
    }

    /// Whether a machine matches any exclusion rule.
    pub fn is_excluded(&self, machine: &str) -> bool {
        self.patterns.is_match(machine)
    }

    /// Drop records for excluded machines, reporting what was removed.
    pub fn apply(&self, records: Vec<SlotRecord>) -> (Vec<SlotRecord>, FilterAudit) {
        let total_records = records.len();
        let mut per_rule_hits = vec![0usize; self.rules.len()];

        let kept: Vec<SlotRecord> = records
            .into_iter()
            .filter(|record| {
                let matches = self.patterns.matches(&record.machine);
                if !matches.matched_any() {
                    return true;
                }
                for idx in matches.iter() {
                    per_rule_hits[idx] += 1;
                }
                false
            })
            .collect();

        let removed = total_records - kept.len();
        let per_rule: Vec<(String, String, usize)> = self
            .rules
            .iter()
            .zip(per_rule_hits)
            .map(|(rule, hits)| (rule.pattern.clone(), rule.reason.clone(), hits))
            .collect();

        if removed > 0 {
            info!(total = total_records, removed = removed, "Excluded host records");
            for (pattern, reason, hits) in &per_rule {
                if *hits > 0 {
                    debug!(pattern = %pattern, reason = %reason, records = hits, "Exclusion rule hit");
                }
            }
        }

        (
            kept,
            FilterAudit {
                total_records,
                removed,
                per_rule,
            },
        )
    }
}
