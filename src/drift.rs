//! Permission drift detection.
//!
//! Diffs the current permission snapshot against the most recent persisted
//! one for the same target, then appends the current snapshot to the
//! history. Store failures degrade: an unreadable history means a baseline
//! run, a failed append skips persistence; neither aborts the run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    risk::RiskWeights,
    snapshot::{PermissionCategory, PermissionSnapshot},
    store::SnapshotStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GrantStatus {
    Granted,
    Denied,
}

impl From<bool> for GrantStatus {
    fn from(granted: bool) -> Self {
        if granted {
            GrantStatus::Granted
        } else {
            GrantStatus::Denied
        }
    }
}

/// A permission whose granted status flipped between two runs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PermissionChange {
    pub permission: String,
    pub previous_status: GrantStatus,
    pub current_status: GrantStatus,
    pub severity: DriftSeverity,
}

/// Drift results for one run against one target.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DriftReport {
    pub has_changes: bool,
    /// Number of individual permission flips. Summary deltas are reported
    /// separately and do not count as discrete changes.
    pub change_count: u32,
    pub changes: Vec<PermissionChange>,
    pub critical_changes: Vec<PermissionChange>,
    pub high_changes: Vec<PermissionChange>,
    /// Signed deltas (current - previous) for the aggregate counters;
    /// zero deltas are omitted. A net-zero permission change with
    /// offsetting adds and removes still shows up here.
    pub summary_changes: BTreeMap<String, i64>,
    /// Absent on the first run for a target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_snapshot_timestamp: Option<DateTime<Utc>>,
}

impl DriftReport {
    fn baseline() -> Self {
        Self {
            has_changes: false,
            change_count: 0,
            changes: Vec::new(),
            critical_changes: Vec::new(),
            high_changes: Vec::new(),
            summary_changes: BTreeMap::new(),
            previous_snapshot_timestamp: None,
        }
    }
}

/// Behavior knobs for drift classification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DriftConfig {
    /// Severity assigned to a permission that flipped from granted to
    /// denied. Loss of access is not itself a risk, so the default is
    /// Low; operators who treat revocation of monitoring access as an
    /// incident can raise it.
    pub revocation_severity: DriftSeverity,
    /// Standard-category grants at or above this base weight classify as
    /// High rather than Medium.
    pub high_weight_threshold: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self { revocation_severity: DriftSeverity::Low, high_weight_threshold: 60.0 }
    }
}

pub struct DriftDetector<'a> {
    config: DriftConfig,
    weights: &'a RiskWeights,
}

impl<'a> DriftDetector<'a> {
    pub fn new(weights: &'a RiskWeights) -> Self {
        Self { config: DriftConfig::default(), weights }
    }

    pub fn with_config(weights: &'a RiskWeights, config: DriftConfig) -> Self {
        Self { config, weights }
    }

    /// Diffs the current snapshot against the latest persisted one for the
    /// same target, then persists the current snapshot as the newest
    /// history entry.
    pub fn detect(
        &self,
        store: &mut dyn SnapshotStore,
        current: &PermissionSnapshot,
    ) -> DriftReport {
        let previous = match store.latest(&current.target) {
            Ok(previous) => previous,
            Err(err) => {
                warn!("Snapshot history unreadable for {}; treating run as baseline: {err}", current.target);
                None
            }
        };

        let report = match previous {
            Some(previous) => self.compare(current, &previous),
            None => DriftReport::baseline(),
        };

        if let Err(err) = store.append(current) {
            warn!("Skipping snapshot persistence for {}: {err}", current.target);
        }
        report
    }

    /// Pure diff of two snapshots; exposed for callers that manage the
    /// store themselves.
    pub fn compare(&self, current: &PermissionSnapshot, previous: &PermissionSnapshot) -> DriftReport {
        let mut changes = Vec::new();
        for result in &current.results {
            let Some(prior) = previous.result(&result.name) else {
                continue;
            };
            if prior.granted == result.granted {
                continue;
            }
            let severity = if result.granted {
                self.grant_severity(&result.name, result.category)
            } else {
                self.config.revocation_severity
            };
            changes.push(PermissionChange {
                permission: result.name.clone(),
                previous_status: prior.granted.into(),
                current_status: result.granted.into(),
                severity,
            });
        }

        let mut summary_changes = BTreeMap::new();
        let deltas = [
            ("total_tested", current.summary.total_tested as i64 - previous.summary.total_tested as i64),
            ("granted", current.summary.granted as i64 - previous.summary.granted as i64),
            (
                "critical_granted",
                current.summary.critical_granted as i64 - previous.summary.critical_granted as i64,
            ),
        ];
        for (counter, delta) in deltas {
            if delta != 0 {
                summary_changes.insert(counter.to_string(), delta);
            }
        }

        let filtered = |severity: DriftSeverity| -> Vec<PermissionChange> {
            changes.iter().filter(|c| c.severity == severity).cloned().collect()
        };

        DriftReport {
            has_changes: !changes.is_empty(),
            change_count: changes.len() as u32,
            critical_changes: filtered(DriftSeverity::Critical),
            high_changes: filtered(DriftSeverity::High),
            changes,
            summary_changes,
            previous_snapshot_timestamp: Some(previous.timestamp),
        }
    }

    fn grant_severity(&self, name: &str, category: PermissionCategory) -> DriftSeverity {
        match category {
            PermissionCategory::Critical => DriftSeverity::Critical,
            PermissionCategory::Standard => {
                if self.weights.permission_weight(name) >= self.config.high_weight_threshold {
                    DriftSeverity::High
                } else {
                    DriftSeverity::Medium
                }
            }
        }
    }
}
