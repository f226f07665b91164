//! Input data model for one audit run.
//!
//! Enumeration collaborators hand the core fully-structured snapshots; the
//! types here are immutable once built and carry everything the scorer,
//! drift detector, compliance evaluator, and remediation engine consume.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a tested permission belongs to the highlighted critical set or
/// the standard set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionCategory {
    Critical,
    Standard,
}

/// Outcome of testing a single permission against the credential.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PermissionResult {
    pub name: String,
    pub category: PermissionCategory,
    pub granted: bool,
    #[serde(default)]
    pub message: String,
    /// Free-form detail bag produced by the enumerator (endpoint tested,
    /// sample counts, ...). Opaque to the core.
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Aggregate counters over one permission test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PermissionSummary {
    pub total_tested: u32,
    pub granted: u32,
    pub critical_granted: u32,
}

/// All permission test results for one target at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PermissionSnapshot {
    /// Enterprise slug or organization name the run pertains to.
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<PermissionResult>,
    pub summary: PermissionSummary,
}

impl PermissionSnapshot {
    /// Builds a snapshot from raw results, deriving the aggregate counters.
    pub fn new(target: impl Into<String>, timestamp: DateTime<Utc>, results: Vec<PermissionResult>) -> Self {
        let summary = PermissionSummary {
            total_tested: results.len() as u32,
            granted: results.iter().filter(|r| r.granted).count() as u32,
            critical_granted: results
                .iter()
                .filter(|r| r.granted && r.category == PermissionCategory::Critical)
                .count() as u32,
        };
        Self { target: target.into(), timestamp, results, summary }
    }

    pub fn result(&self, name: &str) -> Option<&PermissionResult> {
        self.results.iter().find(|r| r.name == name)
    }

    /// Granted results whose name contains the given fragment
    /// (case-insensitive). Used by remediation and compliance conditions
    /// such as "admin-named" or "delete-named" permissions.
    pub fn granted_matching(&self, fragment: &str) -> Vec<&PermissionResult> {
        let fragment = fragment.to_lowercase();
        self.results
            .iter()
            .filter(|r| r.granted && r.name.to_lowercase().contains(&fragment))
            .collect()
    }
}

/// Per-resource-type counts and flags from the enumeration run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRecord {
    pub count: u64,
    /// Detail flags such as `has_secrets_exposed` / `has_public_access`.
    #[serde(default)]
    pub details: BTreeMap<String, bool>,
}

impl ResourceRecord {
    pub fn new(count: u64) -> Self {
        Self { count, details: BTreeMap::new() }
    }

    pub fn with_flag(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.details.insert(flag.into(), value);
        self
    }

    pub fn flag(&self, name: &str) -> bool {
        self.details.get(name).copied().unwrap_or(false)
    }
}

/// Resource inventory for one target: resource-type name (secrets,
/// webhooks, repositories, runners, ...) to count and detail flags.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResourceSnapshot {
    pub target: String,
    pub resources: BTreeMap<String, ResourceRecord>,
}

impl ResourceSnapshot {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into(), resources: BTreeMap::new() }
    }

    pub fn with_resource(mut self, name: impl Into<String>, record: ResourceRecord) -> Self {
        self.resources.insert(name.into(), record);
        self
    }

    pub fn count(&self, name: &str) -> u64 {
        self.resources.get(name).map(|r| r.count).unwrap_or(0)
    }
}

/// Network-exposure summary for self-hosted runners, reduced by the
/// runner enumerator before it reaches the core.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunnerExposureSummary {
    pub total_runners: u32,
    pub online_runners: u32,
    pub offline_runners: u32,
    pub exposed_ip_count: u32,
    pub exposed_hostname_count: u32,
    /// Online runners that leaked an IP or hostname through their labels.
    pub online_exposed_runners: u32,
    pub potential_ssh_targets: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn perm(name: &str, category: PermissionCategory, granted: bool) -> PermissionResult {
        PermissionResult {
            name: name.to_string(),
            category,
            granted,
            message: String::new(),
            details: BTreeMap::new(),
        }
    }

    #[test]
    fn summary_counters_derive_from_results() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let snap = PermissionSnapshot::new(
            "acme",
            ts,
            vec![
                perm("admin:org", PermissionCategory::Critical, true),
                perm("repo", PermissionCategory::Standard, true),
                perm("delete_repo", PermissionCategory::Critical, false),
            ],
        );
        assert_eq!(snap.summary.total_tested, 3);
        assert_eq!(snap.summary.granted, 2);
        assert_eq!(snap.summary.critical_granted, 1);
    }

    #[test]
    fn granted_matching_is_case_insensitive_and_skips_denied() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let snap = PermissionSnapshot::new(
            "acme",
            ts,
            vec![
                perm("admin:org", PermissionCategory::Critical, true),
                perm("Admin:enterprise", PermissionCategory::Critical, true),
                perm("admin:repo_hook", PermissionCategory::Critical, false),
            ],
        );
        assert_eq!(snap.granted_matching("admin").len(), 2);
    }

    #[test]
    fn resource_flags_default_false() {
        let snap = ResourceSnapshot::new("acme")
            .with_resource("secrets", ResourceRecord::new(5).with_flag("has_secrets_exposed", true));
        assert!(snap.resources["secrets"].flag("has_secrets_exposed"));
        assert!(!snap.resources["secrets"].flag("has_public_access"));
        assert_eq!(snap.count("webhooks"), 0);
    }
}
