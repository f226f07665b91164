//! Drift detection against the file-backed snapshot history.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use scopehawk::{
    compliance::FrameworkRegistry,
    drift::{DriftSeverity, GrantStatus},
    snapshot::{PermissionCategory, PermissionResult, PermissionSnapshot},
    AuditInputs, Auditor, FileSnapshotStore, RiskWeights, SnapshotStore,
};
use tempfile::TempDir;

fn perm(name: &str, category: PermissionCategory, granted: bool) -> PermissionResult {
    PermissionResult {
        name: name.to_string(),
        category,
        granted,
        message: String::new(),
        details: BTreeMap::new(),
    }
}

fn snapshot(hour: u32, results: Vec<PermissionResult>) -> PermissionSnapshot {
    PermissionSnapshot::new(
        "acme",
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
        results,
    )
}

#[test]
fn enterprise_admin_grant_between_runs_is_flagged_critical() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let weights = RiskWeights::default();
    let registry = FrameworkRegistry::builtin();
    let auditor = Auditor::new(&weights, &registry);
    let mut store = FileSnapshotStore::new(tmp.path());

    // Run 1: admin:enterprise denied. Baseline, no drift.
    let run1 = snapshot(
        8,
        vec![
            perm("admin:enterprise", PermissionCategory::Critical, false),
            perm("read:org", PermissionCategory::Standard, true),
        ],
    );
    let report = auditor.run(
        AuditInputs { permissions: Some(&run1), ..Default::default() },
        Some(&mut store),
    );
    let drift = report.drift.expect("drift section present");
    assert!(!drift.has_changes);
    assert!(drift.previous_snapshot_timestamp.is_none());

    // Run 2: admin:enterprise flips to granted.
    let run2 = snapshot(
        14,
        vec![
            perm("admin:enterprise", PermissionCategory::Critical, true),
            perm("read:org", PermissionCategory::Standard, true),
        ],
    );
    let report = auditor.run(
        AuditInputs { permissions: Some(&run2), ..Default::default() },
        Some(&mut store),
    );
    let drift = report.drift.expect("drift section present");

    assert!(drift.has_changes);
    assert_eq!(drift.change_count, 1);
    assert_eq!(drift.critical_changes.len(), 1);
    let change = &drift.changes[0];
    assert_eq!(change.permission, "admin:enterprise");
    assert_eq!(change.previous_status, GrantStatus::Denied);
    assert_eq!(change.current_status, GrantStatus::Granted);
    assert_eq!(change.severity, DriftSeverity::Critical);
    assert_eq!(drift.summary_changes.get("granted"), Some(&1));
    assert_eq!(drift.summary_changes.get("critical_granted"), Some(&1));

    // The critical change escalates into a remediation item.
    assert!(report.remediation.critical.iter().any(|i| i.id == "drift-001"));
    Ok(())
}

#[test]
fn rerunning_an_identical_snapshot_reports_no_drift() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let weights = RiskWeights::default();
    let registry = FrameworkRegistry::builtin();
    let auditor = Auditor::new(&weights, &registry);
    let mut store = FileSnapshotStore::new(tmp.path());

    let results = vec![
        perm("repo", PermissionCategory::Critical, true),
        perm("gist", PermissionCategory::Standard, false),
    ];
    auditor.run(
        AuditInputs { permissions: Some(&snapshot(8, results.clone())), ..Default::default() },
        Some(&mut store),
    );
    let report = auditor.run(
        AuditInputs { permissions: Some(&snapshot(9, results)), ..Default::default() },
        Some(&mut store),
    );

    let drift = report.drift.expect("drift section present");
    assert!(!drift.has_changes);
    assert_eq!(drift.change_count, 0);
    assert!(drift.summary_changes.is_empty());
    assert_eq!(
        drift.previous_snapshot_timestamp,
        Some(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap())
    );
    Ok(())
}

#[test]
fn history_keeps_every_run_and_targets_stay_isolated() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let weights = RiskWeights::default();
    let registry = FrameworkRegistry::builtin();
    let auditor = Auditor::new(&weights, &registry);
    let mut store = FileSnapshotStore::new(tmp.path());

    for hour in [8, 10, 12] {
        auditor.run(
            AuditInputs {
                permissions: Some(&snapshot(hour, vec![perm(
                    "repo",
                    PermissionCategory::Critical,
                    hour > 9,
                )])),
                ..Default::default()
            },
            Some(&mut store),
        );
    }

    // Three runs, three entries, latest wins.
    assert_eq!(std::fs::read_dir(tmp.path())?.count(), 3);
    let latest = store.latest("acme")?.expect("history present");
    assert_eq!(latest.timestamp.format("%H").to_string(), "12");

    // A different target never sees acme's history.
    assert!(store.latest("globex")?.is_none());
    Ok(())
}
