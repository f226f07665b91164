//! Consolidated audit pipeline.
//!
//! Runs the scorer, drift detector, compliance evaluator, and remediation
//! engine over whatever inputs the enumeration collaborators produced and
//! assembles the report consumed by the external renderer. Absent inputs
//! yield empty sections, never errors.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    compliance::{ComplianceInputs, ComplianceReport, FrameworkRegistry},
    drift::{DriftConfig, DriftDetector, DriftReport},
    remediation::{self, RemediationInputs, RemediationReport},
    risk::{
        OverallRisk, PermissionAssessment, ResourceAssessment, RiskScorer, RiskWeights,
        ScoreContext,
    },
    snapshot::{PermissionSnapshot, ResourceSnapshot, RunnerExposureSummary},
    store::SnapshotStore,
};

/// Everything one enumeration run handed to the core. Each section is
/// optional; the report covers whatever is present.
#[derive(Clone, Copy, Default)]
pub struct AuditInputs<'a> {
    pub permissions: Option<&'a PermissionSnapshot>,
    pub resources: Option<&'a ResourceSnapshot>,
    pub runners: Option<&'a RunnerExposureSummary>,
    pub context: ScoreContext,
}

/// The full judgment output for one run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuditReport {
    pub target: String,
    /// Timestamp of the permission snapshot the run was built from, when
    /// one was present. The core introduces no clock of its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub overall_risk: OverallRisk,
    pub permission_assessment: PermissionAssessment,
    pub resource_assessment: ResourceAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftReport>,
    pub compliance: ComplianceReport,
    pub remediation: RemediationReport,
}

pub struct Auditor<'a> {
    weights: &'a RiskWeights,
    registry: &'a FrameworkRegistry,
    drift_config: DriftConfig,
}

impl<'a> Auditor<'a> {
    pub fn new(weights: &'a RiskWeights, registry: &'a FrameworkRegistry) -> Self {
        Self { weights, registry, drift_config: DriftConfig::default() }
    }

    pub fn drift_config(mut self, config: DriftConfig) -> Self {
        self.drift_config = config;
        self
    }

    /// Runs the full pipeline. Drift detection requires both a permission
    /// snapshot and a store; otherwise the drift section is absent.
    pub fn run(
        &self,
        inputs: AuditInputs<'_>,
        store: Option<&mut dyn SnapshotStore>,
    ) -> AuditReport {
        let target = inputs
            .permissions
            .map(|s| s.target.clone())
            .or_else(|| inputs.resources.map(|s| s.target.clone()))
            .unwrap_or_default();
        debug!("Running audit pipeline for {target:?}");

        let scorer = RiskScorer::new(self.weights);
        let permission_assessment = scorer.assess_permissions(inputs.permissions, &inputs.context);
        let resource_assessment = scorer.assess_resources(inputs.resources);
        let overall_risk = scorer.overall(&permission_assessment, &resource_assessment);

        let drift = match (inputs.permissions, store) {
            (Some(current), Some(store)) => {
                let detector =
                    DriftDetector::with_config(self.weights, self.drift_config.clone());
                Some(detector.detect(store, current))
            }
            _ => None,
        };

        let compliance = self.registry.evaluate(ComplianceInputs {
            permissions: inputs.permissions,
            resources: inputs.resources,
        });

        let remediation = remediation::generate(RemediationInputs {
            permissions: inputs.permissions,
            resources: inputs.resources,
            compliance: Some(&compliance),
            drift: drift.as_ref(),
            runners: inputs.runners,
            overall_risk: Some(&overall_risk),
        });

        AuditReport {
            target,
            generated_at: inputs.permissions.map(|s| s.timestamp),
            overall_risk,
            permission_assessment,
            resource_assessment,
            drift,
            compliance,
            remediation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{PermissionCategory, PermissionResult};
    use crate::store::MemorySnapshotStore;
    use chrono::TimeZone;

    fn perm(name: &str, granted: bool) -> PermissionResult {
        PermissionResult {
            name: name.to_string(),
            category: PermissionCategory::Standard,
            granted,
            message: String::new(),
            details: Default::default(),
        }
    }

    #[test]
    fn empty_inputs_produce_an_empty_report() {
        let weights = RiskWeights::default();
        let registry = FrameworkRegistry::builtin();
        let auditor = Auditor::new(&weights, &registry);
        let report = auditor.run(AuditInputs::default(), None);

        assert!(report.target.is_empty());
        assert!(report.generated_at.is_none());
        assert_eq!(report.overall_risk.overall_risk_score, 0.0);
        assert!(report.drift.is_none());
        assert!(report.compliance.overall_compliant);
        assert_eq!(report.remediation.summary.total, 0);
    }

    #[test]
    fn report_carries_the_snapshot_timestamp() {
        let weights = RiskWeights::default();
        let registry = FrameworkRegistry::builtin();
        let auditor = Auditor::new(&weights, &registry);
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let snapshot = PermissionSnapshot::new("acme", ts, vec![perm("read:org", true)]);

        let mut store = MemorySnapshotStore::new();
        let report = auditor.run(
            AuditInputs { permissions: Some(&snapshot), ..Default::default() },
            Some(&mut store),
        );
        assert_eq!(report.target, "acme");
        assert_eq!(report.generated_at, Some(ts));
        assert!(report.drift.is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn drift_section_absent_without_store() {
        let weights = RiskWeights::default();
        let registry = FrameworkRegistry::builtin();
        let auditor = Auditor::new(&weights, &registry);
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let snapshot = PermissionSnapshot::new("acme", ts, vec![perm("read:org", true)]);

        let report =
            auditor.run(AuditInputs { permissions: Some(&snapshot), ..Default::default() }, None);
        assert!(report.drift.is_none());
    }

    #[test]
    fn report_serializes_to_json() {
        let weights = RiskWeights::default();
        let registry = FrameworkRegistry::builtin();
        let auditor = Auditor::new(&weights, &registry);
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let snapshot = PermissionSnapshot::new("acme", ts, vec![perm("admin:org", true)]);

        let report =
            auditor.run(AuditInputs { permissions: Some(&snapshot), ..Default::default() }, None);
        let value = serde_json::to_value(&report).expect("report serializes");
        assert_eq!(value["target"], "acme");
        assert_eq!(value["overall_risk"]["risk_level"], "medium");
        assert!(value["drift"].is_null());
    }
}
