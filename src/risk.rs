//! Risk scoring and prioritization.
//!
//! Converts permission and resource snapshots into per-item findings and an
//! overall weighted score. The weight tables are immutable configuration
//! built once and passed by reference into the scorer; classification is a
//! pure function of the score.

use std::{cmp::Ordering, collections::BTreeMap};

use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::snapshot::{PermissionSnapshot, ResourceRecord, ResourceSnapshot};

/// Risk classification for a finding or a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl PartialOrd for RiskLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RiskLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(level: RiskLevel) -> u8 {
            match level {
                RiskLevel::Info => 0,
                RiskLevel::Low => 1,
                RiskLevel::Medium => 2,
                RiskLevel::High => 3,
                RiskLevel::Critical => 4,
            }
        }
        rank(*self).cmp(&rank(*other))
    }
}

/// Fixed multiplicative factors applied on top of base weights.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RiskMultipliers {
    pub private_repo_access: f64,
    pub public_repo_access: f64,
    pub write_access: f64,
    pub admin_access: f64,
    pub secrets_exposed: f64,
}

impl Default for RiskMultipliers {
    fn default() -> Self {
        Self {
            private_repo_access: 1.5,
            public_repo_access: 1.2,
            write_access: 1.3,
            admin_access: 1.5,
            secrets_exposed: 2.0,
        }
    }
}

/// Base weight tables for permission names and resource types.
///
/// Built once at startup and shared by reference; names absent from a
/// table score the default weight of 50.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RiskWeights {
    pub permissions: BTreeMap<String, f64>,
    pub resources: BTreeMap<String, f64>,
    pub multipliers: RiskMultipliers,
    pub default_weight: f64,
}

/// Built-in weight tables, constructed once and cloned into defaults.
static DEFAULT_WEIGHTS: Lazy<RiskWeights> = Lazy::new(|| {
    let permissions = [
        ("admin:org", 100.0),
        ("admin:enterprise", 100.0),
        ("admin:repo", 90.0),
        ("admin:public_key", 85.0),
        ("admin:gpg_key", 85.0),
        ("admin:org_hook", 80.0),
        ("admin:repo_hook", 75.0),
        ("repo", 70.0),
        ("workflow", 70.0),
        ("write:packages", 65.0),
        ("read:packages", 40.0),
        ("delete:packages", 80.0),
        ("write:org", 75.0),
        ("read:org", 30.0),
        ("user:email", 20.0),
        ("user:follow", 10.0),
        ("read:user", 15.0),
    ];
    let resources = [
        ("secrets", 90.0),
        ("runners", 85.0),
        ("codespaces", 80.0),
        ("deploy_keys", 75.0),
        ("webhooks", 70.0),
        ("organizations", 70.0),
        ("actions", 70.0),
        ("environments", 65.0),
        ("packages", 60.0),
        ("collaborators", 60.0),
        ("audit_logs", 55.0),
        ("repositories", 50.0),
    ];
    RiskWeights {
        permissions: permissions.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        resources: resources.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        multipliers: RiskMultipliers::default(),
        default_weight: 50.0,
    }
});

impl Default for RiskWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS.clone()
    }
}

impl RiskWeights {
    pub fn permission_weight(&self, name: &str) -> f64 {
        self.permissions.get(name).copied().unwrap_or(self.default_weight)
    }

    pub fn resource_weight(&self, name: &str) -> f64 {
        self.resources.get(name).copied().unwrap_or(self.default_weight)
    }
}

/// Repository-visibility context flags for permission scoring.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScoreContext {
    pub is_private_repo: bool,
    pub is_public_repo: bool,
}

/// A scored, classified risk item: one per permission tested or resource
/// type enumerated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RiskFinding {
    /// Permission name or resource-type name.
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// 1 = Critical ... 5 = Info; 0 for denied permissions and zero-count
    /// resources, which never contribute risk.
    pub priority: u8,
    pub reasoning: String,
}

impl RiskFinding {
    fn contributes(&self) -> bool {
        self.priority > 0
    }
}

/// Permission-side assessment for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PermissionAssessment {
    pub findings: Vec<RiskFinding>,
    pub total_risk_score: f64,
    pub critical_count: u32,
    pub high_count: u32,
    pub medium_count: u32,
    pub low_count: u32,
    pub top_risks: Vec<RiskFinding>,
}

/// Resource-side assessment for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResourceAssessment {
    pub findings: Vec<RiskFinding>,
    pub total_risk_score: f64,
    pub top_risks: Vec<RiskFinding>,
}

/// Weighted combination of both assessments.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OverallRisk {
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    pub permissions_risk: f64,
    pub resources_risk: f64,
    pub critical_findings: u32,
    pub high_findings: u32,
}

/// Number of findings surfaced in each `top_risks` view.
const TOP_RISKS: usize = 10;

/// Saturation point for the logarithmic resource count factor.
const COUNT_FACTOR_CAP: f64 = 50.0;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sort_findings(findings: &mut [RiskFinding]) {
    findings.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.risk_score.partial_cmp(&a.risk_score).unwrap_or(Ordering::Equal))
    });
}

fn top_risks(findings: &[RiskFinding]) -> Vec<RiskFinding> {
    findings.iter().filter(|f| f.contributes()).take(TOP_RISKS).cloned().collect()
}

pub struct RiskScorer<'a> {
    weights: &'a RiskWeights,
}

impl<'a> RiskScorer<'a> {
    pub fn new(weights: &'a RiskWeights) -> Self {
        Self { weights }
    }

    /// Scores a single permission. Denied permissions always score zero
    /// regardless of their weight.
    pub fn score_permission(
        &self,
        name: &str,
        granted: bool,
        context: &ScoreContext,
    ) -> RiskFinding {
        if !granted {
            return RiskFinding {
                subject: name.to_string(),
                granted: Some(false),
                count: None,
                risk_score: 0.0,
                risk_level: RiskLevel::Info,
                priority: 0,
                reasoning: "Permission not granted".to_string(),
            };
        }

        let base = self.weights.permission_weight(name);
        let m = &self.weights.multipliers;
        let lower = name.to_lowercase();

        // Factors compose multiplicatively; an admin-named permission takes
        // the admin factor instead of the write factor.
        let mut multiplier = 1.0;
        if context.is_private_repo {
            multiplier *= m.private_repo_access;
        }
        if context.is_public_repo {
            multiplier *= m.public_repo_access;
        }
        if lower.contains("admin") {
            multiplier *= m.admin_access;
        } else if lower.contains("write") {
            multiplier *= m.write_access;
        }

        let risk_score = round2(base * multiplier);
        let (risk_level, priority) = classify_permission_score(risk_score);
        RiskFinding {
            subject: name.to_string(),
            granted: Some(true),
            count: None,
            risk_score,
            risk_level,
            priority,
            reasoning: permission_reasoning(&lower, risk_level, context),
        }
    }

    /// Scores a resource type by count. The count factor is logarithmic
    /// and saturates so large inventories do not dominate linearly.
    pub fn score_resource(&self, name: &str, count: u64, record: &ResourceRecord) -> RiskFinding {
        if count == 0 {
            return RiskFinding {
                subject: name.to_string(),
                granted: None,
                count: Some(0),
                risk_score: 0.0,
                risk_level: RiskLevel::Info,
                priority: 0,
                reasoning: "No resources of this type accessible".to_string(),
            };
        }

        let base = self.weights.resource_weight(name);
        let count_factor =
            ((count.saturating_add(1) as f64).log10() * 10.0).min(COUNT_FACTOR_CAP);
        let mut risk_score = base * (1.0 + count_factor / 100.0);

        let m = &self.weights.multipliers;
        if record.flag("has_secrets_exposed") {
            risk_score *= m.secrets_exposed;
        }
        if record.flag("has_public_access") {
            risk_score *= m.public_repo_access;
        }

        let risk_score = round2(risk_score);
        let (risk_level, priority) = classify_resource_score(risk_score);
        RiskFinding {
            subject: name.to_string(),
            granted: None,
            count: Some(count),
            risk_score,
            risk_level,
            priority,
            reasoning: resource_reasoning(name, count, record),
        }
    }

    /// Assesses every permission in the snapshot. Denied permissions are
    /// reported with zero score and excluded from all aggregates.
    pub fn assess_permissions(
        &self,
        snapshot: Option<&PermissionSnapshot>,
        context: &ScoreContext,
    ) -> PermissionAssessment {
        let snapshot = match snapshot {
            Some(s) => s,
            None => return PermissionAssessment::default(),
        };

        let mut findings: Vec<RiskFinding> = snapshot
            .results
            .iter()
            .map(|r| self.score_permission(&r.name, r.granted, context))
            .collect();
        sort_findings(&mut findings);

        let total: f64 = findings.iter().filter(|f| f.contributes()).map(|f| f.risk_score).sum();
        let count_at = |level: RiskLevel| {
            findings.iter().filter(|f| f.contributes() && f.risk_level == level).count() as u32
        };
        let critical_count = count_at(RiskLevel::Critical);
        let high_count = count_at(RiskLevel::High);
        let medium_count = count_at(RiskLevel::Medium);
        let low_count = count_at(RiskLevel::Low);
        let top_risks = top_risks(&findings);

        PermissionAssessment {
            total_risk_score: round2(total),
            critical_count,
            high_count,
            medium_count,
            low_count,
            top_risks,
            findings,
        }
    }

    /// Assesses every nonzero resource type in the snapshot.
    pub fn assess_resources(&self, snapshot: Option<&ResourceSnapshot>) -> ResourceAssessment {
        let snapshot = match snapshot {
            Some(s) => s,
            None => return ResourceAssessment::default(),
        };

        let mut findings: Vec<RiskFinding> = snapshot
            .resources
            .iter()
            .filter(|(_, record)| record.count > 0)
            .map(|(name, record)| self.score_resource(name, record.count, record))
            .collect();
        sort_findings(&mut findings);

        let total: f64 = findings.iter().map(|f| f.risk_score).sum();
        ResourceAssessment {
            total_risk_score: round2(total),
            top_risks: top_risks(&findings),
            findings,
        }
    }

    /// Combines both sides: permissions represent capability and weigh
    /// 0.6, resources represent exposure and weigh 0.4.
    pub fn overall(
        &self,
        permissions: &PermissionAssessment,
        resources: &ResourceAssessment,
    ) -> OverallRisk {
        let perm_risk = permissions.total_risk_score;
        let resource_risk = resources.total_risk_score;
        let overall = round2(perm_risk * 0.6 + resource_risk * 0.4);

        let risk_level = if overall >= 150.0 {
            RiskLevel::Critical
        } else if overall >= 100.0 {
            RiskLevel::High
        } else if overall >= 50.0 {
            RiskLevel::Medium
        } else if overall >= 20.0 {
            RiskLevel::Low
        } else {
            RiskLevel::Info
        };

        let resource_count_at = |level: RiskLevel| {
            resources.findings.iter().filter(|f| f.risk_level == level).count() as u32
        };

        OverallRisk {
            overall_risk_score: overall,
            risk_level,
            permissions_risk: perm_risk,
            resources_risk: resource_risk,
            critical_findings: permissions.critical_count + resource_count_at(RiskLevel::Critical),
            high_findings: permissions.high_count + resource_count_at(RiskLevel::High),
        }
    }
}

fn classify_permission_score(score: f64) -> (RiskLevel, u8) {
    if score >= 80.0 {
        (RiskLevel::Critical, 1)
    } else if score >= 60.0 {
        (RiskLevel::High, 2)
    } else if score >= 40.0 {
        (RiskLevel::Medium, 3)
    } else if score >= 20.0 {
        (RiskLevel::Low, 4)
    } else {
        (RiskLevel::Info, 5)
    }
}

fn classify_resource_score(score: f64) -> (RiskLevel, u8) {
    if score >= 100.0 {
        (RiskLevel::Critical, 1)
    } else if score >= 70.0 {
        (RiskLevel::High, 2)
    } else if score >= 40.0 {
        (RiskLevel::Medium, 3)
    } else {
        (RiskLevel::Low, 4)
    }
}

fn permission_reasoning(lower_name: &str, level: RiskLevel, context: &ScoreContext) -> String {
    let mut reasons: Vec<&str> = Vec::new();
    if lower_name.contains("admin") {
        reasons.push("Administrative access grants full control");
    }
    if lower_name.contains("write") {
        reasons.push("Write access allows modification of resources");
    }
    if lower_name.contains("delete") {
        reasons.push("Delete access allows removal of resources");
    }
    if context.is_private_repo {
        reasons.push("Access to private repositories");
    }
    if reasons.is_empty() {
        return format!("{} risk level based on permission scope", level_label(level));
    }
    reasons.join("; ")
}

fn resource_reasoning(name: &str, count: u64, record: &ResourceRecord) -> String {
    if record.flag("has_secrets_exposed") {
        format!("{count} {name} accessible with secrets exposed")
    } else if record.flag("has_public_access") {
        format!("{count} {name} accessible with public access")
    } else {
        format!("{count} {name} accessible")
    }
}

fn level_label(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "CRITICAL",
        RiskLevel::High => "HIGH",
        RiskLevel::Medium => "MEDIUM",
        RiskLevel::Low => "LOW",
        RiskLevel::Info => "INFO",
    }
}
