//! Compliance evaluation against named framework rule sets.
//!
//! Frameworks are declarative data: an ordered list of requirements, each
//! pairing a stable id with a check kind and description templates. The
//! built-in registry carries SOC2, ISO27001, NIST CSF, CIS Benchmarks,
//! PCI DSS, and GDPR rule sets; additional frameworks load from YAML.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    risk::round2,
    snapshot::{PermissionSnapshot, ResourceSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Compliant,
    NonCompliant,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Declarative predicate a requirement evaluates over the input snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    /// Non-compliant when more than `limit` granted permissions carry an
    /// admin-scoped name.
    AdminPermissionLimit { limit: u32 },
    /// Non-compliant when any granted permission carries a delete-scoped
    /// name.
    NoDeletePermissions,
    /// Warning when the accessible secrets inventory is non-empty.
    SecretsInventory,
    /// Non-compliant when granted/tested exceeds `limit`.
    GrantRatioLimit { limit: f64 },
    /// Warning when the named resource count exceeds `limit`.
    ResourceCountLimit { resource: String, limit: u64 },
    /// Informational note carrying the named resource count.
    ResourceNote { resource: String },
    /// Informational item that cannot be evaluated from snapshots.
    ManualCheck,
}

/// One requirement rule within a framework.
///
/// Description templates may use `{count}`, `{limit}`, and `{ratio}`
/// placeholders, substituted with the triggering values at evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Requirement {
    pub id: String,
    #[serde(flatten)]
    pub check: CheckKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub fail_description: String,
    #[serde(default)]
    pub pass_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Framework {
    pub name: String,
    pub requirements: Vec<Requirement>,
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
}

fn default_pass_threshold() -> f64 {
    70.0
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComplianceFinding {
    pub requirement: String,
    pub status: FindingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FrameworkResult {
    pub framework: String,
    pub compliant: bool,
    /// 0-100; 100 minus a severity-weighted penalty per adverse finding.
    pub compliance_score: f64,
    pub findings: Vec<ComplianceFinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComplianceReport {
    pub overall_compliant: bool,
    pub frameworks: BTreeMap<String, FrameworkResult>,
}

/// Snapshot inputs a requirement may draw on. Any side may be absent;
/// rules that need a missing side report Info rather than failing.
#[derive(Clone, Copy, Default)]
pub struct ComplianceInputs<'a> {
    pub permissions: Option<&'a PermissionSnapshot>,
    pub resources: Option<&'a ResourceSnapshot>,
}

/// Ordered set of frameworks to evaluate.
#[derive(Debug, Clone)]
pub struct FrameworkRegistry {
    frameworks: Vec<Framework>,
}

impl FrameworkRegistry {
    /// The built-in rule sets.
    pub fn builtin() -> Self {
        Self { frameworks: builtin_frameworks() }
    }

    pub fn empty() -> Self {
        Self { frameworks: Vec::new() }
    }

    pub fn push(&mut self, framework: Framework) {
        self.frameworks.push(framework);
    }

    /// Adds frameworks from a YAML document containing a list of
    /// framework definitions.
    pub fn extend_from_yaml(&mut self, yaml: &str) -> Result<()> {
        let extra: Vec<Framework> =
            serde_yaml::from_str(yaml).context("parse framework definitions")?;
        self.frameworks.extend(extra);
        Ok(())
    }

    pub fn frameworks(&self) -> &[Framework] {
        &self.frameworks
    }

    /// Runs every framework over the inputs.
    pub fn evaluate(&self, inputs: ComplianceInputs<'_>) -> ComplianceReport {
        let mut frameworks = BTreeMap::new();
        let mut overall_compliant = true;
        for framework in &self.frameworks {
            let result = evaluate_framework(framework, inputs);
            overall_compliant &= result.compliant;
            frameworks.insert(framework.name.clone(), result);
        }
        ComplianceReport { overall_compliant, frameworks }
    }
}

fn evaluate_framework(framework: &Framework, inputs: ComplianceInputs<'_>) -> FrameworkResult {
    let findings: Vec<ComplianceFinding> =
        framework.requirements.iter().map(|req| evaluate_requirement(req, inputs)).collect();

    let mut penalty = 0.0;
    let mut critical_failure = false;
    for finding in &findings {
        let weight = severity_penalty(finding.severity);
        match finding.status {
            FindingStatus::NonCompliant => {
                penalty += weight;
                if finding.severity == Some(Severity::Critical) {
                    critical_failure = true;
                }
            }
            FindingStatus::Warning => penalty += weight / 2.0,
            FindingStatus::Compliant | FindingStatus::Info => {}
        }
    }

    let compliance_score = round2((100.0 - penalty).max(0.0));
    FrameworkResult {
        framework: framework.name.clone(),
        compliant: compliance_score >= framework.pass_threshold && !critical_failure,
        compliance_score,
        findings,
    }
}

fn severity_penalty(severity: Option<Severity>) -> f64 {
    match severity.unwrap_or(Severity::Medium) {
        Severity::Critical => 50.0,
        Severity::High => 35.0,
        Severity::Medium => 20.0,
        Severity::Low => 10.0,
    }
}

fn evaluate_requirement(req: &Requirement, inputs: ComplianceInputs<'_>) -> ComplianceFinding {
    let outcome = match &req.check {
        CheckKind::AdminPermissionLimit { limit } => inputs.permissions.map(|snapshot| {
            let count = snapshot.granted_matching("admin").len() as u32;
            Outcome::threshold(count > *limit, count as u64, Some(*limit as u64))
        }),
        CheckKind::NoDeletePermissions => inputs.permissions.map(|snapshot| {
            let count = snapshot.granted_matching("delete").len() as u64;
            Outcome::threshold(count > 0, count, None)
        }),
        CheckKind::SecretsInventory => inputs.resources.map(|snapshot| {
            let count = snapshot.count("secrets");
            Outcome { adverse: count > 0, adverse_status: FindingStatus::Warning, count, limit: None, ratio: None }
        }),
        CheckKind::GrantRatioLimit { limit } => inputs.permissions.map(|snapshot| {
            let total = snapshot.summary.total_tested;
            let ratio = if total > 0 {
                snapshot.summary.granted as f64 / total as f64
            } else {
                0.0
            };
            Outcome {
                adverse: ratio > *limit,
                adverse_status: FindingStatus::NonCompliant,
                count: snapshot.summary.granted as u64,
                limit: None,
                ratio: Some(ratio),
            }
        }),
        CheckKind::ResourceCountLimit { resource, limit } => inputs.resources.map(|snapshot| {
            let count = snapshot.count(resource);
            Outcome {
                adverse: count > *limit,
                adverse_status: FindingStatus::Warning,
                count,
                limit: Some(*limit),
                ratio: None,
            }
        }),
        CheckKind::ResourceNote { resource } => inputs.resources.map(|snapshot| Outcome {
            adverse: false,
            adverse_status: FindingStatus::Info,
            count: snapshot.count(resource),
            limit: None,
            ratio: None,
        }),
        CheckKind::ManualCheck => Some(Outcome {
            adverse: false,
            adverse_status: FindingStatus::Info,
            count: 0,
            limit: None,
            ratio: None,
        }),
    };

    let Some(outcome) = outcome else {
        return ComplianceFinding {
            requirement: req.id.clone(),
            status: FindingStatus::Info,
            severity: None,
            description: "Not evaluated: required input is absent".to_string(),
        };
    };

    // Notes and manual checks are always informational.
    let info_only = matches!(req.check, CheckKind::ResourceNote { .. } | CheckKind::ManualCheck);
    let (status, severity, template) = if info_only {
        (FindingStatus::Info, None, &req.pass_description)
    } else if outcome.adverse {
        (outcome.adverse_status, req.severity, &req.fail_description)
    } else {
        (FindingStatus::Compliant, None, &req.pass_description)
    };

    ComplianceFinding {
        requirement: req.id.clone(),
        status,
        severity,
        description: outcome.render(template),
    }
}

struct Outcome {
    adverse: bool,
    adverse_status: FindingStatus,
    count: u64,
    limit: Option<u64>,
    ratio: Option<f64>,
}

impl Outcome {
    fn threshold(adverse: bool, count: u64, limit: Option<u64>) -> Self {
        Self { adverse, adverse_status: FindingStatus::NonCompliant, count, limit, ratio: None }
    }

    fn render(&self, template: &str) -> String {
        let mut text = template.replace("{count}", &self.count.to_string());
        if let Some(limit) = self.limit {
            text = text.replace("{limit}", &limit.to_string());
        }
        if let Some(ratio) = self.ratio {
            text = text.replace("{ratio}", &format!("{:.1}%", ratio * 100.0));
        }
        text
    }
}

fn requirement(
    id: &str,
    check: CheckKind,
    severity: Option<Severity>,
    fail_description: &str,
    pass_description: &str,
) -> Requirement {
    Requirement {
        id: id.to_string(),
        check,
        severity,
        fail_description: fail_description.to_string(),
        pass_description: pass_description.to_string(),
    }
}

fn builtin_frameworks() -> Vec<Framework> {
    vec![
        Framework {
            name: "SOC2".to_string(),
            pass_threshold: default_pass_threshold(),
            requirements: vec![
                requirement(
                    "CC6.1",
                    CheckKind::AdminPermissionLimit { limit: 3 },
                    Some(Severity::High),
                    "Too many administrative permissions granted ({count}). Principle of least privilege violated.",
                    "Administrative permissions are appropriately limited.",
                ),
                requirement(
                    "CC6.2",
                    CheckKind::SecretsInventory,
                    Some(Severity::Medium),
                    "Found {count} secrets. Ensure proper credential management and rotation.",
                    "No accessible secrets detected.",
                ),
                requirement(
                    "CC7.1",
                    CheckKind::ResourceNote { resource: "runners".to_string() },
                    None,
                    "",
                    "CI/CD infrastructure detected ({count} runners). Ensure proper monitoring.",
                ),
            ],
        },
        Framework {
            name: "ISO27001".to_string(),
            pass_threshold: default_pass_threshold(),
            requirements: vec![
                requirement(
                    "A.9.2.3",
                    CheckKind::NoDeletePermissions,
                    Some(Severity::High),
                    "Delete permissions granted ({count}). Review necessity and implement additional controls.",
                    "No delete permissions granted.",
                ),
                requirement(
                    "A.9.4.2",
                    CheckKind::ResourceCountLimit { resource: "webhooks".to_string(), limit: 10 },
                    Some(Severity::Medium),
                    "High number of webhooks ({count}). Ensure proper access controls and monitoring.",
                    "Webhook inventory is within expected bounds.",
                ),
            ],
        },
        Framework {
            name: "NIST_CSF".to_string(),
            pass_threshold: default_pass_threshold(),
            requirements: vec![requirement(
                "PR.AC-1",
                CheckKind::GrantRatioLimit { limit: 0.5 },
                Some(Severity::Medium),
                "High permission grant ratio ({ratio}). Implement least privilege principle.",
                "Permission grant ratio is within the accepted bound.",
            )],
        },
        Framework {
            name: "CIS_BENCHMARKS".to_string(),
            pass_threshold: default_pass_threshold(),
            requirements: vec![
                requirement(
                    "CIS 1.1",
                    CheckKind::ManualCheck,
                    None,
                    "",
                    "Verify MFA is enabled for all accounts with API access.",
                ),
                requirement(
                    "CIS 2.1",
                    CheckKind::AdminPermissionLimit { limit: 2 },
                    Some(Severity::High),
                    "Multiple administrative permissions granted ({count}). Limit to minimum necessary.",
                    "Administrative permissions are limited to the minimum necessary.",
                ),
            ],
        },
        Framework {
            name: "PCI_DSS".to_string(),
            pass_threshold: default_pass_threshold(),
            requirements: vec![requirement(
                "PCI DSS 7",
                CheckKind::SecretsInventory,
                Some(Severity::High),
                "Secrets detected ({count}). Ensure proper access controls and encryption for cardholder data.",
                "No secrets accessible to this credential.",
            )],
        },
        Framework {
            name: "GDPR".to_string(),
            pass_threshold: default_pass_threshold(),
            requirements: vec![requirement(
                "GDPR Art. 32",
                CheckKind::ResourceNote { resource: "repositories".to_string() },
                None,
                "",
                "Access to {count} repositories. Ensure proper data protection measures.",
            )],
        },
    ]
}
