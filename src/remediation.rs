//! Remediation suggestion engine.
//!
//! A fixed, ordered list of condition checks is evaluated against whatever
//! inputs are present; each triggered condition instantiates a template
//! from the catalog below with the triggering counts filled into its
//! description. Extend the catalog and the condition list together rather
//! than branching ad hoc.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    compliance::{ComplianceReport, FindingStatus},
    drift::DriftReport,
    risk::{OverallRisk, RiskLevel},
    snapshot::{PermissionSnapshot, ResourceSnapshot, RunnerExposureSummary},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Priority {
    pub const ALL: [Priority; 5] =
        [Priority::Critical, Priority::High, Priority::Medium, Priority::Low, Priority::Info];

    pub fn label(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Permissions,
    Secrets,
    AccessControl,
    NetworkSecurity,
    Compliance,
    Monitoring,
    BestPractices,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Permissions => "permissions",
            Category::Secrets => "secrets",
            Category::AccessControl => "access_control",
            Category::NetworkSecurity => "network_security",
            Category::Compliance => "compliance",
            Category::Monitoring => "monitoring",
            Category::BestPractices => "best_practices",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl Effort {
    pub fn label(self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
    Critical,
}

/// One actionable, templated suggestion tied to a detected condition.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemediationItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub effort: Effort,
    pub impact: Impact,
    pub steps: Vec<String>,
    pub commands: Vec<String>,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RemediationSummary {
    pub total: u32,
    pub by_priority: BTreeMap<String, u32>,
    pub by_category: BTreeMap<String, u32>,
    pub by_effort: BTreeMap<String, u32>,
}

/// Remediation items bucketed by priority, plus summary tallies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RemediationReport {
    pub critical: Vec<RemediationItem>,
    pub high: Vec<RemediationItem>,
    pub medium: Vec<RemediationItem>,
    pub low: Vec<RemediationItem>,
    pub info: Vec<RemediationItem>,
    pub summary: RemediationSummary,
}

impl RemediationReport {
    pub fn bucket(&self, priority: Priority) -> &[RemediationItem] {
        match priority {
            Priority::Critical => &self.critical,
            Priority::High => &self.high,
            Priority::Medium => &self.medium,
            Priority::Low => &self.low,
            Priority::Info => &self.info,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &RemediationItem> {
        Priority::ALL.into_iter().flat_map(move |p| self.bucket(p).iter())
    }

    fn push(&mut self, item: RemediationItem) {
        let bucket = match item.priority {
            Priority::Critical => &mut self.critical,
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
            Priority::Info => &mut self.info,
        };
        bucket.push(item);
    }

    fn finalize_summary(&mut self) {
        let mut summary = RemediationSummary::default();
        for priority in Priority::ALL {
            let items = self.bucket(priority);
            summary.total += items.len() as u32;
            summary.by_priority.insert(priority.label().to_string(), items.len() as u32);
            for item in items {
                *summary.by_category.entry(item.category.label().to_string()).or_insert(0) += 1;
                *summary.by_effort.entry(item.effort.label().to_string()).or_insert(0) += 1;
            }
        }
        self.summary = summary;
    }
}

/// Inputs the engine may draw on. Absent inputs contribute no items.
#[derive(Clone, Copy, Default)]
pub struct RemediationInputs<'a> {
    pub permissions: Option<&'a PermissionSnapshot>,
    pub resources: Option<&'a ResourceSnapshot>,
    pub compliance: Option<&'a ComplianceReport>,
    pub drift: Option<&'a DriftReport>,
    pub runners: Option<&'a RunnerExposureSummary>,
    pub overall_risk: Option<&'a OverallRisk>,
}

/// Static template record; descriptions are instantiated per trigger.
struct Template {
    id: &'static str,
    title: &'static str,
    category: Category,
    priority: Priority,
    effort: Effort,
    impact: Impact,
    steps: &'static [&'static str],
    commands: &'static [&'static str],
    references: &'static [&'static str],
}

impl Template {
    fn instantiate(&self, description: String) -> RemediationItem {
        RemediationItem {
            id: self.id.to_string(),
            title: self.title.to_string(),
            description,
            category: self.category,
            priority: self.priority,
            effort: self.effort,
            impact: self.impact,
            steps: self.steps.iter().map(|s| s.to_string()).collect(),
            commands: self.commands.iter().map(|s| s.to_string()).collect(),
            references: self.references.iter().map(|s| s.to_string()).collect(),
        }
    }
}

const REDUCE_ADMIN: Template = Template {
    id: "perm-001",
    title: "Reduce Administrative Permissions",
    category: Category::Permissions,
    priority: Priority::Critical,
    effort: Effort::Medium,
    impact: Impact::High,
    steps: &[
        "Review each administrative permission and determine if it's necessary",
        "Replace admin permissions with read-only alternatives where possible",
        "Use organization roles (member, billing manager) instead of admin:org",
        "Implement role-based access control (RBAC) for fine-grained permissions",
        "Document the business justification for each remaining admin permission",
    ],
    commands: &[
        "# Review current permissions:",
        "gh api user --jq '.permissions'",
        "",
        "# For organization admin, consider using:",
        "# - read:org (for read-only access)",
        "# - write:org (for limited write access)",
        "# - billing (for billing management only)",
    ],
    references: &[
        "https://docs.github.com/en/organizations/managing-peoples-access-to-your-organization-with-roles",
        "https://docs.github.com/en/authentication/keeping-your-account-and-data-secure/managing-your-personal-access-tokens",
    ],
};

const REMOVE_DELETE: Template = Template {
    id: "perm-002",
    title: "Remove Delete Permissions",
    category: Category::Permissions,
    priority: Priority::Critical,
    effort: Effort::Low,
    impact: Impact::High,
    steps: &[
        "Identify all delete permissions currently granted",
        "Verify if delete operations are actually required",
        "Remove delete permissions from API tokens",
        "Use GitHub's soft delete features where available",
        "Implement approval workflows for destructive operations",
    ],
    commands: &[
        "# Review tokens with delete permissions:",
        "gh api user/installations --jq '.[] | select(.permissions.contents == \"write\" or .permissions.repository == \"write\")'",
        "",
        "# Remove delete permissions from token scopes",
    ],
    references: &[
        "https://docs.github.com/en/rest/overview/permissions-required-for-fine-grained-personal-access-tokens",
    ],
};

const SECURE_SECRET_ACCESS: Template = Template {
    id: "perm-003",
    title: "Secure Secret Access",
    category: Category::Secrets,
    priority: Priority::High,
    effort: Effort::Medium,
    impact: Impact::High,
    steps: &[
        "Audit all accessible secrets and their usage",
        "Rotate all secrets accessible by this token",
        "Implement secret scanning and monitoring",
        "Use GitHub Secrets Manager with proper access controls",
        "Enable secret rotation policies",
        "Monitor secret access in audit logs",
    ],
    commands: &[
        "# List all organization secrets:",
        "gh api orgs/{org}/actions/secrets",
        "",
        "# Rotate a secret:",
        "# 1. Create new secret value",
        "# 2. Update secret in GitHub",
        "# 3. Update all references",
        "# 4. Delete old secret after verification",
    ],
    references: &[
        "https://docs.github.com/en/actions/security-guides/encrypted-secrets",
        "https://docs.github.com/en/code-security/secret-scanning",
    ],
};

const LEAST_PRIVILEGE: Template = Template {
    id: "perm-004",
    title: "Implement Least Privilege Principle",
    category: Category::Permissions,
    priority: Priority::High,
    effort: Effort::High,
    impact: Impact::High,
    steps: &[
        "Conduct a comprehensive permission audit",
        "Identify the minimum set of permissions required",
        "Create separate tokens for different use cases",
        "Use fine-grained personal access tokens (PATs)",
        "Implement permission review process",
        "Document permission requirements and justifications",
    ],
    commands: &[
        "# Use fine-grained PATs with minimal scopes:",
        "gh auth token --scopes 'repo:read,read:org'",
        "",
        "# Review token permissions:",
        "gh api user --jq '.permissions'",
    ],
    references: &[
        "https://docs.github.com/en/authentication/keeping-your-account-and-data-secure/managing-your-personal-access-tokens#fine-grained-personal-access-tokens",
    ],
};

const ROTATE_SECRETS: Template = Template {
    id: "res-001",
    title: "Rotate Exposed Organization Secrets",
    category: Category::Secrets,
    priority: Priority::Critical,
    effort: Effort::High,
    impact: Impact::Critical,
    steps: &[
        "Immediately rotate all accessible secrets",
        "Update all applications and services using these secrets",
        "Verify no unauthorized access occurred",
        "Implement secret rotation schedule (every 90 days)",
        "Enable secret scanning alerts",
        "Review secret access logs for suspicious activity",
    ],
    commands: &[
        "# List all secrets:",
        "gh api orgs/{org}/actions/secrets",
        "",
        "# For each secret:",
        "# 1. Generate new secret value",
        "# 2. Update secret: gh api -X PUT orgs/{org}/actions/secrets/{secret_name}",
        "# 3. Update all references in workflows and applications",
        "# 4. Monitor for failures",
        "# 5. Delete old secret after 7-day grace period",
    ],
    references: &[
        "https://docs.github.com/en/actions/security-guides/encrypted-secrets#rotating-your-secrets",
    ],
};

const REVIEW_WEBHOOKS: Template = Template {
    id: "res-002",
    title: "Review and Secure Webhooks",
    category: Category::NetworkSecurity,
    priority: Priority::Medium,
    effort: Effort::Medium,
    impact: Impact::Medium,
    steps: &[
        "Audit all webhook endpoints and configurations",
        "Verify webhook URLs use HTTPS",
        "Implement webhook secret validation",
        "Review webhook event subscriptions (subscribe only to needed events)",
        "Monitor webhook delivery failures",
        "Implement webhook rate limiting",
        "Document webhook purposes and owners",
    ],
    commands: &[
        "# List all webhooks:",
        "gh api orgs/{org}/hooks",
        "",
        "# Review webhook configuration:",
        "gh api orgs/{org}/hooks/{hook_id}",
        "",
        "# Update webhook secret:",
        "gh api -X PATCH orgs/{org}/hooks/{hook_id} -f secret='new-secret'",
    ],
    references: &[
        "https://docs.github.com/en/developers/webhooks-and-events/webhooks/securing-your-webhooks",
    ],
};

const REVIEW_REPO_ACCESS: Template = Template {
    id: "res-003",
    title: "Review Repository Access",
    category: Category::AccessControl,
    priority: Priority::Medium,
    effort: Effort::High,
    impact: Impact::Medium,
    steps: &[
        "Audit repository access requirements",
        "Implement repository-level access controls",
        "Use repository visibility settings appropriately",
        "Review and remove unnecessary repository access",
        "Implement repository access review process",
        "Document repository access justifications",
    ],
    commands: &[
        "# List accessible repositories:",
        "gh api user/repos --jq '.[].full_name'",
        "",
        "# Review repository permissions:",
        "gh api repos/{owner}/{repo} --jq '.permissions'",
    ],
    references: &[
        "https://docs.github.com/en/repositories/managing-your-repositorys-settings-and-features/managing-repository-settings",
    ],
};

const COMPLIANCE_VIOLATIONS: Template = Template {
    id: "comp-001",
    title: "Address Compliance Violations",
    category: Category::Compliance,
    priority: Priority::High,
    effort: Effort::High,
    impact: Impact::High,
    steps: &[
        "Review compliance findings for each framework",
        "Prioritize critical and high-severity findings",
        "Develop remediation plan with timelines",
        "Implement required security controls",
        "Document compliance evidence",
        "Schedule follow-up compliance review",
    ],
    commands: &[
        "# Review compliance findings in the generated report",
        "# Address each finding systematically",
        "# Document remediation actions taken",
    ],
    references: &[
        "https://docs.github.com/en/enterprise-cloud@latest/admin/policies/enforcing-policies-for-your-enterprise",
    ],
};

const INVESTIGATE_DRIFT: Template = Template {
    id: "drift-001",
    title: "Investigate Critical Permission Changes",
    category: Category::Permissions,
    priority: Priority::Critical,
    effort: Effort::Low,
    impact: Impact::High,
    steps: &[
        "Review all critical permission changes",
        "Verify if changes were authorized",
        "Check audit logs for change source",
        "Revert unauthorized changes immediately",
        "Document authorized changes",
        "Implement change approval process",
    ],
    commands: &[
        "# Review the snapshot history for this target",
        "",
        "# Review audit logs:",
        "gh api orgs/{org}/audit-log --jq '.entries[] | select(.action == \"org.update_member\")'",
    ],
    references: &[
        "https://docs.github.com/en/enterprise-cloud@latest/admin/monitoring-activity-in-your-enterprise/reviewing-audit-logs-for-your-enterprise",
    ],
};

const ADDRESS_DRIFT: Template = Template {
    id: "drift-002",
    title: "Address Permission Drift",
    category: Category::Permissions,
    priority: Priority::High,
    effort: Effort::Medium,
    impact: Impact::Medium,
    steps: &[
        "Review all permission changes",
        "Implement permission change approval workflow",
        "Set up automated drift detection alerts",
        "Document change management process",
        "Regular permission audits (monthly)",
    ],
    commands: &["# Re-run the audit on a schedule and alert on drift reports with changes"],
    references: &[],
};

const SECURE_RUNNERS: Template = Template {
    id: "runner-001",
    title: "Secure Exposed CI/CD Runners",
    category: Category::NetworkSecurity,
    priority: Priority::High,
    effort: Effort::High,
    impact: Impact::High,
    steps: &[
        "Review runner network exposure",
        "Implement network isolation for runners",
        "Restrict SSH access to runners",
        "Use GitHub-hosted runners for public repositories",
        "Implement runner group access controls",
        "Enable runner monitoring and alerting",
        "Review and rotate runner credentials",
    ],
    commands: &[
        "# List runners:",
        "gh api orgs/{org}/actions/runners",
        "",
        "# Configure runner groups with restricted access:",
        "gh api orgs/{org}/actions/runner-groups",
        "",
        "# Review runner labels and access:",
        "gh api orgs/{org}/actions/runners/{runner_id}",
    ],
    references: &[
        "https://docs.github.com/en/actions/hosting-your-own-runners/managing-self-hosted-runners",
        "https://docs.github.com/en/actions/security-guides/security-hardening-for-github-actions",
    ],
};

const HIGH_RISK_FINDINGS: Template = Template {
    id: "risk-001",
    title: "Address High-Risk Findings",
    category: Category::BestPractices,
    priority: Priority::Critical,
    effort: Effort::High,
    impact: Impact::Critical,
    steps: &[
        "Review all critical and high-risk findings",
        "Prioritize remediation based on risk scores",
        "Implement immediate fixes for critical issues",
        "Develop remediation timeline",
        "Assign ownership for each remediation",
        "Track remediation progress",
        "Schedule follow-up risk assessment",
    ],
    commands: &[
        "# Review risk assessment in generated report",
        "# Address findings in priority order",
        "# Re-run assessment after remediation",
    ],
    references: &[],
};

/// Per-framework cap on items generated from individual non-compliant
/// findings.
const FINDINGS_PER_FRAMEWORK: usize = 3;

/// Evaluates the full condition list against the inputs. Evaluation order
/// is fixed; order only affects iteration within a bucket, never bucket
/// membership.
pub fn generate(inputs: RemediationInputs<'_>) -> RemediationReport {
    let mut report = RemediationReport::default();

    if let Some(permissions) = inputs.permissions {
        analyze_permissions(permissions, &mut report);
    }
    if let Some(resources) = inputs.resources {
        analyze_resources(resources, &mut report);
    }
    if let Some(compliance) = inputs.compliance {
        analyze_compliance(compliance, &mut report);
    }
    if let Some(drift) = inputs.drift {
        analyze_drift(drift, &mut report);
    }
    if let Some(runners) = inputs.runners {
        analyze_runners(runners, &mut report);
    }
    if let Some(overall) = inputs.overall_risk {
        analyze_overall_risk(overall, &mut report);
    }

    report.finalize_summary();
    report
}

fn analyze_permissions(snapshot: &PermissionSnapshot, report: &mut RemediationReport) {
    let admin = snapshot.granted_matching("admin").len();
    if admin > 2 {
        report.push(REDUCE_ADMIN.instantiate(format!(
            "Found {admin} administrative permissions. This violates the principle of least privilege."
        )));
    }

    let delete = snapshot.granted_matching("delete").len();
    if delete > 0 {
        report.push(REMOVE_DELETE.instantiate(format!(
            "Found {delete} delete permissions. These allow permanent data destruction."
        )));
    }

    let secret = snapshot.granted_matching("secret").len();
    if secret > 0 {
        report.push(SECURE_SECRET_ACCESS.instantiate(format!(
            "Found {secret} secret-related permissions. Implement proper secret management."
        )));
    }

    let summary = snapshot.summary;
    if summary.total_tested > 0 {
        let ratio = summary.granted as f64 / summary.total_tested as f64;
        if ratio > 0.5 {
            report.push(LEAST_PRIVILEGE.instantiate(format!(
                "{:.1}% of tested permissions are granted. This exceeds recommended thresholds.",
                ratio * 100.0
            )));
        }
    }
}

fn analyze_resources(snapshot: &ResourceSnapshot, report: &mut RemediationReport) {
    let secrets = snapshot.count("secrets");
    if secrets > 0 {
        report.push(ROTATE_SECRETS.instantiate(format!(
            "Found {secrets} organization secrets accessible by this token. Immediate rotation required."
        )));
    }

    let webhooks = snapshot.count("webhooks");
    if webhooks > 10 {
        report.push(REVIEW_WEBHOOKS.instantiate(format!(
            "Found {webhooks} webhooks. Review for security and proper configuration."
        )));
    }

    let repositories = snapshot.count("repositories");
    if repositories > 50 {
        report.push(REVIEW_REPO_ACCESS.instantiate(format!(
            "Access to {repositories} repositories detected. Review access scope and necessity."
        )));
    }
}

fn analyze_compliance(compliance: &ComplianceReport, report: &mut RemediationReport) {
    if !compliance.overall_compliant {
        let non_compliant: Vec<&str> = compliance
            .frameworks
            .iter()
            .filter(|(_, result)| !result.compliant)
            .map(|(name, _)| name.as_str())
            .collect();
        report.push(COMPLIANCE_VIOLATIONS.instantiate(format!(
            "Non-compliant with {} framework(s): {}",
            non_compliant.len(),
            non_compliant.join(", ")
        )));
    }

    for (name, result) in &compliance.frameworks {
        let non_compliant = result
            .findings
            .iter()
            .filter(|f| f.status == FindingStatus::NonCompliant)
            .take(FINDINGS_PER_FRAMEWORK);
        for finding in non_compliant {
            report.push(RemediationItem {
                id: format!("comp-{name}-{}", finding.requirement),
                title: format!("Fix {name} Compliance: {}", finding.requirement),
                description: finding.description.clone(),
                category: Category::Compliance,
                priority: Priority::High,
                effort: Effort::Medium,
                impact: Impact::High,
                steps: vec![
                    format!("Review {} requirements", finding.requirement),
                    "Implement required controls".to_string(),
                    "Document implementation".to_string(),
                    "Verify compliance".to_string(),
                ],
                commands: Vec::new(),
                references: Vec::new(),
            });
        }
    }
}

fn analyze_drift(drift: &DriftReport, report: &mut RemediationReport) {
    if !drift.has_changes {
        return;
    }

    let critical = drift.critical_changes.len();
    if critical > 0 {
        report.push(INVESTIGATE_DRIFT.instantiate(format!(
            "Detected {critical} critical permission changes. Immediate investigation required."
        )));
    }

    if drift.change_count > 5 {
        report.push(ADDRESS_DRIFT.instantiate(format!(
            "Detected {} permission changes. Review and implement change controls.",
            drift.change_count
        )));
    }
}

fn analyze_runners(runners: &RunnerExposureSummary, report: &mut RemediationReport) {
    if runners.online_exposed_runners > 0 {
        report.push(SECURE_RUNNERS.instantiate(format!(
            "Found {} online runners with exposed network information. Secure immediately.",
            runners.online_exposed_runners
        )));
    }
}

fn analyze_overall_risk(overall: &OverallRisk, report: &mut RemediationReport) {
    if matches!(overall.risk_level, RiskLevel::Critical | RiskLevel::High) {
        let label = match overall.risk_level {
            RiskLevel::Critical => "CRITICAL",
            _ => "HIGH",
        };
        report.push(HIGH_RISK_FINDINGS.instantiate(format!(
            "Overall risk level is {label}. Immediate action required."
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::{ComplianceInputs, FrameworkRegistry};
    use crate::snapshot::{PermissionCategory, PermissionResult, ResourceRecord};
    use chrono::{TimeZone, Utc};

    fn perm(name: &str, granted: bool) -> PermissionResult {
        PermissionResult {
            name: name.to_string(),
            category: PermissionCategory::Critical,
            granted,
            message: String::new(),
            details: Default::default(),
        }
    }

    fn snapshot(results: Vec<PermissionResult>) -> PermissionSnapshot {
        PermissionSnapshot::new(
            "acme",
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            results,
        )
    }

    #[test]
    fn no_inputs_yields_empty_report() {
        let report = generate(RemediationInputs::default());
        assert_eq!(report.summary.total, 0);
        assert!(report.items().next().is_none());
    }

    #[test]
    fn admin_threshold_is_strictly_greater_than_two() {
        // Two admin grants: below the threshold, no item.
        let two = snapshot(vec![
            perm("admin:org", true),
            perm("admin:enterprise", true),
            perm("read:org", false),
            perm("gist", false),
            perm("repo", false),
        ]);
        let report = generate(RemediationInputs { permissions: Some(&two), ..Default::default() });
        assert!(report.items().all(|i| i.id != "perm-001"));

        let three = snapshot(vec![
            perm("admin:org", true),
            perm("admin:enterprise", true),
            perm("admin:repo_hook", true),
            perm("read:org", false),
            perm("gist", false),
            perm("repo", false),
            perm("workflow", false),
        ]);
        let report = generate(RemediationInputs { permissions: Some(&three), ..Default::default() });
        let item = report.critical.iter().find(|i| i.id == "perm-001").expect("rule fired");
        assert!(item.description.starts_with("Found 3 administrative permissions"));
    }

    #[test]
    fn delete_and_secret_permissions_trigger_items() {
        let snap = snapshot(vec![
            perm("delete:packages", true),
            perm("secret_scanning_alerts", true),
            perm("read:org", false),
            perm("gist", false),
            perm("repo", false),
        ]);
        let report = generate(RemediationInputs { permissions: Some(&snap), ..Default::default() });
        assert!(report.critical.iter().any(|i| i.id == "perm-002"));
        assert!(report.high.iter().any(|i| i.id == "perm-003"));
    }

    #[test]
    fn grant_ratio_rule_uses_strict_threshold() {
        // 2 of 4 granted: exactly 0.5, not above it.
        let at_half = snapshot(vec![
            perm("repo", true),
            perm("gist", true),
            perm("read:org", false),
            perm("notifications", false),
        ]);
        let report =
            generate(RemediationInputs { permissions: Some(&at_half), ..Default::default() });
        assert!(report.items().all(|i| i.id != "perm-004"));

        let above = snapshot(vec![
            perm("repo", true),
            perm("gist", true),
            perm("read:org", true),
            perm("notifications", false),
        ]);
        let report =
            generate(RemediationInputs { permissions: Some(&above), ..Default::default() });
        let item = report.high.iter().find(|i| i.id == "perm-004").expect("rule fired");
        assert!(item.description.starts_with("75.0% of tested permissions"));
    }

    #[test]
    fn exposed_secrets_fire_rotation_with_count() {
        let resources = ResourceSnapshot::new("acme")
            .with_resource("secrets", ResourceRecord::new(5).with_flag("has_secrets_exposed", true));
        let report =
            generate(RemediationInputs { resources: Some(&resources), ..Default::default() });
        let item = report.critical.iter().find(|i| i.id == "res-001").expect("rule fired");
        assert!(item.description.contains("Found 5 organization secrets"));
        assert_eq!(item.category, Category::Secrets);
        assert_eq!(item.impact, Impact::Critical);
    }

    #[test]
    fn resource_count_rules_use_strict_thresholds() {
        let at_limits = ResourceSnapshot::new("acme")
            .with_resource("webhooks", ResourceRecord::new(10))
            .with_resource("repositories", ResourceRecord::new(50));
        let report =
            generate(RemediationInputs { resources: Some(&at_limits), ..Default::default() });
        assert!(report.items().all(|i| i.id != "res-002" && i.id != "res-003"));

        let above = ResourceSnapshot::new("acme")
            .with_resource("webhooks", ResourceRecord::new(11))
            .with_resource("repositories", ResourceRecord::new(51));
        let report = generate(RemediationInputs { resources: Some(&above), ..Default::default() });
        assert!(report.medium.iter().any(|i| i.id == "res-002"));
        assert!(report.medium.iter().any(|i| i.id == "res-003"));
    }

    #[test]
    fn compliance_items_are_capped_per_framework() {
        let registry = FrameworkRegistry::builtin();
        let snap = snapshot(vec![
            perm("admin:org", true),
            perm("admin:enterprise", true),
            perm("admin:repo_hook", true),
            perm("admin:org_hook", true),
            perm("delete_repo", true),
        ]);
        let compliance =
            registry.evaluate(ComplianceInputs { permissions: Some(&snap), resources: None });
        assert!(!compliance.overall_compliant);

        let report =
            generate(RemediationInputs { compliance: Some(&compliance), ..Default::default() });
        assert!(report.high.iter().any(|i| i.id == "comp-001"));
        for framework in compliance.frameworks.keys() {
            let per_framework = report
                .high
                .iter()
                .filter(|i| i.id.starts_with(&format!("comp-{framework}-")))
                .count();
            assert!(per_framework <= 3, "{framework} produced {per_framework} items");
        }
    }

    #[test]
    fn drift_rules_follow_severity_and_volume() {
        use crate::drift::{DriftSeverity, GrantStatus, PermissionChange};

        let change = |severity| PermissionChange {
            permission: "admin:enterprise".to_string(),
            previous_status: GrantStatus::Denied,
            current_status: GrantStatus::Granted,
            severity,
        };
        let drift = DriftReport {
            has_changes: true,
            change_count: 6,
            changes: vec![change(DriftSeverity::Critical); 6],
            critical_changes: vec![change(DriftSeverity::Critical)],
            high_changes: Vec::new(),
            summary_changes: Default::default(),
            previous_snapshot_timestamp: None,
        };
        let report = generate(RemediationInputs { drift: Some(&drift), ..Default::default() });
        assert!(report.critical.iter().any(|i| i.id == "drift-001"));
        assert!(report.high.iter().any(|i| i.id == "drift-002"));
    }

    #[test]
    fn exposed_runners_trigger_hardening_item() {
        let runners = RunnerExposureSummary {
            total_runners: 4,
            online_runners: 3,
            offline_runners: 1,
            exposed_ip_count: 2,
            exposed_hostname_count: 1,
            online_exposed_runners: 2,
            potential_ssh_targets: 2,
        };
        let report = generate(RemediationInputs { runners: Some(&runners), ..Default::default() });
        let item = report.high.iter().find(|i| i.id == "runner-001").expect("rule fired");
        assert!(item.description.contains("Found 2 online runners"));
    }

    #[test]
    fn summary_totals_match_bucket_lengths() {
        let snap = snapshot(vec![
            perm("admin:org", true),
            perm("admin:enterprise", true),
            perm("admin:repo_hook", true),
            perm("delete_repo", true),
        ]);
        let resources = ResourceSnapshot::new("acme")
            .with_resource("secrets", ResourceRecord::new(3))
            .with_resource("webhooks", ResourceRecord::new(12));
        let report = generate(RemediationInputs {
            permissions: Some(&snap),
            resources: Some(&resources),
            ..Default::default()
        });

        let bucket_sum = Priority::ALL.iter().map(|p| report.bucket(*p).len() as u32).sum::<u32>();
        assert_eq!(report.summary.total, bucket_sum);
        assert_eq!(
            report.summary.by_priority.values().sum::<u32>(),
            report.summary.total
        );
        assert_eq!(
            report.summary.by_category.values().sum::<u32>(),
            report.summary.total
        );
        assert_eq!(report.summary.by_effort.values().sum::<u32>(), report.summary.total);
    }
}
