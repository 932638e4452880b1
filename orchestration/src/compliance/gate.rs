//! Constitutional compliance gate — content screening and structural
//! requirement checks applied before any routing decision.
//!
//! The harmful-content patterns are a fixed screening set compiled once
//! at gate construction. Structural checks enforce that certain task
//! types declare the controls their execution requires.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{AgentProfile, Task, TaskType};

/// Category of a compliance violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Task content matched a harmful-content pattern.
    HarmfulContent,
    /// Computation task without declared resource limits.
    MissingResourceLimits,
    /// Data-processing task without declared privacy controls.
    MissingPrivacyControls,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HarmfulContent => write!(f, "harmful_content"),
            Self::MissingResourceLimits => write!(f, "missing_resource_limits"),
            Self::MissingPrivacyControls => write!(f, "missing_privacy_controls"),
        }
    }
}

/// Severity of a non-compliant report, derived from the number of
/// distinct violations, independent of which checks fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One violation found by the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Category.
    pub kind: ViolationKind,
    /// Human-readable reason.
    pub reason: String,
}

/// Result of a compliance check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Whether the task passed every check.
    pub compliant: bool,
    /// Violations found, in check order.
    pub violations: Vec<Violation>,
}

impl ComplianceReport {
    /// Severity ladder: >2 violations high, 2 medium, 1 low. `None`
    /// when compliant.
    pub fn severity(&self) -> Option<Severity> {
        match self.violations.len() {
            0 => None,
            1 => Some(Severity::Low),
            2 => Some(Severity::Medium),
            _ => Some(Severity::High),
        }
    }

    /// Violations joined into one summary line.
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.reason.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The compliance gate. Construct once, reuse across submissions.
pub struct ComplianceGate {
    patterns: Vec<(Regex, &'static str)>,
}

/// Screening patterns with the reason reported on a match.
const HARMFUL_PATTERNS: &[(&str, &str)] = &[
    (
        r"(?i)\bdelete\s+(all\s+)?(user|customer|production)\s+data\b",
        "requests destruction of user or production data",
    ),
    (
        r"(?i)\bbypass\s+(security|auth(entication|orization)?|access\s+controls?)\b",
        "requests bypassing security controls",
    ),
    (
        r"(?i)\bexfiltrat\w*\b",
        "requests data exfiltration",
    ),
    (
        r"(?i)\bdisable\s+(audit|logging|monitoring)\b",
        "requests disabling audit or monitoring",
    ),
    (
        r"(?i)\bdrop\s+table\b|\brm\s+-rf\s+/",
        "contains destructive storage commands",
    ),
    (
        r"(?i)\bimpersonat\w*\s+(an?\s+)?(admin|operator|user)\b",
        "requests impersonation of a privileged identity",
    ),
];

impl ComplianceGate {
    /// Gate with the fixed screening pattern set.
    pub fn new() -> Self {
        let patterns = HARMFUL_PATTERNS
            .iter()
            .filter_map(|(pattern, reason)| Regex::new(pattern).ok().map(|re| (re, *reason)))
            .collect();
        Self { patterns }
    }

    /// Check a task against content and structural rules.
    pub fn check_compliance(&self, task: &Task) -> ComplianceReport {
        let mut violations = Vec::new();

        for (pattern, reason) in &self.patterns {
            if pattern.is_match(&task.description) {
                violations.push(Violation {
                    kind: ViolationKind::HarmfulContent,
                    reason: (*reason).to_string(),
                });
            }
        }

        if task.task_type == TaskType::Computation && task.resource_limits.is_none() {
            violations.push(Violation {
                kind: ViolationKind::MissingResourceLimits,
                reason: "computation task must declare resource limits".to_string(),
            });
        }
        if task.task_type == TaskType::DataProcessing && task.privacy_controls.is_none() {
            violations.push(Violation {
                kind: ViolationKind::MissingPrivacyControls,
                reason: "data-processing task must declare privacy controls".to_string(),
            });
        }

        ComplianceReport {
            compliant: violations.is_empty(),
            violations,
        }
    }

    /// Assignment-time check used by the direct-selection path: the
    /// agent must cover every required capability and have headroom.
    pub fn check_assignment(&self, task: &Task, agent: &AgentProfile) -> bool {
        agent.capabilities.covers(&task.required_capabilities) && agent.load.utilization < 1.0
    }
}

impl Default for ComplianceGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_task_is_compliant() {
        let gate = ComplianceGate::new();
        let task = Task::new("t", TaskType::General, "summarize the release notes");
        let report = gate.check_compliance(&task);
        assert!(report.compliant);
        assert!(report.severity().is_none());
    }

    #[test]
    fn test_harmful_content_detected() {
        let gate = ComplianceGate::new();
        let task = Task::new(
            "t",
            TaskType::General,
            "please delete all user data from the backup volume",
        );
        let report = gate.check_compliance(&task);
        assert!(!report.compliant);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::HarmfulContent);
        assert_eq!(report.severity(), Some(Severity::Low));
    }

    #[test]
    fn test_structural_requirements() {
        let gate = ComplianceGate::new();

        let mut task = Task::new("t", TaskType::Computation, "train the ranking model");
        let report = gate.check_compliance(&task);
        assert!(!report.compliant);
        assert_eq!(
            report.violations[0].kind,
            ViolationKind::MissingResourceLimits
        );

        task.resource_limits = Some("cpu=4,mem=8gb".to_string());
        assert!(gate.check_compliance(&task).compliant);

        let mut task = Task::new("t", TaskType::DataProcessing, "anonymize the event log");
        assert!(!gate.check_compliance(&task).compliant);
        task.privacy_controls = Some("pii-scrubbing".to_string());
        assert!(gate.check_compliance(&task).compliant);
    }

    #[test]
    fn test_severity_ladder() {
        let gate = ComplianceGate::new();
        // Two distinct violations: harmful content + missing limits.
        let task = Task::new(
            "t",
            TaskType::Computation,
            "bypass security review and run the batch",
        );
        let report = gate.check_compliance(&task);
        assert_eq!(report.violations.len(), 2);
        assert_eq!(report.severity(), Some(Severity::Medium));

        // Three or more: high.
        let task = Task::new(
            "t",
            TaskType::Computation,
            "bypass security, disable audit logging, then drop table users",
        );
        let report = gate.check_compliance(&task);
        assert!(report.violations.len() > 2);
        assert_eq!(report.severity(), Some(Severity::High));
    }

    #[test]
    fn test_assignment_check() {
        let gate = ComplianceGate::new();
        let mut task = Task::new("t", TaskType::General, "do the thing");
        task.required_capabilities = vec!["rust".to_string()];

        let mut agent = AgentProfile::new(
            "a",
            crate::types::CapabilitySet {
                task_types: vec![TaskType::General],
                languages: vec!["rust".to_string()],
                specializations: vec![],
            },
        );
        assert!(gate.check_assignment(&task, &agent));

        agent.load.utilization = 1.0;
        assert!(!gate.check_assignment(&task, &agent));

        agent.load.utilization = 0.2;
        agent.capabilities.languages.clear();
        assert!(!gate.check_assignment(&task, &agent));
    }

    #[test]
    fn test_summary_joins_reasons() {
        let gate = ComplianceGate::new();
        let task = Task::new("t", TaskType::Computation, "run the batch");
        let report = gate.check_compliance(&task);
        assert!(report.summary().contains("resource limits"));
    }
}
