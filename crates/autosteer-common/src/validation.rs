//! Authoring-time validation for profiles and conditions.
//!
//! Validation collects every problem instead of stopping at the first one, so a
//! profile author sees the full list in a single pass. Each issue carries the
//! path of the offending element, e.g. `phases[1].stop_conditions[0].subconditions[2]`.

use std::fmt;
use thiserror::Error;

use crate::condition::StopCondition;
use crate::metrics::is_registered;
use crate::profile::{Phase, Profile, QualityGate};

/// A single problem found while validating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A malformed profile, phase, gate, or condition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {subject}: {}", format_issues(.issues))]
pub struct ValidationError {
    pub subject: String,
    pub issues: Vec<ValidationIssue>,
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

#[derive(Default)]
struct Collector {
    issues: Vec<ValidationIssue>,
}

impl Collector {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    fn finish(self, subject: &str) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                subject: subject.to_string(),
                issues: self.issues,
            })
        }
    }
}

/// Validate a whole profile before it is persisted.
pub fn validate_profile(profile: &Profile) -> Result<(), ValidationError> {
    let mut c = Collector::default();

    if profile.name.trim().is_empty() {
        c.push("name", "profile name is required");
    }
    if profile.phases.is_empty() {
        c.push("phases", "profile must define at least one phase");
    }

    let mut seen_ids = std::collections::HashSet::new();
    for (i, phase) in profile.phases.iter().enumerate() {
        let path = format!("phases[{}]", i);
        check_phase(phase, &path, &mut c);
        if !phase.id.is_empty() && !seen_ids.insert(phase.id.as_str()) {
            c.push(format!("{}.id", path), format!("duplicate phase id '{}'", phase.id));
        }
    }

    for (i, gate) in profile.quality_gates.iter().enumerate() {
        check_gate(gate, &format!("quality_gates[{}]", i), &mut c);
    }

    c.finish("profile")
}

/// Validate a single condition, recursively.
pub fn validate_condition(condition: &StopCondition) -> Result<(), ValidationError> {
    let mut c = Collector::default();
    check_condition(condition, "condition", &mut c);
    c.finish("condition")
}

fn check_phase(phase: &Phase, path: &str, c: &mut Collector) {
    if phase.id.trim().is_empty() {
        c.push(format!("{}.id", path), "phase id is required");
    }
    if phase.max_iterations == 0 {
        c.push(
            format!("{}.max_iterations", path),
            "max_iterations must be greater than 0",
        );
    }
    if phase.stop_conditions.is_empty() {
        c.push(
            format!("{}.stop_conditions", path),
            "phase must define at least one stop condition",
        );
    }
    for (i, cond) in phase.stop_conditions.iter().enumerate() {
        check_condition(cond, &format!("{}.stop_conditions[{}]", path, i), c);
    }
}

fn check_gate(gate: &QualityGate, path: &str, c: &mut Collector) {
    if gate.name.trim().is_empty() {
        c.push(format!("{}.name", path), "gate name is required");
    }
    check_condition(&gate.condition, &format!("{}.condition", path), c);
}

fn check_condition(condition: &StopCondition, path: &str, c: &mut Collector) {
    match condition {
        StopCondition::Simple { metric, value, .. } => {
            if metric.trim().is_empty() {
                c.push(path, "metric is required");
            } else if !is_registered(metric) {
                c.push(path, format!("unknown metric '{}'", metric));
            }
            if !value.is_finite() {
                c.push(path, "comparison value must be a finite number");
            }
        }
        StopCondition::Compound { subconditions, .. } => {
            if subconditions.is_empty() {
                c.push(path, "compound condition requires at least one subcondition");
            }
            for (i, sub) in subconditions.iter().enumerate() {
                check_condition(sub, &format!("{}.subconditions[{}]", path, i), c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ComparisonOperator;
    use crate::profile::{GateAction, PhaseMode};

    fn loops_gt(v: f64) -> StopCondition {
        StopCondition::simple("loops", ComparisonOperator::GreaterThan, v)
    }

    fn valid_profile() -> Profile {
        Profile::new(
            "p",
            "valid",
            vec![Phase::new("one", PhaseMode::Implement, 5).with_condition(loops_gt(3.0))],
        )
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(validate_profile(&valid_profile()).is_ok());
    }

    #[test]
    fn test_profile_requires_name_and_phases() {
        let mut profile = valid_profile();
        profile.name = "  ".into();
        profile.phases.clear();
        let err = validate_profile(&profile).unwrap_err();
        assert!(err.has_issue_at("name"));
        assert!(err.has_issue_at("phases"));
    }

    #[test]
    fn test_phase_budget_and_conditions_required() {
        let mut profile = valid_profile();
        profile.phases.push(Phase::new("two", PhaseMode::Test, 0));
        let err = validate_profile(&profile).unwrap_err();
        assert!(err.has_issue_at("phases[1].max_iterations"));
        assert!(err.has_issue_at("phases[1].stop_conditions"));
        assert_eq!(err.issues.len(), 2);
    }

    #[test]
    fn test_nested_unknown_metric_reports_full_path() {
        let mut profile = valid_profile();
        profile.phases[0].stop_conditions.push(StopCondition::or(vec![
            loops_gt(1.0),
            StopCondition::and(vec![StopCondition::simple(
                "happiness",
                ComparisonOperator::Equal,
                1.0,
            )]),
        ]));
        let err = validate_profile(&profile).unwrap_err();
        assert!(err.has_issue_at("phases[0].stop_conditions[1].subconditions[1].subconditions[0]"));
        assert!(err.to_string().contains("unknown metric 'happiness'"));
    }

    #[test]
    fn test_empty_compound_rejected() {
        let err = validate_condition(&StopCondition::and(vec![])).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.issues[0].message.contains("at least one subcondition"));
    }

    #[test]
    fn test_empty_metric_rejected() {
        let err =
            validate_condition(&StopCondition::simple("", ComparisonOperator::Equal, 0.0)).unwrap_err();
        assert!(err.issues[0].message.contains("metric is required"));
    }

    #[test]
    fn test_gate_validation() {
        let profile = valid_profile().with_gate(QualityGate::new(
            "",
            StopCondition::simple("nope", ComparisonOperator::Equal, 0.0),
            GateAction::Halt,
        ));
        let err = validate_profile(&profile).unwrap_err();
        assert!(err.has_issue_at("quality_gates[0].name"));
        assert!(err.has_issue_at("quality_gates[0].condition"));
    }

    #[test]
    fn test_duplicate_phase_ids() {
        let mut profile = valid_profile();
        profile.phases.push(profile.phases[0].clone());
        let err = validate_profile(&profile).unwrap_err();
        assert!(err.has_issue_at("phases[1].id"));
    }
}
