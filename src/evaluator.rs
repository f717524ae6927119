//! Stop-condition evaluation against a metrics snapshot.
//!
//! Simple conditions compare one metric with exact numeric comparison. Compound
//! conditions evaluate their subconditions in order and stop as soon as the
//! result is decided: the first `false` under AND, the first `true` under OR.
//! An error met before that point is returned to the caller, which decides
//! whether it is fatal.

use autosteer_common::metrics::is_registered;
use autosteer_common::{LogicalOperator, MetricsSnapshot, StopCondition};

use crate::errors::EvaluationError;

/// Evaluates stop conditions. Substitutable so decision policy can be tested in isolation.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        condition: &StopCondition,
        metrics: &MetricsSnapshot,
    ) -> Result<bool, EvaluationError>;

    /// Render `condition` with current metric values inlined.
    fn format_condition(&self, condition: &StopCondition, metrics: &MetricsSnapshot) -> String {
        format_condition(condition, metrics)
    }
}

/// Registry-aware evaluator used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricConditionEvaluator;

impl MetricConditionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ConditionEvaluator for MetricConditionEvaluator {
    fn evaluate(
        &self,
        condition: &StopCondition,
        metrics: &MetricsSnapshot,
    ) -> Result<bool, EvaluationError> {
        evaluate_condition(condition, metrics)
    }
}

/// Evaluate `condition` against `metrics`.
pub fn evaluate_condition(
    condition: &StopCondition,
    metrics: &MetricsSnapshot,
) -> Result<bool, EvaluationError> {
    match condition {
        StopCondition::Simple {
            metric,
            operator,
            value,
        } => {
            let actual = lookup(metric, metrics)?;
            Ok(operator.compare(actual, *value))
        }
        StopCondition::Compound {
            logical_operator,
            subconditions,
        } => {
            if subconditions.is_empty() {
                return Err(EvaluationError::InvalidCondition(format!(
                    "{} condition has no subconditions",
                    logical_operator
                )));
            }
            for sub in subconditions {
                let result = evaluate_condition(sub, metrics)?;
                match (logical_operator, result) {
                    (LogicalOperator::And, false) => return Ok(false),
                    (LogicalOperator::Or, true) => return Ok(true),
                    _ => {}
                }
            }
            // Every subcondition agreed: all true under AND, all false under OR.
            Ok(matches!(logical_operator, LogicalOperator::And))
        }
    }
}

fn lookup(metric: &str, metrics: &MetricsSnapshot) -> Result<f64, EvaluationError> {
    if !is_registered(metric) {
        return Err(EvaluationError::MetricUnavailable {
            metric: metric.to_string(),
        });
    }
    metrics
        .get(metric)
        .ok_or_else(|| EvaluationError::MetricUnavailable {
            metric: metric.to_string(),
        })
}

/// Render a condition with each metric's current value inlined, e.g.
/// `(tests_failed (0) == 0 AND coverage_pct (81.5) >= 80)`.
pub fn format_condition(condition: &StopCondition, metrics: &MetricsSnapshot) -> String {
    match condition {
        StopCondition::Simple {
            metric,
            operator,
            value,
        } => {
            let current = metrics
                .get(metric)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            format!("{} ({}) {} {}", metric, current, operator, value)
        }
        StopCondition::Compound {
            logical_operator,
            subconditions,
        } => {
            let parts: Vec<String> = subconditions
                .iter()
                .map(|sub| format_condition(sub, metrics))
                .collect();
            format!("({})", parts.join(&format!(" {} ", logical_operator)))
        }
    }
}
