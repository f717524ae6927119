//! Phase transition policy: when to leave a phase and whether gates allow it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use autosteer_common::{GateAction, MetricsSnapshot, Phase, QualityGate, StopReason};

use crate::evaluator::{ConditionEvaluator, MetricConditionEvaluator};

/// Reason attached to a stop/continue decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Keep iterating in the current phase.
    Continue,
    /// The phase budget is exhausted.
    MaxIterations,
    /// A stop condition evaluated true.
    ConditionMet,
    /// The run is already past its last phase.
    AllPhasesCompleted,
    /// No execution state exists for the task.
    Inactive,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::MaxIterations => "max_iterations",
            Self::ConditionMet => "condition_met",
            Self::AllPhasesCompleted => "all_phases_completed",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StopReason> for DecisionReason {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::MaxIterations => Self::MaxIterations,
            StopReason::ConditionMet => Self::ConditionMet,
        }
    }
}

/// Outcome of asking whether the current phase should end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDecision {
    pub should_stop: bool,
    pub reason: DecisionReason,
    /// Formatted text of the stop condition that fired, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_condition: Option<String>,
}

impl PhaseDecision {
    pub fn continue_phase() -> Self {
        Self {
            should_stop: false,
            reason: DecisionReason::Continue,
            matched_condition: None,
        }
    }

    pub fn stop(reason: DecisionReason) -> Self {
        Self {
            should_stop: true,
            reason,
            matched_condition: None,
        }
    }

    pub fn inactive() -> Self {
        Self {
            should_stop: false,
            reason: DecisionReason::Inactive,
            matched_condition: None,
        }
    }
}

/// Result of evaluating one quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvaluation {
    pub gate_name: String,
    pub passed: bool,
    pub message: String,
    pub action: GateAction,
}

/// The gate that blocked advancement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateHalt {
    pub gate_name: String,
    pub message: String,
}

/// Decides phase transitions. The default implementation is [`DefaultPhaseCoordinator`].
pub trait PhaseCoordinator: Send + Sync {
    fn should_advance_phase(
        &self,
        phase: &Phase,
        metrics: &MetricsSnapshot,
        current_iteration: u32,
    ) -> PhaseDecision;

    fn evaluate_quality_gates(
        &self,
        gates: &[QualityGate],
        metrics: &MetricsSnapshot,
    ) -> Vec<GateEvaluation>;

    fn should_halt_on_quality_gates(&self, evaluations: &[GateEvaluation]) -> Option<GateHalt> {
        evaluations
            .iter()
            .find(|e| !e.passed && e.action.blocks_advancement())
            .map(|e| GateHalt {
                gate_name: e.gate_name.clone(),
                message: e.message.clone(),
            })
    }

    fn determine_stop_reason(&self, current_iteration: u32, max_iterations: u32) -> StopReason {
        determine_stop_reason(current_iteration, max_iterations)
    }
}

/// `condition_met` while budget remains, `max_iterations` once it is spent.
pub fn determine_stop_reason(current_iteration: u32, max_iterations: u32) -> StopReason {
    if current_iteration < max_iterations {
        StopReason::ConditionMet
    } else {
        StopReason::MaxIterations
    }
}

pub struct DefaultPhaseCoordinator {
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl Default for DefaultPhaseCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(MetricConditionEvaluator::new()))
    }
}

impl DefaultPhaseCoordinator {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl PhaseCoordinator for DefaultPhaseCoordinator {
    fn should_advance_phase(
        &self,
        phase: &Phase,
        metrics: &MetricsSnapshot,
        current_iteration: u32,
    ) -> PhaseDecision {
        // Budget exhaustion wins without evaluating any condition.
        if current_iteration >= phase.max_iterations {
            tracing::debug!(
                phase = %phase.id,
                iteration = current_iteration,
                max_iterations = phase.max_iterations,
                "Phase budget exhausted"
            );
            return PhaseDecision::stop(DecisionReason::MaxIterations);
        }

        for (index, condition) in phase.stop_conditions.iter().enumerate() {
            match self.evaluator.evaluate(condition, metrics) {
                Ok(true) => {
                    let rendered = self.evaluator.format_condition(condition, metrics);
                    tracing::debug!(
                        phase = %phase.id,
                        iteration = current_iteration,
                        condition = %rendered,
                        "Stop condition met"
                    );
                    return PhaseDecision {
                        should_stop: true,
                        reason: DecisionReason::ConditionMet,
                        matched_condition: Some(rendered),
                    };
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        phase = %phase.id,
                        condition_index = index,
                        error = %e,
                        "Skipping stop condition that could not be evaluated"
                    );
                }
            }
        }

        PhaseDecision::continue_phase()
    }

    fn evaluate_quality_gates(
        &self,
        gates: &[QualityGate],
        metrics: &MetricsSnapshot,
    ) -> Vec<GateEvaluation> {
        gates
            .iter()
            .map(|gate| match self.evaluator.evaluate(&gate.condition, metrics) {
                Ok(passed) => {
                    let message = if passed {
                        format!("Quality gate '{}' passed", gate.name)
                    } else if gate.message.is_empty() {
                        format!(
                            "Quality gate '{}' failed: {}",
                            gate.name,
                            self.evaluator.format_condition(&gate.condition, metrics)
                        )
                    } else {
                        gate.message.clone()
                    };
                    if !passed && gate.failure_action == GateAction::SkipPhase {
                        tracing::warn!(
                            gate = %gate.name,
                            "Quality gate with skip_phase action failed; continuing without skipping"
                        );
                    }
                    GateEvaluation {
                        gate_name: gate.name.clone(),
                        passed,
                        message,
                        action: gate.failure_action,
                    }
                }
                // An evaluation failure must never silently halt a run.
                Err(e) => {
                    tracing::warn!(gate = %gate.name, error = %e, "Quality gate could not be evaluated");
                    GateEvaluation {
                        gate_name: gate.name.clone(),
                        passed: false,
                        message: format!("Quality gate '{}' could not be evaluated: {}", gate.name, e),
                        action: GateAction::Warn,
                    }
                }
            })
            .collect()
    }
}
