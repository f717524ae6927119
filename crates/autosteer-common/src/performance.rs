//! Archival records written when a run finalizes.
//!
//! Effectiveness is a heuristic in `[0.0, 1.0]`. For one phase it is the share
//! of scored metrics (registered, non-neutral, present at both ends) that moved
//! in their favorable direction, plus [`CONDITION_MET_BONUS`] when the phase
//! ended on a stop condition instead of exhausting its budget. A run's score is
//! the mean over its phases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metrics::{MetricDirection, metric_spec};
use crate::profile::PhaseMode;
use crate::state::{ExecutionState, PhaseExecution, StopReason};

/// Added to a phase's score when it stopped via `condition_met`.
pub const CONDITION_MET_BONUS: f64 = 0.2;

/// Per-phase slice of an archived run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePerformance {
    pub phase_id: String,
    pub mode: PhaseMode,
    pub iterations_used: u32,
    pub stop_reason: StopReason,
    /// End minus start, for every metric present at both ends
    pub metric_deltas: BTreeMap<String, f64>,
    pub improved_metrics: Vec<String>,
    pub regressed_metrics: Vec<String>,
    pub effectiveness: f64,
}

impl PhasePerformance {
    pub fn from_execution(execution: &PhaseExecution) -> Self {
        let metric_deltas = execution.end_metrics.deltas_from(&execution.start_metrics);

        let mut improved = Vec::new();
        let mut regressed = Vec::new();
        let mut scored = 0usize;
        for (name, delta) in &metric_deltas {
            let Some(spec) = metric_spec(name) else {
                continue;
            };
            let favorable = match spec.direction {
                MetricDirection::Higher => *delta > 0.0,
                MetricDirection::Lower => *delta < 0.0,
                MetricDirection::Neutral => continue,
            };
            let unfavorable = match spec.direction {
                MetricDirection::Higher => *delta < 0.0,
                MetricDirection::Lower => *delta > 0.0,
                MetricDirection::Neutral => false,
            };
            scored += 1;
            if favorable {
                improved.push(name.clone());
            } else if unfavorable {
                regressed.push(name.clone());
            }
        }

        let ratio = if scored == 0 {
            0.0
        } else {
            improved.len() as f64 / scored as f64
        };
        let bonus = if execution.stop_reason == StopReason::ConditionMet {
            CONDITION_MET_BONUS
        } else {
            0.0
        };

        Self {
            phase_id: execution.phase_id.clone(),
            mode: execution.mode,
            iterations_used: execution.iterations_used,
            stop_reason: execution.stop_reason,
            metric_deltas,
            improved_metrics: improved,
            regressed_metrics: regressed,
            effectiveness: (ratio + bonus).min(1.0),
        }
    }
}

/// One archived, completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePerformance {
    pub id: String,
    pub task_id: String,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    pub total_iterations: u64,
    pub phases_completed: usize,
    pub phase_breakdown: Vec<PhasePerformance>,
    pub effectiveness_score: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl ProfilePerformance {
    /// Build the archival record for a run that is being finalized. An
    /// explicit `scenario_id` wins over the one the run was started with.
    pub fn from_state(state: &ExecutionState, scenario_id: Option<String>) -> Self {
        let scenario_id = scenario_id.or_else(|| state.scenario_id.clone());
        let phase_breakdown: Vec<PhasePerformance> = state
            .phase_history
            .iter()
            .map(PhasePerformance::from_execution)
            .collect();

        let effectiveness_score = if phase_breakdown.is_empty() {
            0.0
        } else {
            phase_breakdown.iter().map(|p| p.effectiveness).sum::<f64>()
                / phase_breakdown.len() as f64
        };

        let completed_at = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: state.task_id.clone(),
            profile_id: state.profile_id.clone(),
            scenario_id,
            total_iterations: state.total_iterations(),
            phases_completed: phase_breakdown.len(),
            phase_breakdown,
            effectiveness_score,
            started_at: state.started_at,
            completed_at,
            duration_seconds: (completed_at - state.started_at).num_seconds(),
        }
    }
}
