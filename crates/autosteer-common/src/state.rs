//! Resumable execution state for one task.
//!
//! [`ExecutionState`] is the record persisted between calls. The transition
//! methods here are pure in-memory mutations; stores persist the result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::MetricsSnapshot;
use crate::profile::{Phase, PhaseMode, Profile};

/// Why a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxIterations,
    ConditionMet,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxIterations => "max_iterations",
            StopReason::ConditionMet => "condition_met",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable history entry appended when a phase completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseExecution {
    pub phase_id: String,
    pub mode: PhaseMode,
    pub iterations_used: u32,
    pub start_metrics: MetricsSnapshot,
    pub end_metrics: MetricsSnapshot,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub stop_reason: StopReason,
}

/// Resolved target of a seek after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTarget {
    pub phase_index: usize,
    pub phase_iteration: u32,
}

/// The persistent, resumable record of where a task is in its profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub task_id: String,
    pub profile_id: String,
    /// Scenario the run was started under; carried into the archive record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    pub current_phase_index: usize,
    pub current_phase_iteration: u32,
    pub total_iteration_counter: u64,
    pub phase_started_at: DateTime<Utc>,
    #[serde(default)]
    pub phase_history: Vec<PhaseExecution>,
    pub metrics: MetricsSnapshot,
    pub phase_start_metrics: MetricsSnapshot,
    pub started_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by every successful save.
    #[serde(default)]
    pub version: u64,
}

impl ExecutionState {
    /// Fresh state positioned at the start of the first phase.
    pub fn new(task_id: &str, profile_id: &str, initial_metrics: MetricsSnapshot) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.to_string(),
            profile_id: profile_id.to_string(),
            scenario_id: None,
            current_phase_index: 0,
            current_phase_iteration: 0,
            total_iteration_counter: 0,
            phase_started_at: now,
            phase_history: Vec::new(),
            phase_start_metrics: initial_metrics.clone(),
            metrics: initial_metrics,
            started_at: now,
            last_updated: now,
            version: 0,
        }
    }

    pub fn with_scenario(mut self, scenario_id: Option<String>) -> Self {
        self.scenario_id = scenario_id;
        self
    }

    /// Count one iteration against the current phase and record its reading.
    pub fn increment_iteration(&mut self, new_metrics: MetricsSnapshot) {
        self.total_iteration_counter += 1;
        self.current_phase_iteration += 1;
        self.metrics = new_metrics;
        self.last_updated = Utc::now();
    }

    /// Append the history entry for the phase being left.
    pub fn record_phase_completion(&mut self, phase: &Phase, stop_reason: StopReason) {
        let now = Utc::now();
        self.phase_history.push(PhaseExecution {
            phase_id: phase.id.clone(),
            mode: phase.mode,
            iterations_used: self.current_phase_iteration,
            start_metrics: self.phase_start_metrics.clone(),
            end_metrics: self.metrics.clone(),
            started_at: self.phase_started_at,
            completed_at: now,
            stop_reason,
        });
        self.last_updated = now;
    }

    /// Move to the next phase, resetting the per-phase counter and baseline.
    pub fn advance_to_next_phase(&mut self) {
        let now = Utc::now();
        self.current_phase_index += 1;
        self.current_phase_iteration = 0;
        self.phase_start_metrics = self.metrics.clone();
        self.phase_started_at = now;
        self.last_updated = now;
    }

    /// True once the phase index has run past the last phase of `profile`.
    pub fn is_past_last_phase(&self, profile: &Profile) -> bool {
        self.current_phase_index >= profile.phases.len()
    }

    pub fn current_phase<'a>(&self, profile: &'a Profile) -> Option<&'a Phase> {
        profile.phases.get(self.current_phase_index)
    }

    /// Sum of iterations recorded in the phase history.
    pub fn history_iterations(&self) -> u64 {
        self.phase_history
            .iter()
            .map(|p| u64::from(p.iterations_used))
            .sum()
    }

    /// Total iterations for archival: the running counter when it has been
    /// maintained, otherwise the history sum.
    pub fn total_iterations(&self) -> u64 {
        if self.total_iteration_counter > 0 {
            self.total_iteration_counter
        } else {
            self.history_iterations()
        }
    }

    /// Administratively reposition the state within `profile`.
    ///
    /// The phase index is clamped to the profile's phases and the iteration to
    /// the target phase's budget (floored at 1). The running total is rebuilt
    /// from prior phases: recorded history where available, otherwise each prior
    /// phase is assumed to have used its whole budget. Seeking backward
    /// truncates history entries at or after the target phase; that loss is
    /// permanent.
    pub fn seek(&mut self, profile: &Profile, phase_index: i64, phase_iteration: i64) -> SeekTarget {
        let last_index = profile.phases.len().saturating_sub(1);
        let target_index = clamp_index(phase_index, last_index);
        let budget = profile
            .phases
            .get(target_index)
            .map(|p| p.max_iterations.max(1))
            .unwrap_or(1);
        let target_iteration = phase_iteration.clamp(0, i64::from(budget)) as u32;

        let prior: u64 = profile
            .phases
            .iter()
            .take(target_index)
            .enumerate()
            .map(|(i, phase)| {
                self.phase_history
                    .get(i)
                    .map(|h| u64::from(h.iterations_used))
                    .unwrap_or(u64::from(phase.max_iterations))
            })
            .sum();

        let now = Utc::now();
        self.current_phase_index = target_index;
        self.current_phase_iteration = target_iteration;
        self.total_iteration_counter = prior + u64::from(target_iteration);
        self.phase_start_metrics = self.metrics.clone();
        self.phase_started_at = now;
        self.last_updated = now;

        if self.phase_history.len() > target_index {
            self.phase_history.truncate(target_index);
        }

        SeekTarget {
            phase_index: target_index,
            phase_iteration: target_iteration,
        }
    }
}

fn clamp_index(requested: i64, last_index: usize) -> usize {
    if requested <= 0 {
        0
    } else {
        usize::try_from(requested).unwrap_or(usize::MAX).min(last_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ComparisonOperator, StopCondition};

    fn two_phase_profile() -> Profile {
        let cond = StopCondition::simple("loops", ComparisonOperator::GreaterThan, 3.0);
        Profile::new(
            "p",
            "two",
            vec![
                Phase::new("a", PhaseMode::Implement, 5).with_condition(cond.clone()),
                Phase::new("b", PhaseMode::Test, 5).with_condition(cond),
            ],
        )
    }

    fn snapshot(loops: f64) -> MetricsSnapshot {
        MetricsSnapshot::new().with("loops", loops)
    }

    #[test]
    fn test_new_state_baseline_matches_initial_metrics() {
        let state = ExecutionState::new("t", "p", snapshot(0.0));
        assert_eq!(state.current_phase_index, 0);
        assert_eq!(state.current_phase_iteration, 0);
        assert!(state.phase_history.is_empty());
        assert_eq!(state.metrics, state.phase_start_metrics);
    }

    #[test]
    fn test_increment_does_not_touch_phase_index() {
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        state.increment_iteration(snapshot(1.0));
        state.increment_iteration(snapshot(2.0));
        assert_eq!(state.current_phase_index, 0);
        assert_eq!(state.current_phase_iteration, 2);
        assert_eq!(state.total_iteration_counter, 2);
        assert_eq!(state.metrics.get("loops"), Some(2.0));
        assert_eq!(state.phase_start_metrics.get("loops"), Some(0.0));
    }

    #[test]
    fn test_record_and_advance() {
        let profile = two_phase_profile();
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        state.increment_iteration(snapshot(4.0));
        state.record_phase_completion(&profile.phases[0], StopReason::ConditionMet);
        state.advance_to_next_phase();

        assert_eq!(state.phase_history.len(), 1);
        let entry = &state.phase_history[0];
        assert_eq!(entry.iterations_used, 1);
        assert_eq!(entry.start_metrics.get("loops"), Some(0.0));
        assert_eq!(entry.end_metrics.get("loops"), Some(4.0));
        assert_eq!(state.current_phase_index, 1);
        assert_eq!(state.current_phase_iteration, 0);
        assert_eq!(state.phase_start_metrics.get("loops"), Some(4.0));
        assert!(!state.is_past_last_phase(&profile));
    }

    #[test]
    fn test_seek_clamps_index_and_iteration() {
        let profile = two_phase_profile();
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        let target = state.seek(&profile, 5, 99);
        assert_eq!(target, SeekTarget { phase_index: 1, phase_iteration: 5 });
        assert_eq!(state.current_phase_index, 1);
        assert_eq!(state.current_phase_iteration, 5);
        // Phase 0 has no history so it counts as its full budget.
        assert_eq!(state.total_iteration_counter, 10);
    }

    #[test]
    fn test_seek_negative_values_clamp_to_zero() {
        let profile = two_phase_profile();
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        let target = state.seek(&profile, -3, -1);
        assert_eq!(target, SeekTarget { phase_index: 0, phase_iteration: 0 });
        assert_eq!(state.total_iteration_counter, 0);
    }

    #[test]
    fn test_seek_uses_recorded_history_for_prior_phases() {
        let profile = two_phase_profile();
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        state.increment_iteration(snapshot(1.0));
        state.increment_iteration(snapshot(2.0));
        state.record_phase_completion(&profile.phases[0], StopReason::ConditionMet);
        state.advance_to_next_phase();

        state.seek(&profile, 1, 3);
        assert_eq!(state.total_iteration_counter, 2 + 3);
        assert_eq!(state.phase_history.len(), 1);
    }

    #[test]
    fn test_seek_backward_truncates_history() {
        let profile = two_phase_profile();
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        for phase in &profile.phases {
            state.increment_iteration(snapshot(4.0));
            state.record_phase_completion(phase, StopReason::ConditionMet);
            state.advance_to_next_phase();
        }
        assert_eq!(state.phase_history.len(), 2);

        state.seek(&profile, 0, 0);
        assert!(state.phase_history.is_empty());
        assert_eq!(state.current_phase_index, 0);
        assert_eq!(state.phase_start_metrics, state.metrics);
    }

    #[test]
    fn test_seek_floors_zero_budget_at_one() {
        let mut profile = two_phase_profile();
        profile.phases[0].max_iterations = 0;
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        let target = state.seek(&profile, 0, 10);
        assert_eq!(target.phase_iteration, 1);
    }

    #[test]
    fn test_total_iterations_falls_back_to_history() {
        let profile = two_phase_profile();
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        state.current_phase_iteration = 3;
        state.record_phase_completion(&profile.phases[0], StopReason::MaxIterations);
        assert_eq!(state.total_iteration_counter, 0);
        assert_eq!(state.total_iterations(), 3);
    }

    #[test]
    fn test_state_json_round_trip_keeps_history() {
        let profile = two_phase_profile();
        let mut state = ExecutionState::new("t", "p", snapshot(0.0));
        state.increment_iteration(snapshot(4.0));
        state.record_phase_completion(&profile.phases[0], StopReason::ConditionMet);
        let json = serde_json::to_string(&state).unwrap();
        let back: ExecutionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert!(json.contains("\"condition_met\""));
    }
}
