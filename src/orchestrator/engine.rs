//! The execution orchestrator: start, evaluate, advance, seek, cancel.
//!
//! Every mutating operation holds the task's lock from its first read to its
//! last write, so concurrent calls for one task are applied one at a time.
//! Stores additionally reject stale writes through the state version, which
//! covers callers in other processes.

use std::sync::Arc;

use autosteer_common::{
    ExecutionState, MetricsSnapshot, PhaseMode, Profile, ProfilePerformance, validate_profile,
};

use super::locks::TaskLocks;
use super::types::{AdvanceOutcome, ExecutionStatus, OrchestratorConfig};
use crate::catalog::ProfileCatalog;
use crate::coordinator::{DecisionReason, DefaultPhaseCoordinator, PhaseCoordinator, PhaseDecision};
use crate::errors::{SteerError, SteerResult};
use crate::provider::{MetricsProvider, ScenarioContext};
use crate::store::ExecutionStateStore;

pub struct ExecutionOrchestrator {
    catalog: Arc<dyn ProfileCatalog>,
    store: Arc<dyn ExecutionStateStore>,
    provider: Arc<dyn MetricsProvider>,
    coordinator: Arc<dyn PhaseCoordinator>,
    locks: TaskLocks,
    config: OrchestratorConfig,
}

impl ExecutionOrchestrator {
    pub fn new(
        catalog: Arc<dyn ProfileCatalog>,
        store: Arc<dyn ExecutionStateStore>,
        provider: Arc<dyn MetricsProvider>,
    ) -> Self {
        Self {
            catalog,
            store,
            provider,
            coordinator: Arc::new(DefaultPhaseCoordinator::default()),
            locks: TaskLocks::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_coordinator(mut self, coordinator: Arc<dyn PhaseCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// Begin (or restart) execution of `profile_id` for `task_id`.
    pub async fn start_execution(
        &self,
        task_id: &str,
        profile_id: &str,
        ctx: &ScenarioContext,
    ) -> SteerResult<ExecutionState> {
        let _guard = self.locks.acquire(task_id).await;
        self.start_locked(task_id, profile_id, ctx).await
    }

    async fn start_locked(
        &self,
        task_id: &str,
        profile_id: &str,
        ctx: &ScenarioContext,
    ) -> SteerResult<ExecutionState> {
        let profile = self.load_profile(profile_id).await?;
        validate_profile(&profile)?;

        if let Some(existing) = self.store.get(task_id).await? {
            if !self.config.allow_restart {
                return Err(SteerError::AlreadyActive {
                    task_id: task_id.to_string(),
                });
            }
            tracing::warn!(
                task_id,
                previous_profile = %existing.profile_id,
                phase_index = existing.current_phase_index,
                "Restarting active execution; previous progress is discarded"
            );
        }

        let initial = self.collect(ctx, 0, 0).await?;
        let state = self
            .store
            .initialize_state(task_id, profile_id, ctx.scenario_id.clone(), initial)
            .await?;
        tracing::info!(
            task_id,
            profile_id,
            phases = profile.phases.len(),
            "Execution started"
        );
        Ok(state)
    }

    /// Take one iteration: collect metrics, count it, and decide whether the
    /// current phase should end. No state yields an `inactive` decision.
    pub async fn evaluate(&self, task_id: &str, ctx: &ScenarioContext) -> SteerResult<PhaseDecision> {
        let _guard = self.locks.acquire(task_id).await;

        let Some(mut state) = self.store.get(task_id).await? else {
            tracing::debug!(task_id, "Evaluate called with no active execution");
            return Ok(PhaseDecision::inactive());
        };
        let profile = self.load_profile(&state.profile_id).await?;
        let Some(phase) = state.current_phase(&profile).cloned() else {
            return Ok(PhaseDecision::stop(DecisionReason::AllPhasesCompleted));
        };

        let metrics = self
            .collect(
                ctx,
                state.current_phase_iteration + 1,
                state.total_iteration_counter + 1,
            )
            .await?;
        self.store.increment_iteration(&mut state, metrics).await?;

        let decision =
            self.coordinator
                .should_advance_phase(&phase, &state.metrics, state.current_phase_iteration);
        tracing::debug!(
            task_id,
            phase_index = state.current_phase_index,
            iteration = state.current_phase_iteration,
            total = state.total_iteration_counter,
            reason = %decision.reason,
            "Iteration evaluated"
        );
        Ok(decision)
    }

    /// Decide against the stored metrics and iteration without collecting,
    /// counting, or persisting anything.
    pub async fn evaluate_without_metrics_collection(
        &self,
        task_id: &str,
    ) -> SteerResult<PhaseDecision> {
        let Some(state) = self.store.get(task_id).await? else {
            return Ok(PhaseDecision::inactive());
        };
        let profile = self.load_profile(&state.profile_id).await?;
        let Some(phase) = state.current_phase(&profile) else {
            return Ok(PhaseDecision::stop(DecisionReason::AllPhasesCompleted));
        };
        Ok(self
            .coordinator
            .should_advance_phase(phase, &state.metrics, state.current_phase_iteration))
    }

    /// Leave the current phase.
    ///
    /// The last phase finalizes the run. Any other phase first checks the
    /// profile's quality gates; a failing `halt` gate leaves the state exactly
    /// as it was, so a halted attempt is not recorded in the phase history.
    /// Only the gate evaluations in the returned outcome and the warning log
    /// show that it happened.
    ///
    /// The archive record takes `ctx.scenario_id` when given, and otherwise
    /// the scenario the run was started with.
    pub async fn advance_phase(
        &self,
        task_id: &str,
        ctx: &ScenarioContext,
    ) -> SteerResult<AdvanceOutcome> {
        let _guard = self.locks.acquire(task_id).await;

        let mut state = self.require_state(task_id).await?;
        let profile = self.load_profile(&state.profile_id).await?;

        let Some(phase) = state.current_phase(&profile).cloned() else {
            // The profile lost phases since the state was written.
            let performance = self.store.finalize_execution(&state, ctx.scenario_id.clone()).await?;
            return Ok(completed_outcome(&profile, performance));
        };

        let stop_reason = self
            .coordinator
            .determine_stop_reason(state.current_phase_iteration, phase.max_iterations);

        if profile.is_last_phase(state.current_phase_index) {
            state.record_phase_completion(&phase, stop_reason);
            let performance = self.store.finalize_execution(&state, ctx.scenario_id.clone()).await?;
            tracing::info!(
                task_id,
                profile_id = %profile.id,
                total_iterations = performance.total_iterations,
                effectiveness = performance.effectiveness_score,
                "Execution completed and archived"
            );
            return Ok(completed_outcome(&profile, performance));
        }

        let gate_evaluations = self
            .coordinator
            .evaluate_quality_gates(&profile.quality_gates, &state.metrics);

        if let Some(halt) = self.coordinator.should_halt_on_quality_gates(&gate_evaluations) {
            tracing::warn!(
                task_id,
                phase_index = state.current_phase_index,
                gate = %halt.gate_name,
                "Phase advancement halted by quality gate"
            );
            return Ok(AdvanceOutcome {
                success: false,
                next_phase_index: Some(state.current_phase_index),
                completed: false,
                message: halt.message,
                gate_evaluations,
                performance: None,
            });
        }

        for failed in gate_evaluations.iter().filter(|e| !e.passed) {
            tracing::warn!(
                task_id,
                gate = %failed.gate_name,
                action = %failed.action,
                "Quality gate failed without blocking advancement"
            );
        }

        state.record_phase_completion(&phase, stop_reason);
        state.advance_to_next_phase();
        self.store.save(&mut state).await?;

        let next_index = state.current_phase_index;
        let message = match profile.phase(next_index) {
            Some(next) => format!(
                "Advanced from '{}' to phase '{}' ({})",
                phase.id, next.id, next.mode
            ),
            None => format!("Advanced past phase '{}'", phase.id),
        };
        tracing::info!(
            task_id,
            from = %phase.id,
            phase_index = next_index,
            reason = %stop_reason,
            "Phase advanced"
        );
        Ok(AdvanceOutcome {
            success: true,
            next_phase_index: Some(next_index),
            completed: false,
            message,
            gate_evaluations,
            performance: None,
        })
    }

    /// Administratively reposition a task. Out-of-range targets are clamped.
    ///
    /// With no active state, a `profile_id` starts the run first; without one
    /// the call fails with `ExecutionNotFound`. For an active state the
    /// stored profile is authoritative.
    pub async fn seek_execution(
        &self,
        task_id: &str,
        phase_index: i64,
        phase_iteration: i64,
        profile_id: Option<&str>,
        ctx: &ScenarioContext,
    ) -> SteerResult<ExecutionState> {
        let _guard = self.locks.acquire(task_id).await;

        let mut state = match (self.store.get(task_id).await?, profile_id) {
            (Some(state), requested) => {
                if let Some(requested) = requested.filter(|p| *p != state.profile_id) {
                    tracing::warn!(
                        task_id,
                        requested,
                        active = %state.profile_id,
                        "Seek ignores profile argument for an active execution"
                    );
                }
                state
            }
            (None, Some(profile_id)) => self.start_locked(task_id, profile_id, ctx).await?,
            (None, None) => {
                return Err(SteerError::ExecutionNotFound {
                    task_id: task_id.to_string(),
                });
            }
        };

        let profile = self.load_profile(&state.profile_id).await?;
        let history_before = state.phase_history.len();
        let target = state.seek(&profile, phase_index, phase_iteration);
        self.store.save(&mut state).await?;

        tracing::info!(
            task_id,
            phase_index = target.phase_index,
            iteration = target.phase_iteration,
            total = state.total_iteration_counter,
            history_dropped = history_before - state.phase_history.len(),
            "Execution repositioned"
        );
        Ok(state)
    }

    /// Mode of the current phase, or `None` with no state or past the last phase.
    pub async fn get_current_mode(&self, task_id: &str) -> SteerResult<Option<PhaseMode>> {
        let Some(state) = self.store.get(task_id).await? else {
            return Ok(None);
        };
        let profile = self.load_profile(&state.profile_id).await?;
        Ok(state.current_phase(&profile).map(|p| p.mode))
    }

    /// Cancel a run. Returns whether a record existed.
    pub async fn delete_execution_state(&self, task_id: &str) -> SteerResult<bool> {
        let _guard = self.locks.acquire(task_id).await;
        let deleted = self.store.delete(task_id).await?;
        if deleted {
            tracing::info!(task_id, "Execution cancelled");
        }
        Ok(deleted)
    }

    pub async fn status(&self, task_id: &str) -> SteerResult<Option<ExecutionStatus>> {
        let Some(state) = self.store.get(task_id).await? else {
            return Ok(None);
        };
        let profile = self.load_profile(&state.profile_id).await?;
        let phase = state.current_phase(&profile).cloned();
        let remaining_iterations = phase
            .as_ref()
            .map(|p| p.max_iterations.saturating_sub(state.current_phase_iteration))
            .unwrap_or(0);
        Ok(Some(ExecutionStatus {
            profile_name: profile.name.clone(),
            phase_count: profile.phases.len(),
            phase,
            remaining_iterations,
            state,
        }))
    }

    pub async fn history(
        &self,
        profile_id: Option<&str>,
        limit: usize,
    ) -> SteerResult<Vec<ProfilePerformance>> {
        Ok(self.store.list_history(profile_id, limit).await?)
    }

    // ── Internals ─────────────────────────────────────────────────────

    async fn load_profile(&self, profile_id: &str) -> SteerResult<Profile> {
        self.catalog
            .get_profile(profile_id)
            .await
            .map_err(SteerError::Catalog)?
            .ok_or_else(|| SteerError::ProfileNotFound {
                profile_id: profile_id.to_string(),
            })
    }

    async fn require_state(&self, task_id: &str) -> SteerResult<ExecutionState> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| SteerError::ExecutionNotFound {
                task_id: task_id.to_string(),
            })
    }

    async fn collect(
        &self,
        ctx: &ScenarioContext,
        phase_iteration: u32,
        total_iterations: u64,
    ) -> SteerResult<MetricsSnapshot> {
        let collection = self
            .provider
            .collect_metrics(ctx, phase_iteration, total_iterations);
        let result = match self.config.metrics_timeout {
            Some(limit) => tokio::time::timeout(limit, collection)
                .await
                .map_err(|_| SteerError::MetricsTimeout {
                    seconds: limit.as_secs(),
                })?,
            None => collection.await,
        };
        result.map_err(SteerError::MetricsCollection)
    }
}

fn completed_outcome(profile: &Profile, performance: ProfilePerformance) -> AdvanceOutcome {
    AdvanceOutcome {
        success: true,
        next_phase_index: None,
        completed: true,
        message: format!(
            "Profile '{}' completed: {} phases, {} iterations, effectiveness {:.2}",
            profile.name,
            performance.phases_completed,
            performance.total_iterations,
            performance.effectiveness_score
        ),
        gate_evaluations: Vec::new(),
        performance: Some(performance),
    }
}
