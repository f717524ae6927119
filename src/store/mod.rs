//! Execution state persistence.
//!
//! | Module   | Backend                                                  |
//! |----------|----------------------------------------------------------|
//! | `memory` | `InMemoryStateStore`, one mutex over live + archive maps |
//! | `sqlite` | `SteerDb` behind `DbHandle`, also the profile catalog    |
//!
//! Every `save` is version-checked: it succeeds only when the stored record
//! still carries the caller's `version`, and bumps it on success.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use autosteer_common::{ExecutionState, MetricsSnapshot, Phase, ProfilePerformance, StopReason};

use crate::errors::StoreError;

pub use memory::InMemoryStateStore;
pub use sqlite::{DbHandle, SteerDb};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ExecutionStateStore: Send + Sync {
    /// Create a fresh state at phase 0, replacing any existing record.
    async fn initialize_state(
        &self,
        task_id: &str,
        profile_id: &str,
        scenario_id: Option<String>,
        initial_metrics: MetricsSnapshot,
    ) -> StoreResult<ExecutionState>;

    async fn get(&self, task_id: &str) -> StoreResult<Option<ExecutionState>>;

    /// Persist `state` if nobody else saved since it was read. On success
    /// `state.version` is bumped to the stored version.
    async fn save(&self, state: &mut ExecutionState) -> StoreResult<()>;

    async fn delete(&self, task_id: &str) -> StoreResult<bool>;

    /// Archive the run and remove the live record as one atomic step. Like
    /// `save`, this is version-checked: a stale `state` archives nothing.
    async fn finalize_execution(
        &self,
        state: &ExecutionState,
        scenario_id: Option<String>,
    ) -> StoreResult<ProfilePerformance>;

    /// Archived runs, newest first, optionally for one profile.
    async fn list_history(
        &self,
        profile_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ProfilePerformance>>;

    async fn increment_iteration(
        &self,
        state: &mut ExecutionState,
        new_metrics: MetricsSnapshot,
    ) -> StoreResult<()> {
        state.increment_iteration(new_metrics);
        self.save(state).await
    }

    async fn record_phase_completion(
        &self,
        state: &mut ExecutionState,
        phase: &Phase,
        stop_reason: StopReason,
    ) -> StoreResult<()> {
        state.record_phase_completion(phase, stop_reason);
        self.save(state).await
    }

    async fn advance_to_next_phase(&self, state: &mut ExecutionState) -> StoreResult<()> {
        state.advance_to_next_phase();
        self.save(state).await
    }
}
