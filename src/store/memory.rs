use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use autosteer_common::{ExecutionState, MetricsSnapshot, ProfilePerformance};

use super::{ExecutionStateStore, StoreResult};
use crate::errors::StoreError;

#[derive(Default)]
struct Inner {
    live: HashMap<String, ExecutionState>,
    archive: Vec<ProfilePerformance>,
}

/// Process-local store. Live records and the archive share one mutex, so
/// finalize is a single critical section.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: Mutex<Inner>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Fails unless the live record still carries `state.version`. A version 0
    /// state has never been stored and only passes when no record exists.
    fn check_version(inner: &Inner, state: &ExecutionState) -> StoreResult<()> {
        match inner.live.get(&state.task_id) {
            Some(stored) if stored.version != state.version => Err(StoreError::Conflict {
                task_id: state.task_id.clone(),
                expected: state.version,
                found: stored.version,
            }),
            None if state.version != 0 => Err(StoreError::Missing {
                task_id: state.task_id.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Number of archived runs.
    pub fn archived_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.archive.len())
    }
}

#[async_trait]
impl ExecutionStateStore for InMemoryStateStore {
    async fn initialize_state(
        &self,
        task_id: &str,
        profile_id: &str,
        scenario_id: Option<String>,
        initial_metrics: MetricsSnapshot,
    ) -> StoreResult<ExecutionState> {
        let mut inner = self.lock()?;
        let mut state =
            ExecutionState::new(task_id, profile_id, initial_metrics).with_scenario(scenario_id);
        // Continue the version sequence so holders of the old record conflict.
        state.version = inner.live.get(task_id).map(|s| s.version + 1).unwrap_or(1);
        inner.live.insert(task_id.to_string(), state.clone());
        Ok(state)
    }

    async fn get(&self, task_id: &str) -> StoreResult<Option<ExecutionState>> {
        Ok(self.lock()?.live.get(task_id).cloned())
    }

    async fn save(&self, state: &mut ExecutionState) -> StoreResult<()> {
        let mut inner = self.lock()?;
        Self::check_version(&inner, state)?;
        state.version += 1;
        inner.live.insert(state.task_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, task_id: &str) -> StoreResult<bool> {
        Ok(self.lock()?.live.remove(task_id).is_some())
    }

    async fn finalize_execution(
        &self,
        state: &ExecutionState,
        scenario_id: Option<String>,
    ) -> StoreResult<ProfilePerformance> {
        let performance = ProfilePerformance::from_state(state, scenario_id);
        let mut inner = self.lock()?;
        Self::check_version(&inner, state)?;
        inner.archive.push(performance.clone());
        inner.live.remove(&state.task_id);
        Ok(performance)
    }

    async fn list_history(
        &self,
        profile_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ProfilePerformance>> {
        let inner = self.lock()?;
        Ok(inner
            .archive
            .iter()
            .rev()
            .filter(|p| profile_id.is_none_or(|id| p.profile_id == id))
            .take(limit)
            .cloned()
            .collect())
    }
}
