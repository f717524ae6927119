use serde::{Deserialize, Serialize};
use std::time::Duration;

use autosteer_common::{ExecutionState, Phase, PhaseMode, ProfilePerformance};

use crate::coordinator::GateEvaluation;

/// Orchestrator behavior switches, usually filled from `[engine]` config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// When false, `start_execution` on an active task fails instead of reinitializing.
    pub allow_restart: bool,
    /// Upper bound on one metrics collection. `None` waits indefinitely.
    pub metrics_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            allow_restart: true,
            metrics_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Result of `advance_phase`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub success: bool,
    /// Phase index after the call. `None` once the run has been finalized.
    pub next_phase_index: Option<usize>,
    pub completed: bool,
    pub message: String,
    #[serde(default)]
    pub gate_evaluations: Vec<GateEvaluation>,
    /// Archival record, present when this call finalized the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<ProfilePerformance>,
}

/// Read-only view of an active execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStatus {
    pub state: ExecutionState,
    pub profile_name: String,
    pub phase_count: usize,
    /// Definition of the current phase; `None` once past the last phase
    pub phase: Option<Phase>,
    pub remaining_iterations: u32,
}

impl ExecutionStatus {
    pub fn mode(&self) -> Option<PhaseMode> {
        self.phase.as_ref().map(|p| p.mode)
    }

    pub fn is_past_last_phase(&self) -> bool {
        self.phase.is_none()
    }
}
