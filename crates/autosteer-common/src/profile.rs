//! Profiles: named, reusable phase plans with quality gates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::condition::StopCondition;

/// What kind of work a phase steers the agent toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    Scaffold,
    Implement,
    Fix,
    Test,
    Refactor,
    Optimize,
    Harden,
    Polish,
}

impl PhaseMode {
    pub fn all() -> &'static [PhaseMode] {
        &[
            PhaseMode::Scaffold,
            PhaseMode::Implement,
            PhaseMode::Fix,
            PhaseMode::Test,
            PhaseMode::Refactor,
            PhaseMode::Optimize,
            PhaseMode::Harden,
            PhaseMode::Polish,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseMode::Scaffold => "scaffold",
            PhaseMode::Implement => "implement",
            PhaseMode::Fix => "fix",
            PhaseMode::Test => "test",
            PhaseMode::Refactor => "refactor",
            PhaseMode::Optimize => "optimize",
            PhaseMode::Harden => "harden",
            PhaseMode::Polish => "polish",
        }
    }
}

impl fmt::Display for PhaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseMode::all()
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s.to_lowercase())
            .ok_or_else(|| {
                format!(
                    "Invalid phase mode '{}'. Valid values: scaffold, implement, fix, test, refactor, optimize, harden, polish",
                    s
                )
            })
    }
}

/// One stage of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub mode: PhaseMode,
    /// Iteration budget for the phase
    pub max_iterations: u32,
    /// Evaluated in declaration order; the first true condition ends the phase
    #[serde(default)]
    pub stop_conditions: Vec<StopCondition>,
}

impl Phase {
    pub fn new(id: &str, mode: PhaseMode, max_iterations: u32) -> Self {
        Self {
            id: id.to_string(),
            mode,
            max_iterations,
            stop_conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: StopCondition) -> Self {
        self.stop_conditions.push(condition);
        self
    }
}

/// What a failed quality gate does at a phase boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    /// Block advancement to the next phase.
    Halt,
    /// Accepted for compatibility; never blocks and behaves like `Warn`.
    SkipPhase,
    /// Report the failure and continue.
    #[default]
    Warn,
}

impl GateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateAction::Halt => "halt",
            GateAction::SkipPhase => "skip_phase",
            GateAction::Warn => "warn",
        }
    }

    pub fn blocks_advancement(&self) -> bool {
        matches!(self, GateAction::Halt)
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GateAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "halt" => Ok(GateAction::Halt),
            "skip_phase" => Ok(GateAction::SkipPhase),
            "warn" => Ok(GateAction::Warn),
            _ => Err(format!(
                "Invalid gate action '{}'. Valid values: halt, skip_phase, warn",
                s
            )),
        }
    }
}

/// A pass/fail check evaluated only between phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGate {
    pub name: String,
    pub condition: StopCondition,
    #[serde(default)]
    pub failure_action: GateAction,
    #[serde(default)]
    pub message: String,
}

impl QualityGate {
    pub fn new(name: &str, condition: StopCondition, failure_action: GateAction) -> Self {
        Self {
            name: name.to_string(),
            condition,
            failure_action,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }
}

/// A named, reusable plan: ordered phases plus boundary gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub quality_gates: Vec<QualityGate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: &str, name: &str, phases: Vec<Phase>) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            phases,
            quality_gates: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_gate(mut self, gate: QualityGate) -> Self {
        self.quality_gates.push(gate);
        self
    }

    pub fn phase(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn is_last_phase(&self, index: usize) -> bool {
        index + 1 >= self.phases.len()
    }

    /// Sum of every phase budget.
    pub fn total_budget(&self) -> u64 {
        self.phases.iter().map(|p| u64::from(p.max_iterations)).sum()
    }
}
