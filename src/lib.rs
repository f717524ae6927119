//! Auto Steer: drives a task through a profile of phases, deciding after each
//! iteration whether the current phase should end, and gating phase
//! boundaries on quality checks.
//!
//! | Module         | Role                                                    |
//! |----------------|---------------------------------------------------------|
//! | `evaluator`    | Stop-condition evaluation against a metrics snapshot    |
//! | `coordinator`  | Phase transition policy and quality gates               |
//! | `store`        | Execution state persistence (memory, SQLite)            |
//! | `catalog`      | Profile lookup and authoring                            |
//! | `provider`     | Metrics providers and scenario context                  |
//! | `orchestrator` | The engine operations callers use                       |
//! | `config`       | `.autosteer/autosteer.toml`                             |
//! | `logging`      | Tracing subscriber setup for the CLI                    |
//! | `init`         | Project directory scaffolding                           |
//!
//! Domain types live in the `autosteer-common` crate and are re-exported as
//! [`common`].

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod evaluator;
pub mod init;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod store;

pub use autosteer_common as common;

pub use catalog::{InMemoryProfileCatalog, ProfileCatalog};
pub use coordinator::{DecisionReason, DefaultPhaseCoordinator, PhaseCoordinator, PhaseDecision};
pub use errors::{EvaluationError, SteerError, SteerResult, StoreError};
pub use evaluator::{ConditionEvaluator, MetricConditionEvaluator};
pub use orchestrator::{AdvanceOutcome, ExecutionOrchestrator, ExecutionStatus, OrchestratorConfig};
pub use provider::{FileMetricsProvider, MetricsProvider, ScenarioContext};
pub use store::{DbHandle, ExecutionStateStore, InMemoryStateStore};
