//! Shared domain types for Auto Steer.
//!
//! | Module        | Contents                                              |
//! |---------------|-------------------------------------------------------|
//! | `metrics`     | Metric registry, `MetricsSnapshot`                    |
//! | `condition`   | `StopCondition` expression tree and operators         |
//! | `profile`     | `Profile`, `Phase`, `QualityGate`                     |
//! | `validation`  | Authoring-time validation, `ValidationError`          |
//! | `state`       | `ExecutionState`, `PhaseExecution`, seek clamping     |
//! | `performance` | `ProfilePerformance` archival record                  |

pub mod condition;
pub mod metrics;
pub mod performance;
pub mod profile;
pub mod state;
pub mod validation;

pub use condition::{ComparisonOperator, LogicalOperator, StopCondition};
pub use metrics::{METRIC_REGISTRY, MetricCategory, MetricDirection, MetricSpec, MetricsSnapshot};
pub use performance::{PhasePerformance, ProfilePerformance};
pub use profile::{GateAction, Phase, PhaseMode, Profile, QualityGate};
pub use state::{ExecutionState, PhaseExecution, SeekTarget, StopReason};
pub use validation::{ValidationError, ValidationIssue, validate_condition, validate_profile};
