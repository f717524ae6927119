//! Typed error hierarchy for the Auto Steer engine.
//!
//! Three enums cover the three layers:
//! - `EvaluationError`: condition evaluation failures (absorbed per condition)
//! - `StoreError`: execution state persistence failures
//! - `SteerError`: what orchestrator operations surface to callers

use thiserror::Error;

pub use autosteer_common::ValidationError;

/// Errors from evaluating a single stop condition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    /// The metric is not registered or was not present in the snapshot.
    #[error("Metric '{metric}' is unavailable")]
    MetricUnavailable { metric: String },

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),
}

impl EvaluationError {
    pub fn is_metric_unavailable(&self) -> bool {
        matches!(self, EvaluationError::MetricUnavailable { .. })
    }
}

/// Errors from an execution state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored record changed since it was read.
    #[error("Execution state for task '{task_id}' was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        task_id: String,
        expected: u64,
        found: u64,
    },

    /// A versioned save found no record to update.
    #[error("Execution state for task '{task_id}' no longer exists")]
    Missing { task_id: String },

    #[error("Storage error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Errors surfaced by orchestrator operations.
#[derive(Debug, Error)]
pub enum SteerError {
    #[error("Profile '{profile_id}' not found")]
    ProfileNotFound { profile_id: String },

    #[error("No execution state for task '{task_id}'")]
    ExecutionNotFound { task_id: String },

    #[error("Task '{task_id}' already has an active execution")]
    AlreadyActive { task_id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("Metrics collection failed: {0}")]
    MetricsCollection(#[source] anyhow::Error),

    #[error("Metrics collection timed out after {seconds}s")]
    MetricsTimeout { seconds: u64 },

    #[error("Profile catalog error: {0}")]
    Catalog(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SteerError {
    /// True for the "unknown id" family, which shells typically map to 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SteerError::ProfileNotFound { .. } | SteerError::ExecutionNotFound { .. }
        )
    }
}

pub type SteerResult<T> = std::result::Result<T, SteerError>;
