//! Per-invocation wiring: open the database and build the orchestrator.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use autosteer::config::SteerConfig;
use autosteer::{DbHandle, ExecutionOrchestrator, FileMetricsProvider, ScenarioContext};

pub struct Session {
    pub config: SteerConfig,
    pub db: DbHandle,
    pub orchestrator: ExecutionOrchestrator,
}

impl Session {
    pub fn open(config: SteerConfig) -> Result<Self> {
        let db_path = config.db_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db = DbHandle::open(&db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        tracing::debug!(db = %db_path.display(), "Database opened");

        let orchestrator = ExecutionOrchestrator::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(FileMetricsProvider::new()),
        )
        .with_config(config.toml.orchestrator_config());

        Ok(Self {
            config,
            db,
            orchestrator,
        })
    }

    /// Scenario context rooted at the project directory.
    pub fn scenario(&self, metrics: Option<&Path>, scenario_id: Option<&str>) -> ScenarioContext {
        let mut ctx = ScenarioContext::new().with_working_dir(&self.config.project_dir);
        if let Some(path) = metrics {
            ctx = ctx.with_metrics_file(path);
        }
        if let Some(id) = scenario_id {
            ctx = ctx.with_scenario(id);
        }
        ctx
    }
}
