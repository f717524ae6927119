//! Metrics providers: where snapshots come from.
//!
//! The engine only knows the [`MetricsProvider`] trait. The CLI uses
//! [`FileMetricsProvider`], which reads a JSON object of readings written by
//! whatever drives the task (a build script, a CI step, an agent harness).
//! [`FnMetricsProvider`] and [`StaticMetricsProvider`] are programmable
//! providers for embedding and tests.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use autosteer_common::MetricsSnapshot;

/// Caller-supplied context handed through to the metrics provider untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// JSON file of metric readings, consumed by [`FileMetricsProvider`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_file: Option<PathBuf>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ScenarioContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenario(mut self, scenario_id: &str) -> Self {
        self.scenario_id = Some(scenario_id.to_string());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_metrics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_file = Some(path.into());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// `metrics_file` resolved against `working_dir` when relative.
    pub fn resolved_metrics_file(&self) -> Option<PathBuf> {
        let file = self.metrics_file.as_ref()?;
        match &self.working_dir {
            Some(dir) if file.is_relative() => Some(dir.join(file)),
            _ => Some(file.clone()),
        }
    }
}

/// Produces a metrics snapshot for the current iteration.
///
/// `phase_iteration` and `total_iterations` are the counts the reading is
/// being taken for: `(0, 0)` at start, post-increment values during evaluate.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn collect_metrics(
        &self,
        ctx: &ScenarioContext,
        phase_iteration: u32,
        total_iterations: u64,
    ) -> Result<MetricsSnapshot>;
}

/// Reads readings from the JSON file named by the scenario context.
///
/// The file holds a flat object of metric names to numbers; booleans count as
/// `1`/`0`. `loops` and `total_loops` are always injected from the iteration
/// counts and override whatever the file says. A context without a metrics
/// file yields a snapshot holding only those two.
#[derive(Debug, Clone, Default)]
pub struct FileMetricsProvider {
    fallback: Option<PathBuf>,
}

impl FileMetricsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `path` when the scenario context names no metrics file.
    pub fn with_fallback(path: impl Into<PathBuf>) -> Self {
        Self {
            fallback: Some(path.into()),
        }
    }

    fn read_file(path: &Path) -> Result<MetricsSnapshot> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metrics file {}", path.display()))?;
        parse_metrics_json(&content)
            .with_context(|| format!("Failed to parse metrics file {}", path.display()))
    }
}

#[async_trait]
impl MetricsProvider for FileMetricsProvider {
    async fn collect_metrics(
        &self,
        ctx: &ScenarioContext,
        phase_iteration: u32,
        total_iterations: u64,
    ) -> Result<MetricsSnapshot> {
        let path = ctx.resolved_metrics_file().or_else(|| self.fallback.clone());
        let mut snapshot = match path {
            Some(path) => {
                let snapshot = tokio::task::spawn_blocking(move || Self::read_file(&path))
                    .await
                    .context("Metrics reader task panicked")??;
                let unknown = snapshot.unregistered_names();
                if !unknown.is_empty() {
                    tracing::debug!(metrics = ?unknown, "Metrics file contains unregistered names");
                }
                snapshot
            }
            None => MetricsSnapshot::new(),
        };
        snapshot.set("loops", f64::from(phase_iteration));
        snapshot.set("total_loops", total_iterations as f64);
        Ok(snapshot)
    }
}

/// Parse a flat JSON object of readings into a snapshot.
pub fn parse_metrics_json(content: &str) -> Result<MetricsSnapshot> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let Some(object) = value.as_object() else {
        bail!("Metrics must be a JSON object of name/number pairs");
    };

    let mut snapshot = MetricsSnapshot::new();
    for (name, raw) in object {
        let reading = match raw {
            serde_json::Value::Number(n) => n
                .as_f64()
                .with_context(|| format!("Metric '{}' is not representable as f64", name))?,
            serde_json::Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            other => bail!("Metric '{}' must be a number, got {}", name, other),
        };
        snapshot.set(name, reading);
    }
    Ok(snapshot)
}

/// Provider backed by a closure over `(phase_iteration, total_iterations)`.
pub struct FnMetricsProvider<F> {
    f: F,
}

impl<F> FnMetricsProvider<F>
where
    F: Fn(u32, u64) -> MetricsSnapshot + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> MetricsProvider for FnMetricsProvider<F>
where
    F: Fn(u32, u64) -> MetricsSnapshot + Send + Sync,
{
    async fn collect_metrics(
        &self,
        _ctx: &ScenarioContext,
        phase_iteration: u32,
        total_iterations: u64,
    ) -> Result<MetricsSnapshot> {
        Ok((self.f)(phase_iteration, total_iterations))
    }
}

/// Returns a fixed snapshot that can be swapped between calls.
#[derive(Default)]
pub struct StaticMetricsProvider {
    snapshot: Mutex<MetricsSnapshot>,
}

impl StaticMetricsProvider {
    pub fn new(snapshot: MetricsSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: MetricsSnapshot) -> Result<()> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| anyhow::anyhow!("Metrics lock poisoned: {}", e))?;
        *guard = snapshot;
        Ok(())
    }
}

#[async_trait]
impl MetricsProvider for StaticMetricsProvider {
    async fn collect_metrics(
        &self,
        _ctx: &ScenarioContext,
        _phase_iteration: u32,
        _total_iterations: u64,
    ) -> Result<MetricsSnapshot> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|e| anyhow::anyhow!("Metrics lock poisoned: {}", e))?;
        Ok(guard.clone())
    }
}
