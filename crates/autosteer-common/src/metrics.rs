//! Metric registry and metrics snapshots.
//!
//! The registry is the single closed table of metric names that stop conditions,
//! quality gates, and snapshots may reference. Profile validation and runtime
//! evaluation both read [`METRIC_REGISTRY`]; nothing else defines metric names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grouping used when listing the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Build,
    Targets,
    Progress,
    Ux,
    Quality,
    Test,
    Performance,
    Security,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Targets => "targets",
            Self::Progress => "progress",
            Self::Ux => "ux",
            Self::Quality => "quality",
            Self::Test => "test",
            Self::Performance => "performance",
            Self::Security => "security",
        }
    }
}

/// Which way a metric should move for a phase to count as effective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDirection {
    /// Larger readings are an improvement.
    Higher,
    /// Smaller readings are an improvement.
    Lower,
    /// Counters and bookkeeping values that are not scored.
    Neutral,
}

/// One entry of the metric registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub category: MetricCategory,
    pub direction: MetricDirection,
    pub description: &'static str,
}

const fn spec(
    name: &'static str,
    category: MetricCategory,
    direction: MetricDirection,
    description: &'static str,
) -> MetricSpec {
    MetricSpec {
        name,
        category,
        direction,
        description,
    }
}

use MetricCategory as C;
use MetricDirection as D;

/// Every metric name the engine accepts.
pub static METRIC_REGISTRY: &[MetricSpec] = &[
    // Build status
    spec("build_success", C::Build, D::Higher, "1 when the last build succeeded, else 0"),
    spec("build_errors", C::Build, D::Lower, "Compiler errors in the last build"),
    spec("build_warnings", C::Build, D::Lower, "Compiler warnings in the last build"),
    spec("build_time_seconds", C::Build, D::Lower, "Wall-clock duration of the last build"),
    // Operational targets
    spec("targets_completed", C::Targets, D::Higher, "Operational targets marked complete"),
    spec("targets_total", C::Targets, D::Neutral, "Operational targets defined for the task"),
    spec("target_completion_pct", C::Targets, D::Higher, "Completed targets as a percentage"),
    // Loop progress
    spec("loops", C::Progress, D::Neutral, "Iterations spent in the current phase"),
    spec("total_loops", C::Progress, D::Neutral, "Iterations spent across all phases"),
    // UX
    spec("ux_issues", C::Ux, D::Lower, "Open UX findings"),
    spec("accessibility_issues", C::Ux, D::Lower, "Open accessibility findings"),
    spec("ux_score", C::Ux, D::Higher, "Aggregate UX review score (0-100)"),
    // Refactor / quality
    spec("lint_warnings", C::Quality, D::Lower, "Linter warnings"),
    spec("lint_errors", C::Quality, D::Lower, "Linter errors"),
    spec("cyclomatic_complexity", C::Quality, D::Lower, "Average cyclomatic complexity"),
    spec("duplication_pct", C::Quality, D::Lower, "Duplicated code as a percentage"),
    spec("todo_count", C::Quality, D::Lower, "TODO/FIXME markers in the tree"),
    spec("dead_code_items", C::Quality, D::Lower, "Unreferenced items reported by the toolchain"),
    spec("files_changed", C::Quality, D::Neutral, "Files touched since the phase started"),
    // Tests
    spec("tests_total", C::Test, D::Higher, "Tests discovered"),
    spec("tests_passed", C::Test, D::Higher, "Tests passing"),
    spec("tests_failed", C::Test, D::Lower, "Tests failing"),
    spec("test_pass_rate", C::Test, D::Higher, "Passing tests as a percentage"),
    spec("coverage_pct", C::Test, D::Higher, "Line coverage percentage"),
    spec("flaky_tests", C::Test, D::Lower, "Tests with inconsistent outcomes"),
    // Performance
    spec("response_time_ms", C::Performance, D::Lower, "p95 response time"),
    spec("memory_usage_mb", C::Performance, D::Lower, "Peak resident memory"),
    spec("cpu_usage_pct", C::Performance, D::Lower, "Average CPU utilisation"),
    spec("bundle_size_kb", C::Performance, D::Lower, "Shipped artifact size"),
    spec("benchmark_score", C::Performance, D::Higher, "Relative benchmark score"),
    // Security
    spec("vulnerabilities_critical", C::Security, D::Lower, "Critical advisories"),
    spec("vulnerabilities_high", C::Security, D::Lower, "High-severity advisories"),
    spec("vulnerabilities_total", C::Security, D::Lower, "All advisories"),
    spec("secrets_detected", C::Security, D::Lower, "Hard-coded secrets found by scanning"),
    spec("security_score", C::Security, D::Higher, "Aggregate security audit score (0-100)"),
];

/// Look up a metric by name.
pub fn metric_spec(name: &str) -> Option<&'static MetricSpec> {
    METRIC_REGISTRY.iter().find(|m| m.name == name)
}

/// Whether `name` is a registered metric.
pub fn is_registered(name: &str) -> bool {
    metric_spec(name).is_some()
}

/// A flat set of named readings taken at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
    pub collected_at: DateTime<Utc>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSnapshot {
    /// Empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            collected_at: Utc::now(),
        }
    }

    /// Build a snapshot from `(name, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            collected_at: Utc::now(),
        }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    /// Raw lookup; does not consult the registry.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names present in the snapshot that the registry does not know.
    pub fn unregistered_names(&self) -> Vec<&str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| !is_registered(name))
            .collect()
    }

    /// Per-metric change from `baseline` to `self`, for metrics present in both.
    pub fn deltas_from(&self, baseline: &MetricsSnapshot) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .filter_map(|(name, end)| baseline.get(name).map(|start| (name.clone(), end - start)))
            .collect()
    }
}
