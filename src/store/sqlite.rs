use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use autosteer_common::{ExecutionState, MetricsSnapshot, Profile, ProfilePerformance};

use super::{ExecutionStateStore, StoreResult};
use crate::catalog::{ProfileCatalog, prepare_new_profile};
use crate::errors::StoreError;

/// Async-safe handle to the Auto Steer database.
///
/// Wraps `SteerDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<SteerDb>>,
}

impl DbHandle {
    pub fn new(db: SteerDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(SteerDb::new(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SteerDb::new_in_memory()?))
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&SteerDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    async fn store_call<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&SteerDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.call(f).await.map_err(StoreError::Persistence)
    }
}

/// Result of a version-checked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { version: u64 },
    Conflict { found: u64 },
    Missing,
}

impl SaveOutcome {
    /// The stored version on success, or the matching `StoreError` for `state`.
    fn into_version(self, state: &ExecutionState) -> StoreResult<u64> {
        match self {
            SaveOutcome::Saved { version } => Ok(version),
            SaveOutcome::Conflict { found } => Err(StoreError::Conflict {
                task_id: state.task_id.clone(),
                expected: state.version,
                found,
            }),
            SaveOutcome::Missing => Err(StoreError::Missing {
                task_id: state.task_id.clone(),
            }),
        }
    }
}

pub struct SteerDb {
    conn: Connection,
}

fn ts(dt: &DateTime<Utc>) -> String {
    // Fixed width so lexical order matches time order.
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp '{}'", raw))?
        .with_timezone(&Utc))
}

fn to_u64(v: i64) -> u64 {
    v.max(0) as u64
}

struct StateRow {
    task_id: String,
    profile_id: String,
    current_phase_index: i64,
    current_phase_iteration: i64,
    total_iteration_counter: i64,
    phase_started_at: String,
    phase_history: String,
    metrics: String,
    phase_start_metrics: String,
    started_at: String,
    last_updated: String,
    version: i64,
    scenario_id: Option<String>,
}

impl StateRow {
    fn into_state(self) -> Result<ExecutionState> {
        Ok(ExecutionState {
            current_phase_index: to_u64(self.current_phase_index) as usize,
            current_phase_iteration: u32::try_from(self.current_phase_iteration.max(0))
                .context("Phase iteration out of range")?,
            total_iteration_counter: to_u64(self.total_iteration_counter),
            phase_started_at: parse_ts(&self.phase_started_at)?,
            phase_history: serde_json::from_str(&self.phase_history)
                .context("Failed to decode phase history")?,
            metrics: serde_json::from_str(&self.metrics).context("Failed to decode metrics")?,
            phase_start_metrics: serde_json::from_str(&self.phase_start_metrics)
                .context("Failed to decode phase start metrics")?,
            started_at: parse_ts(&self.started_at)?,
            last_updated: parse_ts(&self.last_updated)?,
            version: to_u64(self.version),
            task_id: self.task_id,
            profile_id: self.profile_id,
            scenario_id: self.scenario_id,
        })
    }
}

struct ProfileRow {
    id: String,
    name: String,
    description: String,
    phases: String,
    quality_gates: String,
    tags: String,
    created_at: String,
    updated_at: String,
}

impl ProfileRow {
    fn into_profile(self) -> Result<Profile> {
        Ok(Profile {
            phases: serde_json::from_str(&self.phases)
                .with_context(|| format!("Failed to decode phases of profile '{}'", self.id))?,
            quality_gates: serde_json::from_str(&self.quality_gates)
                .with_context(|| format!("Failed to decode gates of profile '{}'", self.id))?,
            tags: serde_json::from_str(&self.tags).context("Failed to decode profile tags")?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            name: self.name,
            description: self.description,
        })
    }
}

struct HistoryRow {
    id: String,
    task_id: String,
    profile_id: String,
    scenario_id: Option<String>,
    total_iterations: i64,
    phases_completed: i64,
    phase_breakdown: String,
    effectiveness_score: f64,
    started_at: String,
    completed_at: String,
    duration_seconds: i64,
}

impl HistoryRow {
    fn into_performance(self) -> Result<ProfilePerformance> {
        Ok(ProfilePerformance {
            phase_breakdown: serde_json::from_str(&self.phase_breakdown)
                .context("Failed to decode phase breakdown")?,
            total_iterations: to_u64(self.total_iterations),
            phases_completed: to_u64(self.phases_completed) as usize,
            effectiveness_score: self.effectiveness_score,
            started_at: parse_ts(&self.started_at)?,
            completed_at: parse_ts(&self.completed_at)?,
            duration_seconds: self.duration_seconds,
            id: self.id,
            task_id: self.task_id,
            profile_id: self.profile_id,
            scenario_id: self.scenario_id,
        })
    }
}

const STATE_COLUMNS: &str = "task_id, profile_id, current_phase_index, current_phase_iteration, \
    total_iteration_counter, phase_started_at, phase_history, metrics, phase_start_metrics, \
    started_at, last_updated, version, scenario_id";

const HISTORY_COLUMNS: &str = "id, task_id, profile_id, scenario_id, total_iterations, \
    phases_completed, phase_breakdown, effectiveness_score, started_at, completed_at, duration_seconds";

impl SteerDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // Several CLI invocations may share one database file.
        self.conn
            .busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    phases TEXT NOT NULL,
                    quality_gates TEXT NOT NULL DEFAULT '[]',
                    tags TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS execution_states (
                    task_id TEXT PRIMARY KEY,
                    profile_id TEXT NOT NULL,
                    current_phase_index INTEGER NOT NULL DEFAULT 0,
                    current_phase_iteration INTEGER NOT NULL DEFAULT 0,
                    total_iteration_counter INTEGER NOT NULL DEFAULT 0,
                    phase_started_at TEXT NOT NULL,
                    phase_history TEXT NOT NULL DEFAULT '[]',
                    metrics TEXT NOT NULL,
                    phase_start_metrics TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    last_updated TEXT NOT NULL,
                    version INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS execution_history (
                    id TEXT PRIMARY KEY,
                    task_id TEXT NOT NULL,
                    profile_id TEXT NOT NULL,
                    scenario_id TEXT,
                    total_iterations INTEGER NOT NULL,
                    phases_completed INTEGER NOT NULL,
                    phase_breakdown TEXT NOT NULL DEFAULT '[]',
                    effectiveness_score REAL NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    duration_seconds INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_history_profile ON execution_history(profile_id, completed_at);
                CREATE INDEX IF NOT EXISTS idx_history_task ON execution_history(task_id);
                ",
            )
            .context("Failed to create tables")?;

        // Additive migrations (columns are nullable, safe to re-run).
        match self
            .conn
            .execute("ALTER TABLE execution_states ADD COLUMN scenario_id TEXT", [])
        {
            Ok(_) => {}
            Err(e) if e.to_string().contains("duplicate column") => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to add scenario_id column: {}", e)),
        }
        Ok(())
    }

    // ── Profiles ──────────────────────────────────────────────────────

    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, description, phases, quality_gates, tags, created_at, updated_at
                 FROM profiles WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ProfileRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        phases: row.get(3)?,
                        quality_gates: row.get(4)?,
                        tags: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()
            .context("Failed to query profile")?;
        row.map(ProfileRow::into_profile).transpose()
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, description, phases, quality_gates, tags, created_at, updated_at
                 FROM profiles ORDER BY name, id",
            )
            .context("Failed to prepare list_profiles")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProfileRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    phases: row.get(3)?,
                    quality_gates: row.get(4)?,
                    tags: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .context("Failed to query profiles")?;
        rows.map(|r| r.context("Failed to read profile row")?.into_profile())
            .collect()
    }

    /// Insert a validated profile. Fails if the id is taken.
    pub fn insert_profile(&self, profile: &Profile) -> Result<()> {
        let inserted = self
            .conn
            .execute(
                "INSERT INTO profiles (id, name, description, phases, quality_gates, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    profile.id,
                    profile.name,
                    profile.description,
                    serde_json::to_string(&profile.phases)?,
                    serde_json::to_string(&profile.quality_gates)?,
                    serde_json::to_string(&profile.tags)?,
                    ts(&profile.created_at),
                    ts(&profile.updated_at),
                ],
            )
            .context("Failed to insert profile")?;
        if inserted == 0 {
            bail!("Profile '{}' already exists", profile.id);
        }
        Ok(())
    }

    /// Overwrite a profile's definition, keeping `created_at`. Returns false if absent.
    pub fn replace_profile(&self, profile: &Profile) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE profiles SET name = ?2, description = ?3, phases = ?4, quality_gates = ?5,
                     tags = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    profile.id,
                    profile.name,
                    profile.description,
                    serde_json::to_string(&profile.phases)?,
                    serde_json::to_string(&profile.quality_gates)?,
                    serde_json::to_string(&profile.tags)?,
                    ts(&profile.updated_at),
                ],
            )
            .context("Failed to update profile")?;
        Ok(changed > 0)
    }

    pub fn delete_profile(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM profiles WHERE id = ?1", params![id])
            .context("Failed to delete profile")?;
        Ok(deleted > 0)
    }

    // ── Execution state ───────────────────────────────────────────────

    pub fn get_state(&self, task_id: &str) -> Result<Option<ExecutionState>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM execution_states WHERE task_id = ?1", STATE_COLUMNS),
                params![task_id],
                |row| {
                    Ok(StateRow {
                        task_id: row.get(0)?,
                        profile_id: row.get(1)?,
                        current_phase_index: row.get(2)?,
                        current_phase_iteration: row.get(3)?,
                        total_iteration_counter: row.get(4)?,
                        phase_started_at: row.get(5)?,
                        phase_history: row.get(6)?,
                        metrics: row.get(7)?,
                        phase_start_metrics: row.get(8)?,
                        started_at: row.get(9)?,
                        last_updated: row.get(10)?,
                        version: row.get(11)?,
                        scenario_id: row.get(12)?,
                    })
                },
            )
            .optional()
            .context("Failed to query execution state")?;
        row.map(StateRow::into_state).transpose()
    }

    fn stored_version(&self, task_id: &str) -> Result<Option<u64>> {
        let version: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM execution_states WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read state version")?;
        Ok(version.map(to_u64))
    }

    /// Replace any existing record with a fresh state, continuing its version
    /// sequence so stale copies of the old record conflict on save.
    pub fn initialize_state(
        &self,
        task_id: &str,
        profile_id: &str,
        scenario_id: Option<String>,
        initial_metrics: MetricsSnapshot,
    ) -> Result<ExecutionState> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let previous = self.stored_version(task_id)?;
        let mut state =
            ExecutionState::new(task_id, profile_id, initial_metrics).with_scenario(scenario_id);
        state.version = previous.map(|v| v + 1).unwrap_or(1);
        tx.execute(
            "DELETE FROM execution_states WHERE task_id = ?1",
            params![task_id],
        )
        .context("Failed to clear previous execution state")?;
        Self::insert_state(&tx, &state)?;
        tx.commit().context("Failed to commit state initialization")?;
        Ok(state)
    }

    fn insert_state(conn: &Connection, state: &ExecutionState) -> Result<usize> {
        conn.execute(
            &format!(
                "INSERT INTO execution_states ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(task_id) DO NOTHING",
                STATE_COLUMNS
            ),
            params![
                state.task_id,
                state.profile_id,
                state.current_phase_index as i64,
                state.current_phase_iteration,
                state.total_iteration_counter as i64,
                ts(&state.phase_started_at),
                serde_json::to_string(&state.phase_history)?,
                serde_json::to_string(&state.metrics)?,
                serde_json::to_string(&state.phase_start_metrics)?,
                ts(&state.started_at),
                ts(&state.last_updated),
                state.version as i64,
                state.scenario_id,
            ],
        )
        .context("Failed to insert execution state")
    }

    /// Write `state` if the stored version still equals `state.version`.
    ///
    /// A state with version 0 has never been stored and is inserted.
    pub fn save_state(&self, state: &ExecutionState) -> Result<SaveOutcome> {
        if state.version == 0 {
            let mut fresh = state.clone();
            fresh.version = 1;
            if Self::insert_state(&self.conn, &fresh)? == 0 {
                let found = self.stored_version(&state.task_id)?.unwrap_or_default();
                return Ok(SaveOutcome::Conflict { found });
            }
            return Ok(SaveOutcome::Saved { version: 1 });
        }

        let changed = self
            .conn
            .execute(
                "UPDATE execution_states SET profile_id = ?3, current_phase_index = ?4,
                     current_phase_iteration = ?5, total_iteration_counter = ?6,
                     phase_started_at = ?7, phase_history = ?8, metrics = ?9,
                     phase_start_metrics = ?10, started_at = ?11, last_updated = ?12,
                     scenario_id = ?13, version = version + 1
                 WHERE task_id = ?1 AND version = ?2",
                params![
                    state.task_id,
                    state.version as i64,
                    state.profile_id,
                    state.current_phase_index as i64,
                    state.current_phase_iteration,
                    state.total_iteration_counter as i64,
                    ts(&state.phase_started_at),
                    serde_json::to_string(&state.phase_history)?,
                    serde_json::to_string(&state.metrics)?,
                    serde_json::to_string(&state.phase_start_metrics)?,
                    ts(&state.started_at),
                    ts(&state.last_updated),
                    state.scenario_id,
                ],
            )
            .context("Failed to update execution state")?;

        if changed == 1 {
            return Ok(SaveOutcome::Saved {
                version: state.version + 1,
            });
        }
        Ok(match self.stored_version(&state.task_id)? {
            Some(found) => SaveOutcome::Conflict { found },
            None => SaveOutcome::Missing,
        })
    }

    pub fn delete_state(&self, task_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM execution_states WHERE task_id = ?1",
                params![task_id],
            )
            .context("Failed to delete execution state")?;
        Ok(deleted > 0)
    }

    // ── History ───────────────────────────────────────────────────────

    /// Remove the live record and append the archive row in one transaction.
    ///
    /// The live record must still carry `version`; otherwise nothing is
    /// written. A version 0 run was never stored and archives only when no
    /// live record exists.
    pub fn archive_execution(
        &self,
        performance: &ProfilePerformance,
        version: u64,
    ) -> Result<SaveOutcome> {
        // Use unchecked_transaction so both writes are atomic.
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let removed = tx
            .execute(
                "DELETE FROM execution_states WHERE task_id = ?1 AND version = ?2",
                params![performance.task_id, version as i64],
            )
            .context("Failed to delete finalized execution state")?;
        if removed == 0 {
            // Dropping `tx` rolls back.
            match (self.stored_version(&performance.task_id)?, version) {
                (None, 0) => {}
                (Some(found), _) => return Ok(SaveOutcome::Conflict { found }),
                (None, _) => return Ok(SaveOutcome::Missing),
            }
        }

        tx.execute(
            &format!(
                "INSERT INTO execution_history ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                HISTORY_COLUMNS
            ),
            params![
                performance.id,
                performance.task_id,
                performance.profile_id,
                performance.scenario_id,
                performance.total_iterations as i64,
                performance.phases_completed as i64,
                serde_json::to_string(&performance.phase_breakdown)?,
                performance.effectiveness_score,
                ts(&performance.started_at),
                ts(&performance.completed_at),
                performance.duration_seconds,
            ],
        )
        .context("Failed to insert execution history")?;

        tx.commit().context("Failed to commit finalize")?;
        Ok(SaveOutcome::Saved { version })
    }

    pub fn list_history(
        &self,
        profile_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ProfilePerformance>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM execution_history
                 WHERE ?1 IS NULL OR profile_id = ?1
                 ORDER BY completed_at DESC, rowid DESC
                 LIMIT ?2",
                HISTORY_COLUMNS
            ))
            .context("Failed to prepare list_history")?;
        let rows = stmt
            .query_map(params![profile_id, limit as i64], |row| {
                Ok(HistoryRow {
                    id: row.get(0)?,
                    task_id: row.get(1)?,
                    profile_id: row.get(2)?,
                    scenario_id: row.get(3)?,
                    total_iterations: row.get(4)?,
                    phases_completed: row.get(5)?,
                    phase_breakdown: row.get(6)?,
                    effectiveness_score: row.get(7)?,
                    started_at: row.get(8)?,
                    completed_at: row.get(9)?,
                    duration_seconds: row.get(10)?,
                })
            })
            .context("Failed to query execution history")?;
        rows.map(|r| r.context("Failed to read history row")?.into_performance())
            .collect()
    }
}

#[async_trait]
impl ExecutionStateStore for DbHandle {
    async fn initialize_state(
        &self,
        task_id: &str,
        profile_id: &str,
        scenario_id: Option<String>,
        initial_metrics: MetricsSnapshot,
    ) -> StoreResult<ExecutionState> {
        let task_id = task_id.to_string();
        let profile_id = profile_id.to_string();
        self.store_call(move |db| {
            db.initialize_state(&task_id, &profile_id, scenario_id, initial_metrics)
        })
        .await
    }

    async fn get(&self, task_id: &str) -> StoreResult<Option<ExecutionState>> {
        let task_id = task_id.to_string();
        self.store_call(move |db| db.get_state(&task_id)).await
    }

    async fn save(&self, state: &mut ExecutionState) -> StoreResult<()> {
        let snapshot = state.clone();
        let outcome = self.store_call(move |db| db.save_state(&snapshot)).await?;
        state.version = outcome.into_version(state)?;
        Ok(())
    }

    async fn delete(&self, task_id: &str) -> StoreResult<bool> {
        let task_id = task_id.to_string();
        self.store_call(move |db| db.delete_state(&task_id)).await
    }

    async fn finalize_execution(
        &self,
        state: &ExecutionState,
        scenario_id: Option<String>,
    ) -> StoreResult<ProfilePerformance> {
        let performance = ProfilePerformance::from_state(state, scenario_id);
        let record = performance.clone();
        let version = state.version;
        let outcome = self
            .store_call(move |db| db.archive_execution(&record, version))
            .await?;
        outcome.into_version(state)?;
        Ok(performance)
    }

    async fn list_history(
        &self,
        profile_id: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<ProfilePerformance>> {
        let profile_id = profile_id.map(str::to_string);
        self.store_call(move |db| db.list_history(profile_id.as_deref(), limit))
            .await
    }
}

#[async_trait]
impl ProfileCatalog for DbHandle {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let id = id.to_string();
        self.call(move |db| db.get_profile(&id)).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.call(|db| db.list_profiles()).await
    }

    async fn create_profile(&self, profile: Profile) -> Result<Profile> {
        let profile = prepare_new_profile(profile)?;
        let stored = profile.clone();
        self.call(move |db| db.insert_profile(&stored)).await?;
        Ok(profile)
    }

    async fn update_profile(&self, mut profile: Profile) -> Result<Profile> {
        autosteer_common::validate_profile(&profile)?;
        profile.updated_at = Utc::now();
        let id = profile.id.clone();
        let stored = profile.clone();
        let existing = self
            .call(move |db| {
                let existing = db.get_profile(&stored.id)?;
                if existing.is_some() {
                    db.replace_profile(&stored)?;
                }
                Ok(existing)
            })
            .await?;
        let Some(existing) = existing else {
            bail!("Profile '{}' not found", id);
        };
        profile.created_at = existing.created_at;
        Ok(profile)
    }

    async fn delete_profile(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.call(move |db| db.delete_profile(&id)).await
    }
}
