//! End-to-end engine scenarios against the in-memory and SQLite backends.

use std::sync::Arc;

use autosteer::common::{
    ComparisonOperator, GateAction, MetricsSnapshot, Phase, PhaseMode, Profile, QualityGate,
    StopCondition, StopReason,
};
use autosteer::provider::FnMetricsProvider;
use autosteer::{
    DbHandle, DecisionReason, ExecutionOrchestrator, ExecutionStateStore, InMemoryProfileCatalog,
    InMemoryStateStore, MetricsProvider, OrchestratorConfig, ProfileCatalog, ScenarioContext, SteerError,
    StoreError,
};

fn loops_gt(value: f64) -> StopCondition {
    StopCondition::simple("loops", ComparisonOperator::GreaterThan, value)
}

/// Reports only the iteration counters the engine asks for.
fn loops_provider() -> Arc<dyn MetricsProvider> {
    Arc::new(FnMetricsProvider::new(|iteration: u32, total: u64| {
        MetricsSnapshot::new()
            .with("loops", f64::from(iteration))
            .with("total_loops", total as f64)
    }))
}

fn single_phase_profile() -> Profile {
    Profile::new(
        "single",
        "Single phase",
        vec![Phase::new("build", PhaseMode::Implement, 5).with_condition(loops_gt(3.0))],
    )
}

fn two_phase_profile() -> Profile {
    Profile::new(
        "two",
        "Build then test",
        vec![
            Phase::new("build", PhaseMode::Implement, 4).with_condition(loops_gt(2.0)),
            Phase::new("test", PhaseMode::Test, 5).with_condition(loops_gt(10.0)),
        ],
    )
}

fn gated_profile() -> Profile {
    two_phase_profile().with_gate(
        QualityGate::new(
            "tests green",
            StopCondition::simple("tests_failed", ComparisonOperator::Equal, 0.0),
            GateAction::Halt,
        )
        .with_message("Failing tests block the next phase"),
    )
}

fn long_profile() -> Profile {
    Profile::new(
        "long",
        "Long running",
        vec![Phase::new("grind", PhaseMode::Fix, 10_000).with_condition(loops_gt(1_000_000.0))],
    )
}

struct Harness {
    orchestrator: Arc<ExecutionOrchestrator>,
    catalog: Arc<InMemoryProfileCatalog>,
    store: Arc<InMemoryStateStore>,
}

fn harness(profiles: Vec<Profile>) -> Harness {
    let catalog = Arc::new(InMemoryProfileCatalog::with_profiles(profiles).unwrap());
    let store = Arc::new(InMemoryStateStore::new());
    let orchestrator =
        ExecutionOrchestrator::new(catalog.clone(), store.clone(), loops_provider());
    Harness {
        orchestrator: Arc::new(orchestrator),
        catalog,
        store,
    }
}

// =============================================================================
// Iteration and phase lifecycle
// =============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn condition_ends_phase_on_fourth_iteration() {
        let h = harness(vec![single_phase_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator
            .start_execution("task-1", "single", &ctx)
            .await
            .unwrap();

        for expected_iteration in 1..=3u32 {
            let decision = h.orchestrator.evaluate("task-1", &ctx).await.unwrap();
            assert!(!decision.should_stop, "iteration {}", expected_iteration);
            assert_eq!(decision.reason, DecisionReason::Continue);
        }

        let decision = h.orchestrator.evaluate("task-1", &ctx).await.unwrap();
        assert!(decision.should_stop);
        assert_eq!(decision.reason, DecisionReason::ConditionMet);
        assert_eq!(decision.matched_condition.as_deref(), Some("loops (4) > 3"));

        let state = h.store.get("task-1").await.unwrap().unwrap();
        assert_eq!(state.current_phase_iteration, 4);
        assert_eq!(state.total_iteration_counter, 4);
        assert_eq!(state.metrics.get("loops"), Some(4.0));
    }

    #[tokio::test]
    async fn budget_wins_over_conditions() {
        let profile = Profile::new(
            "tight",
            "Tight budget",
            vec![Phase::new("only", PhaseMode::Fix, 2).with_condition(loops_gt(50.0))],
        );
        let h = harness(vec![profile]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("t", "tight", &ctx).await.unwrap();

        assert!(!h.orchestrator.evaluate("t", &ctx).await.unwrap().should_stop);
        let decision = h.orchestrator.evaluate("t", &ctx).await.unwrap();
        assert!(decision.should_stop);
        assert_eq!(decision.reason, DecisionReason::MaxIterations);
        assert!(decision.matched_condition.is_none());
    }

    #[tokio::test]
    async fn finalizing_last_phase_archives_run() {
        let h = harness(vec![two_phase_profile()]);
        let ctx = ScenarioContext::new().with_scenario("nightly");
        h.orchestrator.start_execution("t", "two", &ctx).await.unwrap();

        for _ in 0..3 {
            h.orchestrator.evaluate("t", &ctx).await.unwrap();
        }
        let first = h.orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert!(first.success);
        assert!(!first.completed);
        assert_eq!(first.next_phase_index, Some(1));
        assert_eq!(
            h.orchestrator.get_current_mode("t").await.unwrap(),
            Some(PhaseMode::Test)
        );

        for _ in 0..5 {
            h.orchestrator.evaluate("t", &ctx).await.unwrap();
        }
        let last = h.orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert!(last.success);
        assert!(last.completed);
        assert!(last.next_phase_index.is_none());

        assert!(h.store.get("t").await.unwrap().is_none());
        assert_eq!(h.store.archived_count().unwrap(), 1);

        let history = h.orchestrator.history(None, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        let run = &history[0];
        assert_eq!(run.scenario_id.as_deref(), Some("nightly"));
        assert_eq!(run.phases_completed, 2);
        assert_eq!(run.total_iterations, 8);
        let summed: u64 = run
            .phase_breakdown
            .iter()
            .map(|p| u64::from(p.iterations_used))
            .sum();
        assert_eq!(run.total_iterations, summed);
        assert_eq!(run.phase_breakdown[0].stop_reason, StopReason::ConditionMet);
        assert_eq!(run.phase_breakdown[1].stop_reason, StopReason::MaxIterations);

        let decision = h.orchestrator.evaluate("t", &ctx).await.unwrap();
        assert_eq!(decision.reason, DecisionReason::Inactive);
    }

    #[tokio::test]
    async fn started_scenario_is_archived_without_final_context() {
        let h = harness(vec![single_phase_profile()]);
        let started = ScenarioContext::new().with_scenario("nightly");
        h.orchestrator.start_execution("t", "single", &started).await.unwrap();
        assert_eq!(
            h.store.get("t").await.unwrap().unwrap().scenario_id.as_deref(),
            Some("nightly")
        );

        let bare = ScenarioContext::new();
        h.orchestrator.evaluate("t", &bare).await.unwrap();
        let outcome = h.orchestrator.advance_phase("t", &bare).await.unwrap();
        assert!(outcome.completed);
        let performance = outcome.performance.unwrap();
        assert_eq!(performance.scenario_id.as_deref(), Some("nightly"));
    }

    #[tokio::test]
    async fn profile_shrunk_under_running_task_completes() {
        let h = harness(vec![two_phase_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("t", "two", &ctx).await.unwrap();
        for _ in 0..3 {
            h.orchestrator.evaluate("t", &ctx).await.unwrap();
        }
        let first = h.orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert_eq!(first.next_phase_index, Some(1));

        // Drop the phase the task is now in.
        let mut shrunk = two_phase_profile();
        shrunk.phases.truncate(1);
        h.catalog.update_profile(shrunk).await.unwrap();

        let decision = h.orchestrator.evaluate("t", &ctx).await.unwrap();
        assert!(decision.should_stop);
        assert_eq!(decision.reason, DecisionReason::AllPhasesCompleted);
        let decision = h
            .orchestrator
            .evaluate_without_metrics_collection("t")
            .await
            .unwrap();
        assert!(decision.should_stop);
        assert_eq!(decision.reason, DecisionReason::AllPhasesCompleted);
        assert_eq!(h.orchestrator.get_current_mode("t").await.unwrap(), None);

        // Past-the-end evaluation counts nothing.
        let state = h.store.get("t").await.unwrap().unwrap();
        assert_eq!(state.current_phase_index, 1);
        assert_eq!(state.total_iteration_counter, 3);

        let last = h.orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert!(last.success);
        assert!(last.completed);
        assert!(last.next_phase_index.is_none());
        assert_eq!(last.performance.unwrap().phases_completed, 1);
        assert!(h.store.get("t").await.unwrap().is_none());
        assert_eq!(h.store.archived_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn restart_discards_progress() {
        let h = harness(vec![two_phase_profile(), single_phase_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("t", "two", &ctx).await.unwrap();
        h.orchestrator.evaluate("t", &ctx).await.unwrap();

        let restarted = h
            .orchestrator
            .start_execution("t", "single", &ctx)
            .await
            .unwrap();
        assert_eq!(restarted.profile_id, "single");
        assert_eq!(restarted.current_phase_iteration, 0);
        assert_eq!(restarted.total_iteration_counter, 0);
    }

    #[tokio::test]
    async fn restart_refused_when_disabled() {
        let catalog = Arc::new(InMemoryProfileCatalog::with_profiles(vec![single_phase_profile()]).unwrap());
        let orchestrator = ExecutionOrchestrator::new(
            catalog,
            Arc::new(InMemoryStateStore::new()),
            loops_provider(),
        )
        .with_config(OrchestratorConfig {
            allow_restart: false,
            ..OrchestratorConfig::default()
        });
        let ctx = ScenarioContext::new();
        orchestrator.start_execution("t", "single", &ctx).await.unwrap();

        let err = orchestrator
            .start_execution("t", "single", &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, SteerError::AlreadyActive { .. }));
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let h = harness(vec![single_phase_profile()]);
        let err = h
            .orchestrator
            .start_execution("t", "missing", &ScenarioContext::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}

// =============================================================================
// Quality gates
// =============================================================================

mod gates {
    use super::*;

    #[tokio::test]
    async fn failing_halt_gate_keeps_phase() {
        let catalog = Arc::new(InMemoryProfileCatalog::with_profiles(vec![gated_profile()]).unwrap());
        let store = Arc::new(InMemoryStateStore::new());
        let provider = Arc::new(FnMetricsProvider::new(|iteration: u32, _total: u64| {
            MetricsSnapshot::new()
                .with("loops", f64::from(iteration))
                .with("tests_failed", 2.0)
        }));
        let orchestrator = ExecutionOrchestrator::new(catalog, store.clone(), provider);
        let ctx = ScenarioContext::new();

        orchestrator.start_execution("t", "two", &ctx).await.unwrap();
        orchestrator.evaluate("t", &ctx).await.unwrap();
        let before = store.get("t").await.unwrap().unwrap();

        let outcome = orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert!(!outcome.success);
        assert!(!outcome.completed);
        assert_eq!(outcome.next_phase_index, Some(0));
        assert_eq!(outcome.message, "Failing tests block the next phase");
        assert_eq!(outcome.gate_evaluations.len(), 1);
        assert!(!outcome.gate_evaluations[0].passed);

        let after = store.get("t").await.unwrap().unwrap();
        assert_eq!(after.current_phase_index, 0);
        assert!(after.phase_history.is_empty());
        assert_eq!(after.version, before.version);
    }

    #[tokio::test]
    async fn passing_gate_allows_advance() {
        let catalog = Arc::new(InMemoryProfileCatalog::with_profiles(vec![gated_profile()]).unwrap());
        let provider = Arc::new(FnMetricsProvider::new(|iteration: u32, _total: u64| {
            MetricsSnapshot::new()
                .with("loops", f64::from(iteration))
                .with("tests_failed", 0.0)
        }));
        let orchestrator =
            ExecutionOrchestrator::new(catalog, Arc::new(InMemoryStateStore::new()), provider);
        let ctx = ScenarioContext::new();

        orchestrator.start_execution("t", "two", &ctx).await.unwrap();
        orchestrator.evaluate("t", &ctx).await.unwrap();
        let outcome = orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.next_phase_index, Some(1));
        assert!(outcome.gate_evaluations.iter().all(|g| g.passed));
    }

    #[tokio::test]
    async fn missing_gate_metric_degrades_to_warning() {
        // No tests_failed reading at all: the gate cannot be evaluated.
        let h = harness(vec![gated_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("t", "two", &ctx).await.unwrap();
        h.orchestrator.evaluate("t", &ctx).await.unwrap();

        let outcome = h.orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.gate_evaluations.len(), 1);
        assert!(!outcome.gate_evaluations[0].passed);
        assert_eq!(outcome.gate_evaluations[0].action, GateAction::Warn);
    }
}

// =============================================================================
// Seek
// =============================================================================

mod seek {
    use super::*;

    #[tokio::test]
    async fn out_of_range_target_is_clamped() {
        let h = harness(vec![two_phase_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("t", "two", &ctx).await.unwrap();

        let state = h
            .orchestrator
            .seek_execution("t", 5, 99, None, &ctx)
            .await
            .unwrap();
        assert_eq!(state.current_phase_index, 1);
        assert_eq!(state.current_phase_iteration, 5);
        // Phase 0 has no history, so its full budget counts as spent.
        assert_eq!(state.total_iteration_counter, 4 + 5);

        let negative = h
            .orchestrator
            .seek_execution("t", -3, -1, None, &ctx)
            .await
            .unwrap();
        assert_eq!(negative.current_phase_index, 0);
        assert_eq!(negative.current_phase_iteration, 0);
        assert_eq!(negative.total_iteration_counter, 0);
    }

    #[tokio::test]
    async fn backward_seek_truncates_history() {
        let h = harness(vec![two_phase_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("t", "two", &ctx).await.unwrap();
        for _ in 0..3 {
            h.orchestrator.evaluate("t", &ctx).await.unwrap();
        }
        h.orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert_eq!(h.store.get("t").await.unwrap().unwrap().phase_history.len(), 1);

        let state = h
            .orchestrator
            .seek_execution("t", 0, 1, None, &ctx)
            .await
            .unwrap();
        assert_eq!(state.current_phase_index, 0);
        assert!(state.phase_history.is_empty());
        assert_eq!(state.total_iteration_counter, 1);
    }

    #[tokio::test]
    async fn seek_forward_uses_recorded_iterations() {
        let h = harness(vec![two_phase_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("t", "two", &ctx).await.unwrap();
        for _ in 0..3 {
            h.orchestrator.evaluate("t", &ctx).await.unwrap();
        }
        h.orchestrator.advance_phase("t", &ctx).await.unwrap();

        let state = h
            .orchestrator
            .seek_execution("t", 1, 2, None, &ctx)
            .await
            .unwrap();
        assert_eq!(state.phase_history.len(), 1);
        assert_eq!(state.total_iteration_counter, 3 + 2);
    }

    #[tokio::test]
    async fn seek_without_state_needs_profile() {
        let h = harness(vec![two_phase_profile()]);
        let ctx = ScenarioContext::new();

        let err = h
            .orchestrator
            .seek_execution("t", 1, 0, None, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, SteerError::ExecutionNotFound { .. }));

        let state = h
            .orchestrator
            .seek_execution("t", 1, 0, Some("two"), &ctx)
            .await
            .unwrap();
        assert_eq!(state.profile_id, "two");
        assert_eq!(state.current_phase_index, 1);
    }
}

// =============================================================================
// Concurrency and versioning
// =============================================================================

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_evaluations_count_every_iteration() {
        const CALLS: u64 = 48;
        let h = harness(vec![long_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("storm", "long", &ctx).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..CALLS {
            let orchestrator = h.orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orchestrator
                    .evaluate("storm", &ScenarioContext::new())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            let decision = handle.await.unwrap();
            assert_eq!(decision.reason, DecisionReason::Continue);
        }

        let state = h.store.get("storm").await.unwrap().unwrap();
        assert_eq!(state.total_iteration_counter, CALLS);
        assert_eq!(u64::from(state.current_phase_iteration), CALLS);
    }

    #[tokio::test]
    async fn tasks_do_not_share_counters() {
        let h = harness(vec![long_profile()]);
        let ctx = ScenarioContext::new();
        h.orchestrator.start_execution("a", "long", &ctx).await.unwrap();
        h.orchestrator.start_execution("b", "long", &ctx).await.unwrap();

        for _ in 0..3 {
            h.orchestrator.evaluate("a", &ctx).await.unwrap();
        }
        h.orchestrator.evaluate("b", &ctx).await.unwrap();

        assert_eq!(h.store.get("a").await.unwrap().unwrap().total_iteration_counter, 3);
        assert_eq!(h.store.get("b").await.unwrap().unwrap().total_iteration_counter, 1);
    }

    #[tokio::test]
    async fn stale_copy_is_rejected() {
        let store = InMemoryStateStore::new();
        store
            .initialize_state("t", "p", None, MetricsSnapshot::new())
            .await
            .unwrap();

        let mut first = store.get("t").await.unwrap().unwrap();
        let mut stale = first.clone();

        first.increment_iteration(MetricsSnapshot::new().with("loops", 1.0));
        store.save(&mut first).await.unwrap();

        stale.increment_iteration(MetricsSnapshot::new().with("loops", 1.0));
        let err = store.save(&mut stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let stored = store.get("t").await.unwrap().unwrap();
        assert_eq!(stored.version, first.version);
        assert_eq!(stored.total_iteration_counter, 1);
    }
}

// =============================================================================
// SQLite-backed engine
// =============================================================================

mod sqlite_backend {
    use super::*;

    #[tokio::test]
    async fn full_run_on_sqlite() {
        let db = DbHandle::open_in_memory().unwrap();
        db.create_profile(single_phase_profile()).await.unwrap();

        let orchestrator =
            ExecutionOrchestrator::new(Arc::new(db.clone()), Arc::new(db.clone()), loops_provider());
        let ctx = ScenarioContext::new();

        orchestrator.start_execution("t", "single", &ctx).await.unwrap();
        let mut last = None;
        for _ in 0..4 {
            last = Some(orchestrator.evaluate("t", &ctx).await.unwrap());
        }
        assert_eq!(last.unwrap().reason, DecisionReason::ConditionMet);

        let status = orchestrator.status("t").await.unwrap().unwrap();
        assert_eq!(status.profile_name, "Single phase");
        assert_eq!(status.remaining_iterations, 1);
        assert_eq!(status.mode(), Some(PhaseMode::Implement));

        let outcome = orchestrator.advance_phase("t", &ctx).await.unwrap();
        assert!(outcome.completed);
        let performance = outcome.performance.unwrap();
        assert_eq!(performance.total_iterations, 4);

        assert!(db.get("t").await.unwrap().is_none());
        let history = orchestrator.history(Some("single"), 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task_id, "t");
        assert!(orchestrator.history(Some("other"), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_removes_state_without_archiving() {
        let db = DbHandle::open_in_memory().unwrap();
        db.create_profile(single_phase_profile()).await.unwrap();
        let orchestrator =
            ExecutionOrchestrator::new(Arc::new(db.clone()), Arc::new(db.clone()), loops_provider());
        let ctx = ScenarioContext::new();

        orchestrator.start_execution("t", "single", &ctx).await.unwrap();
        assert!(orchestrator.delete_execution_state("t").await.unwrap());
        assert!(!orchestrator.delete_execution_state("t").await.unwrap());
        assert!(orchestrator.status("t").await.unwrap().is_none());
        assert!(orchestrator.history(None, 5).await.unwrap().is_empty());
    }
}
