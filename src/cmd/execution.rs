//! Execution lifecycle commands: start, evaluate, advance, seek, status, cancel.

use anyhow::Result;
use console::style;
use std::path::Path;

use autosteer::evaluator::format_condition;
use autosteer::{DecisionReason, ExecutionStatus, PhaseDecision};

use super::Session;

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn position(status: &ExecutionStatus) -> String {
    match &status.phase {
        Some(phase) => format!(
            "phase {}/{} '{}' [{}], iteration {}/{}",
            status.state.current_phase_index + 1,
            status.phase_count,
            phase.id,
            phase.mode,
            status.state.current_phase_iteration,
            phase.max_iterations
        ),
        None => "all phases completed".to_string(),
    }
}

fn describe(decision: &PhaseDecision) -> String {
    let verdict = if decision.should_stop {
        style("stop").yellow().bold().to_string()
    } else {
        style("continue").green().to_string()
    };
    match (&decision.reason, &decision.matched_condition) {
        (DecisionReason::ConditionMet, Some(condition)) => {
            format!("{} ({}: {})", verdict, decision.reason, condition)
        }
        _ => format!("{} ({})", verdict, decision.reason),
    }
}

pub async fn cmd_start(
    session: &Session,
    task: &str,
    profile_id: &str,
    metrics: Option<&Path>,
    scenario: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = session.scenario(metrics, scenario);
    let state = session
        .orchestrator
        .start_execution(task, profile_id, &ctx)
        .await?;
    if json {
        return print_json(&state);
    }
    println!("Started task '{}' with profile '{}'", task, profile_id);
    if let Some(status) = session.orchestrator.status(task).await? {
        println!("  {}", position(&status));
    }
    Ok(())
}

pub async fn cmd_evaluate(
    session: &Session,
    task: &str,
    metrics: Option<&Path>,
    no_collect: bool,
    json: bool,
) -> Result<()> {
    let decision = if no_collect {
        session
            .orchestrator
            .evaluate_without_metrics_collection(task)
            .await?
    } else {
        let ctx = session.scenario(metrics, None);
        session.orchestrator.evaluate(task, &ctx).await?
    };
    if json {
        return print_json(&decision);
    }

    if decision.reason == DecisionReason::Inactive {
        println!("No active execution for task '{}'", task);
        return Ok(());
    }
    println!("Decision: {}", describe(&decision));
    if let Some(status) = session.orchestrator.status(task).await? {
        println!("  {}", position(&status));
        if decision.should_stop && decision.reason != DecisionReason::AllPhasesCompleted {
            println!("  Run `autosteer advance {}` to leave this phase.", task);
        }
    }
    Ok(())
}

pub async fn cmd_advance(
    session: &Session,
    task: &str,
    metrics: Option<&Path>,
    scenario: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = session.scenario(metrics, scenario);
    let outcome = session.orchestrator.advance_phase(task, &ctx).await?;
    if json {
        return print_json(&outcome);
    }

    if !outcome.success {
        println!("{} {}", style("Advancement halted:").red().bold(), outcome.message);
    } else {
        println!("{}", outcome.message);
    }
    for gate in &outcome.gate_evaluations {
        let mark = if gate.passed {
            style("pass").green()
        } else {
            style("fail").red()
        };
        println!("  [{}] {} ({}): {}", mark, gate.gate_name, gate.action, gate.message);
    }
    if let Some(performance) = &outcome.performance {
        println!();
        for phase in &performance.phase_breakdown {
            println!(
                "  {:<20} {:>4} iterations  {:<15} effectiveness {:.2}",
                phase.phase_id,
                phase.iterations_used,
                phase.stop_reason.as_str(),
                phase.effectiveness
            );
        }
    }
    Ok(())
}

pub async fn cmd_seek(
    session: &Session,
    task: &str,
    phase: i64,
    iteration: i64,
    profile_id: Option<&str>,
    metrics: Option<&Path>,
    json: bool,
) -> Result<()> {
    let ctx = session.scenario(metrics, None);
    let state = session
        .orchestrator
        .seek_execution(task, phase, iteration, profile_id, &ctx)
        .await?;
    if json {
        return print_json(&state);
    }
    println!("Repositioned task '{}'", task);
    if let Some(status) = session.orchestrator.status(task).await? {
        println!("  {}", position(&status));
        println!("  total iterations: {}", status.state.total_iteration_counter);
    }
    Ok(())
}

pub async fn cmd_status(session: &Session, task: &str, json: bool) -> Result<()> {
    let status = session.orchestrator.status(task).await?;
    if json {
        return print_json(&status);
    }
    let Some(status) = status else {
        println!("No active execution for task '{}'", task);
        return Ok(());
    };

    let state = &status.state;
    println!();
    println!("{} {}", style("Task:").bold(), state.task_id);
    println!("{} {} ({})", style("Profile:").bold(), status.profile_name, state.profile_id);
    println!("{} {}", style("Position:").bold(), position(&status));
    println!(
        "{} {} total, {} left in phase",
        style("Iterations:").bold(),
        state.total_iteration_counter,
        status.remaining_iterations
    );
    println!("{} {}", style("Started:").bold(), state.started_at.to_rfc3339());

    if let Some(phase) = &status.phase {
        println!();
        println!("Stop conditions:");
        for condition in &phase.stop_conditions {
            println!("  {}", format_condition(condition, &state.metrics));
        }
    }

    if !state.phase_history.is_empty() {
        println!();
        println!("Completed phases:");
        for entry in &state.phase_history {
            println!(
                "  {:<20} {:>4} iterations  {}",
                entry.phase_id, entry.iterations_used, entry.stop_reason
            );
        }
    }

    if !state.metrics.is_empty() {
        println!();
        println!("Latest metrics:");
        for (name, value) in &state.metrics.values {
            println!("  {:<28} {}", name, value);
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_cancel(session: &Session, task: &str) -> Result<()> {
    if session.orchestrator.delete_execution_state(task).await? {
        println!("Cancelled execution for task '{}'", task);
    } else {
        println!("No active execution for task '{}'", task);
    }
    Ok(())
}
