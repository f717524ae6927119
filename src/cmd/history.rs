//! Archived run listing (`autosteer history`).

use anyhow::Result;

use super::Session;

pub async fn cmd_history(
    session: &Session,
    profile_id: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(session.config.toml.history.default_limit);
    let runs = session.orchestrator.history(profile_id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    if runs.is_empty() {
        println!("No archived runs.");
        return Ok(());
    }

    println!();
    println!(
        "{:<20} {:<20} {:<8} {:<10} {:<13} Completed",
        "Task", "Profile", "Phases", "Iterations", "Effectiveness"
    );
    for run in &runs {
        println!(
            "{:<20} {:<20} {:<8} {:<10} {:<13.2} {}",
            run.task_id,
            run.profile_id,
            run.phases_completed,
            run.total_iterations,
            run.effectiveness_score,
            run.completed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
    Ok(())
}
