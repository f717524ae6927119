//! Profile catalog commands (`autosteer profile`).

use anyhow::{Context, Result};
use console::style;

use autosteer::ProfileCatalog;
use autosteer::catalog::load_profile_file;
use autosteer::common::ValidationError;

use super::super::ProfileCommands;
use super::Session;

pub async fn cmd_profile(session: &Session, command: ProfileCommands, json: bool) -> Result<()> {
    match command {
        ProfileCommands::Import { file, replace } => {
            let profile = load_profile_file(&file)?;
            let exists = !profile.id.is_empty() && session.db.get_profile(&profile.id).await?.is_some();

            let result = if exists && replace {
                session.db.update_profile(profile).await
            } else if exists {
                anyhow::bail!(
                    "Profile '{}' already exists. Use --replace to overwrite it.",
                    profile.id
                );
            } else {
                session.db.create_profile(profile).await
            };

            let stored = match result {
                Ok(p) => p,
                Err(e) => {
                    if let Some(validation) = e.downcast_ref::<ValidationError>() {
                        eprintln!("{}", style("Profile is invalid:").red().bold());
                        for issue in &validation.issues {
                            eprintln!("  - {}", issue);
                        }
                    }
                    return Err(e).context(format!("Failed to import {}", file.display()));
                }
            };

            tracing::info!(profile_id = %stored.id, replaced = exists, "Profile imported");
            if json {
                println!("{}", serde_json::to_string_pretty(&stored)?);
            } else {
                println!(
                    "{} profile '{}' ({}) with {} phases",
                    if exists { "Replaced" } else { "Imported" },
                    stored.id,
                    stored.name,
                    stored.phases.len()
                );
            }
        }
        ProfileCommands::List => {
            let profiles = session.db.list_profiles().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
                return Ok(());
            }
            if profiles.is_empty() {
                println!("No profiles found. Import one with `autosteer profile import <file>`.");
                return Ok(());
            }
            println!();
            println!("{:<24} {:<28} {:<8} {:<8}", "ID", "Name", "Phases", "Budget");
            println!(
                "{:<24} {:<28} {:<8} {:<8}",
                "------------------------", "----------------------------", "------", "------"
            );
            for p in &profiles {
                println!(
                    "{:<24} {:<28} {:<8} {:<8}",
                    p.id,
                    p.name,
                    p.phases.len(),
                    p.total_budget()
                );
            }
            println!();
        }
        ProfileCommands::Show { id } => {
            let Some(profile) = session.db.get_profile(&id).await? else {
                anyhow::bail!("Profile '{}' not found", id);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
                return Ok(());
            }
            println!();
            println!("{} ({})", style(&profile.name).bold(), profile.id);
            if !profile.description.is_empty() {
                println!("{}", profile.description);
            }
            if !profile.tags.is_empty() {
                println!("Tags: {}", profile.tags.join(", "));
            }
            println!();
            for (i, phase) in profile.phases.iter().enumerate() {
                println!(
                    "  {}. {} [{}] max {} iterations",
                    i, phase.id, phase.mode, phase.max_iterations
                );
                for condition in &phase.stop_conditions {
                    println!("       stop when {}", condition);
                }
            }
            if !profile.quality_gates.is_empty() {
                println!();
                println!("  Quality gates:");
                for gate in &profile.quality_gates {
                    println!(
                        "    {} ({}): {}",
                        gate.name,
                        style(gate.failure_action).dim(),
                        gate.condition
                    );
                }
            }

            let mut metrics: Vec<&str> = profile
                .phases
                .iter()
                .flat_map(|p| &p.stop_conditions)
                .chain(profile.quality_gates.iter().map(|g| &g.condition))
                .flat_map(|c| c.referenced_metrics())
                .collect();
            metrics.sort_unstable();
            metrics.dedup();
            println!();
            println!("  Reads metrics: {}", metrics.join(", "));
            println!();
        }
        ProfileCommands::Delete { id } => {
            if session.db.delete_profile(&id).await? {
                tracing::info!(profile_id = %id, "Profile deleted");
                println!("Deleted profile '{}'", id);
            } else {
                println!("Profile '{}' not found", id);
            }
        }
    }
    Ok(())
}
