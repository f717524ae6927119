//! Configuration view and validation commands (`autosteer config`).

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use autosteer::config::{CONFIG_FILE, SteerConfig, SteerToml};
    use autosteer::init::get_steer_dir;

    let steer_dir = get_steer_dir(project_dir);
    let config_path = steer_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Autosteer Configuration");
            println!("=======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                SteerToml::load(&config_path)?
            } else {
                println!("No autosteer.toml found at {}", config_path.display());
                println!("Using default configuration.");
                SteerToml::default()
            };
            println!();

            println!("[storage]");
            println!("  db_path = \"{}\"", toml.storage.db_path.display());
            println!();
            println!("[engine]");
            println!("  allow_restart = {}", toml.engine.allow_restart);
            println!("  metrics_timeout_secs = {}", toml.engine.metrics_timeout_secs);
            println!();
            println!("[logging]");
            println!("  level = \"{}\"", toml.logging.level);
            println!("  format = \"{}\"", toml.logging.format);
            if let Some(dir) = &toml.logging.directory {
                println!("  directory = \"{}\"", dir.display());
            }
            println!();
            println!("[history]");
            println!("  default_limit = {}", toml.history.default_limit);
            println!();

            // Show effective values (including env overrides)
            println!("Effective values (with env overrides):");
            let config = SteerConfig::new(project_dir.to_path_buf())?;
            println!("  db_path = \"{}\"", config.db_path().display());
            println!("  log_level = \"{}\"", config.log_level());
            println!();

            if !config_path.exists() {
                println!("Run 'autosteer config init' to create an autosteer.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No autosteer.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = SteerToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("autosteer.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !steer_dir.exists() {
                std::fs::create_dir_all(&steer_dir)?;
            }

            SteerToml::default().save(&config_path)?;

            println!("Created autosteer.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [storage] db_path");
            println!("  - [engine] allow_restart, metrics_timeout_secs");
            println!("  - [logging] level, format, directory");
            println!();
        }
    }

    Ok(())
}
