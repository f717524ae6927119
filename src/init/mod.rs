//! Project scaffolding for `autosteer init`.
//!
//! ```text
//! .autosteer/
//! ├── autosteer.toml   # Configuration (defaults written on first init)
//! ├── autosteer.db     # Created on first use
//! └── profiles/        # Profile definitions to import
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE, STEER_DIR, SteerToml};

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    /// Path to the .autosteer directory
    pub steer_dir: PathBuf,
    /// Whether the directory was newly created
    pub created: bool,
    /// Whether a default autosteer.toml was written
    pub wrote_config: bool,
}

pub fn get_steer_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(STEER_DIR)
}

pub fn is_initialized(project_dir: &Path) -> bool {
    get_steer_dir(project_dir).is_dir()
}

/// Create `.autosteer/` and its default files. Existing files are left alone.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let steer_dir = get_steer_dir(project_dir);
    let created = !steer_dir.exists();

    let profiles_dir = steer_dir.join("profiles");
    std::fs::create_dir_all(&profiles_dir).with_context(|| {
        format!(
            "Failed to create profiles directory: {}",
            profiles_dir.display()
        )
    })?;

    let config_path = steer_dir.join(CONFIG_FILE);
    let wrote_config = !config_path.exists();
    if wrote_config {
        SteerToml::default().save(&config_path)?;
    }

    Ok(InitResult {
        steer_dir,
        created,
        wrote_config,
    })
}
