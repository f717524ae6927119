//! Profile catalog: lookup and authoring of profiles.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use autosteer_common::{Profile, validate_profile};

/// Source of profiles for the orchestrator.
///
/// Only `get_profile` is needed at run time. The write operations validate the
/// profile before storing it and never persist a malformed one.
#[async_trait]
pub trait ProfileCatalog: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>>;

    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// Store a new profile. An empty id is replaced with a generated one.
    async fn create_profile(&self, profile: Profile) -> Result<Profile>;

    /// Replace an existing profile, keeping its `created_at`.
    async fn update_profile(&self, profile: Profile) -> Result<Profile>;

    async fn delete_profile(&self, id: &str) -> Result<bool>;
}

/// Assign an id if missing, stamp timestamps, and validate.
pub(crate) fn prepare_new_profile(mut profile: Profile) -> Result<Profile> {
    if profile.id.trim().is_empty() {
        profile.id = uuid::Uuid::new_v4().to_string();
    }
    let now = Utc::now();
    profile.created_at = now;
    profile.updated_at = now;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Parse a profile definition file. The format follows the extension:
/// `.json`, `.toml`, or `.yaml`/`.yml`.
pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile file {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let profile: Profile = match ext.as_str() {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON profile {}", path.display()))?,
        "toml" => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML profile {}", path.display()))?,
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML profile {}", path.display()))?,
        other => bail!(
            "Unsupported profile format '{}'. Valid values: json, toml, yaml, yml",
            other
        ),
    };
    Ok(profile)
}

/// Catalog held in process memory.
#[derive(Default)]
pub struct InMemoryProfileCatalog {
    profiles: Mutex<BTreeMap<String, Profile>>,
}

impl InMemoryProfileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with profiles. Each is validated.
    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Result<Self> {
        let catalog = Self::new();
        {
            let mut map = catalog.lock()?;
            for profile in profiles {
                validate_profile(&profile)?;
                map.insert(profile.id.clone(), profile);
            }
        }
        Ok(catalog)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Profile>>> {
        self.profiles
            .lock()
            .map_err(|e| anyhow::anyhow!("Catalog lock poisoned: {}", e))
    }
}

#[async_trait]
impl ProfileCatalog for InMemoryProfileCatalog {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn create_profile(&self, profile: Profile) -> Result<Profile> {
        let profile = prepare_new_profile(profile)?;
        let mut map = self.lock()?;
        if map.contains_key(&profile.id) {
            bail!("Profile '{}' already exists", profile.id);
        }
        map.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    async fn update_profile(&self, mut profile: Profile) -> Result<Profile> {
        validate_profile(&profile)?;
        let mut map = self.lock()?;
        let Some(existing) = map.get(&profile.id) else {
            bail!("Profile '{}' not found", profile.id);
        };
        profile.created_at = existing.created_at;
        profile.updated_at = Utc::now();
        map.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    async fn delete_profile(&self, id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(id).is_some())
    }
}
