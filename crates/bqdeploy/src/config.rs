//! Deployment configuration: named environment profiles loaded from YAML.
//!
//! Profile selection happens in the entry point; the resolved profile is
//! passed into the deployment client explicitly.

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Dataset location used when a profile does not name one
pub const DEFAULT_LOCATION: &str = "EU";

/// Configuration file contents: one or more named environment profiles
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeployConfig {
    pub profiles: BTreeMap<String, Profile>,
    /// Profile used when none is named on the command line
    pub default_profile: Option<String>,
}

/// A single deployment environment
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Profile {
    /// Target BigQuery project identifier
    pub project: String,
    /// Folder holding service-account credential files
    pub creds_folder: PathBuf,
    /// Credential file name within the folder
    pub creds_file_name: String,
    /// Dataset location region code (defaults to "EU")
    pub location: Option<String>,
}

impl Profile {
    /// Full path to the service-account credentials file
    pub fn creds_path(&self) -> PathBuf {
        self.creds_folder.join(&self.creds_file_name)
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or(DEFAULT_LOCATION)
    }
}

impl DeployConfig {
    /// Resolve a profile by name, falling back to the configured default.
    pub fn resolve(&self, name: Option<&str>) -> Result<&Profile> {
        let name = match name.or(self.default_profile.as_deref()) {
            Some(name) => name,
            None => {
                return Err(DeployError::Config(format!(
                    "no profile named and no default_profile set (available: {})",
                    self.profile_names()
                )));
            }
        };
        self.profiles.get(name).ok_or_else(|| {
            DeployError::Config(format!(
                "unknown profile '{}' (available: {})",
                name,
                self.profile_names()
            ))
        })
    }

    fn profile_names(&self) -> String {
        self.profiles
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Load configuration from YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<DeployConfig> {
    let content = std::fs::read_to_string(&path).map_err(|e| {
        DeployError::Config(format!(
            "failed to read config file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;

    let config: DeployConfig = serde_yaml_ng::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub(crate) fn validate_config(config: &DeployConfig) -> Result<()> {
    if config.profiles.is_empty() {
        return Err(DeployError::Config(
            "at least one profile must be configured".to_string(),
        ));
    }

    for (name, profile) in &config.profiles {
        if profile.project.is_empty() {
            return Err(DeployError::Config(format!(
                "profile '{name}': project cannot be empty"
            )));
        }
        if profile.creds_file_name.is_empty() {
            return Err(DeployError::Config(format!(
                "profile '{name}': creds_file_name cannot be empty"
            )));
        }
    }

    if let Some(default) = &config.default_profile {
        if !config.profiles.contains_key(default) {
            return Err(DeployError::Config(format!(
                "default_profile '{default}' does not match any configured profile"
            )));
        }
    }

    Ok(())
}
