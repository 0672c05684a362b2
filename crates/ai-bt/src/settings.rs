//! Tree and process settings, loaded from YAML.

use std::path::Path;

use ai_core::{VariableData, VariableRegistry, TIME_EPSILON};
use serde::{Deserialize, Serialize};

use crate::SettingsError;

/// What a tree does when a tick fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Keep the tree alive but stop ticking it until resumed.
    #[default]
    Pause,
    /// Rebuild the live graph and start over.
    Restart,
    /// End the tree and hand the error to the host.
    Throw,
}

/// Per-prototype settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    /// Restart the tree when the same node stays on top of the main stack for longer than this.
    /// `None` disables the watchdog.
    pub stage_timeout_seconds: Option<f32>,

    pub error_policy: ErrorPolicy,
}

impl TreeSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn with_stage_timeout(mut self, seconds: f32) -> Self {
        self.stage_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Strictly greater than: a stage lasting exactly the timeout is still allowed, within
    /// [`TIME_EPSILON`] of accumulated rounding.
    pub fn stage_timed_out(&self, elapsed: f32) -> bool {
        self.stage_timeout_seconds
            .is_some_and(|timeout| elapsed > timeout + TIME_EPSILON)
    }
}

/// Process-wide settings: the global variable declarations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub variables: Vec<VariableData>,
}

impl GlobalSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Build a registry whose global table holds these declarations.
    pub fn into_registry(self) -> Result<VariableRegistry, SettingsError> {
        Ok(VariableRegistry::with_globals(&self.variables)?)
    }
}
