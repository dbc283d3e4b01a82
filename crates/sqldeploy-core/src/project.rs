//! The in-memory project model.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ScriptError};
use crate::script::SourceScript;

/// File name of the project manifest at the project root.
pub const MANIFEST_FILE: &str = "project.json";

/// Project identity, read from the project manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfiguration {
    /// Project name, the key of the deployment record.
    pub project: String,
    /// Version being deployed. Compared as plain text.
    pub version: String,
    /// Scripts to deploy before all others, by name.
    #[serde(default)]
    pub priority_scripts: Vec<String>,
}

impl ProjectConfiguration {
    /// Creates a configuration with no priority scripts.
    #[must_use]
    pub fn new(project: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
            priority_scripts: Vec::new(),
        }
    }

    /// Reads the manifest from a project root.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| ScriptError::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ScriptError::Manifest {
            path,
            message: e.to_string(),
        })
    }

    /// Returns whether `recorded` is at least this version.
    ///
    /// The comparison is byte-wise lexicographic, so `"9"` is newer than
    /// `"10"`.
    #[must_use]
    pub fn is_superseded_by(&self, recorded: &str) -> bool {
        recorded >= self.version.as_str()
    }
}

/// Outcome of loading a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Every script parsed and none failed validation.
    Success,
    /// At least one script failed to parse or failed validation.
    Failure,
}

/// A loaded project: priority and non-priority scripts, in load order.
#[derive(Debug, Clone)]
pub struct Project {
    configuration: ProjectConfiguration,
    priority_scripts: Vec<SourceScript>,
    non_priority_scripts: Vec<SourceScript>,
    status: LoadStatus,
}

impl Project {
    /// Creates a project.
    #[must_use]
    pub fn new(
        configuration: ProjectConfiguration,
        priority_scripts: Vec<SourceScript>,
        non_priority_scripts: Vec<SourceScript>,
        status: LoadStatus,
    ) -> Self {
        Self {
            configuration,
            priority_scripts,
            non_priority_scripts,
            status,
        }
    }

    /// The project identity.
    #[must_use]
    pub fn configuration(&self) -> &ProjectConfiguration {
        &self.configuration
    }

    /// Scripts deployed first, across all their phases.
    #[must_use]
    pub fn priority_scripts(&self) -> &[SourceScript] {
        &self.priority_scripts
    }

    /// Scripts deployed phase by phase after the priority scripts.
    #[must_use]
    pub fn non_priority_scripts(&self) -> &[SourceScript] {
        &self.non_priority_scripts
    }

    /// Priority scripts, mutable so deployment can record finished phases.
    pub fn priority_scripts_mut(&mut self) -> &mut [SourceScript] {
        &mut self.priority_scripts
    }

    /// Non-priority scripts, mutable so deployment can record finished
    /// phases.
    pub fn non_priority_scripts_mut(&mut self) -> &mut [SourceScript] {
        &mut self.non_priority_scripts
    }

    /// All scripts, priority scripts first.
    pub fn scripts(&self) -> impl Iterator<Item = &SourceScript> {
        self.priority_scripts
            .iter()
            .chain(self.non_priority_scripts.iter())
    }

    /// The load status.
    #[must_use]
    pub const fn status(&self) -> LoadStatus {
        self.status
    }
}
