//! Deployer configuration and run settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqldeploy_core::ScriptChecker;

use crate::error::{DeployError, Result};

/// Default file name of the deployer configuration.
pub const CONFIG_FILE: &str = "config.json";

/// Logical catalog pattern name to concrete catalog names.
pub type CatalogPatternLookup = BTreeMap<String, Vec<String>>;

/// Deployer configuration, usually read from `config.json`.
///
/// ```json
/// {
///   "databaseLookup": { "Sales": ["sales_eu", "sales_us"] },
///   "defaultCatalog": "public",
///   "validationFilter": { "warnOn": ["truncate\\s+table"], "haltOn": ["drop\\s+database"] },
///   "projectsTable": { "catalog": "sqldeploy", "table": "deployed_projects" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeployerConfig {
    /// Catalog pattern lookup.
    pub database_lookup: CatalogPatternLookup,
    /// Catalog used by scripts that declare no catalog pattern.
    pub default_catalog: String,
    /// Validation patterns.
    pub validation_filter: ValidationFilterConfig,
    /// Location of the deployment records.
    pub projects_table: ProjectsTableConfig,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            database_lookup: CatalogPatternLookup::new(),
            default_catalog: "public".to_string(),
            validation_filter: ValidationFilterConfig::default(),
            projects_table: ProjectsTableConfig::default(),
        }
    }
}

impl DeployerConfig {
    /// Reads the configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Builds a checker from the validation patterns.
    pub fn checker(&self) -> Result<ScriptChecker> {
        Ok(ScriptChecker::from_patterns(
            &self.validation_filter.warn_on,
            &self.validation_filter.halt_on,
        )?)
    }
}

/// Validation patterns, evaluated warn-on first, then halt-on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationFilterConfig {
    /// Patterns raising a warning.
    pub warn_on: Vec<String>,
    /// Patterns failing the script.
    pub halt_on: Vec<String>,
}

/// Where deployment records are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectsTableConfig {
    /// Catalog (schema) holding the table.
    pub catalog: String,
    /// Table name.
    pub table: String,
}

impl Default for ProjectsTableConfig {
    fn default() -> Self {
        Self {
            catalog: "sqldeploy".to_string(),
            table: "deployed_projects".to_string(),
        }
    }
}

/// Options for one deployment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Root folder of the script project.
    pub script_project_folder: PathBuf,
    /// Folder for log files.
    pub log_folder: Option<PathBuf>,
    /// Database server (connection URL).
    pub server: String,
    /// Write one SQL file here instead of executing.
    pub unified_script_path: Option<PathBuf>,
    /// Wrap the run in a transaction.
    pub use_transaction: bool,
    /// Roll back even if everything succeeded.
    pub should_rollback: bool,
    /// Load and validate only.
    pub check_files_only: bool,
    /// Skip pattern validation.
    pub bypass_check: bool,
}

impl RunnerSettings {
    /// Creates settings for a transactional, committing run.
    #[must_use]
    pub fn new(script_project_folder: impl Into<PathBuf>, server: impl Into<String>) -> Self {
        Self {
            script_project_folder: script_project_folder.into(),
            log_folder: None,
            server: server.into(),
            unified_script_path: None,
            use_transaction: true,
            should_rollback: false,
            check_files_only: false,
            bypass_check: false,
        }
    }

    /// Sets the log folder.
    #[must_use]
    pub fn log_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_folder = Some(path.into());
        self
    }

    /// Generates a SQL file at `path` instead of executing.
    #[must_use]
    pub fn unified_script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.unified_script_path = Some(path.into());
        self
    }

    /// Enables or disables the transaction.
    #[must_use]
    pub const fn use_transaction(mut self, enabled: bool) -> Self {
        self.use_transaction = enabled;
        self
    }

    /// Forces a rollback at the end of the run.
    #[must_use]
    pub const fn rollback(mut self, enabled: bool) -> Self {
        self.should_rollback = enabled;
        self
    }

    /// Only loads and validates the project.
    #[must_use]
    pub const fn check_files_only(mut self, enabled: bool) -> Self {
        self.check_files_only = enabled;
        self
    }

    /// Skips pattern validation.
    #[must_use]
    pub const fn bypass_check(mut self, enabled: bool) -> Self {
        self.bypass_check = enabled;
        self
    }

    /// Returns whether a SQL file is generated instead of executing.
    #[must_use]
    pub const fn has_unified_script_path(&self) -> bool {
        self.unified_script_path.is_some()
    }

    /// Checks the constraints between options.
    pub fn validate(&self) -> Result<()> {
        if self.check_files_only && self.bypass_check {
            return Err(DeployError::InvalidSettings(
                "bypass-check and check-only cannot both be set".to_string(),
            ));
        }
        if self.check_files_only && (!self.use_transaction || !self.should_rollback) {
            return Err(DeployError::InvalidSettings(
                "check-only requires a transaction and rollback".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: DeployerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DeployerConfig::default());
        assert_eq!(config.default_catalog, "public");
        assert_eq!(config.projects_table.table, "deployed_projects");
    }

    #[test]
    fn test_config_parsing() {
        let config: DeployerConfig = serde_json::from_str(
            r#"{
                "databaseLookup": { "Sales": ["sales_us", "sales_eu"] },
                "validationFilter": { "warnOn": ["truncate"], "haltOn": ["drop table"] },
                "projectsTable": { "catalog": "meta" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.database_lookup["Sales"], ["sales_us", "sales_eu"]);
        assert_eq!(config.validation_filter.halt_on, ["drop table"]);
        assert_eq!(config.projects_table.catalog, "meta");
        assert_eq!(config.projects_table.table, "deployed_projects");

        let checker = config.checker().unwrap();
        assert_eq!(checker.rules().len(), 2);
    }

    #[test]
    fn test_settings_defaults_valid() {
        let settings = RunnerSettings::new("scripts", "postgres://localhost");
        assert!(settings.use_transaction);
        assert!(!settings.has_unified_script_path());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_check_only_and_bypass_exclusive() {
        let settings = RunnerSettings::new("scripts", "")
            .rollback(true)
            .check_files_only(true)
            .bypass_check(true);
        assert!(matches!(settings.validate(), Err(DeployError::InvalidSettings(_))));
    }

    #[test]
    fn test_check_only_requires_rollback() {
        let settings = RunnerSettings::new("scripts", "").check_files_only(true);
        assert!(settings.validate().is_err());

        let settings = RunnerSettings::new("scripts", "")
            .check_files_only(true)
            .rollback(true)
            .use_transaction(false);
        assert!(settings.validate().is_err());

        let settings = RunnerSettings::new("scripts", "")
            .check_files_only(true)
            .rollback(true);
        assert!(settings.validate().is_ok());
    }
}
