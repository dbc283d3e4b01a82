//! Test doubles for deployment runs.
//!
//! [`RecordingSession`] stands in for a database: it records every statement
//! with the catalog it ran against and can be told to fail one of them.

use sqldeploy_core::{LoadStatus, Project, ProjectConfiguration, ScriptParser, SourceScript};

use crate::error::{DeployError, Result};
use crate::session::SqlSession;

/// Session that records statements instead of executing them.
#[derive(Debug, Default)]
pub struct RecordingSession {
    catalog: Option<String>,
    recorded_version: Option<String>,
    fail_on: Option<(String, String)>,
    executed: Vec<(Option<String>, String)>,
    events: Vec<&'static str>,
}

impl RecordingSession {
    /// Session whose projects table already holds `version`.
    #[must_use]
    pub fn with_recorded_version(version: &str) -> Self {
        Self {
            recorded_version: Some(version.to_string()),
            ..Self::default()
        }
    }

    /// Fails the first statement containing `fragment` run against `catalog`.
    #[must_use]
    pub fn fail_on(mut self, fragment: &str, catalog: &str) -> Self {
        self.fail_on = Some((fragment.to_string(), catalog.to_string()));
        self
    }

    /// Successful statements with their current catalog, in order.
    #[must_use]
    pub fn executed(&self) -> &[(Option<String>, String)] {
        &self.executed
    }

    /// Connection and transaction calls, in order.
    #[must_use]
    pub fn events(&self) -> &[&'static str] {
        &self.events
    }

    /// Returns whether the transaction was committed.
    #[must_use]
    pub fn committed(&self) -> bool {
        self.events.contains(&"commit")
    }

    /// Returns whether the transaction was rolled back.
    #[must_use]
    pub fn rolled_back(&self) -> bool {
        self.events.contains(&"rollback")
    }
}

impl SqlSession for RecordingSession {
    async fn open(&mut self, _server: &str) -> Result<()> {
        self.events.push("open");
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.events.push("begin");
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        self.events.push("commit");
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        self.events.push("rollback");
        Ok(())
    }

    async fn use_catalog(&mut self, catalog: &str) -> Result<()> {
        self.catalog = Some(catalog.to_string());
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let fails = self.fail_on.as_ref().is_some_and(|(fragment, catalog)| {
            sql.contains(fragment.as_str()) && self.catalog.as_deref() == Some(catalog.as_str())
        });
        if fails {
            let catalog = self.catalog.clone().unwrap_or_default();
            self.fail_on = None;
            return Err(DeployError::Io(std::io::Error::other(format!(
                "injected failure in catalog {catalog}"
            ))));
        }
        self.executed.push((self.catalog.clone(), sql.to_string()));
        Ok(())
    }

    async fn fetch_text(&mut self, sql: &str) -> Result<Option<String>> {
        let Some(version) = &self.recorded_version else {
            return Ok(None);
        };
        if sql.starts_with("SELECT to_regclass") {
            Ok(Some("deployed_projects".to_string()))
        } else if sql.contains("MAX(version") {
            Ok(Some(version.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Parses a script with the standard block rules.
///
/// # Panics
///
/// Panics if the script does not parse.
#[must_use]
pub fn script(name: &str, text: &str) -> SourceScript {
    let blocks = ScriptParser::standard()
        .parse(text)
        .unwrap_or_else(|e| panic!("script {name} does not parse: {e}"));
    SourceScript::new(name, blocks)
}

/// Builds a successfully loaded project `Test` at version `1.0`.
#[must_use]
pub fn project(priority: Vec<SourceScript>, non_priority: Vec<SourceScript>) -> Project {
    Project::new(
        ProjectConfiguration::new("Test", "1.0"),
        priority,
        non_priority,
        LoadStatus::Success,
    )
}
