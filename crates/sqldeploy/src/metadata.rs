//! Deployment records.
//!
//! Every deployment appends a row to the projects table: project name,
//! version, host and user. The latest version on record decides whether a
//! new deployment of the same project may proceed.
//!
//! Statements are produced as literal SQL text so the live backend and the
//! generated script run exactly the same SQL.

use sqldeploy_core::ProjectConfiguration;

use crate::config::ProjectsTableConfig;

/// Error raised by the generated script when the project is stale.
pub const STALE_MESSAGE: &str = "Project is older than current database version.";

/// Quotes a string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quotes an identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One row of the projects table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// Project name.
    pub project: String,
    /// Deployed version.
    pub version: String,
    /// Host running the deployment.
    pub host: String,
    /// User running the deployment.
    pub user: String,
}

impl DeploymentRecord {
    /// Creates a record for the project, deployed from this host by the
    /// current user.
    #[must_use]
    pub fn current(configuration: &ProjectConfiguration) -> Self {
        Self {
            project: configuration.project.clone(),
            version: configuration.version.clone(),
            host: host_name(),
            user: user_name(),
        }
    }
}

/// SQL for the projects table.
#[derive(Debug, Clone, Copy)]
pub struct ProjectsTable<'a> {
    config: &'a ProjectsTableConfig,
}

impl<'a> ProjectsTable<'a> {
    /// Creates the statement source for a configured table.
    #[must_use]
    pub const fn new(config: &'a ProjectsTableConfig) -> Self {
        Self { config }
    }

    /// Catalog holding the table.
    #[must_use]
    pub fn catalog(&self) -> &str {
        &self.config.catalog
    }

    /// Schema-qualified, quoted table name.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.config.catalog),
            quote_identifier(&self.config.table)
        )
    }

    /// Creates the schema and table if missing.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        format!(
            r#"CREATE SCHEMA IF NOT EXISTS {schema};
CREATE TABLE IF NOT EXISTS {table} (
    id BIGSERIAL PRIMARY KEY,
    project TEXT NOT NULL,
    version TEXT NOT NULL,
    host TEXT NOT NULL,
    deployed_by TEXT NOT NULL,
    deployed_at TIMESTAMPTZ NOT NULL DEFAULT now()
);"#,
            schema = quote_identifier(&self.config.catalog),
            table = self.qualified_name(),
        )
    }

    /// Selects the table's name if it exists, NULL otherwise.
    #[must_use]
    pub fn exists_sql(&self) -> String {
        format!(
            "SELECT to_regclass({})::text",
            quote_literal(&self.qualified_name())
        )
    }

    /// Selects the highest version on record for a project. Versions compare
    /// byte-wise.
    #[must_use]
    pub fn read_version_sql(&self, project: &str) -> String {
        format!(
            r#"SELECT MAX(version COLLATE "C") FROM {} WHERE project = {}"#,
            self.qualified_name(),
            quote_literal(project)
        )
    }

    /// Inserts a deployment record.
    #[must_use]
    pub fn insert_sql(&self, record: &DeploymentRecord) -> String {
        format!(
            "INSERT INTO {} (project, version, host, deployed_by) VALUES ({}, {}, {}, {});",
            self.qualified_name(),
            quote_literal(&record.project),
            quote_literal(&record.version),
            quote_literal(&record.host),
            quote_literal(&record.user)
        )
    }

    /// Raises an error if the recorded version is at least `version`.
    #[must_use]
    pub fn stale_guard_sql(&self, project: &str, version: &str) -> String {
        format!(
            r#"DO $guard$
BEGIN
    IF ({read}) >= {version} COLLATE "C" THEN
        RAISE EXCEPTION {message};
    END IF;
END
$guard$;"#,
            read = self.read_version_sql(project),
            version = quote_literal(version),
            message = quote_literal(STALE_MESSAGE),
        )
    }
}

/// Name of the machine running the deployment.
#[must_use]
pub fn host_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|name| name.trim().to_string())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Name of the user running the deployment.
#[must_use]
pub fn user_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
