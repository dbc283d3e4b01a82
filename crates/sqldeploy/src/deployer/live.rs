//! Deployment through a database session.

use sqldeploy_core::Project;
use tracing::{info, warn};

use super::{deploy_project, CommandSink, ScriptDeployer};
use crate::catalog::CatalogResolver;
use crate::config::DeployerConfig;
use crate::error::Result;
use crate::metadata::{DeploymentRecord, ProjectsTable};
use crate::session::SqlSession;

/// Executes a project statement by statement on a live session.
///
/// The session's transaction is owned by the caller; the deployer only
/// issues statements inside it.
pub struct LiveDeployer<'a, S: SqlSession> {
    session: &'a mut S,
    config: &'a DeployerConfig,
    project: Project,
}

impl<'a, S: SqlSession> LiveDeployer<'a, S> {
    /// Creates a deployer for `project` over an open session.
    pub fn new(session: &'a mut S, config: &'a DeployerConfig, project: Project) -> Self {
        Self {
            session,
            config,
            project,
        }
    }

    /// The project being deployed.
    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }
}

impl<S: SqlSession> ScriptDeployer for LiveDeployer<'_, S> {
    async fn can_proceed(&mut self) -> Result<bool> {
        let table = ProjectsTable::new(&self.config.projects_table);
        let configuration = self.project.configuration();

        if self.session.fetch_text(&table.exists_sql()).await?.is_none() {
            info!(table = %table.qualified_name(), "No deployment records yet");
            return Ok(true);
        }

        let recorded = self
            .session
            .fetch_text(&table.read_version_sql(&configuration.project))
            .await?;
        match recorded {
            Some(recorded) if configuration.is_superseded_by(&recorded) => {
                warn!(
                    project = %configuration.project,
                    recorded = %recorded,
                    candidate = %configuration.version,
                    "Project is older than current database version"
                );
                Ok(false)
            }
            Some(recorded) => {
                info!(
                    project = %configuration.project,
                    recorded = %recorded,
                    candidate = %configuration.version,
                    "Newer version, proceeding"
                );
                Ok(true)
            }
            None => {
                info!(project = %configuration.project, "First deployment of project");
                Ok(true)
            }
        }
    }

    async fn deploy_scripts(&mut self) -> Result<()> {
        let table = ProjectsTable::new(&self.config.projects_table);
        let record = DeploymentRecord::current(self.project.configuration());
        self.session.execute(&table.create_table_sql()).await?;
        self.session.execute(&table.insert_sql(&record)).await?;
        info!(
            project = %record.project,
            version = %record.version,
            host = %record.host,
            user = %record.user,
            "Recorded deployment"
        );

        let resolver =
            CatalogResolver::new(&self.config.database_lookup, &self.config.default_catalog);
        let mut sink = SessionSink {
            session: &mut *self.session,
        };
        deploy_project(&mut self.project, resolver, &mut sink).await
    }
}

struct SessionSink<'s, S> {
    session: &'s mut S,
}

impl<S: SqlSession> CommandSink for SessionSink<'_, S> {
    async fn submit(&mut self, catalog: &str, sql: &str) -> Result<()> {
        self.session.use_catalog(catalog).await?;
        self.session.execute(sql).await
    }
}
