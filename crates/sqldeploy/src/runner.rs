//! The deployment run.
//!
//! A run opens the session, optionally begins the transaction, loads and
//! validates the project, checks the recorded version, deploys, and then
//! commits or rolls back. The transaction is always finalized, whatever path
//! the run took.

use std::error::Error as StdError;
use std::fmt;

use sqldeploy_core::{LoadStatus, ProjectLoader, ScriptParser};
use tracing::{error, info};

use crate::config::{DeployerConfig, RunnerSettings};
use crate::deployer::{FileDeployer, LiveDeployer, ScriptDeployer};
use crate::error::{DeployError, Result};
use crate::session::{NullSession, PgSession, SqlSession};

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerResolution {
    /// Scripts deployed and committed.
    Committed,
    /// Project loaded and validated; nothing deployed.
    ValidationOnly,
    /// Scripts deployed, then rolled back on request.
    RolledBack,
    /// A version at least as recent is already deployed.
    StaleDeployment,
    /// Loading, validation or deployment failed.
    ExceptionThrown,
}

impl RunnerResolution {
    /// Process exit code for the resolution.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Committed => 0,
            Self::ValidationOnly => 2,
            Self::RolledBack => 3,
            Self::StaleDeployment => 50,
            Self::ExceptionThrown => 99,
        }
    }
}

impl fmt::Display for RunnerResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Committed => "Committed",
            Self::ValidationOnly => "ValidationOnly",
            Self::RolledBack => "RolledBack",
            Self::StaleDeployment => "StaleDeployment",
            Self::ExceptionThrown => "ExceptionThrown",
        };
        f.write_str(name)
    }
}

/// Failure ending a run early.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A recognized failure with a known resolution.
    #[error("{message}")]
    Resolved {
        /// What went wrong.
        message: String,
        /// Resolution of the run.
        resolution: RunnerResolution,
    },

    /// Anything else.
    #[error(transparent)]
    Unexpected(#[from] DeployError),
}

impl RunnerError {
    fn resolved(message: &str, resolution: RunnerResolution) -> Self {
        Self::Resolved {
            message: message.to_string(),
            resolution,
        }
    }
}

enum RunOutcome {
    Deployed,
    ValidationOnly,
}

/// Runs one deployment.
#[derive(Debug, Clone)]
pub struct Runner {
    settings: RunnerSettings,
    config: DeployerConfig,
}

impl Runner {
    /// Creates a runner, checking the settings.
    pub fn new(settings: RunnerSettings, config: DeployerConfig) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings, config })
    }

    /// The run settings.
    #[must_use]
    pub const fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Runs against PostgreSQL, or without a database when a unified script
    /// is generated.
    pub async fn go(&self) -> RunnerResolution {
        if self.settings.has_unified_script_path() {
            self.go_with(&mut NullSession).await
        } else {
            self.go_with(&mut PgSession::new()).await
        }
    }

    /// Runs through the given session.
    pub async fn go_with<S: SqlSession>(&self, session: &mut S) -> RunnerResolution {
        self.log_options();

        let mut commit = false;
        let early = match self.run(session).await {
            Ok(RunOutcome::Deployed) => {
                commit = !self.settings.should_rollback;
                None
            }
            Ok(RunOutcome::ValidationOnly) => Some(RunnerResolution::ValidationOnly),
            Err(RunnerError::Resolved {
                message,
                resolution,
            }) => {
                error!("<<< ERROR >>> {message}");
                Some(resolution)
            }
            Err(RunnerError::Unexpected(err)) => {
                error!(error = %ErrorChain(&err), "Unexpected failure");
                Some(RunnerResolution::ExceptionThrown)
            }
        };

        let finalized = resolve_transaction(commit, session).await;
        let resolution = early.unwrap_or(finalized);
        info!(resolution = %resolution, exit_code = resolution.exit_code(), "Run finished");
        resolution
    }

    async fn run<S: SqlSession>(
        &self,
        session: &mut S,
    ) -> std::result::Result<RunOutcome, RunnerError> {
        info!(server = %redact_server(&self.settings.server), "Opening connection");
        session.open(&self.settings.server).await?;

        if self.settings.use_transaction {
            info!("BEGINNING TRANSACTION");
            session.begin_transaction().await?;
        }

        let checker = if self.settings.bypass_check {
            None
        } else {
            Some(self.config.checker()?)
        };
        let parser = ScriptParser::standard();
        let project = ProjectLoader::new(
            &self.settings.script_project_folder,
            &parser,
            checker.as_ref(),
        )
        .load()
        .map_err(DeployError::from)?;

        if project.status() == LoadStatus::Failure {
            return Err(RunnerError::resolved(
                "Issues found loading project.  Review log for error information.",
                RunnerResolution::ExceptionThrown,
            ));
        }

        if self.settings.check_files_only {
            return Ok(RunOutcome::ValidationOnly);
        }

        match &self.settings.unified_script_path {
            Some(path) => {
                let deployer = FileDeployer::create(path, &self.config, project)?;
                deploy_with(deployer).await?;
            }
            None => deploy_with(LiveDeployer::new(session, &self.config, project)).await?,
        }

        Ok(RunOutcome::Deployed)
    }

    fn log_options(&self) {
        let settings = &self.settings;
        info!(
            server = %redact_server(&settings.server),
            project_folder = %settings.script_project_folder.display(),
            log_folder = ?settings.log_folder,
            unified_script_path = ?settings.unified_script_path,
            use_transaction = settings.use_transaction,
            rollback = settings.should_rollback,
            check_only = settings.check_files_only,
            bypass_check = settings.bypass_check,
            "runner options"
        );
    }
}

async fn deploy_with<D: ScriptDeployer>(mut deployer: D) -> std::result::Result<(), RunnerError> {
    if !deployer.can_proceed().await? {
        return Err(RunnerError::resolved(
            "Cannot proceed! A more recent version has already been deployed.",
            RunnerResolution::StaleDeployment,
        ));
    }

    if let Err(err) = deployer.deploy_scripts().await {
        error!(error = %ErrorChain(&err), "Deployment failed");
        return Err(RunnerError::resolved(
            "Deploy scripts failed.",
            RunnerResolution::ExceptionThrown,
        ));
    }

    Ok(())
}

async fn resolve_transaction<S: SqlSession>(commit: bool, session: &mut S) -> RunnerResolution {
    if commit {
        info!("~~~~~~~~~~ COMMITTING ~~~~~~~~~~");
        match session.commit_transaction().await {
            Ok(()) => RunnerResolution::Committed,
            Err(err) => {
                error!(error = %ErrorChain(&err), "Commit failed");
                RunnerResolution::ExceptionThrown
            }
        }
    } else {
        info!("~~~~~~~~~~ ROLLING BACK ~~~~~~~~~~");
        match session.rollback_transaction().await {
            Ok(()) => RunnerResolution::RolledBack,
            Err(err) => {
                error!(error = %ErrorChain(&err), "Rollback failed");
                RunnerResolution::ExceptionThrown
            }
        }
    }
}

/// Formats an error followed by its sources. A source already quoted by the
/// message before it is not repeated.
struct ErrorChain<'e>(&'e (dyn StdError + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shown = self.0.to_string();
        f.write_str(&shown)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            let message = err.to_string();
            if !shown.contains(&message) {
                write!(f, ": {message}")?;
            }
            shown = message;
            source = err.source();
        }
        Ok(())
    }
}

/// Hides the password of a connection URL.
fn redact_server(server: &str) -> String {
    let Some((scheme, rest)) = server.split_once("://") else {
        return server.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return server.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => server.to_string(),
    }
}
