//! Deployment backends.
//!
//! Both backends run the same ordered sequence of statements:
//!
//! 1. every priority script, all of its phases (`Pre`, `Main`, `Post`);
//! 2. for each phase in turn, every other script declaring that phase.
//!
//! Each (script, phase) resolves its catalogs and submits the phase SQL to
//! every catalog in sorted order. The first failure stops the deployment.
//! [`LiveDeployer`] executes through a [`SqlSession`](crate::session::SqlSession);
//! [`FileDeployer`] writes a single SQL file.

mod file;
mod live;

pub use file::FileDeployer;
pub use live::LiveDeployer;

use sqldeploy_core::{Phase, Project, SourceScript};
use tracing::{debug, info};

use crate::catalog::CatalogResolver;
use crate::error::{DeployError, Result};

/// A deployment backend.
#[allow(async_fn_in_trait)]
pub trait ScriptDeployer {
    /// Returns whether the project version is newer than the one on record.
    async fn can_proceed(&mut self) -> Result<bool>;

    /// Deploys every script. Must only run after [`Self::can_proceed`]
    /// returned `true`.
    async fn deploy_scripts(&mut self) -> Result<()>;
}

/// Receives catalog-scoped SQL in execution order.
#[allow(async_fn_in_trait)]
pub trait CommandSink {
    /// Called before the non-priority scripts of a phase.
    async fn begin_phase(&mut self, _phase: Phase) -> Result<()> {
        Ok(())
    }

    /// Runs `sql` against `catalog`.
    async fn submit(&mut self, catalog: &str, sql: &str) -> Result<()>;
}

/// Comment opening each phase's SQL.
#[must_use]
pub fn phase_comment(script: &str, phase: Phase) -> String {
    format!("-- sqldeploy: {script} ({phase})\n")
}

/// Sends every script phase of `project` to `sink`, in deployment order.
pub async fn deploy_project<S: CommandSink>(
    project: &mut Project,
    resolver: CatalogResolver<'_>,
    sink: &mut S,
) -> Result<()> {
    info!("~~~~~~~~~~ Priority Scripts ~~~~~~~~~~");
    for script in project.priority_scripts_mut() {
        info!(script = %script.name(), "Deploying priority script");
        for phase in Phase::ALL {
            if script.has_phase(phase) {
                deploy_phase(script, phase, resolver, sink).await?;
            }
        }
    }

    for phase in Phase::ALL {
        info!("~~~~~~~~~~ {phase} ~~~~~~~~~~");
        sink.begin_phase(phase).await?;
        for script in project
            .non_priority_scripts_mut()
            .iter_mut()
            .filter(|script| script.has_phase(phase))
        {
            deploy_phase(script, phase, resolver, sink).await?;
        }
    }

    Ok(())
}

async fn deploy_phase<S: CommandSink>(
    script: &mut SourceScript,
    phase: Phase,
    resolver: CatalogResolver<'_>,
    sink: &mut S,
) -> Result<()> {
    if script.has_phase_executed(phase) {
        debug!(script = %script.name(), phase = %phase, "Phase already executed, skipping");
        return Ok(());
    }

    let Some(sql) = script.request_phase(phase) else {
        debug!(script = %script.name(), phase = %phase, "Phase has no SQL");
        return Ok(());
    };

    let catalogs = resolver.resolve(script.catalog_patterns());
    if catalogs.is_empty() {
        return Err(DeployError::NoCatalogs {
            script: script.name().to_string(),
            phase,
            patterns: script.catalog_patterns().to_vec(),
        });
    }

    let sql = format!("{}{sql}", phase_comment(script.name(), phase));
    for catalog in &catalogs {
        info!(script = %script.name(), phase = %phase, catalog = %catalog, "Deploying");
        sink.submit(catalog, &sql).await?;
    }

    Ok(())
}
