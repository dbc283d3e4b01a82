//! # sqldeploy
//!
//! Deploys a folder of SQL scripts to PostgreSQL in a single transaction,
//! or writes the whole deployment to one SQL file.
//!
//! - Scripts marked as priority run first, each across all its phases.
//! - Every other script then runs phase by phase: `Pre`, `Main`, `Post`.
//! - Each script phase runs in every catalog (schema) its catalog patterns
//!   resolve to, in sorted order.
//! - A deployment is recorded per project and version; a version that is not
//!   newer than the recorded one is refused.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqldeploy::{DeployerConfig, Runner, RunnerSettings};
//!
//! let config = DeployerConfig::load("config.json".as_ref())?;
//! let settings = RunnerSettings::new("scripts/billing", "postgres://localhost/app");
//! let resolution = Runner::new(settings, config)?.go().await;
//! std::process::exit(resolution.exit_code().into());
//! ```

pub mod catalog;
pub mod config;
pub mod deployer;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod runner;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::CatalogResolver;
pub use config::{CatalogPatternLookup, DeployerConfig, RunnerSettings};
pub use deployer::{FileDeployer, LiveDeployer, ScriptDeployer};
pub use error::{DeployError, Result};
pub use runner::{Runner, RunnerError, RunnerResolution};
pub use session::{NullSession, PgSession, SqlSession};
