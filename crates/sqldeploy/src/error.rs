//! Error types for deployment.

use sqldeploy_core::{Phase, ScriptError};

/// Errors that can occur while deploying a project.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Database error during deployment.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (configuration, generated script file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Script parsing or project loading failed.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A statement was submitted before a connection was opened.
    #[error("No open connection")]
    NotConnected,

    /// A script phase resolved to no catalog at all.
    #[error("Script '{script}' has no target catalog for phase {phase} (patterns: {patterns:?})")]
    NoCatalogs {
        /// Script name.
        script: String,
        /// Phase being deployed.
        phase: Phase,
        /// Catalog patterns the script declared.
        patterns: Vec<String>,
    },

    /// Run settings violate a constraint.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;
