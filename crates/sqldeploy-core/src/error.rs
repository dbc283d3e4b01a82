//! Error types for script parsing and project loading.

use std::path::PathBuf;

/// Errors that can occur while parsing scripts or loading a project.
///
/// Content problems found by the validator are never reported through this
/// type; they are attached to the script as diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A block marker without a keyword.
    #[error("Malformed block marker on line {line}: {message}")]
    MalformedMarker {
        /// 1-based line of the marker.
        line: usize,
        /// What is wrong with the marker.
        message: String,
    },

    /// Non-comment text before the first block marker.
    #[error("Text outside of any block on line {line}")]
    OrphanText {
        /// 1-based line of the offending text.
        line: usize,
    },

    /// A keyword with no registered rule and no fallback rule.
    #[error("No rule registered for block keyword '{0}'")]
    UnknownKeyword(String),

    /// The options block is not a valid options object.
    #[error("Invalid options block: {0}")]
    InvalidOptions(String),

    /// A validation pattern that does not compile.
    #[error("Invalid validation pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as configured.
        pattern: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// The project root folder does not exist.
    #[error("Project folder not found: {0}")]
    ProjectNotFound(PathBuf),

    /// The project manifest could not be read or parsed.
    #[error("Failed to read project manifest '{path}': {message}")]
    Manifest {
        /// Path to the manifest.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A script file failed to parse.
    #[error("Failed to parse script '{path}': {source}")]
    Script {
        /// Path to the script file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: Box<ScriptError>,
    },

    /// IO error (reading script files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error.
    #[error("Failed to walk project folder: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result type for script operations.
pub type Result<T> = std::result::Result<T, ScriptError>;
