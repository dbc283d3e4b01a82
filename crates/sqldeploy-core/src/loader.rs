//! Project loading.
//!
//! Walks a project folder, parses and validates every `*.sql` file, and
//! builds a [`Project`]. Problems with script content are collected for all
//! files before the load status is decided; problems with the file system
//! stop the load immediately.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::check::{ScriptCheck, ScriptChecker};
use crate::error::{Result, ScriptError};
use crate::parser::ScriptParser;
use crate::project::{LoadStatus, Project, ProjectConfiguration};
use crate::script::SourceScript;

/// Extension of script files.
pub const SCRIPT_EXTENSION: &str = "sql";

/// Loads a project folder into a [`Project`].
pub struct ProjectLoader<'a> {
    root: PathBuf,
    parser: &'a ScriptParser,
    checker: Option<&'a ScriptChecker>,
}

impl<'a> ProjectLoader<'a> {
    /// Creates a loader. Without a checker, scripts are not validated
    /// against patterns.
    pub fn new(
        root: impl Into<PathBuf>,
        parser: &'a ScriptParser,
        checker: Option<&'a ScriptChecker>,
    ) -> Self {
        Self {
            root: root.into(),
            parser,
            checker,
        }
    }

    /// The project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the project.
    pub fn load(&self) -> Result<Project> {
        if !self.root.is_dir() {
            return Err(ScriptError::ProjectNotFound(self.root.clone()));
        }

        let configuration = ProjectConfiguration::load(&self.root)?;
        info!(
            project = %configuration.project,
            version = %configuration.version,
            root = %self.root.display(),
            "Loading project"
        );

        let mut status = LoadStatus::Success;
        let mut names = HashSet::new();
        let mut priority_scripts = Vec::new();
        let mut non_priority_scripts = Vec::new();

        for path in self.script_files()? {
            let Some(mut script) = self.load_script(&path)? else {
                status = LoadStatus::Failure;
                continue;
            };

            if !names.insert(script.name().to_string()) {
                script.add_issue(
                    ScriptCheck::FAILED,
                    format!(
                        "Failed: duplicate script name '{}' ({}).",
                        script.name(),
                        path.display()
                    ),
                );
            }

            if script.is_ignored() {
                info!(script = %script.name(), "Ignoring script");
                continue;
            }

            report(&script);
            if script.check().is_blocking() {
                status = LoadStatus::Failure;
            }

            let listed = configuration
                .priority_scripts
                .iter()
                .any(|name| name == script.name());
            if script.is_priority() || listed {
                priority_scripts.push(script);
            } else {
                non_priority_scripts.push(script);
            }
        }

        for script in priority_scripts.iter().chain(non_priority_scripts.iter()) {
            for need in script.needs().filter(|need| !names.contains(*need)) {
                warn!(script = %script.name(), need = %need, "Needed script not found in project");
            }
        }

        if status == LoadStatus::Failure {
            error!(project = %configuration.project, "Project has script errors");
        }

        Ok(Project::new(
            configuration,
            priority_scripts,
            non_priority_scripts,
            status,
        ))
    }

    /// Script files under the root, sorted by path.
    fn script_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            let is_script = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION));
            if entry.file_type().is_file() && is_script {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Reads, parses and validates one file.
    ///
    /// Returns `None` if the file does not parse; the parse error is logged.
    fn load_script(&self, path: &Path) -> Result<Option<SourceScript>> {
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(script = %name, path = %path.display(), "Reading script");

        let blocks = match self.parser.parse(&text) {
            Ok(blocks) => blocks,
            Err(source) => {
                let err = ScriptError::Script {
                    path: path.to_path_buf(),
                    source: Box::new(source),
                };
                error!(script = %name, "{err}");
                return Ok(None);
            }
        };

        let mut script = SourceScript::new(name, blocks);
        if script.is_ignored() {
            return Ok(Some(script));
        }

        if let Some(checker) = self.checker {
            script.set_validation(checker.validate(&text));
        }

        let unexpected: Vec<String> = script
            .unexpected_blocks()
            .map(|block| format!("Failed: unexpected block '{}'.", block.keyword()))
            .collect();
        for message in unexpected {
            script.add_issue(ScriptCheck::FAILED, message);
        }

        Ok(Some(script))
    }
}

fn report(script: &SourceScript) {
    let check = script.check();
    if check.is_blocking() {
        error!(script = %script.name(), check = %check, "Script failed validation");
    } else if !check.is_empty() {
        warn!(script = %script.name(), check = %check, "Script has warnings");
    } else {
        debug!(script = %script.name(), "Script passed validation");
    }

    for message in script.messages() {
        if check.is_blocking() {
            error!(script = %script.name(), "  {message}");
        } else {
            warn!(script = %script.name(), "  {message}");
        }
    }
}
