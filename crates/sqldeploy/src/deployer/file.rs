//! Deployment into a single SQL file.
//!
//! The generated file runs the whole deployment in one serializable
//! transaction. Its first statements create the projects table and raise an
//! error if the project version is not newer than the one on record, so a
//! stale file refuses to run. If generation fails, the file is overwritten
//! with a script that refuses to run as well.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use sqldeploy_core::{Phase, Project, ProjectConfiguration};
use tracing::{error, info};

use super::{deploy_project, CommandSink, ScriptDeployer};
use crate::catalog::CatalogResolver;
use crate::config::DeployerConfig;
use crate::error::{DeployError, Result};
use crate::metadata::{host_name, quote_identifier, user_name, DeploymentRecord, ProjectsTable};

/// First line of a file whose generation failed.
pub const POISON_HEADER: &str = "-- !!! Building of script file failed.  See the log file.";

/// Error raised when a poisoned file is run.
pub const POISON_MESSAGE: &str = "Do not use this script file.";

/// Writes a project as one transactional SQL file.
pub struct FileDeployer<'a> {
    path: PathBuf,
    file: File,
    buffer: Vec<u8>,
    config: &'a DeployerConfig,
    project: Project,
}

impl<'a> FileDeployer<'a> {
    /// Creates the output file.
    ///
    /// A `path` without an extension is a folder; the file is then named
    /// after the project and version, e.g. `Billing_v1-2.sql`.
    pub fn create(path: &Path, config: &'a DeployerConfig, project: Project) -> Result<Self> {
        let path = if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.join(file_name(project.configuration()))
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        info!(path = %path.display(), "Generating script file");

        let mut buffer = Vec::new();
        writeln!(
            buffer,
            "-- Generated {} on {} by {}",
            Local::now().format("%Y-%m-%d %H:%M:%S %:z"),
            host_name(),
            user_name()
        )?;
        writeln!(
            buffer,
            "-- Project {} version {}",
            project.configuration().project,
            project.configuration().version
        )?;
        writeln!(buffer)?;

        Ok(Self {
            path,
            file,
            buffer,
            config,
            project,
        })
    }

    /// Path of the generated file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_scripts(&mut self) -> Result<()> {
        let table = ProjectsTable::new(&self.config.projects_table);
        let record = DeploymentRecord::current(self.project.configuration());
        write_command(&mut self.buffer, None, &table.insert_sql(&record))?;

        let resolver =
            CatalogResolver::new(&self.config.database_lookup, &self.config.default_catalog);
        let mut sink = BufferSink {
            buffer: &mut self.buffer,
        };
        deploy_project(&mut self.project, resolver, &mut sink).await?;

        writeln!(self.buffer, "COMMIT;")?;
        Ok(())
    }

    fn overwrite(&mut self, contents: &[u8]) -> std::io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(contents)?;
        self.file.flush()
    }

    fn poison(&mut self, reason: &DeployError) -> std::io::Result<()> {
        let mut contents = Vec::new();
        writeln!(contents, "{POISON_HEADER}")?;
        for line in reason.to_string().lines() {
            writeln!(contents, "-- {line}")?;
        }
        writeln!(contents)?;
        writeln!(
            contents,
            "DO $poison$ BEGIN RAISE EXCEPTION '{POISON_MESSAGE}'; END $poison$;"
        )?;
        self.overwrite(&contents)
    }

    /// Poisons the file if generating or writing it failed.
    fn finish(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                info!(path = %self.path.display(), "Script file written");
                Ok(())
            }
            Err(err) => {
                error!(path = %self.path.display(), error = %err, "Script file generation failed");
                if let Err(poison_err) = self.poison(&err) {
                    error!(
                        path = %self.path.display(),
                        error = %poison_err,
                        "Could not poison script file"
                    );
                }
                Err(err)
            }
        }
    }
}

impl ScriptDeployer for FileDeployer<'_> {
    async fn can_proceed(&mut self) -> Result<bool> {
        let table = ProjectsTable::new(&self.config.projects_table);
        let configuration = self.project.configuration();
        writeln!(self.buffer, "BEGIN ISOLATION LEVEL SERIALIZABLE;")?;
        writeln!(self.buffer)?;
        write_command(&mut self.buffer, None, &table.create_table_sql())?;
        write_command(
            &mut self.buffer,
            None,
            &table.stale_guard_sql(&configuration.project, &configuration.version),
        )?;
        Ok(true)
    }

    async fn deploy_scripts(&mut self) -> Result<()> {
        let result = self.write_scripts().await.and_then(|()| {
            let contents = std::mem::take(&mut self.buffer);
            self.overwrite(&contents).map_err(DeployError::from)
        });
        self.finish(result)
    }
}

/// Default file name for a project: `{project}_v{version}.sql`, with dots
/// in the version replaced by dashes.
#[must_use]
pub fn file_name(configuration: &ProjectConfiguration) -> String {
    format!(
        "{}_v{}.sql",
        configuration.project,
        configuration.version.replace('.', "-")
    )
}

fn write_command(out: &mut Vec<u8>, catalog: Option<&str>, sql: &str) -> std::io::Result<()> {
    if let Some(catalog) = catalog {
        writeln!(out, "SET search_path TO {};", quote_identifier(catalog))?;
    }
    out.write_all(sql.as_bytes())?;
    if !sql.ends_with('\n') {
        writeln!(out)?;
    }
    writeln!(out)
}

struct BufferSink<'b> {
    buffer: &'b mut Vec<u8>,
}

impl CommandSink for BufferSink<'_> {
    async fn begin_phase(&mut self, phase: Phase) -> Result<()> {
        writeln!(self.buffer, "-- deploying {phase}")?;
        writeln!(self.buffer)?;
        Ok(())
    }

    async fn submit(&mut self, catalog: &str, sql: &str) -> Result<()> {
        write_command(self.buffer, Some(catalog), sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{project, script};

    fn config() -> DeployerConfig {
        let mut config = DeployerConfig::default();
        config
            .database_lookup
            .insert("Sales".to_string(), vec!["sales_us".to_string(), "sales_eu".to_string()]);
        config
    }

    #[test]
    fn test_file_name() {
        let configuration = ProjectConfiguration::new("Billing", "1.2.3");
        assert_eq!(file_name(&configuration), "Billing_v1-2-3.sql");
    }

    #[tokio::test]
    async fn test_folder_path_gets_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let deployer =
            FileDeployer::create(&dir.path().join("out"), &config, project(Vec::new(), Vec::new()))
                .unwrap();
        assert_eq!(deployer.path(), dir.path().join("out").join("Test_v1-0.sql"));
        assert!(deployer.path().exists());
    }

    #[tokio::test]
    async fn test_writes_transactional_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.sql");
        let config = config();
        let mut deployer = FileDeployer::create(
            &path,
            &config,
            project(
                vec![script("Setup", "--@main\nCREATE TABLE t (id INT);\n")],
                vec![script("Orders", "--@catalog Sales\n--@pre\nSELECT 1;\n")],
            ),
        )
        .unwrap();

        assert!(deployer.can_proceed().await.unwrap());
        deployer.deploy_scripts().await.unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("-- Generated "));
        let begin = text.find("BEGIN ISOLATION LEVEL SERIALIZABLE;").unwrap();
        let guard = text.find("DO $guard$").unwrap();
        let insert = text.find("INSERT INTO").unwrap();
        let setup = text.find("CREATE TABLE t (id INT);").unwrap();
        let pre = text.find("-- deploying Pre").unwrap();
        let eu = text.find("SET search_path TO \"sales_eu\";").unwrap();
        let us = text.find("SET search_path TO \"sales_us\";").unwrap();
        let commit = text.find("COMMIT;").unwrap();
        assert!(begin < guard && guard < insert && insert < setup);
        assert!(setup < pre && pre < eu && eu < us && us < commit);
        assert!(text.contains("SET search_path TO \"public\";\n-- sqldeploy: Setup (Main)\n"));
    }

    #[tokio::test]
    async fn test_failure_poisons_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.sql");
        let config = config();
        let mut deployer = FileDeployer::create(
            &path,
            &config,
            project(
                Vec::new(),
                vec![script("Orders", "--@catalog Nowhere\n--@main\nSELECT 1;\n")],
            ),
        )
        .unwrap();

        assert!(deployer.can_proceed().await.unwrap());
        let result = deployer.deploy_scripts().await;
        assert!(matches!(result, Err(DeployError::NoCatalogs { .. })));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(POISON_HEADER));
        assert!(text.contains("-- Script 'Orders' has no target catalog"));
        assert!(text.contains("RAISE EXCEPTION 'Do not use this script file.'"));
        assert!(!text.contains("BEGIN ISOLATION LEVEL"));
    }

    #[tokio::test]
    async fn test_failed_write_poisons_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.sql");
        let config = config();
        let mut deployer =
            FileDeployer::create(&path, &config, project(Vec::new(), Vec::new())).unwrap();
        deployer
            .overwrite(b"BEGIN ISOLATION LEVEL SERIALIZABLE;\nINSERT INTO")
            .unwrap();

        let err = std::io::Error::other("No space left on device");
        let result = deployer.finish(Err(DeployError::Io(err)));
        assert!(matches!(result, Err(DeployError::Io(_))));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(POISON_HEADER));
        assert!(text.contains("-- IO error: No space left on device"));
        assert!(!text.contains("INSERT INTO"));
    }
}
