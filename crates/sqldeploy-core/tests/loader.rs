//! Tests for loading project folders.

use std::fs;
use std::path::Path;

use sqldeploy_core::{
    LoadStatus, Phase, ProjectLoader, ScriptCheck, ScriptChecker, ScriptError, ScriptParser,
};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn project_dir(manifest: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "project.json", manifest);
    dir
}

fn names<'a>(scripts: impl Iterator<Item = &'a sqldeploy_core::SourceScript>) -> Vec<&'a str> {
    scripts.map(|s| s.name()).collect()
}

#[test]
fn test_loads_and_partitions_scripts() {
    let dir = project_dir(r#"{ "project": "Billing", "version": "1.2", "priorityScripts": ["Types"] }"#);
    write(dir.path(), "tables/Invoice.sql", "--@catalog Billing\n--@main\ncreate table invoice (id int);\n");
    write(dir.path(), "tables/Customer.sql", "--@catalog Billing\n--@main\ncreate table customer (id int);\n");
    write(dir.path(), "setup/Schema.sql", "--@options {\"priority\": true}\n--@pre\ncreate schema billing;\n");
    write(dir.path(), "setup/Types.sql", "--@main\ncreate type money2 as (v numeric);\n");
    write(dir.path(), "notes.txt", "not a script");

    let parser = ScriptParser::standard();
    let project = ProjectLoader::new(dir.path(), &parser, None).load().unwrap();

    assert_eq!(project.status(), LoadStatus::Success);
    assert_eq!(project.configuration().project, "Billing");
    assert_eq!(project.configuration().version, "1.2");
    assert_eq!(names(project.priority_scripts().iter()), ["Schema", "Types"]);
    assert_eq!(names(project.non_priority_scripts().iter()), ["Customer", "Invoice"]);
    assert!(project.non_priority_scripts()[0].has_phase(Phase::Main));
}

#[test]
fn test_collects_every_problem() {
    let dir = project_dir(r#"{ "project": "p", "version": "1" }"#);
    write(dir.path(), "a.sql", "--@main\ndrop table a;\n");
    write(dir.path(), "b.sql", "--@\nselect 1;\n");
    write(dir.path(), "c.sql", "--@main\ntruncate c;\n");
    write(dir.path(), "d.sql", "--@main\ndrop table d;\n");
    write(dir.path(), "e.sql", "--@mian\nselect 1;\n");

    let parser = ScriptParser::standard();
    let checker = ScriptChecker::from_patterns(["truncate"], ["drop table"]).unwrap();
    let project = ProjectLoader::new(dir.path(), &parser, Some(&checker))
        .load()
        .unwrap();

    assert_eq!(project.status(), LoadStatus::Failure);
    let scripts: Vec<_> = project.scripts().collect();
    assert_eq!(names(scripts.iter().copied()), ["a", "c", "d", "e"]);

    assert_eq!(scripts[0].check(), ScriptCheck::FAILED);
    assert_eq!(scripts[0].messages(), ["Failed: Line 2, found \"drop table a;\"."]);
    assert_eq!(scripts[1].check(), ScriptCheck::WARNING);
    assert_eq!(scripts[2].check(), ScriptCheck::FAILED);
    assert_eq!(scripts[3].check(), ScriptCheck::FAILED);
    assert_eq!(scripts[3].messages(), ["Failed: unexpected block 'mian'."]);
}

#[test]
fn test_warnings_do_not_fail_the_load() {
    let dir = project_dir(r#"{ "project": "p", "version": "1" }"#);
    write(dir.path(), "a.sql", "--@main\ntruncate a;\n");

    let parser = ScriptParser::standard();
    let checker = ScriptChecker::from_patterns(["truncate"], Vec::<String>::new()).unwrap();
    let project = ProjectLoader::new(dir.path(), &parser, Some(&checker))
        .load()
        .unwrap();

    assert_eq!(project.status(), LoadStatus::Success);
    assert_eq!(project.non_priority_scripts()[0].check(), ScriptCheck::WARNING);
}

#[test]
fn test_without_checker_patterns_are_not_evaluated() {
    let dir = project_dir(r#"{ "project": "p", "version": "1" }"#);
    write(dir.path(), "a.sql", "--@main\ndrop table a;\n/* never closed\n");

    let parser = ScriptParser::standard();
    let project = ProjectLoader::new(dir.path(), &parser, None).load().unwrap();

    assert_eq!(project.status(), LoadStatus::Success);
    assert_eq!(project.non_priority_scripts()[0].check(), ScriptCheck::PASSED);
}

#[test]
fn test_unterminated_comment_is_fatal() {
    let dir = project_dir(r#"{ "project": "p", "version": "1" }"#);
    write(dir.path(), "a.sql", "--@main\nselect 1;\n/* never closed\n");

    let parser = ScriptParser::standard();
    let checker = ScriptChecker::new();
    let project = ProjectLoader::new(dir.path(), &parser, Some(&checker))
        .load()
        .unwrap();

    assert_eq!(project.status(), LoadStatus::Failure);
    assert_eq!(project.non_priority_scripts()[0].check(), ScriptCheck::FATAL);
}

#[test]
fn test_ignored_scripts_are_skipped() {
    let dir = project_dir(r#"{ "project": "p", "version": "1" }"#);
    write(dir.path(), "a.sql", "--@ignore\n--@main\ndrop table a;\n");
    write(dir.path(), "b.sql", "--@main\nselect 1;\n");

    let parser = ScriptParser::standard();
    let checker = ScriptChecker::from_patterns(Vec::<String>::new(), ["drop table"]).unwrap();
    let project = ProjectLoader::new(dir.path(), &parser, Some(&checker))
        .load()
        .unwrap();

    assert_eq!(project.status(), LoadStatus::Success);
    assert_eq!(names(project.scripts()), ["b"]);
}

#[test]
fn test_duplicate_names_fail() {
    let dir = project_dir(r#"{ "project": "p", "version": "1" }"#);
    write(dir.path(), "one/a.sql", "--@main\nselect 1;\n");
    write(dir.path(), "two/a.sql", "--@main\nselect 2;\n");

    let parser = ScriptParser::standard();
    let project = ProjectLoader::new(dir.path(), &parser, None).load().unwrap();

    assert_eq!(project.status(), LoadStatus::Failure);
    assert_eq!(project.non_priority_scripts()[1].check(), ScriptCheck::FAILED);
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = TempDir::new().unwrap();
    let parser = ScriptParser::standard();
    let result = ProjectLoader::new(dir.path().join("missing"), &parser, None).load();
    assert!(matches!(result, Err(ScriptError::ProjectNotFound(_))));
}

#[test]
fn test_missing_manifest_is_an_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.sql", "--@main\nselect 1;\n");
    let parser = ScriptParser::standard();
    let result = ProjectLoader::new(dir.path(), &parser, None).load();
    assert!(matches!(result, Err(ScriptError::Manifest { .. })));
}
