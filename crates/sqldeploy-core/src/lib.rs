//! # sqldeploy-core
//!
//! Script model for sqldeploy: parsing script files into typed blocks,
//! validating script text against forbidden patterns, and loading a project
//! folder into an in-memory [`Project`].
//!
//! ## Script files
//!
//! A script is split into blocks by `--@keyword` marker lines:
//!
//! ```text
//! --@catalog Sales
//! --@options { "priority": false }
//! --@pre
//! ALTER TABLE orders ADD COLUMN IF NOT EXISTS region TEXT;
//! --@main
//! UPDATE orders SET region = 'emea' WHERE region IS NULL;
//! ```
//!
//! ## Validation
//!
//! ```rust
//! use sqldeploy_core::{ScriptCheck, ScriptChecker};
//!
//! let checker = ScriptChecker::from_patterns(["truncate"], ["drop\\s+table"]).unwrap();
//! let result = checker.validate("--@main\n-- drop table a;\nDROP TABLE b;");
//!
//! assert_eq!(result.check, ScriptCheck::FAILED);
//! assert_eq!(result.messages, ["Failed: Line 3, found \"DROP TABLE b;\"."]);
//! ```

pub mod block;
pub mod check;
pub mod error;
pub mod loader;
pub mod parser;
pub mod project;
pub mod sanitize;
pub mod script;

pub use block::{Block, BlockKind, Phase, ScriptOptions};
pub use check::{ScriptCheck, ScriptChecker, Validation, ValidationRule};
pub use error::{Result, ScriptError};
pub use loader::ProjectLoader;
pub use parser::ScriptParser;
pub use project::{LoadStatus, Project, ProjectConfiguration};
pub use script::SourceScript;
