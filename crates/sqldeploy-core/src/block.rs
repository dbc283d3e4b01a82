//! Typed script blocks.
//!
//! A script file is a sequence of blocks, each opened by a `--@keyword`
//! marker. Blocks keep the keyword and text exactly as written; the typed
//! payload is derived once, when the block is constructed.

use std::fmt;

use serde::Deserialize;

use crate::error::{Result, ScriptError};

/// Execution phase of a command block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Runs before any main phase.
    Pre,
    /// The main body of the deployment.
    Main,
    /// Runs after every main phase.
    Post,
}

impl Phase {
    /// All phases, in execution order.
    pub const ALL: [Self; 3] = [Self::Pre, Self::Main, Self::Post];

    /// Returns the phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "Pre",
            Self::Main => "Main",
            Self::Post => "Post",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Pre => 0,
            Self::Main => 1,
            Self::Post => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-script options carried by an `options` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptOptions {
    /// Deploy this script, across all its phases, before any other script.
    pub priority: bool,
}

impl ScriptOptions {
    /// Parses options from a block's text. Blank text yields the defaults.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| ScriptError::InvalidOptions(e.to_string()))
    }
}

/// The typed payload of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Logical catalog patterns the script targets.
    Catalog(Vec<String>),
    /// Script options.
    Options(ScriptOptions),
    /// Names of scripts this script expects to exist.
    Need(Vec<String>),
    /// Excludes the script from validation and deployment.
    Ignore,
    /// SQL to run in the given phase.
    Command(Phase),
    /// A keyword nothing is registered for.
    Unexpected,
}

/// A parsed script block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    keyword: String,
    text: String,
    kind: BlockKind,
}

impl Block {
    /// Creates a block from its raw parts.
    #[must_use]
    pub fn new(keyword: impl Into<String>, text: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
            kind,
        }
    }

    /// Builds a `catalog` block.
    pub fn catalog(keyword: &str, text: &str) -> Result<Self> {
        Ok(Self::new(keyword, text, BlockKind::Catalog(parse_names(text))))
    }

    /// Builds an `options` block.
    pub fn options(keyword: &str, text: &str) -> Result<Self> {
        let options = ScriptOptions::parse(text)?;
        Ok(Self::new(keyword, text, BlockKind::Options(options)))
    }

    /// Builds a `need` block.
    pub fn need(keyword: &str, text: &str) -> Result<Self> {
        Ok(Self::new(keyword, text, BlockKind::Need(parse_names(text))))
    }

    /// Builds an `ignore` block.
    pub fn ignore(keyword: &str, text: &str) -> Result<Self> {
        Ok(Self::new(keyword, text, BlockKind::Ignore))
    }

    /// Builds a `pre` command block.
    pub fn pre(keyword: &str, text: &str) -> Result<Self> {
        Ok(Self::new(keyword, text, BlockKind::Command(Phase::Pre)))
    }

    /// Builds a `main` command block.
    pub fn main(keyword: &str, text: &str) -> Result<Self> {
        Ok(Self::new(keyword, text, BlockKind::Command(Phase::Main)))
    }

    /// Builds a `post` command block.
    pub fn post(keyword: &str, text: &str) -> Result<Self> {
        Ok(Self::new(keyword, text, BlockKind::Command(Phase::Post)))
    }

    /// Builds a block for an unrecognized keyword.
    pub fn unexpected(keyword: &str, text: &str) -> Result<Self> {
        Ok(Self::new(keyword, text, BlockKind::Unexpected))
    }

    /// The keyword as written in the marker.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// The raw block text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The typed payload.
    #[must_use]
    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Returns the phase if this is a command block.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self.kind {
            BlockKind::Command(phase) => Some(phase),
            _ => None,
        }
    }
}

/// Splits a name list on commas and whitespace, ignoring `--` comments.
fn parse_names(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split("--").next().unwrap_or_default())
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert!(Phase::Pre < Phase::Main);
        assert!(Phase::Main < Phase::Post);
        assert_eq!(Phase::ALL, [Phase::Pre, Phase::Main, Phase::Post]);
    }

    #[test]
    fn test_catalog_names() {
        let block = Block::catalog("Catalog", " Sales, Hr\n  Audit -- legacy\n").unwrap();
        assert_eq!(
            block.kind(),
            &BlockKind::Catalog(vec![
                "Sales".to_string(),
                "Hr".to_string(),
                "Audit".to_string()
            ])
        );
        assert_eq!(block.keyword(), "Catalog");
    }

    #[test]
    fn test_options_blank_is_default() {
        let block = Block::options("options", "\n  \n").unwrap();
        assert_eq!(block.kind(), &BlockKind::Options(ScriptOptions::default()));
    }

    #[test]
    fn test_options_priority() {
        let options = ScriptOptions::parse(r#"{ "priority": true }"#).unwrap();
        assert!(options.priority);
    }

    #[test]
    fn test_options_invalid() {
        let result = ScriptOptions::parse("priority = yes");
        assert!(matches!(result, Err(ScriptError::InvalidOptions(_))));

        let result = ScriptOptions::parse(r#"{ "prio": true }"#);
        assert!(matches!(result, Err(ScriptError::InvalidOptions(_))));
    }

    #[test]
    fn test_command_phase() {
        assert_eq!(Block::post("POST", "select 1").unwrap().phase(), Some(Phase::Post));
        assert_eq!(Block::ignore("ignore", "").unwrap().phase(), None);
    }
}
