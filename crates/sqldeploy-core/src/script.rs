//! Source scripts.

use std::collections::BTreeSet;

use crate::block::{Block, BlockKind, Phase};
use crate::check::{ScriptCheck, Validation};

/// A named script and its parsed blocks.
///
/// Besides the blocks, a script tracks which phases have already been
/// handed out for execution during the current run, and the validation
/// result attached by the loader.
#[derive(Debug, Clone)]
pub struct SourceScript {
    name: String,
    blocks: Vec<Block>,
    catalog_patterns: Vec<String>,
    executed: [bool; 3],
    validation: Validation,
}

impl SourceScript {
    /// Creates a script from its parsed blocks.
    #[must_use]
    pub fn new(name: impl Into<String>, blocks: Vec<Block>) -> Self {
        let catalog_patterns: BTreeSet<String> = blocks
            .iter()
            .filter_map(|block| match block.kind() {
                BlockKind::Catalog(names) => Some(names.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();

        Self {
            name: name.into(),
            blocks,
            catalog_patterns: catalog_patterns.into_iter().collect(),
            executed: [false; 3],
            validation: Validation::default(),
        }
    }

    /// The script name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The blocks, in declaration order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Distinct catalog patterns declared by the script, sorted.
    #[must_use]
    pub fn catalog_patterns(&self) -> &[String] {
        &self.catalog_patterns
    }

    /// Script names listed in `need` blocks.
    pub fn needs(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .filter_map(|block| match block.kind() {
                BlockKind::Need(names) => Some(names.iter().map(String::as_str)),
                _ => None,
            })
            .flatten()
    }

    /// Returns whether an `options` block asks for priority deployment.
    #[must_use]
    pub fn is_priority(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block.kind(), BlockKind::Options(options) if options.priority))
    }

    /// Returns whether the script carries an `ignore` block.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.blocks
            .iter()
            .any(|block| matches!(block.kind(), BlockKind::Ignore))
    }

    /// Blocks whose keyword had no registered rule.
    pub fn unexpected_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|block| matches!(block.kind(), BlockKind::Unexpected))
    }

    /// Returns whether the script declares the phase.
    #[must_use]
    pub fn has_phase(&self, phase: Phase) -> bool {
        self.blocks.iter().any(|block| block.phase() == Some(phase))
    }

    /// Returns whether the phase was already handed out in this run.
    #[must_use]
    pub const fn has_phase_executed(&self, phase: Phase) -> bool {
        self.executed[phase.index()]
    }

    /// Hands out the SQL of a phase and marks the phase executed.
    ///
    /// Returns `None` if the phase was already handed out, or if the script
    /// has no non-blank SQL for it. Several blocks of the same phase are
    /// joined in declaration order.
    pub fn request_phase(&mut self, phase: Phase) -> Option<String> {
        if self.has_phase_executed(phase) {
            return None;
        }
        self.executed[phase.index()] = true;

        let sql: Vec<&str> = self
            .blocks
            .iter()
            .filter(|block| block.phase() == Some(phase))
            .map(Block::text)
            .filter(|text| !text.trim().is_empty())
            .collect();

        if sql.is_empty() {
            None
        } else {
            Some(sql.join("\n"))
        }
    }

    /// Attaches a validation result.
    pub fn set_validation(&mut self, validation: Validation) {
        self.validation = validation;
    }

    /// Adds a diagnostic and raises the severity.
    pub fn add_issue(&mut self, check: ScriptCheck, message: impl Into<String>) {
        self.validation.check |= check;
        self.validation.messages.push(message.into());
    }

    /// The combined validation severity.
    #[must_use]
    pub const fn check(&self) -> ScriptCheck {
        self.validation.check
    }

    /// The validation messages.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.validation.messages
    }
}
