//! Block parser.
//!
//! Splits script text into blocks. A block starts at a marker line:
//!
//! ```text
//! --@catalog Sales
//! --@main
//! UPDATE orders SET status = 'open' WHERE status IS NULL;
//! ```
//!
//! The marker is `--@` as the first non-blank characters of a line,
//! followed immediately by a keyword made of ASCII letters, digits and
//! underscores. Keywords match case-insensitively. Whatever follows the
//! keyword on the marker line, plus every following line up to the next
//! marker, is the block text.
//!
//! Markers are recognized on raw lines, so a `--@` line inside a string
//! literal still opens a block. Lines that start inside a block comment are
//! never markers; they stay part of the current block's text.
//!
//! Before the first marker only blank lines and comments are allowed.

use std::collections::HashMap;

use crate::block::Block;
use crate::error::{Result, ScriptError};
use crate::sanitize::block_comment_lines;

/// Marker prefix opening a block.
pub const MARKER: &str = "--@";

/// Builds a block from its keyword (as written) and raw text.
pub type BlockRule = fn(&str, &str) -> Result<Block>;

/// Keyword-driven script parser.
///
/// Rules are registered per keyword; a fallback rule handles every keyword
/// without one.
#[derive(Debug, Clone, Default)]
pub struct ScriptParser {
    rules: HashMap<String, BlockRule>,
    fallback: Option<BlockRule>,
}

impl ScriptParser {
    /// Creates a parser with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser with the standard keyword set and the
    /// [`Block::unexpected`] fallback.
    #[must_use]
    pub fn standard() -> Self {
        let mut parser = Self::new();
        parser.add_rule("catalog", Block::catalog);
        parser.add_rule("options", Block::options);
        parser.add_rule("need", Block::need);
        parser.add_rule("ignore", Block::ignore);
        parser.add_rule("pre", Block::pre);
        parser.add_rule("main", Block::main);
        parser.add_rule("post", Block::post);
        parser.set_fallback_rule(Block::unexpected);
        parser
    }

    /// Registers the rule for a keyword, replacing any previous one.
    pub fn add_rule(&mut self, keyword: &str, rule: BlockRule) {
        self.rules.insert(keyword.to_ascii_lowercase(), rule);
    }

    /// Sets the rule used for keywords without a registered rule.
    pub fn set_fallback_rule(&mut self, rule: BlockRule) {
        self.fallback = Some(rule);
    }

    /// Returns whether a rule is registered for the keyword.
    #[must_use]
    pub fn has_rule(&self, keyword: &str) -> bool {
        self.rules.contains_key(&keyword.to_ascii_lowercase())
    }

    /// Parses script text into blocks, in declaration order.
    pub fn parse(&self, text: &str) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut open: Option<(String, String)> = None;
        let commented = block_comment_lines(text);

        for (idx, line) in text.split_inclusive('\n').enumerate() {
            let line_number = idx + 1;
            let in_comment = commented.contains(&line_number);

            let marker = if in_comment {
                None
            } else {
                split_marker(line, line_number)?
            };
            if let Some((keyword, rest)) = marker {
                if let Some((keyword, body)) = open.take() {
                    blocks.push(self.build(&keyword, &body)?);
                }
                open = Some((keyword.to_string(), rest.to_string()));
                continue;
            }

            match open.as_mut() {
                Some((_, body)) => body.push_str(line),
                None if in_comment => {}
                None => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty()
                        && !trimmed.starts_with("--")
                        && !trimmed.starts_with("/*")
                    {
                        return Err(ScriptError::OrphanText { line: line_number });
                    }
                }
            }
        }

        if let Some((keyword, body)) = open {
            blocks.push(self.build(&keyword, &body)?);
        }

        Ok(blocks)
    }

    fn build(&self, keyword: &str, text: &str) -> Result<Block> {
        let rule = self
            .rules
            .get(&keyword.to_ascii_lowercase())
            .or(self.fallback.as_ref())
            .ok_or_else(|| ScriptError::UnknownKeyword(keyword.to_string()))?;
        rule(keyword, text)
    }
}

/// Splits a marker line into its keyword and the text after it.
///
/// Returns `None` for lines that are not markers.
fn split_marker(line: &str, line_number: usize) -> Result<Option<(&str, &str)>> {
    let Some(after) = line.trim_start().strip_prefix(MARKER) else {
        return Ok(None);
    };

    let keyword_len = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(after.len());
    if keyword_len == 0 {
        return Err(ScriptError::MalformedMarker {
            line: line_number,
            message: format!("expected a keyword after '{MARKER}'"),
        });
    }

    let (keyword, rest) = after.split_at(keyword_len);
    let rest = if rest.trim().is_empty() {
        ""
    } else {
        rest.trim_start()
    };
    Ok(Some((keyword, rest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, Phase};

    #[test]
    fn test_parse_blocks_in_order() {
        let text = "--@Catalog Sales\n--@pre\nselect 1;\n--@MAIN\nselect 2;\nselect 3;\n";
        let blocks = ScriptParser::standard().parse(text).unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind(), &BlockKind::Catalog(vec!["Sales".to_string()]));
        assert_eq!(blocks[1].phase(), Some(Phase::Pre));
        assert_eq!(blocks[1].text(), "select 1;\n");
        assert_eq!(blocks[2].keyword(), "MAIN");
        assert_eq!(blocks[2].text(), "select 2;\nselect 3;\n");
    }

    #[test]
    fn test_unknown_keyword_is_unexpected_block() {
        let blocks = ScriptParser::standard()
            .parse("--@mian\nselect 1;")
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind(), &BlockKind::Unexpected);
        assert_eq!(blocks[0].keyword(), "mian");
        assert_eq!(blocks[0].text(), "select 1;");
    }

    #[test]
    fn test_unknown_keyword_without_fallback() {
        let mut parser = ScriptParser::new();
        parser.add_rule("main", Block::main);
        let result = parser.parse("--@other\n");
        assert!(matches!(result, Err(ScriptError::UnknownKeyword(kw)) if kw == "other"));
    }

    #[test]
    fn test_marker_without_keyword() {
        let result = ScriptParser::standard().parse("--@main\nselect 1;\n  --@ \n");
        assert!(matches!(
            result,
            Err(ScriptError::MalformedMarker { line: 3, .. })
        ));
    }

    #[test]
    fn test_marker_inside_block_comment_is_text() {
        let text = "--@main\nselect 1;\n/*\n--@ old marker\n--@post\n*/\nselect 2;\n";
        let blocks = ScriptParser::standard().parse(text).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].text(),
            "select 1;\n/*\n--@ old marker\n--@post\n*/\nselect 2;\n"
        );
    }

    #[test]
    fn test_leading_block_comment_allowed() {
        let blocks = ScriptParser::standard()
            .parse("/* Copyright\n   Billing team */\n--@main\nselect 1;")
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "select 1;");
    }

    #[test]
    fn test_marker_inside_string_still_opens_block() {
        let text = "--@main\nselect '\n--@post\n';\n";
        let blocks = ScriptParser::standard().parse(text).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].phase(), Some(Phase::Post));
    }

    #[test]
    fn test_orphan_text() {
        let result = ScriptParser::standard().parse("-- header\n\nselect 1;\n--@main\n");
        assert!(matches!(result, Err(ScriptError::OrphanText { line: 3 })));
    }

    #[test]
    fn test_leading_comments_allowed() {
        let blocks = ScriptParser::standard()
            .parse("-- Copyright\n\n--@main\nselect 1;")
            .unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_invalid_options_fail_parse() {
        let result = ScriptParser::standard().parse("--@options {priority}\n--@main\n");
        assert!(matches!(result, Err(ScriptError::InvalidOptions(_))));
    }

    #[test]
    fn test_empty_text() {
        assert!(ScriptParser::standard().parse("").unwrap().is_empty());
    }

    #[test]
    fn test_custom_rule() {
        let mut parser = ScriptParser::standard();
        parser.add_rule("Setup", Block::pre);
        assert!(parser.has_rule("SETUP"));
        let blocks = parser.parse("--@setup\nselect 1;").unwrap();
        assert_eq!(blocks[0].phase(), Some(Phase::Pre));
    }
}
