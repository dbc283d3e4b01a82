//! Script validation against configurable patterns.
//!
//! The validator strips comments first, then runs every rule against the
//! sanitized text in the order the rules were added. Each match is located
//! in the original text to report its line and a short excerpt.

use std::fmt;

use bitflags::bitflags;
use regex::{Regex, RegexBuilder};

use crate::error::{Result, ScriptError};
use crate::sanitize::strip_comments;

/// Number of characters shown in a diagnostic excerpt.
pub const EXCERPT_LEN: usize = 40;

bitflags! {
    /// Validation outcome. Severities combine, so a script can be both
    /// [`ScriptCheck::WARNING`] and [`ScriptCheck::FAILED`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScriptCheck: u8 {
        /// A warn-on pattern matched.
        const WARNING = 1 << 0;
        /// A halt-on pattern matched.
        const FAILED = 1 << 1;
        /// The script could not be sanitized.
        const FATAL = 1 << 2;
    }
}

impl ScriptCheck {
    /// No rule matched.
    pub const PASSED: Self = Self::empty();

    /// Returns whether this outcome blocks deployment.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        self.intersects(Self::FAILED.union(Self::FATAL))
    }
}

impl Default for ScriptCheck {
    fn default() -> Self {
        Self::PASSED
    }
}

impl fmt::Display for ScriptCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Passed");
        }
        let names: Vec<&str> = [
            (Self::WARNING, "Warning"),
            (Self::FAILED, "Failed"),
            (Self::FATAL, "Fatal"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        f.write_str(&names.join(", "))
    }
}

/// A validation rule: a pattern and the severity a match raises.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    regex: Regex,
    severity: ScriptCheck,
}

impl ValidationRule {
    /// Compiles a rule. Patterns match case-insensitively and `.` matches
    /// line breaks.
    pub fn new(pattern: &str, severity: ScriptCheck) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|source| ScriptError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self { regex, severity })
    }

    /// The pattern as configured.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// The severity raised on a match.
    #[must_use]
    pub const fn severity(&self) -> ScriptCheck {
        self.severity
    }
}

/// Validation result for one script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Union of every matched rule's severity.
    pub check: ScriptCheck,
    /// One message per match, in rule order.
    pub messages: Vec<String>,
}

/// Validates script text against an ordered set of rules.
#[derive(Debug, Clone, Default)]
pub struct ScriptChecker {
    rules: Vec<ValidationRule>,
}

impl ScriptChecker {
    /// Creates a checker with no rules. Everything passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a checker from warn-on and halt-on pattern lists.
    pub fn from_patterns<W, H>(warn_on: W, halt_on: H) -> Result<Self>
    where
        W: IntoIterator,
        W::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        let mut checker = Self::new();
        for pattern in warn_on {
            checker.add_validation_pattern(pattern.as_ref(), ScriptCheck::WARNING)?;
        }
        for pattern in halt_on {
            checker.add_validation_pattern(pattern.as_ref(), ScriptCheck::FAILED)?;
        }
        Ok(checker)
    }

    /// Appends a rule.
    pub fn add_validation_pattern(&mut self, pattern: &str, severity: ScriptCheck) -> Result<()> {
        self.rules.push(ValidationRule::new(pattern, severity)?);
        Ok(())
    }

    /// Returns the rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Validates script text.
    #[must_use]
    pub fn validate(&self, input: &str) -> Validation {
        let sanitized = match strip_comments(input) {
            Ok(sanitized) => sanitized,
            Err(err) => {
                return Validation {
                    check: ScriptCheck::FATAL,
                    messages: vec![err.to_string()],
                };
            }
        };

        let mut validation = Validation::default();
        for rule in &self.rules {
            let mut cursor = 0;
            for found in rule.regex.find_iter(&sanitized) {
                validation.check |= rule.severity;
                let message = match locate(input, cursor, found.as_str()) {
                    Some(location) => {
                        cursor = location.end;
                        format!(
                            "{}: Line {}, found \"{}\".",
                            rule.severity, location.line, location.excerpt
                        )
                    }
                    None => format!("{}: Line unknown, found \"<failed to find text>\".", rule.severity),
                };
                validation.messages.push(message);
            }
        }
        validation
    }
}

struct Location {
    line: usize,
    end: usize,
    excerpt: String,
}

/// Finds `needle` in `original` at or after `cursor`.
///
/// The search only moves forward, so an identical text earlier than the
/// cursor is never reported twice.
fn locate(original: &str, cursor: usize, needle: &str) -> Option<Location> {
    let start = cursor + original.get(cursor..)?.find(needle)?;
    let line = original[..start].matches('\n').count() + 1;
    let excerpt: String = original[start..]
        .chars()
        .take(EXCERPT_LEN)
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();

    Some(Location {
        line,
        end: start + needle.len(),
        excerpt: excerpt.trim().to_string(),
    })
}
