//! Catalog resolution.
//!
//! Scripts name their targets through logical patterns; the lookup table
//! turns each pattern into concrete catalogs.

use std::collections::BTreeSet;

use tracing::warn;

use crate::config::CatalogPatternLookup;

/// Resolves catalog patterns to concrete catalog names.
#[derive(Debug, Clone, Copy)]
pub struct CatalogResolver<'a> {
    lookup: &'a CatalogPatternLookup,
    default_catalog: &'a str,
}

impl<'a> CatalogResolver<'a> {
    /// Creates a resolver over a lookup table.
    #[must_use]
    pub const fn new(lookup: &'a CatalogPatternLookup, default_catalog: &'a str) -> Self {
        Self {
            lookup,
            default_catalog,
        }
    }

    /// Resolves patterns to distinct catalog names, sorted.
    ///
    /// No patterns at all means the default catalog. A pattern missing from
    /// the lookup contributes nothing and is logged.
    #[must_use]
    pub fn resolve(&self, patterns: &[String]) -> Vec<String> {
        if patterns.is_empty() {
            return vec![self.default_catalog.to_string()];
        }

        let mut catalogs = BTreeSet::new();
        for pattern in patterns {
            match self.lookup.get(pattern) {
                Some(names) => catalogs.extend(names.iter().cloned()),
                None => warn!(pattern = %pattern, "No catalogs configured for pattern"),
            }
        }
        catalogs.into_iter().collect()
    }
}
