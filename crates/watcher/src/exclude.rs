//! Exclusion patterns for the directory walk
//!
//! Patterns come from configuration as regular expressions and are matched
//! case-insensitively against the full absolute path of each candidate
//! directory. A match anywhere in the path excludes the directory.

use std::path::Path;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use tracing::info;

/// Compiled exclusion patterns, in configuration order
pub struct ExclusionFilter {
    patterns: Vec<Regex>,
}

impl ExclusionFilter {
    /// Compile configuration strings into matchers
    ///
    /// Compiled once at startup; an invalid pattern is fatal since silently
    /// dropping it would watch directories the operator asked to exclude.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.trim();
            info!(filter = pattern, "adding exclusion filter");
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid exclusion pattern '{pattern}'"))?;
            compiled.push(regex);
        }
        Ok(Self { patterns: compiled })
    }

    /// Return the first pattern matching the path, if any
    pub fn matched(&self, path: &Path) -> Option<&str> {
        let text = path.to_string_lossy();
        self.patterns
            .iter()
            .find(|regex| regex.is_match(&text))
            .map(|regex| regex.as_str())
    }

    /// Check whether the path matches any pattern
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.matched(path).is_some()
    }

    /// Number of compiled patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True when no patterns are configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
