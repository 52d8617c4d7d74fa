//! Filter module - rule definitions, path matching and the filter engine

pub mod path;
mod engine;

pub use engine::*;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One include/exclude rule as stored in the filter file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterRule {
    /// Dotted path into the record
    #[serde(rename = "PropertyPath")]
    pub property_path: String,

    /// Value compared case-insensitively
    #[serde(rename = "Value")]
    pub expected_value: String,

    /// Keep the record when the rule fires
    #[serde(rename = "IncludeResult")]
    pub is_include: bool,
}

impl FilterRule {
    /// Rule keeping records where `path` equals `value`
    pub fn include(path: &str, value: &str) -> Self {
        Self {
            property_path: path.to_string(),
            expected_value: value.to_string(),
            is_include: true,
        }
    }

    /// Rule dropping records where `path` equals `value`
    pub fn exclude(path: &str, value: &str) -> Self {
        Self {
            property_path: path.to_string(),
            expected_value: value.to_string(),
            is_include: false,
        }
    }
}

/// Parse a filter document.
///
/// Accepts `{"Filter": {"Entries": [...]}}`, `{"Entries": [...]}` or a bare
/// array of entries. Duplicate entries are dropped, keeping the first.
pub fn parse_rules(text: &str) -> Result<Vec<FilterRule>> {
    let document: Value = serde_json::from_str(text).context("filter file is not valid JSON")?;

    let entries = if document.is_array() {
        &document
    } else {
        document
            .pointer("/Filter/Entries")
            .or_else(|| document.get("Entries"))
            .ok_or_else(|| anyhow!("filter file has no Filter.Entries array"))?
    };

    let rules: Vec<FilterRule> =
        serde_json::from_value(entries.clone()).context("invalid filter entry")?;

    Ok(dedup(rules))
}

fn dedup(rules: Vec<FilterRule>) -> Vec<FilterRule> {
    let mut seen = HashSet::new();
    rules.into_iter().filter(|rule| seen.insert(rule.clone())).collect()
}

/// Filter rules backed by a file that is re-read between monitor cycles
#[derive(Debug, Clone)]
pub struct FilterFile {
    path: PathBuf,
    rules: Vec<FilterRule>,
}

impl FilterFile {
    /// Start with no rules; call [`refresh`](Self::refresh) to load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rules: Vec::new(),
        }
    }

    /// Fixed rule set that is never reloaded (no backing file).
    pub fn fixed(rules: Vec<FilterRule>) -> Self {
        Self {
            path: PathBuf::new(),
            rules: dedup(rules),
        }
    }

    /// Backing file; empty for a fixed rule set
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rules currently in effect
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Re-read the file and swap in its rules if they differ from the loaded set.
    ///
    /// Returns `true` when the rule set changed. A missing file counts as an
    /// empty rule set until rules have been loaded; after that, a missing or
    /// unparseable file keeps the current rules.
    pub fn refresh(&mut self) -> Result<bool> {
        if self.path.as_os_str().is_empty() {
            return Ok(false);
        }

        let loaded = match std::fs::read_to_string(&self.path) {
            Ok(text) => parse_rules(&text)
                .with_context(|| format!("failed to load filter file {:?}", self.path))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !self.rules.is_empty() {
                    warn!(
                        "Filter file {:?} is missing, keeping {} loaded rules",
                        self.path,
                        self.rules.len()
                    );
                    return Ok(false);
                }
                warn!("Filter file not found at {:?}, using no rules", self.path);
                Vec::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read filter file {:?}", self.path))
            }
        };

        if loaded == self.rules {
            debug!("Filter rules unchanged");
            return Ok(false);
        }

        info!(
            "Filter rules updated from {:?}: {} -> {} entries",
            self.path,
            self.rules.len(),
            loaded.len()
        );
        self.rules = loaded;
        Ok(true)
    }
}
