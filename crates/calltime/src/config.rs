//! Tracking configuration loaded from `calltime.toml`.
//!
//! ```toml
//! fallback_namespaces = ["app", "app::net"]
//!
//! [[track]]
//! prefix = "ProgrammableChip._"
//! suffix = "_Operation.Execute"
//! names = "ADD,MUL"
//!
//! [[track]]
//! names = "Lru.get, Lru.insert"
//! ```

use crate::error::Result;
use calltime_probe::{TrackRequest, compose_identifiers};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Root of a tracking file
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Namespaces tried, in order, for type names that do not resolve directly
    #[serde(default)]
    pub fallback_namespaces: Vec<String>,

    #[serde(default)]
    pub track: Vec<TrackEntry>,
}

/// One `[[track]]` table
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TrackEntry {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    /// Comma-separated names placed between prefix and suffix
    pub names: String,
}

impl TrackingConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn requests(&self) -> Vec<TrackRequest> {
        self.track
            .iter()
            .map(|t| TrackRequest::new(&t.prefix, &t.suffix, &t.names))
            .collect()
    }

    /// Every configured identifier, deduplicated, followed by `extra`
    pub fn identifiers<S: AsRef<str>>(&self, extra: &[S]) -> Vec<String> {
        let mut requests = self.requests();
        requests.extend(extra.iter().map(|id| TrackRequest::new("", "", id.as_ref())));
        compose_identifiers(&requests)
    }

    /// Append fallback namespaces given on the command line
    pub fn merge_fallbacks<S: AsRef<str>>(&mut self, namespaces: &[S]) {
        for ns in namespaces {
            let ns = ns.as_ref();
            if !self.fallback_namespaces.iter().any(|f| f == ns) {
                self.fallback_namespaces.push(ns.to_string());
            }
        }
    }
}
