//! Environment manifest model.
//!
//! An environment is a named mapping from package name to exactly one pinned
//! version. The model is persistence-agnostic; the registry decides where and
//! how manifests are stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

fn default_schema() -> u32 {
    MANIFEST_SCHEMA_VERSION
}

/// One environment manifest: metadata plus its package-version selections.
///
/// `selections` holds at most one version per package name; pinning a package
/// that is already selected replaces the previous version (last write wins).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default = "default_schema")]
    pub schema: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: String,
    #[serde(default)]
    pub selections: BTreeMap<String, String>,
}

/// Result of a selection upsert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PinOutcome {
    Added,
    Replaced { previous: String },
    Unchanged,
}

impl Environment {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, created_at: String) -> Self {
        Self {
            schema: MANIFEST_SCHEMA_VERSION,
            name: name.into(),
            description: description.into(),
            created_at,
            selections: BTreeMap::new(),
        }
    }

    /// Upsert a selection, replacing any prior version pinned for `package`.
    pub fn pin(&mut self, package: impl Into<String>, version: impl Into<String>) -> PinOutcome {
        let package = package.into();
        let version = version.into();
        match self.selections.insert(package, version.clone()) {
            None => PinOutcome::Added,
            Some(previous) if previous == version => PinOutcome::Unchanged,
            Some(previous) => PinOutcome::Replaced { previous },
        }
    }

    #[must_use]
    pub fn package_count(&self) -> usize {
        self.selections.len()
    }

    #[must_use]
    pub fn summary(&self) -> EnvironmentSummary {
        EnvironmentSummary {
            name: self.name.clone(),
            package_count: self.package_count(),
            description: self.description.clone(),
        }
    }
}

/// Aggregate row returned by environment listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnvironmentSummary {
    pub name: String,
    pub package_count: usize,
    pub description: String,
}
