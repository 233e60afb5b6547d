//! Stateless reconciliation between an environment's selections and the
//! central store's index. The only place that reads from both.
//!
//! Every function here composes two independently-locked reads, so a result
//! is a best-effort snapshot: it may be stale by the time the caller acts on
//! it. No cross-component lock is taken.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::core::registry::EnvironmentRegistry;
use crate::core::store::{CentralStore, GcSummary};
use crate::core::tooling::diagnostics;
use silo_domain::{MissingSelection, VerificationReport};

/// Errors surfaced by the loader.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoaderError {
    #[error(
        "[SL330] environment {environment:?} is incomplete ({count} unresolved selections)",
        count = .missing.len()
    )]
    EnvironmentIncomplete {
        environment: String,
        missing: Vec<MissingSelection>,
    },
}

impl LoaderError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EnvironmentIncomplete { .. } => diagnostics::loader::ENVIRONMENT_INCOMPLETE,
        }
    }
}

/// Check every selection of `env_name` against the store and report
/// completeness. A missing package is a reportable condition here, not an
/// error; pure read, no side effects.
///
/// # Errors
///
/// Propagates `EnvironmentNotFound` from the registry and index read
/// failures from the store.
pub fn verify_environment(
    store: &CentralStore,
    registry: &EnvironmentRegistry,
    env_name: &str,
) -> Result<VerificationReport> {
    let env = registry.get_environment(env_name)?;
    let mut missing = Vec::new();
    for (package, version) in &env.selections {
        if !store.has_package(package, version)? {
            missing.push(MissingSelection {
                name: package.clone(),
                version: version.clone(),
            });
        }
    }
    let report = VerificationReport::new(env.name, env.selections.len(), missing);
    debug!(
        environment = env_name,
        status = report.status.as_str(),
        total = report.total_packages,
        "environment verified"
    );
    Ok(report)
}

/// Resolve every selection of `env_name` to its store-owned payload path.
///
/// All-or-nothing: a caller activating an environment needs full resolution,
/// so any unresolvable selection fails the whole call. Returned paths point
/// into the store and must be treated as read-only.
///
/// # Errors
///
/// `EnvironmentNotFound` from the registry; `EnvironmentIncomplete` carrying
/// every missing `(name, version)` pair.
pub fn resolve_paths(
    store: &CentralStore,
    registry: &EnvironmentRegistry,
    env_name: &str,
) -> Result<BTreeMap<String, PathBuf>> {
    let env = registry.get_environment(env_name)?;
    let mut resolved = BTreeMap::new();
    let mut missing = Vec::new();
    for (package, version) in &env.selections {
        match store.find_package(package, version)? {
            Some(record) => {
                resolved.insert(package.clone(), record.storage_path);
            }
            None => missing.push(MissingSelection {
                name: package.clone(),
                version: version.clone(),
            }),
        }
    }
    if !missing.is_empty() {
        return Err(LoaderError::EnvironmentIncomplete {
            environment: env.name,
            missing,
        }
        .into());
    }
    Ok(resolved)
}

/// Every `(name, version)` pair selected by any environment.
///
/// # Errors
///
/// Propagates manifest read failures from the registry.
pub fn collect_live_selections(
    registry: &EnvironmentRegistry,
) -> Result<HashSet<(String, String)>> {
    let mut live = HashSet::new();
    for env in registry.environments()? {
        for (package, version) in env.selections {
            live.insert((package, version));
        }
    }
    Ok(live)
}

/// Explicitly-invoked maintenance: drop store entries that no environment
/// selects. Records locked by a concurrent writer are skipped.
///
/// # Errors
///
/// Propagates registry and store failures.
pub fn sweep_unreferenced(
    store: &CentralStore,
    registry: &EnvironmentRegistry,
) -> Result<GcSummary> {
    let live = collect_live_selections(registry)?;
    store.remove_unreferenced(&live)
}
