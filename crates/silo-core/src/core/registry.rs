//! Environment registry: one JSON manifest per environment.
//!
//! The registry knows nothing about payload bytes; it records which
//! `(package, version)` pairs each environment selects. Manifests are written
//! through a temp file and renamed into place, and every mutation for a given
//! environment runs under that environment's lock file, so concurrent upserts
//! serialize per environment while distinct environments proceed in parallel.

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::FileExt;
use tempfile::NamedTempFile;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use crate::core::tooling::diagnostics;
use silo_domain::{
    validate_environment_name, validate_package_name, validate_version, Environment,
    EnvironmentSummary, InvalidIdentifier, PinOutcome,
};

const LOCKS_DIR: &str = ".locks";
const MANIFEST_EXT: &str = "json";

/// Errors surfaced by the registry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),
    #[error("[SL320] environment {name:?} already exists")]
    DuplicateEnvironment { name: String },
    #[error("[SL321] environment {name:?} is not registered")]
    EnvironmentNotFound { name: String },
    #[error("[SL322] environment manifest for {name:?} is corrupt: {reason}")]
    ManifestCorrupt { name: String, reason: String },
}

impl RegistryError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => diagnostics::store::INVALID_IDENTIFIER,
            Self::DuplicateEnvironment { .. } => diagnostics::env::DUPLICATE_ENVIRONMENT,
            Self::EnvironmentNotFound { .. } => diagnostics::env::ENVIRONMENT_NOT_FOUND,
            Self::ManifestCorrupt { .. } => diagnostics::env::MANIFEST_CORRUPT,
        }
    }
}

/// Named collections of package-version selections, persisted independently
/// of the central store.
#[derive(Clone, Debug)]
pub struct EnvironmentRegistry {
    root: PathBuf,
}

impl EnvironmentRegistry {
    /// Open (and lazily initialize) a registry at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry directories cannot be created.
    pub fn open(root: PathBuf) -> Result<Self> {
        let registry = Self { root };
        registry.ensure_layout()?;
        Ok(registry)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a new environment with empty selections.
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` for malformed names, `DuplicateEnvironment` when
    /// the name is already taken.
    pub fn create_environment(&self, name: &str, description: &str) -> Result<Environment> {
        validate_environment_name(name).map_err(RegistryError::from)?;
        self.ensure_layout()?;
        let _lock = self.acquire_lock(name)?;

        let path = self.manifest_path(name);
        if path.exists() {
            return Err(RegistryError::DuplicateEnvironment {
                name: name.to_string(),
            }
            .into());
        }

        let env = Environment::new(name, description, now_rfc3339()?);
        self.write_manifest(&env)?;
        debug!(name, "environment created");
        Ok(env)
    }

    /// Upsert `selections[package] = version` for an environment. Succeeds
    /// even when the version is not (yet) in any store; registration and
    /// verification are deliberately decoupled.
    ///
    /// # Errors
    ///
    /// `EnvironmentNotFound` when the environment is unregistered,
    /// `InvalidIdentifier` for malformed inputs.
    pub fn pin_package(&self, env_name: &str, package: &str, version: &str) -> Result<PinOutcome> {
        validate_environment_name(env_name).map_err(RegistryError::from)?;
        validate_package_name(package).map_err(RegistryError::from)?;
        validate_version(version).map_err(RegistryError::from)?;
        self.ensure_layout()?;
        let _lock = self.acquire_lock(env_name)?;

        let mut env = self.load(env_name)?;
        let outcome = env.pin(package, version);
        if !matches!(outcome, PinOutcome::Unchanged) {
            self.write_manifest(&env)?;
        }
        debug!(env = env_name, package, version, "selection pinned");
        Ok(outcome)
    }

    /// Aggregate rows for every registered environment, ordered by name.
    ///
    /// # Errors
    ///
    /// `ManifestCorrupt` when any manifest fails to parse; nothing is
    /// silently skipped.
    pub fn list_environments(&self) -> Result<Vec<EnvironmentSummary>> {
        Ok(self
            .environments()?
            .iter()
            .map(Environment::summary)
            .collect())
    }

    /// Read-only snapshot of one environment.
    ///
    /// # Errors
    ///
    /// `EnvironmentNotFound` when absent, `ManifestCorrupt` when unreadable.
    pub fn get_environment(&self, name: &str) -> Result<Environment> {
        validate_environment_name(name).map_err(RegistryError::from)?;
        self.load(name)
    }

    /// Load every manifest, ordered by environment name.
    ///
    /// # Errors
    ///
    /// `ManifestCorrupt` when any manifest fails to parse.
    pub fn environments(&self) -> Result<Vec<Environment>> {
        self.ensure_layout()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().map(|ext| ext == MANIFEST_EXT) != Some(true) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();

        let mut environments = Vec::with_capacity(names.len());
        for name in names {
            environments.push(self.load(&name)?);
        }
        Ok(environments)
    }

    fn load(&self, name: &str) -> Result<Environment> {
        let path = self.manifest_path(name);
        if !path.exists() {
            return Err(RegistryError::EnvironmentNotFound {
                name: name.to_string(),
            }
            .into());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let env: Environment =
            serde_json::from_str(&contents).map_err(|err| RegistryError::ManifestCorrupt {
                name: name.to_string(),
                reason: err.to_string(),
            })?;
        Ok(env)
    }

    fn write_manifest(&self, env: &Environment) -> Result<()> {
        let path = self.manifest_path(&env.name);
        let mut tmp = NamedTempFile::new_in(&self.root)
            .context("failed to create temporary manifest file")?;
        serde_json::to_writer_pretty(&mut tmp, env)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all().ok();
        tmp.persist(&path)
            .map_err(|err| anyhow::anyhow!("unable to persist manifest: {err}"))?;
        fsync_dir(&self.root).ok();
        Ok(())
    }

    fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(self.root.join(LOCKS_DIR)).with_context(|| {
            format!(
                "failed to ensure registry directory {}",
                self.root.join(LOCKS_DIR).display()
            )
        })?;
        Ok(())
    }

    fn acquire_lock(&self, name: &str) -> Result<File> {
        let path = self.root.join(LOCKS_DIR).join(format!("{name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open registry lock {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(file)
    }

    fn manifest_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{MANIFEST_EXT}"))
    }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format manifest timestamp")
}

fn fsync_dir(dir: &Path) -> Result<()> {
    let file = File::open(dir)?;
    file.sync_all()?;
    Ok(())
}
