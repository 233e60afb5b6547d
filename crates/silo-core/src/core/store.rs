//! Central package store: one payload per `(name, version)`, ever.
//!
//! Layout under the store root:
//!
//! ```text
//! index.sqlite            durable (name, version) -> record index
//! payloads/<name>/<ver>/  the stored payload trees
//! locks/                  per-key lock files
//! tmp/                    staging area for in-flight copies
//! ```
//!
//! Writers stage the payload copy under `tmp/`, then atomically rename it
//! into `payloads/` and publish the index row. A crash between copy and index
//! publish leaves at worst an orphaned directory that `doctor` reports; it is
//! never visible through the index.

use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, bail, Context, Result};
use fs4::FileExt;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::tooling::diagnostics;
use silo_domain::{validate_package_name, validate_version, InvalidIdentifier};

const PAYLOADS_DIR: &str = "payloads";
const LOCKS_DIR: &str = "locks";
const TMP_DIR: &str = "tmp";
const INDEX_FILENAME: &str = "index.sqlite";
const STORE_FORMAT_VERSION: u32 = 1;
const META_KEY_FORMAT_VERSION: &str = "store_format_version";
const META_KEY_CREATED_BY: &str = "created_by_silo_version";
const SILO_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors surfaced by the central store.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),
    #[error("[SL310] package source {path} does not exist or is unreadable")]
    SourceNotFound { path: PathBuf },
    #[error("[SL311] store write failed: {0}")]
    StorageWriteFailure(String),
    #[error("[SL312] package {name} {version} is not in the store")]
    PackageNotFound { name: String, version: String },
    #[error("[SL313] store index is corrupt: {0}")]
    IndexCorrupt(String),
    #[error("[SL314] store format incompatible for {key}: expected {expected}, found {found}")]
    IncompatibleFormat {
        key: String,
        expected: String,
        found: String,
    },
}

impl StoreError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => diagnostics::store::INVALID_IDENTIFIER,
            Self::SourceNotFound { .. } => diagnostics::store::SOURCE_NOT_FOUND,
            Self::StorageWriteFailure(_) => diagnostics::store::WRITE_FAILURE,
            Self::PackageNotFound { .. } => diagnostics::store::PACKAGE_NOT_FOUND,
            Self::IndexCorrupt(_) => diagnostics::store::INDEX_CORRUPT,
            Self::IncompatibleFormat { .. } => diagnostics::store::FORMAT_INCOMPATIBLE,
        }
    }
}

/// One immutable store entry. Key = `(name, version)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub storage_path: PathBuf,
    pub size_bytes: u64,
    pub digest: String,
    pub added_at: u64,
}

/// Read-only aggregate over the whole store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub store_path: PathBuf,
    pub total_versions: u64,
    pub unique_packages: u64,
    pub total_size_bytes: u64,
}

impl StoreInfo {
    /// Total payload size in megabytes, rounded to two decimals for display.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_size_mb(&self) -> f64 {
        let mb = self.total_size_bytes as f64 / (1024.0 * 1024.0);
        (mb * 100.0).round() / 100.0
    }
}

/// Result of an `add_package` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added(PackageRecord),
    AlreadyStored(PackageRecord),
}

impl AddOutcome {
    #[must_use]
    pub fn record(&self) -> &PackageRecord {
        match self {
            Self::Added(record) | Self::AlreadyStored(record) => record,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Added(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcSummary {
    pub scanned: usize,
    pub reclaimed: usize,
    pub reclaimed_bytes: u64,
    pub locked_skipped: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DoctorSummary {
    pub partials_removed: u64,
    pub missing_payloads: usize,
    pub corrupt_payloads: usize,
    pub orphan_payloads: usize,
}

impl DoctorSummary {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_payloads == 0 && self.corrupt_payloads == 0 && self.orphan_payloads == 0
    }
}

/// Deduplicated payload store keyed by `(name, version)`.
#[derive(Clone, Debug)]
pub struct CentralStore {
    root: PathBuf,
}

impl CentralStore {
    /// Open (and lazily initialize) a store at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be created or the index schema
    /// cannot be initialized.
    pub fn open(root: PathBuf) -> Result<Self> {
        let store = Self { root };
        store.ensure_layout()?;
        Ok(store)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add a payload under the `(name, version)` key.
    ///
    /// Re-adding an existing key is a no-op returning the original record;
    /// the stored size, digest, and timestamp never change. Safe under
    /// concurrent callers: the per-key lock serializes same-key writers and
    /// the index insert is create-if-absent.
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` for malformed inputs, `SourceNotFound` when the
    /// payload source is absent, `StorageWriteFailure` when the staged copy or
    /// index publish fails (nothing partial stays visible).
    pub fn add_package(&self, name: &str, version: &str, source: &Path) -> Result<AddOutcome> {
        validate_package_name(name).map_err(StoreError::from)?;
        validate_version(version).map_err(StoreError::from)?;
        if fs::metadata(source).is_err() {
            return Err(StoreError::SourceNotFound {
                path: source.to_path_buf(),
            }
            .into());
        }

        self.ensure_layout()?;
        let key = key(name, version);
        let _lock = self.acquire_lock(&key)?;

        if let Some(record) = self.find_package(name, version)? {
            debug!(name, version, "store hit");
            return Ok(AddOutcome::AlreadyStored(record));
        }

        let staging = self.tmp_path(&key);
        if staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        let (size_bytes, digest) = match copy_tree(source, &staging) {
            Ok(totals) => totals,
            Err(err) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(store_write_error(err));
            }
        };

        let dest = self.payload_path(name, version);
        if let Err(err) = self.publish_payload(&staging, &dest) {
            let _ = fs::remove_dir_all(&staging);
            return Err(store_write_error(err));
        }

        let added_at = timestamp_secs();
        let record = PackageRecord {
            name: name.to_string(),
            version: version.to_string(),
            storage_path: dest.clone(),
            size_bytes,
            digest,
            added_at,
        };
        if let Err(err) = self.insert_record(&record) {
            // Keep the index authoritative: an unpublishable row means the
            // payload must not stay behind either.
            let _ = fs::remove_dir_all(&dest);
            return Err(store_write_error(err));
        }

        debug!(name, version, size_bytes, "store add");
        Ok(AddOutcome::Added(record))
    }

    /// Existence check; never errors on absence.
    ///
    /// # Errors
    ///
    /// Returns an error only when the index itself cannot be read.
    pub fn has_package(&self, name: &str, version: &str) -> Result<bool> {
        Ok(self.find_package(name, version)?.is_some())
    }

    /// Look up a record without treating absence as an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be read.
    pub fn find_package(&self, name: &str, version: &str) -> Result<Option<PackageRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT name, version, storage_path, size_bytes, digest, added_at \
             FROM packages WHERE name = ?1 AND version = ?2",
        )?;
        let record = stmt
            .query_row(params![name, version], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Direct lookup; absence is an error here, unlike `has_package`.
    ///
    /// # Errors
    ///
    /// `PackageNotFound` when the key has no record.
    pub fn get_package(&self, name: &str, version: &str) -> Result<PackageRecord> {
        self.find_package(name, version)?.ok_or_else(|| {
            StoreError::PackageNotFound {
                name: name.to_string(),
                version: version.to_string(),
            }
            .into()
        })
    }

    /// Snapshot of every record, ordered by name then version.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be read.
    pub fn list_packages(&self) -> Result<Vec<PackageRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT name, version, storage_path, size_bytes, digest, added_at \
             FROM packages ORDER BY name ASC, version ASC",
        )?;
        let rows = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Read-only aggregate; no side effects.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be read.
    #[allow(clippy::cast_sign_loss)]
    pub fn store_info(&self) -> Result<StoreInfo> {
        let conn = self.connection()?;
        let (total_versions, unique_packages, total_size_bytes) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT name), COALESCE(SUM(size_bytes), 0) FROM packages",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        Ok(StoreInfo {
            store_path: self.root.clone(),
            total_versions: total_versions as u64,
            unique_packages: unique_packages as u64,
            total_size_bytes: total_size_bytes as u64,
        })
    }

    /// Remove every record whose `(name, version)` key is absent from `live`.
    ///
    /// Keys locked by a concurrent writer are skipped, never waited on. The
    /// index row is dropped first so readers stop observing the record before
    /// its payload directory goes away.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be read or updated.
    pub fn remove_unreferenced(&self, live: &HashSet<(String, String)>) -> Result<GcSummary> {
        self.ensure_layout()?;
        let mut summary = GcSummary::default();
        for record in self.list_packages()? {
            summary.scanned += 1;
            let record_key = (record.name.clone(), record.version.clone());
            if live.contains(&record_key) {
                continue;
            }
            let Some(_lock) = self.try_lock(&key(&record.name, &record.version))? else {
                summary.locked_skipped += 1;
                continue;
            };
            self.with_immediate_tx(|tx| {
                tx.execute(
                    "DELETE FROM packages WHERE name = ?1 AND version = ?2",
                    params![record.name, record.version],
                )?;
                Ok(())
            })?;
            if record.storage_path.exists() {
                if let Err(err) = fs::remove_dir_all(&record.storage_path) {
                    warn!(
                        name = %record.name,
                        version = %record.version,
                        %err,
                        "failed to remove reclaimed payload directory"
                    );
                    continue;
                }
            }
            // Drop the now-empty per-name directory if this was the last version.
            if let Some(parent) = record.storage_path.parent() {
                let _ = fs::remove_dir(parent);
            }
            summary.reclaimed += 1;
            summary.reclaimed_bytes += record.size_bytes;
            debug!(
                name = %record.name,
                version = %record.version,
                "store gc reclaim"
            );
        }
        Ok(summary)
    }

    /// Delete leftover staging directories from interrupted copies.
    ///
    /// # Errors
    ///
    /// Returns an error when the staging area cannot be enumerated.
    pub fn sweep_partials(&self) -> Result<u64> {
        self.ensure_layout()?;
        let mut removed = 0;
        let tmp_dir = self.root.join(TMP_DIR);
        for entry in fs::read_dir(&tmp_dir)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().contains(".partial") {
                continue;
            }
            let path = entry.path();
            let result = if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if result.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Integrity pass: sweeps staging leftovers, then reports (without
    /// repairing) records whose payload is missing or whose content digest no
    /// longer matches, and payload directories the index does not know about.
    ///
    /// # Errors
    ///
    /// Returns an error when the index or payload tree cannot be read.
    pub fn doctor(&self) -> Result<DoctorSummary> {
        let partials_removed = self.sweep_partials()?;
        let mut summary = DoctorSummary {
            partials_removed,
            ..DoctorSummary::default()
        };

        let mut indexed = HashSet::new();
        for record in self.list_packages()? {
            indexed.insert((record.name.clone(), record.version.clone()));
            if !record.storage_path.exists() {
                warn!(
                    name = %record.name,
                    version = %record.version,
                    "indexed payload directory is missing"
                );
                summary.missing_payloads += 1;
                continue;
            }
            let digest = digest_tree(&record.storage_path)?;
            if digest != record.digest {
                warn!(
                    name = %record.name,
                    version = %record.version,
                    "payload digest mismatch"
                );
                summary.corrupt_payloads += 1;
            }
        }

        let payloads_root = self.root.join(PAYLOADS_DIR);
        for name_entry in fs::read_dir(&payloads_root)? {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let name = name_entry.file_name().to_string_lossy().to_string();
            for version_entry in fs::read_dir(name_entry.path())? {
                let version_entry = version_entry?;
                let version = version_entry.file_name().to_string_lossy().to_string();
                if !indexed.contains(&(name.clone(), version.clone())) {
                    warn!(%name, %version, "payload directory has no index row");
                    summary.orphan_payloads += 1;
                }
            }
        }

        Ok(summary)
    }

    fn publish_payload(&self, staging: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create payload directory {}", parent.display())
            })?;
        }
        // A destination without an index row is a leftover from a crash after
        // rename but before publish; the lock holder owns it.
        if dest.exists() {
            fs::remove_dir_all(dest)
                .with_context(|| format!("failed to clear stale payload {}", dest.display()))?;
        }
        make_payload_files_read_only(staging)?;
        fs::rename(staging, dest).with_context(|| {
            format!(
                "failed to move payload into place ({} -> {})",
                staging.display(),
                dest.display()
            )
        })?;
        if let Some(parent) = dest.parent() {
            fsync_dir(parent).ok();
        }
        Ok(())
    }

    fn insert_record(&self, record: &PackageRecord) -> Result<()> {
        self.with_immediate_tx(|tx| {
            tx.execute(
                "INSERT INTO packages(name, version, storage_path, size_bytes, digest, added_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(name, version) DO NOTHING",
                params![
                    record.name,
                    record.version,
                    record.storage_path.display().to_string(),
                    i64::try_from(record.size_bytes).unwrap_or(i64::MAX),
                    record.digest,
                    i64::try_from(record.added_at).unwrap_or(i64::MAX),
                ],
            )?;
            Ok(())
        })
    }

    fn ensure_layout(&self) -> Result<()> {
        for dir in [PAYLOADS_DIR, LOCKS_DIR, TMP_DIR] {
            fs::create_dir_all(self.root.join(dir)).with_context(|| {
                format!(
                    "failed to ensure store directory {}",
                    self.root.join(dir).display()
                )
            })?;
        }
        let mut conn = self.connection_raw()?;
        init_schema(&conn)?;
        self.ensure_meta(&mut conn)?;
        Ok(())
    }

    fn connection(&self) -> Result<Connection> {
        let conn = self.connection_raw()?;
        conn.busy_timeout(Duration::from_secs(10))
            .context("failed to set busy timeout for store index")?;
        Ok(conn)
    }

    fn connection_raw(&self) -> Result<Connection> {
        let path = self.index_path();
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open store index at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")
            .context("failed to enable WAL for store index")?;
        Ok(conn)
    }

    fn with_immediate_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start store index transaction")?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    fn ensure_meta(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start store meta transaction")?;
        tx.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
            params![META_KEY_FORMAT_VERSION, STORE_FORMAT_VERSION.to_string()],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
            params![META_KEY_CREATED_BY, SILO_VERSION],
        )?;
        tx.commit()?;

        let found: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_KEY_FORMAT_VERSION],
                |row| row.get(0),
            )
            .optional()?;
        match found {
            Some(value) if value == STORE_FORMAT_VERSION.to_string() => Ok(()),
            Some(value) => Err(StoreError::IncompatibleFormat {
                key: META_KEY_FORMAT_VERSION.to_string(),
                expected: STORE_FORMAT_VERSION.to_string(),
                found: value,
            }
            .into()),
            None => Err(StoreError::IndexCorrupt(format!(
                "meta key {META_KEY_FORMAT_VERSION} missing"
            ))
            .into()),
        }
    }

    fn acquire_lock(&self, key: &str) -> Result<File> {
        let path = self.lock_path(key);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open store lock {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(file)
    }

    fn try_lock(&self, key: &str) -> Result<Option<File>> {
        let path = self.lock_path(key);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(file)),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn payload_path(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(PAYLOADS_DIR).join(name).join(version)
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.root.join(LOCKS_DIR).join(format!("{key}.lock"))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        self.root.join(TMP_DIR).join(format!("{key}.partial"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILENAME)
    }
}

fn key(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}

#[allow(clippy::cast_sign_loss)]
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PackageRecord> {
    Ok(PackageRecord {
        name: row.get(0)?,
        version: row.get(1)?,
        storage_path: PathBuf::from(row.get::<_, String>(2)?),
        size_bytes: row.get::<_, i64>(3)? as u64,
        digest: row.get(4)?,
        added_at: row.get::<_, i64>(5)? as u64,
    })
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS packages (
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            digest TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            PRIMARY KEY(name, version)
        );
        "#,
    )
    .context("failed to initialize store index schema")?;
    Ok(())
}

/// Copy `source` (a directory tree or single file) into `dest`, returning the
/// summed file sizes and the content digest of the copy.
fn copy_tree(source: &Path, dest: &Path) -> Result<(u64, String)> {
    fs::create_dir_all(dest)
        .with_context(|| format!("failed to create staging directory {}", dest.display()))?;

    let mut total = 0u64;
    let mut hasher = Sha256::new();

    let metadata = fs::metadata(source)?;
    if metadata.is_file() {
        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("payload source {} has no file name", source.display()))?;
        let target = dest.join(file_name);
        hasher.update(file_name.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        total += copy_file_hashed(source, &target, &mut hasher)?;
        return Ok((total, hex::encode(hasher.finalize())));
    }

    for entry in walkdir::WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("failed to walk payload source {}", source.display()))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .context("walked entry escaped the payload source")?;
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else if file_type.is_file() {
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            total += copy_file_hashed(entry.path(), &target, &mut hasher)?;
        } else {
            bail!(
                "unsupported payload entry {} (only files and directories are stored)",
                entry.path().display()
            );
        }
    }

    Ok((total, hex::encode(hasher.finalize())))
}

fn copy_file_hashed(source: &Path, target: &Path, hasher: &mut Sha256) -> Result<u64> {
    let mut input = File::open(source)
        .with_context(|| format!("failed to read payload file {}", source.display()))?;
    let mut output = File::create(target)
        .with_context(|| format!("failed to write payload file {}", target.display()))?;
    let mut buffer = [0u8; 32 * 1024];
    let mut written = 0u64;
    loop {
        let read = input.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        output.write_all(&buffer[..read])?;
        written += read as u64;
    }
    output.sync_all().ok();
    hasher.update([0u8]);
    Ok(written)
}

/// Recompute the content digest of a stored payload tree.
fn digest_tree(root: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .context("walked entry escaped the payload root")?;
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        let mut file = File::open(entry.path())?;
        let mut buffer = [0u8; 32 * 1024];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Strip write bits from the files of a payload tree. Directories stay
/// writable so gc can unlink entries later.
fn make_payload_files_read_only(root: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let mut perms = entry.metadata()?.permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = perms.mode();
            let new_mode = mode & !0o222;
            if mode != new_mode {
                perms.set_mode(new_mode);
                fs::set_permissions(entry.path(), perms)?;
            }
        }
        #[cfg(not(unix))]
        {
            if !perms.readonly() {
                perms.set_readonly(true);
                fs::set_permissions(entry.path(), perms)?;
            }
        }
    }
    Ok(())
}

fn store_write_error(err: anyhow::Error) -> anyhow::Error {
    if err.is::<StoreError>() {
        err
    } else {
        StoreError::StorageWriteFailure(format!("{err:#}")).into()
    }
}

fn fsync_dir(dir: &Path) -> Result<()> {
    let file = File::open(dir)?;
    file.sync_all()?;
    Ok(())
}

fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
