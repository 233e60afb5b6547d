//! Configuration and per-command context assembly.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::core::registry::EnvironmentRegistry;
use crate::core::store::CentralStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

/// Resolved silo data root plus the setting that produced it.
#[derive(Debug, Clone)]
pub struct HomeLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

/// Resolve the silo data root.
///
/// `SILO_HOME` wins when set; otherwise the platform data directory is used
/// (`XDG_DATA_HOME`/`~/.local/share` on unix, `LOCALAPPDATA` on Windows).
///
/// # Errors
///
/// Returns an error when no home directory can be determined.
pub fn resolve_home() -> Result<HomeLocation> {
    if let Some(override_path) = env::var_os("SILO_HOME") {
        let path = absolutize(PathBuf::from(override_path))?;
        return Ok(HomeLocation {
            path,
            source: "SILO_HOME",
        });
    }

    #[cfg(target_os = "windows")]
    let (base, source) = resolve_windows_data_base()?;
    #[cfg(not(target_os = "windows"))]
    let (base, source) = resolve_unix_data_base()?;

    Ok(HomeLocation {
        path: base.join("silo"),
        source,
    })
}

#[cfg(not(target_os = "windows"))]
fn resolve_unix_data_base() -> Result<(PathBuf, &'static str)> {
    if let Some(xdg) = env::var_os("XDG_DATA_HOME") {
        return Ok((PathBuf::from(xdg), "XDG_DATA_HOME"));
    }
    let home = dirs_next::home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    Ok((home.join(".local").join("share"), "~/.local/share"))
}

#[cfg(target_os = "windows")]
fn resolve_windows_data_base() -> Result<(PathBuf, &'static str)> {
    if let Some(local) = env::var_os("LOCALAPPDATA") {
        return Ok((PathBuf::from(local), "LOCALAPPDATA"));
    }
    let home = dirs_next::home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    Ok((home.join("AppData").join("Local"), "home/AppData/Local"))
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Per-invocation context handed to every core operation.
pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    home: HomeLocation,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context with the provided global options.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be resolved.
    pub fn new(global: &'a GlobalOptions) -> Result<Self> {
        let home = resolve_home()?;
        Ok(Self { global, home })
    }

    #[must_use]
    pub fn home(&self) -> &HomeLocation {
        &self.home
    }

    #[must_use]
    pub fn store_root(&self) -> PathBuf {
        self.home.path.join("store")
    }

    #[must_use]
    pub fn envs_root(&self) -> PathBuf {
        self.home.path.join("envs")
    }

    /// Open the central store under this context's data root.
    ///
    /// # Errors
    ///
    /// Returns an error if the store layout or index cannot be initialized.
    pub fn open_store(&self) -> Result<CentralStore> {
        CentralStore::open(self.store_root())
    }

    /// Open the environment registry under this context's data root.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry directories cannot be created.
    pub fn open_registry(&self) -> Result<EnvironmentRegistry> {
        EnvironmentRegistry::open(self.envs_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_derives_store_and_envs_roots_from_home() {
        let global = GlobalOptions::default();
        let ctx = CommandContext {
            global: &global,
            home: HomeLocation {
                path: PathBuf::from("/data/silo"),
                source: "SILO_HOME",
            },
        };
        assert_eq!(ctx.store_root(), PathBuf::from("/data/silo/store"));
        assert_eq!(ctx.envs_root(), PathBuf::from("/data/silo/envs"));
    }
}
