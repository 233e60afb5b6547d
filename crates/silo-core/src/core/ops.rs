//! Command layer: one function per CLI operation, each returning an
//! `ExecutionOutcome`. Typed core errors are mapped to user-error outcomes
//! with hints here; anything unexpected stays a `Failure`.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use serde_json::{json, Value};

use crate::core::config::CommandContext;
use crate::core::loader::{self, LoaderError};
use crate::core::registry::RegistryError;
use crate::core::store::StoreError;
use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
use silo_domain::{InvalidIdentifier, PinOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandGroup {
    Add,
    List,
    Info,
    CreateEnv,
    Pin,
    ListEnvs,
    ShowEnv,
    Verify,
    Resolve,
    Gc,
    Doctor,
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandGroup::Add => "add",
            CommandGroup::List => "list",
            CommandGroup::Info => "info",
            CommandGroup::CreateEnv => "create-env",
            CommandGroup::Pin => "pin",
            CommandGroup::ListEnvs => "list-envs",
            CommandGroup::ShowEnv => "show-env",
            CommandGroup::Verify => "verify",
            CommandGroup::Resolve => "resolve",
            CommandGroup::Gc => "gc",
            CommandGroup::Doctor => "doctor",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: CommandGroup,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: CommandGroup, name: &'static str) -> Self {
        Self { group, name }
    }
}

#[must_use]
pub fn format_status_message(info: CommandInfo, message: &str) -> String {
    let group_name = info.group.to_string();
    let prefix = if group_name == info.name {
        format!("silo {}", info.name)
    } else {
        format!("silo {group_name} {}", info.name)
    };
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}

#[must_use]
pub fn to_json_response(info: CommandInfo, outcome: &ExecutionOutcome, _code: i32) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(info, &outcome.message),
        "details": details,
    })
}

#[derive(Clone, Debug)]
pub struct AddRequest {
    pub name: String,
    pub version: String,
    pub source: PathBuf,
}

#[derive(Clone, Debug)]
pub struct EnvCreateRequest {
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct PinRequest {
    pub environment: String,
    pub package: String,
    pub version: String,
}

/// Copy a payload into the store under `(name, version)`.
///
/// # Errors
///
/// Returns an error only when the store itself cannot be opened; operation
/// failures become outcomes.
pub fn store_add(ctx: &CommandContext, request: &AddRequest) -> Result<ExecutionOutcome> {
    let store = ctx.open_store()?;
    match store.add_package(&request.name, &request.version, &request.source) {
        Ok(outcome) => {
            let record = outcome.record();
            let details = json!({
                "name": record.name,
                "version": record.version,
                "storage_path": record.storage_path,
                "size_bytes": record.size_bytes,
                "already_stored": !outcome.is_new(),
            });
            let message = if outcome.is_new() {
                format!("added {} {}", record.name, record.version)
            } else {
                format!("{} {} already stored", record.name, record.version)
            };
            Ok(ExecutionOutcome::success(message, details))
        }
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Snapshot every stored package version.
///
/// # Errors
///
/// Returns an error only when the store cannot be opened.
pub fn store_list(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let store = ctx.open_store()?;
    match store.list_packages() {
        Ok(packages) => {
            let count = packages.len();
            let details = json!({
                "count": count,
                "packages": packages,
            });
            Ok(ExecutionOutcome::success(
                format!("{count} package version(s) stored"),
                details,
            ))
        }
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Store-wide aggregate counters.
///
/// # Errors
///
/// Returns an error only when the store cannot be opened.
pub fn store_info(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let store = ctx.open_store()?;
    match store.store_info() {
        Ok(info) => {
            let details = json!({
                "store_path": info.store_path,
                "total_versions": info.total_versions,
                "unique_packages": info.unique_packages,
                "total_size_mb": info.total_size_mb(),
            });
            Ok(ExecutionOutcome::success(
                format!(
                    "{} version(s) of {} package(s), {} MB",
                    info.total_versions,
                    info.unique_packages,
                    info.total_size_mb()
                ),
                details,
            ))
        }
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Register a new, empty environment.
///
/// # Errors
///
/// Returns an error only when the registry cannot be opened.
pub fn env_create(ctx: &CommandContext, request: &EnvCreateRequest) -> Result<ExecutionOutcome> {
    let registry = ctx.open_registry()?;
    match registry.create_environment(&request.name, &request.description) {
        Ok(env) => Ok(ExecutionOutcome::success(
            format!("created environment {}", env.name),
            json!({
                "name": env.name,
                "description": env.description,
                "created_at": env.created_at,
            }),
        )),
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Pin a package version in an environment (upsert).
///
/// # Errors
///
/// Returns an error only when the registry cannot be opened.
pub fn env_pin(ctx: &CommandContext, request: &PinRequest) -> Result<ExecutionOutcome> {
    let registry = ctx.open_registry()?;
    match registry.pin_package(&request.environment, &request.package, &request.version) {
        Ok(outcome) => {
            let (kind, previous) = match &outcome {
                PinOutcome::Added => ("added", None),
                PinOutcome::Replaced { previous } => ("replaced", Some(previous.clone())),
                PinOutcome::Unchanged => ("unchanged", None),
            };
            Ok(ExecutionOutcome::success(
                format!(
                    "pinned {} {} in {}",
                    request.package, request.version, request.environment
                ),
                json!({
                    "environment": request.environment,
                    "package": request.package,
                    "version": request.version,
                    "outcome": kind,
                    "previous": previous,
                }),
            ))
        }
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// List every registered environment.
///
/// # Errors
///
/// Returns an error only when the registry cannot be opened.
pub fn env_list(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let registry = ctx.open_registry()?;
    match registry.list_environments() {
        Ok(environments) => {
            let count = environments.len();
            Ok(ExecutionOutcome::success(
                format!("{count} environment(s)"),
                json!({
                    "count": count,
                    "environments": environments,
                }),
            ))
        }
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Show one environment's manifest.
///
/// # Errors
///
/// Returns an error only when the registry cannot be opened.
pub fn env_show(ctx: &CommandContext, name: &str) -> Result<ExecutionOutcome> {
    let registry = ctx.open_registry()?;
    match registry.get_environment(name) {
        Ok(env) => Ok(ExecutionOutcome::success(
            format!("environment {} ({} package(s))", env.name, env.package_count()),
            json!({
                "name": env.name,
                "description": env.description,
                "created_at": env.created_at,
                "package_count": env.package_count(),
                "selections": env.selections,
            }),
        )),
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Verify an environment's selections against the store.
///
/// An incomplete environment is a user-error outcome (non-zero exit at the
/// CLI) but not an operational failure.
///
/// # Errors
///
/// Returns an error only when the store or registry cannot be opened.
pub fn verify_env(ctx: &CommandContext, name: &str) -> Result<ExecutionOutcome> {
    let store = ctx.open_store()?;
    let registry = ctx.open_registry()?;
    match loader::verify_environment(&store, &registry, name) {
        Ok(report) => {
            if report.is_complete() {
                Ok(ExecutionOutcome::success(
                    format!(
                        "environment {} is complete ({} package(s))",
                        report.environment, report.total_packages
                    ),
                    report.details_json(),
                ))
            } else {
                let mut details = report.details_json();
                if let Value::Object(map) = &mut details {
                    map.insert(
                        "hint".to_string(),
                        Value::String(
                            "Add the missing versions with `silo add <name> <version> <path>`."
                                .to_string(),
                        ),
                    );
                }
                Ok(ExecutionOutcome::user_error(
                    format!(
                        "environment {} is incomplete ({} of {} selection(s) missing)",
                        report.environment,
                        report.missing.len(),
                        report.total_packages
                    ),
                    details,
                ))
            }
        }
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Resolve an environment's selections to store payload paths.
///
/// # Errors
///
/// Returns an error only when the store or registry cannot be opened.
pub fn resolve_env(ctx: &CommandContext, name: &str) -> Result<ExecutionOutcome> {
    let store = ctx.open_store()?;
    let registry = ctx.open_registry()?;
    match loader::resolve_paths(&store, &registry, name) {
        Ok(paths) => Ok(ExecutionOutcome::success(
            format!("resolved {} package(s) for {name}", paths.len()),
            json!({
                "environment": name,
                "paths": paths,
            }),
        )),
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Reclaim store entries no environment references.
///
/// # Errors
///
/// Returns an error only when the store or registry cannot be opened.
pub fn store_gc(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let store = ctx.open_store()?;
    let registry = ctx.open_registry()?;
    match loader::sweep_unreferenced(&store, &registry) {
        Ok(summary) => Ok(ExecutionOutcome::success(
            format!(
                "reclaimed {} of {} stored version(s) ({} bytes)",
                summary.reclaimed, summary.scanned, summary.reclaimed_bytes
            ),
            json!({
                "scanned": summary.scanned,
                "reclaimed": summary.reclaimed,
                "reclaimed_bytes": summary.reclaimed_bytes,
                "locked_skipped": summary.locked_skipped,
            }),
        )),
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

/// Run the store integrity pass.
///
/// # Errors
///
/// Returns an error only when the store cannot be opened.
pub fn store_doctor(ctx: &CommandContext) -> Result<ExecutionOutcome> {
    let store = ctx.open_store()?;
    match store.doctor() {
        Ok(summary) => {
            let details = json!({
                "partials_removed": summary.partials_removed,
                "missing_payloads": summary.missing_payloads,
                "corrupt_payloads": summary.corrupt_payloads,
                "orphan_payloads": summary.orphan_payloads,
            });
            if summary.is_clean() {
                Ok(ExecutionOutcome::success("store is consistent", details))
            } else {
                Ok(ExecutionOutcome::failure(
                    format!(
                        "store integrity check found {} issue(s)",
                        summary.missing_payloads + summary.corrupt_payloads + summary.orphan_payloads
                    ),
                    details,
                ))
            }
        }
        Err(err) => Ok(outcome_from_error(&err)),
    }
}

fn outcome_from_error(err: &anyhow::Error) -> ExecutionOutcome {
    if let Some(store_err) = err.downcast_ref::<StoreError>() {
        let details = json!({
            "code": store_err.code(),
            "hint": store_hint(store_err),
        });
        return match store_err {
            StoreError::InvalidIdentifier(_)
            | StoreError::SourceNotFound { .. }
            | StoreError::PackageNotFound { .. } => {
                ExecutionOutcome::user_error(store_err.to_string(), details)
            }
            StoreError::StorageWriteFailure(_)
            | StoreError::IndexCorrupt(_)
            | StoreError::IncompatibleFormat { .. } => {
                ExecutionOutcome::failure(store_err.to_string(), details)
            }
        };
    }

    if let Some(registry_err) = err.downcast_ref::<RegistryError>() {
        let details = json!({
            "code": registry_err.code(),
            "hint": registry_hint(registry_err),
        });
        return match registry_err {
            RegistryError::ManifestCorrupt { .. } => {
                ExecutionOutcome::failure(registry_err.to_string(), details)
            }
            _ => ExecutionOutcome::user_error(registry_err.to_string(), details),
        };
    }

    if let Some(loader_err) = err.downcast_ref::<LoaderError>() {
        let LoaderError::EnvironmentIncomplete { missing, .. } = loader_err;
        let details = json!({
            "code": loader_err.code(),
            "missing": missing,
            "hint": "Add the missing versions with `silo add <name> <version> <path>`.",
        });
        return ExecutionOutcome::user_error(loader_err.to_string(), details);
    }

    if let Some(ident_err) = err.downcast_ref::<InvalidIdentifier>() {
        return ExecutionOutcome::user_error(
            ident_err.to_string(),
            json!({
                "code": ident_err.code(),
                "hint": IDENTIFIER_HINT,
            }),
        );
    }

    ExecutionOutcome::failure(format!("{err:#}"), json!({}))
}

const IDENTIFIER_HINT: &str =
    "Identifiers are ASCII [A-Za-z0-9._+-] and start with a letter or digit.";

fn store_hint(err: &StoreError) -> &'static str {
    match err {
        StoreError::InvalidIdentifier(_) => IDENTIFIER_HINT,
        StoreError::SourceNotFound { .. } => {
            "Check the payload path; it must exist and be readable."
        }
        StoreError::StorageWriteFailure(_) => {
            "The staged copy was rolled back; check free space and permissions, then retry."
        }
        StoreError::PackageNotFound { .. } => "Add it with `silo add <name> <version> <path>`.",
        StoreError::IndexCorrupt(_) | StoreError::IncompatibleFormat { .. } => {
            "Run `silo doctor` to inspect the store."
        }
    }
}

fn registry_hint(err: &RegistryError) -> &'static str {
    match err {
        RegistryError::InvalidIdentifier(_) => IDENTIFIER_HINT,
        RegistryError::DuplicateEnvironment { .. } => {
            "Choose a different name, or inspect the existing one with `silo show-env`."
        }
        RegistryError::EnvironmentNotFound { .. } => {
            "Create it first with `silo create-env <name>`."
        }
        RegistryError::ManifestCorrupt { .. } => {
            "Fix or remove the manifest file under the envs directory."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_messages_are_prefixed_once() {
        let info = CommandInfo::new(CommandGroup::Verify, "verify");
        assert_eq!(
            format_status_message(info, "environment web_app is complete (1 package(s))"),
            "silo verify: environment web_app is complete (1 package(s))"
        );
        assert_eq!(format_status_message(info, ""), "silo verify");
        assert_eq!(
            format_status_message(info, "silo verify: already prefixed"),
            "silo verify: already prefixed"
        );
    }

    #[test]
    fn json_envelope_carries_status_and_details() {
        let info = CommandInfo::new(CommandGroup::Add, "add");
        let outcome = ExecutionOutcome::user_error("bad input", json!({"code": "SL301"}));
        let payload = to_json_response(info, &outcome, 1);
        assert_eq!(payload["status"], "user-error");
        assert_eq!(payload["details"]["code"], "SL301");
        assert_eq!(payload["message"], "silo add: bad input");
    }

    #[test]
    fn typed_errors_become_user_error_outcomes() {
        let err = anyhow::Error::from(StoreError::PackageNotFound {
            name: "utils".to_string(),
            version: "0.9.0".to_string(),
        });
        let outcome = outcome_from_error(&err);
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert_eq!(outcome.details["code"], "SL312");
    }

    #[test]
    fn unexpected_errors_stay_failures() {
        let err = anyhow::anyhow!("disk on fire");
        let outcome = outcome_from_error(&err);
        assert_eq!(outcome.status, CommandStatus::Failure);
    }
}
