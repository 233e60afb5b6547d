//! Identifier rules shared by the store and the registry.
//!
//! Package names, versions, and environment names all end up as path
//! components (payload directories, manifest filenames), so they share one
//! conservative character set.

use thiserror::Error;

const MAX_IDENTIFIER_LEN: usize = 128;

/// A name, version, or environment identifier failed validation.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("[SL301] invalid {field} {value:?}: {reason}")]
pub struct InvalidIdentifier {
    pub field: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl InvalidIdentifier {
    #[must_use]
    pub fn code(&self) -> &'static str {
        "SL301"
    }
}

/// Validate a package name.
///
/// # Errors
///
/// Returns `InvalidIdentifier` when the name is empty, too long, or contains
/// characters outside `[A-Za-z0-9._+-]` (the first byte must be alphanumeric).
pub fn validate_package_name(value: &str) -> Result<(), InvalidIdentifier> {
    validate("package name", value)
}

/// Validate a version string. Versions are opaque identifiers; no ordering or
/// semantic-versioning rules apply.
///
/// # Errors
///
/// Returns `InvalidIdentifier` under the same rules as package names.
pub fn validate_version(value: &str) -> Result<(), InvalidIdentifier> {
    validate("version", value)
}

/// Validate an environment name.
///
/// # Errors
///
/// Returns `InvalidIdentifier` under the same rules as package names.
pub fn validate_environment_name(value: &str) -> Result<(), InvalidIdentifier> {
    validate("environment name", value)
}

fn validate(field: &'static str, value: &str) -> Result<(), InvalidIdentifier> {
    let fail = |reason: &'static str| InvalidIdentifier {
        field,
        value: value.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(fail("must not be empty"));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(fail("exceeds 128 bytes"));
    }
    let mut chars = value.chars();
    let first = chars.next().unwrap_or('\0');
    if !first.is_ascii_alphanumeric() {
        return Err(fail("must start with an ASCII letter or digit"));
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '+' | '-')) {
        return Err(fail("contains characters outside [A-Za-z0-9._+-]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_identifiers() {
        for value in ["calculator", "utils", "3.2.1", "0.9.0-rc.1", "py_tool+cu12"] {
            assert!(validate_package_name(value).is_ok(), "rejected {value}");
        }
    }

    #[test]
    fn rejects_empty_and_path_like_values() {
        assert!(validate_package_name("").is_err());
        assert!(validate_version("1.0/..").is_err());
        assert!(validate_environment_name("../escape").is_err());
        assert!(validate_environment_name(".hidden").is_err());
    }

    #[test]
    fn rejects_oversized_values() {
        let long = "a".repeat(129);
        let err = validate_version(&long).unwrap_err();
        assert_eq!(err.field, "version");
        assert_eq!(err.code(), "SL301");
    }
}
