//! Verification report produced when an environment's selections are checked
//! against the central store.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStatus {
    Complete,
    Incomplete,
}

impl VerificationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Complete => "complete",
            VerificationStatus::Incomplete => "incomplete",
        }
    }
}

/// A selection whose `(name, version)` pair is absent from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MissingSelection {
    pub name: String,
    pub version: String,
}

/// Ephemeral verification result; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationReport {
    pub environment: String,
    pub status: VerificationStatus,
    pub total_packages: usize,
    pub missing: Vec<MissingSelection>,
}

impl VerificationReport {
    /// Derive the report status from the missing set: complete iff nothing is
    /// missing.
    #[must_use]
    pub fn new(environment: String, total_packages: usize, missing: Vec<MissingSelection>) -> Self {
        let status = if missing.is_empty() {
            VerificationStatus::Complete
        } else {
            VerificationStatus::Incomplete
        };
        Self {
            environment,
            status,
            total_packages,
            missing,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.status, VerificationStatus::Complete)
    }

    #[must_use]
    pub fn details_json(&self) -> Value {
        json!({
            "environment": self.environment,
            "status": self.status.as_str(),
            "total_packages": self.total_packages,
            "missing": self.missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_missing_set_is_complete() {
        let report = VerificationReport::new("web_app".to_string(), 3, Vec::new());
        assert!(report.is_complete());
        assert_eq!(report.status, VerificationStatus::Complete);
        assert_eq!(report.total_packages, 3);
    }

    #[test]
    fn any_missing_selection_flips_to_incomplete() {
        let missing = vec![MissingSelection {
            name: "utils".to_string(),
            version: "0.9.0".to_string(),
        }];
        let report = VerificationReport::new("api_service".to_string(), 2, missing);
        assert!(!report.is_complete());
        assert_eq!(report.status.as_str(), "incomplete");
    }

    #[test]
    fn details_expose_missing_pairs() {
        let missing = vec![MissingSelection {
            name: "utils".to_string(),
            version: "0.9.0".to_string(),
        }];
        let report = VerificationReport::new("api_service".to_string(), 2, missing);
        let details = report.details_json();
        assert_eq!(details["status"], "incomplete");
        assert_eq!(details["missing"][0]["name"], "utils");
        assert_eq!(details["missing"][0]["version"], "0.9.0");
    }
}
