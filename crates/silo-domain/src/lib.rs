#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod environment;
pub mod ident;
pub mod verify;

pub use environment::{Environment, EnvironmentSummary, PinOutcome, MANIFEST_SCHEMA_VERSION};
pub use ident::{
    validate_environment_name, validate_package_name, validate_version, InvalidIdentifier,
};
pub use verify::{MissingSelection, VerificationReport, VerificationStatus};
