#![deny(clippy::all, warnings)]

mod core;

pub use crate::core::config::{resolve_home, CommandContext, GlobalOptions, HomeLocation};
pub use crate::core::loader::{
    collect_live_selections, resolve_paths, sweep_unreferenced, verify_environment, LoaderError,
};
pub use crate::core::ops::{
    env_create, env_list, env_pin, env_show, format_status_message, resolve_env, store_add,
    store_doctor, store_gc, store_info, store_list, to_json_response, verify_env, AddRequest,
    CommandGroup, CommandInfo, EnvCreateRequest, PinRequest,
};
pub use crate::core::registry::{EnvironmentRegistry, RegistryError};
pub use crate::core::store::{
    AddOutcome, CentralStore, DoctorSummary, GcSummary, PackageRecord, StoreError, StoreInfo,
};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
pub use silo_domain::{
    Environment, EnvironmentSummary, MissingSelection, VerificationReport, VerificationStatus,
};
