//! Quest events: intercepts the operations of a host service and notifies
//! registered listeners before and after each call.
//!
//! Listeners, their registry and the dispatcher live in `quest-events-core`.
//! This crate adds the host side: service tables, the interceptor factory,
//! patching and rerouting, configuration and logging setup.

pub mod config;
pub mod intercept;
pub mod logging;
pub mod quest;
pub mod service;

pub use config::{ConfigError, InterceptConfig};
pub use intercept::{
    install, EventApi, InstallError, InterceptorFactory, PatchCoordinator, PatchOutcome,
    PatchPlan, PatchResult,
};
pub use service::{
    Operation, OperationError, PatchRecord, ServiceInstance, ServiceLocator, TargetService,
};
