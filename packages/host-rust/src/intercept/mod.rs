//! Operation interception.
//!
//! 1. **Factory** (`factory`): wraps one operation so calls go through the
//!    event dispatcher (before → original → after)
//! 2. **Patching** (`patch`): wraps every whitelisted operation of a service
//!    instance, verifies the result, reroutes the locator, and can undo it
//! 3. **Install** (`install`): startup wiring of the whole chain

pub mod factory;
pub mod install;
pub mod patch;

pub use factory::InterceptorFactory;
pub use install::{install, EventApi, InstallError};
pub use patch::{PatchCoordinator, PatchOutcome, PatchPlan, PatchResult};
