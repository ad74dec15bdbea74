//! Target-service plumbing.
//!
//! - **Operations** (`operation`): type-erased async operation handles and
//!   the patch marker carried by wrapped ones
//! - **Instances** (`instance`): the `TargetService` trait and the swappable
//!   operation table built from it
//! - **Locator** (`locator`): name-based lookup that rerouting rewrites

pub mod instance;
pub mod locator;
pub mod operation;

pub use instance::{ServiceInstance, TargetService};
pub use locator::ServiceLocator;
pub use operation::{BoxedFuture, Operation, OperationError, OperationFn, PatchRecord};
