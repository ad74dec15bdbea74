//! Target services and their swappable operation tables.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use quest_events_core::Value;

use super::operation::{Operation, OperationError};

// ---------------------------------------------------------------------------
// TargetService trait
// ---------------------------------------------------------------------------

/// A host service whose operations can be intercepted.
///
/// Implementations describe their callable operations once, up front; the
/// framework never inspects a live object to discover what it can wrap.
pub trait TargetService: Send + Sync + 'static {
    /// Name the service is registered under in the [`ServiceLocator`](super::ServiceLocator).
    fn service_name(&self) -> &'static str;

    /// Static description of every callable operation, keyed by name. Each
    /// operation captures `self` as its receiver.
    fn describe(self: Arc<Self>) -> Vec<(&'static str, Operation)>;
}

// ---------------------------------------------------------------------------
// ServiceInstance
// ---------------------------------------------------------------------------

type OperationTable = BTreeMap<String, Operation>;

/// A named table of operations that can be read and reassigned by name.
///
/// Reads load the current table without locking. Writes copy the table and
/// swap the copy in, so a call that already fetched an operation keeps using
/// it even if the slot is replaced concurrently.
pub struct ServiceInstance {
    name: &'static str,
    operations: ArcSwap<OperationTable>,
}

impl ServiceInstance {
    /// Creates an instance from an explicit list of operations.
    pub fn new<N, I>(name: &'static str, operations: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Operation)>,
    {
        let table: OperationTable = operations
            .into_iter()
            .map(|(op_name, op)| (op_name.into(), op))
            .collect();
        Self {
            name,
            operations: ArcSwap::from_pointee(table),
        }
    }

    /// Builds the operation table from a target's static description.
    pub fn from_target<T: TargetService>(target: Arc<T>) -> Self {
        let name = target.service_name();
        Self::new(name, target.describe())
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Operation names in lexicographic order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<String> {
        self.operations.load().keys().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Operation> {
        self.operations.load().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.operations.load().contains_key(name)
    }

    /// Puts `operation` in the slot for `name`, returning what was there.
    pub fn replace(&self, name: &str, operation: Operation) -> Option<Operation> {
        let previous = self.operations.rcu(|table| {
            let mut next = OperationTable::clone(table);
            next.insert(name.to_string(), operation.clone());
            next
        });
        previous.get(name).cloned()
    }

    /// Empties the slot for `name`, returning what was there.
    pub fn remove(&self, name: &str) -> Option<Operation> {
        let previous = self.operations.rcu(|table| {
            let mut next = OperationTable::clone(table);
            next.remove(name);
            next
        });
        previous.get(name).cloned()
    }

    /// Looks up `name` and calls it.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnknownOperation`] if no operation is
    /// registered under `name`, otherwise whatever the operation returns.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, OperationError> {
        let operation = self.get(name).ok_or_else(|| OperationError::UnknownOperation {
            name: name.to_string(),
        })?;
        operation.call(args).await
    }

    /// A new instance with the same name and the same operations. Slots of
    /// the fork can be replaced without affecting `self`.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            name: self.name,
            operations: ArcSwap::new(self.operations.load_full()),
        }
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("name", &self.name)
            .field("operations", &self.operation_names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
