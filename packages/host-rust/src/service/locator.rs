use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::instance::ServiceInstance;

// ---------------------------------------------------------------------------
// ServiceLocator
// ---------------------------------------------------------------------------

/// Global lookup from service name to the instance callers should use.
///
/// Rerouting a service means registering a different instance under the same
/// name; everyone who resolves the name afterwards gets the new instance.
/// Registration order of distinct names is kept for deterministic listing.
pub struct ServiceLocator {
    by_name: DashMap<&'static str, Arc<ServiceInstance>>,
    order: RwLock<Vec<&'static str>>,
}

impl ServiceLocator {
    /// Creates an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Registers `instance` under its own name, returning the instance it
    /// replaced, if any.
    pub fn register(&self, instance: Arc<ServiceInstance>) -> Option<Arc<ServiceInstance>> {
        let name = instance.name();
        let previous = self.by_name.insert(name, instance);
        if previous.is_none() {
            self.order.write().push(name);
        }
        previous
    }

    /// Drops the registration for `name`, returning the instance that was
    /// registered.
    pub fn remove(&self, name: &str) -> Option<Arc<ServiceInstance>> {
        let (_, previous) = self.by_name.remove(name)?;
        self.order.write().retain(|registered| *registered != name);
        Some(previous)
    }

    /// The instance currently registered under `name`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<ServiceInstance>> {
        self.by_name.get(name).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered service names, in first-registration order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&'static str> {
        self.order.read().clone()
    }
}

impl Default for ServiceLocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
