//! Patch coordinator: wraps whitelisted operations of a service instance,
//! verifies the result, and reroutes the service locator to the patched
//! instance.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::factory::InterceptorFactory;
use crate::config::InterceptConfig;
use crate::service::{ServiceInstance, ServiceLocator};

// ---------------------------------------------------------------------------
// PatchPlan
// ---------------------------------------------------------------------------

/// Which operations to wrap, which names are never considered, and which
/// operation proves a reroute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPlan {
    whitelist: Vec<String>,
    exclusions: BTreeSet<String>,
    sentinel: Option<String>,
}

impl PatchPlan {
    /// Lifecycle names that are never wrapped, whatever the whitelist says.
    pub const DEFAULT_EXCLUSIONS: [&'static str; 3] = ["new", "init", "shutdown"];

    /// Plan for `whitelist` with the default exclusions. Duplicate names are
    /// dropped; first-occurrence order is kept.
    pub fn new<I, S>(whitelist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let whitelist = whitelist
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| seen.insert(name.clone()))
            .collect();
        Self {
            whitelist,
            exclusions: Self::DEFAULT_EXCLUSIONS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            sentinel: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &InterceptConfig) -> Self {
        let plan = Self::new(config.methods_to_patch.iter().cloned());
        match &config.sentinel_operation {
            Some(sentinel) => plan.with_sentinel(sentinel.clone()),
            None => plan,
        }
    }

    #[must_use]
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = Some(sentinel.into());
        self
    }

    #[must_use]
    pub fn whitelist(&self) -> &[String] {
        &self.whitelist
    }

    #[must_use]
    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.whitelist.iter().any(|listed| listed == name)
    }

    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclusions.contains(name)
    }

    /// The explicit sentinel, or the first whitelisted name.
    #[must_use]
    pub fn sentinel(&self) -> Option<&str> {
        self.sentinel
            .as_deref()
            .or_else(|| self.whitelist.first().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// PatchResult / PatchOutcome
// ---------------------------------------------------------------------------

/// Verification report for a patched instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchResult {
    pub success: bool,
    /// Whitelisted names that are missing or not wrapped, in whitelist order.
    pub unpatched_operations: Vec<String>,
}

/// A freshly patched instance together with its verification report.
#[derive(Debug)]
pub struct PatchOutcome {
    pub instance: Arc<ServiceInstance>,
    pub result: PatchResult,
}

// ---------------------------------------------------------------------------
// PatchCoordinator
// ---------------------------------------------------------------------------

/// Applies the interceptor to every whitelisted operation of a service.
///
/// Per operation the only transitions are `Unpatched → Patched` (by
/// [`patch`](Self::patch)) and `Patched → Unpatched` (by
/// [`unpatch`](Self::unpatch)). [`verify`](Self::verify) only reads.
pub struct PatchCoordinator {
    factory: InterceptorFactory,
    plan: PatchPlan,
}

impl PatchCoordinator {
    #[must_use]
    pub fn new(factory: InterceptorFactory, plan: PatchPlan) -> Self {
        Self { factory, plan }
    }

    #[must_use]
    pub fn plan(&self) -> &PatchPlan {
        &self.plan
    }

    #[must_use]
    pub fn factory(&self) -> &InterceptorFactory {
        &self.factory
    }

    /// Forks `target`, wraps the fork's whitelisted operations and verifies
    /// the fork. `target` itself is left untouched.
    #[must_use]
    pub fn patch(&self, target: &ServiceInstance) -> PatchOutcome {
        let instance = Arc::new(target.fork());
        let patched = self.patch_in_place(&instance);
        tracing::debug!(
            service = instance.name(),
            patched = patched.len(),
            "patched service fork"
        );
        let result = self.verify(&instance);
        PatchOutcome { instance, result }
    }

    /// Wraps the whitelisted operations of `instance` in place and returns the
    /// names that were wrapped. Operations that already carry a patch marker
    /// are left as they are.
    pub fn patch_in_place(&self, instance: &ServiceInstance) -> Vec<String> {
        let mut patched = Vec::new();
        for name in instance.operation_names() {
            if self.plan.is_excluded(&name) {
                continue;
            }
            if !self.plan.is_whitelisted(&name) {
                tracing::debug!(service = instance.name(), operation = %name, "skipped patching");
                continue;
            }
            let Some(current) = instance.get(&name) else {
                continue;
            };
            if current.is_patched() {
                tracing::debug!(service = instance.name(), operation = %name, "already patched");
                continue;
            }

            instance.replace(&name, self.factory.wrap(&name, current));
            tracing::info!(
                service = instance.name(),
                operation = %name,
                status = "success",
                "patched operation"
            );
            patched.push(name);
        }
        patched
    }

    /// Checks that every whitelisted name exists on `instance` and carries a
    /// patch marker.
    #[must_use]
    pub fn verify(&self, instance: &ServiceInstance) -> PatchResult {
        let unpatched_operations: Vec<String> = self
            .plan
            .whitelist()
            .iter()
            .filter(|name| !instance.get(name).is_some_and(|op| op.is_patched()))
            .cloned()
            .collect();
        PatchResult {
            success: unpatched_operations.is_empty(),
            unpatched_operations,
        }
    }

    /// Registers `patched` in `locator` in place of whatever is registered
    /// under the same name.
    ///
    /// Returns `true` only if the sentinel operation resolved through the
    /// locator afterwards is a different function from the one resolved
    /// before. On failure an error is logged and `false` is returned. If
    /// `patched` lacks the sentinel, the previous registration is put back.
    pub fn reroute(&self, locator: &ServiceLocator, patched: Arc<ServiceInstance>) -> bool {
        let service = patched.name();
        let Some(sentinel) = self.plan.sentinel() else {
            tracing::error!(service, "no sentinel operation to confirm the reroute");
            return false;
        };

        let before = locator
            .resolve(service)
            .and_then(|instance| instance.get(sentinel));
        let previous = locator.register(patched);
        let after = locator
            .resolve(service)
            .and_then(|instance| instance.get(sentinel));

        match (before, after) {
            (_, None) => {
                tracing::error!(service, sentinel, "rerouted service has no sentinel operation");
                match previous {
                    Some(previous) => {
                        locator.register(previous);
                    }
                    None => {
                        locator.remove(service);
                    }
                }
                false
            }
            (Some(before), Some(after)) if before.ptr_eq(&after) => {
                tracing::error!(
                    service,
                    sentinel,
                    "reroute had no effect; lookups still return the original operation"
                );
                false
            }
            _ => {
                tracing::info!(service, sentinel, status = "success", "rerouted service lookups");
                true
            }
        }
    }

    /// Restores the original function of every patched operation on
    /// `instance`. Returns the restored names.
    pub fn unpatch(&self, instance: &ServiceInstance) -> Vec<String> {
        let mut restored = Vec::new();
        for name in instance.operation_names() {
            let Some(current) = instance.get(&name) else {
                continue;
            };
            let Some(record) = current.patch_record() else {
                continue;
            };
            instance.replace(&name, record.original().clone());
            tracing::info!(service = instance.name(), operation = %name, "unpatched operation");
            restored.push(name);
        }
        restored
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
