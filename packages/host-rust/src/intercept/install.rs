//! Startup wiring: builds the registry, dispatcher, factory and coordinator,
//! patches the target service and reroutes its lookups.

use std::sync::Arc;

use quest_events_core::{
    CancelableEventArgs, EventDispatcher, ListenerRegistry, OperationId, PostBinding, PreBinding,
    Value,
};

use super::factory::InterceptorFactory;
use super::patch::{PatchCoordinator, PatchPlan};
use crate::config::{ConfigError, InterceptConfig};
use crate::service::{ServiceInstance, ServiceLocator};

/// Errors that stop installation before any lookup is rerouted.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("service not registered: {name}")]
    ServiceNotFound { name: String },
    #[error("failed to patch operations: {}", .unpatched.join(", "))]
    Verification { unpatched: Vec<String> },
}

/// Handle returned by [`install`]: the registration API plus the patched
/// service.
pub struct EventApi {
    registry: Arc<ListenerRegistry>,
    coordinator: PatchCoordinator,
    patched: Arc<ServiceInstance>,
    rerouted: bool,
}

impl EventApi {
    /// Registers `f` to run before every call of `operation`.
    pub fn on_before<F>(&self, operation: OperationId, f: F) -> Arc<PreBinding>
    where
        F: Fn(&CancelableEventArgs, &[Value]) -> anyhow::Result<CancelableEventArgs>
            + Send
            + Sync
            + 'static,
    {
        self.registry.on_before(operation, f)
    }

    /// Registers `f` to run with the result of every completed call of
    /// `operation`.
    pub fn on_after<F>(&self, operation: OperationId, f: F) -> Arc<PostBinding>
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.on_after(operation, f)
    }

    pub fn remove_before(&self, binding: &Arc<PreBinding>) -> bool {
        self.registry.remove_pre(binding)
    }

    pub fn remove_after(&self, binding: &Arc<PostBinding>) -> bool {
        self.registry.remove_post(binding)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn coordinator(&self) -> &PatchCoordinator {
        &self.coordinator
    }

    /// The patched instance. Callers normally reach it through the locator.
    #[must_use]
    pub fn patched(&self) -> &Arc<ServiceInstance> {
        &self.patched
    }

    /// Whether lookups of the service now return the patched instance. When
    /// false, listeners can be registered but are never notified.
    #[must_use]
    pub fn is_rerouted(&self) -> bool {
        self.rerouted
    }
}

/// Installs interception on the service registered as `service_name`.
///
/// Returns `Ok(None)` when `config.enabled` is false. A failed reroute is
/// logged and still returns the handle, with
/// [`is_rerouted`](EventApi::is_rerouted) reporting `false`.
///
/// # Errors
///
/// - [`InstallError::Config`] if the configuration is invalid
/// - [`InstallError::ServiceNotFound`] if nothing is registered under
///   `service_name`
/// - [`InstallError::Verification`] if any whitelisted operation could not be
///   patched; the locator is not touched in that case
pub fn install(
    config: &InterceptConfig,
    locator: &ServiceLocator,
    service_name: &str,
) -> Result<Option<EventApi>, InstallError> {
    if !config.enabled {
        tracing::info!("interception disabled; leaving {service_name} untouched");
        return Ok(None);
    }
    config.validate()?;

    let registry = Arc::new(ListenerRegistry::new());
    let dispatcher = Arc::new(EventDispatcher::new(
        Arc::clone(&registry),
        config.listener_failure_policy,
    ));
    let factory = InterceptorFactory::new(dispatcher, config.debug);
    let coordinator = PatchCoordinator::new(factory, PatchPlan::from_config(config));

    let target = locator
        .resolve(service_name)
        .ok_or_else(|| InstallError::ServiceNotFound {
            name: service_name.to_string(),
        })?;

    let outcome = coordinator.patch(&target);
    if !outcome.result.success {
        tracing::error!(
            service = service_name,
            unpatched = ?outcome.result.unpatched_operations,
            "patcher did not patch every whitelisted operation; not rerouting"
        );
        return Err(InstallError::Verification {
            unpatched: outcome.result.unpatched_operations,
        });
    }
    tracing::info!(service = service_name, status = "success", "patched service");

    let rerouted = coordinator.reroute(locator, Arc::clone(&outcome.instance));
    if rerouted {
        tracing::info!(service = service_name, "interception installed");
    }

    Ok(Some(EventApi {
        registry,
        coordinator,
        patched: outcome.instance,
        rerouted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Operation;

    fn locator_with_quests() -> (ServiceLocator, Arc<ServiceInstance>) {
        let locator = ServiceLocator::new();
        let quests = Arc::new(ServiceInstance::new(
            "quests",
            [
                (
                    "accept_quest",
                    Operation::new(|_args| async { Ok(Value::from("accepted")) }),
                ),
                (
                    "fail_quest",
                    Operation::new(|_args| async { Ok(Value::from("failed")) }),
                ),
            ],
        ));
        locator.register(Arc::clone(&quests));
        (locator, quests)
    }

    fn config(whitelist: &[&str]) -> InterceptConfig {
        InterceptConfig {
            methods_to_patch: whitelist.iter().map(|name| (*name).to_string()).collect(),
            ..InterceptConfig::default()
        }
    }

    #[test]
    fn disabled_config_installs_nothing() {
        let (locator, quests) = locator_with_quests();
        let config = InterceptConfig {
            enabled: false,
            ..config(&["accept_quest"])
        };

        assert!(install(&config, &locator, "quests").unwrap().is_none());
        assert!(Arc::ptr_eq(&locator.resolve("quests").unwrap(), &quests));
    }

    #[test]
    fn missing_service_is_reported() {
        let locator = ServiceLocator::new();
        let err = install(&config(&["accept_quest"]), &locator, "quests")
            .err()
            .unwrap();
        assert!(matches!(err, InstallError::ServiceNotFound { name } if name == "quests"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (locator, _) = locator_with_quests();
        let err = install(&config(&[]), &locator, "quests").err().unwrap();
        assert!(matches!(err, InstallError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn verification_failure_skips_reroute() {
        let (locator, quests) = locator_with_quests();
        let err = install(
            &config(&["accept_quest", "complete_quest"]),
            &locator,
            "quests",
        )
        .err()
        .unwrap();

        assert!(matches!(
            &err,
            InstallError::Verification { unpatched } if unpatched == &["complete_quest"]
        ));
        assert_eq!(err.to_string(), "failed to patch operations: complete_quest");
        assert!(Arc::ptr_eq(&locator.resolve("quests").unwrap(), &quests));
    }

    #[tokio::test]
    async fn installed_service_routes_through_listeners() {
        let (locator, quests) = locator_with_quests();
        let api = install(&config(&["accept_quest"]), &locator, "quests")
            .unwrap()
            .unwrap();
        assert!(api.is_rerouted());

        let veto = api.on_before(OperationId::AcceptQuest, |_event, _args| {
            Ok(CancelableEventArgs::CANCEL)
        });
        let resolved = locator.resolve("quests").unwrap();
        assert!(!Arc::ptr_eq(&resolved, &quests));
        assert!(Arc::ptr_eq(&resolved, api.patched()));
        assert_eq!(
            resolved.call("accept_quest", vec![]).await.unwrap(),
            Value::Null
        );

        assert!(api.remove_before(&veto));
        assert_eq!(
            resolved.call("accept_quest", vec![]).await.unwrap(),
            Value::from("accepted")
        );
    }
}
