//! Event dispatcher: the before/after notification of a single call.

use std::sync::Arc;

use crate::event::CancelableEventArgs;
use crate::listener::{ListenerError, ListenerFailurePolicy, ListenerPhase};
use crate::operation::OperationId;
use crate::registry::ListenerRegistry;
use crate::types::Value;

/// Drives pre- and post-notification for intercepted calls.
///
/// The dispatcher owns the seed verdict and the listener failure policy; the
/// [`ListenerRegistry`] it was built with is queried live on every call, so
/// bindings registered after patching are honored.
///
/// Callers must invoke [`emit_after`](Self::emit_after) only once the original
/// operation has fully completed.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<ListenerRegistry>,
    policy: ListenerFailurePolicy,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(registry: Arc<ListenerRegistry>, policy: ListenerFailurePolicy) -> Self {
        Self { registry, policy }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn policy(&self) -> ListenerFailurePolicy {
        self.policy
    }

    /// Collects the before-verdict for one call of `operation`.
    ///
    /// # Errors
    ///
    /// Under [`ListenerFailurePolicy::Propagate`], the first failing
    /// pre-listener's error. Never fails under `Isolate`.
    pub fn emit_before(
        &self,
        operation: OperationId,
        args: &[Value],
    ) -> Result<CancelableEventArgs, ListenerError> {
        tracing::debug!(%operation, args = args.len(), "emitting before-event");
        let seed = CancelableEventArgs::PROCEED;
        match self.policy {
            ListenerFailurePolicy::Propagate => self.registry.notify_pre(operation, seed, args),
            ListenerFailurePolicy::Isolate => {
                let (verdict, failures) = self.registry.notify_pre_isolated(operation, seed, args);
                report_isolated(operation, ListenerPhase::Pre, failures);
                Ok(verdict)
            }
        }
    }

    /// Notifies post-listeners of `operation` with the call's result.
    ///
    /// # Errors
    ///
    /// Under [`ListenerFailurePolicy::Propagate`], the first failing
    /// post-listener's error. Never fails under `Isolate`.
    pub fn emit_after(&self, operation: OperationId, result: &Value) -> Result<(), ListenerError> {
        tracing::debug!(%operation, "emitting after-event");
        match self.policy {
            ListenerFailurePolicy::Propagate => self.registry.notify_post(operation, result),
            ListenerFailurePolicy::Isolate => {
                let failures = self.registry.notify_post_isolated(operation, result);
                report_isolated(operation, ListenerPhase::Post, failures);
                Ok(())
            }
        }
    }
}

fn report_isolated(operation: OperationId, phase: ListenerPhase, failures: Vec<ListenerError>) {
    if failures.is_empty() {
        return;
    }
    for failure in &failures {
        tracing::warn!(%operation, %phase, error = %failure, "listener failed; continuing");
    }
    let aggregate = ListenerError::Aggregate {
        operation,
        phase,
        failures,
    };
    tracing::warn!(%operation, %phase, "{aggregate}");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn dispatcher(policy: ListenerFailurePolicy) -> EventDispatcher {
        EventDispatcher::new(Arc::new(ListenerRegistry::new()), policy)
    }

    #[test]
    fn no_listeners_means_proceed() {
        let dispatcher = dispatcher(ListenerFailurePolicy::Propagate);
        let verdict = dispatcher
            .emit_before(OperationId::CompleteQuest, &[Value::Null])
            .unwrap();
        assert_eq!(verdict, CancelableEventArgs::PROCEED);
        dispatcher
            .emit_after(OperationId::CompleteQuest, &Value::Null)
            .unwrap();
    }

    #[test]
    fn registrations_after_construction_are_seen() {
        let dispatcher = dispatcher(ListenerFailurePolicy::Propagate);
        dispatcher
            .registry()
            .on_before(OperationId::CompleteQuest, |_event, _args| {
                Ok(CancelableEventArgs::CANCEL)
            });

        let verdict = dispatcher
            .emit_before(OperationId::CompleteQuest, &[])
            .unwrap();
        assert!(verdict.cancel);
    }

    #[test]
    fn propagate_policy_surfaces_listener_errors() {
        let dispatcher = dispatcher(ListenerFailurePolicy::Propagate);
        dispatcher
            .registry()
            .on_after(OperationId::CompleteQuest, |_result| anyhow::bail!("bad result"));

        let err = dispatcher
            .emit_after(OperationId::CompleteQuest, &Value::Null)
            .unwrap_err();
        assert_eq!(err.phase(), ListenerPhase::Post);
    }

    #[test]
    fn isolate_policy_keeps_votes_of_healthy_listeners() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(ListenerFailurePolicy::Isolate);
        let registry = dispatcher.registry();
        registry.on_before(OperationId::CompleteQuest, |_event, _args| {
            anyhow::bail!("broken listener")
        });
        let counter = Arc::clone(&calls);
        registry.on_before(OperationId::CompleteQuest, move |_event, _args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CancelableEventArgs::CANCEL)
        });

        let verdict = dispatcher
            .emit_before(OperationId::CompleteQuest, &[])
            .unwrap();

        assert!(verdict.cancel);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn isolate_policy_swallows_post_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(ListenerFailurePolicy::Isolate);
        dispatcher
            .registry()
            .on_after(OperationId::CompleteQuest, |_result| anyhow::bail!("broken"));
        let counter = Arc::clone(&calls);
        dispatcher
            .registry()
            .on_after(OperationId::CompleteQuest, move |_result| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        dispatcher
            .emit_after(OperationId::CompleteQuest, &Value::Null)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
