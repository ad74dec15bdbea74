//! Interceptor factory: wraps an operation so each call routes through the
//! event dispatcher.

use std::sync::Arc;

use quest_events_core::{EventDispatcher, OperationId, Value};
use tracing::{info_span, Instrument};

use crate::service::{BoxedFuture, Operation, OperationError, OperationFn, PatchRecord};

// ---------------------------------------------------------------------------
// InterceptorFactory
// ---------------------------------------------------------------------------

/// Produces instrumented replacements for operations.
///
/// The operation's identity is resolved once, when it is wrapped, and the
/// resulting wrapper closes over it together with the dispatcher handle.
#[derive(Clone)]
pub struct InterceptorFactory {
    dispatcher: Arc<EventDispatcher>,
    debug: bool,
}

impl InterceptorFactory {
    #[must_use]
    pub fn new(dispatcher: Arc<EventDispatcher>, debug: bool) -> Self {
        Self { dispatcher, debug }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Wraps `original`, which is registered under `name`.
    ///
    /// Names outside the interceptable set produce a pass-through wrapper:
    /// calls reach `original` unchanged and no listener is ever notified.
    /// Either way the returned operation carries a [`PatchRecord`].
    #[must_use]
    pub fn wrap(&self, name: &str, original: Operation) -> Operation {
        let operation = OperationId::cast(name);
        let record = PatchRecord::new(name, operation, original.clone());

        let func: OperationFn = match operation {
            Some(operation) => {
                let dispatcher = Arc::clone(&self.dispatcher);
                Arc::new(move |args: Vec<Value>| {
                    intercepted_call(Arc::clone(&dispatcher), operation, original.clone(), args)
                })
            }
            None => {
                tracing::warn!(
                    name,
                    "not an interceptable operation; calls will bypass listeners"
                );
                let debug = self.debug;
                let name = name.to_string();
                Arc::new(move |args: Vec<Value>| {
                    if debug {
                        tracing::debug!(name = %name, "calling unresolved operation directly");
                    }
                    original.call(args)
                })
            }
        };

        Operation::patched(func, record)
    }
}

// ---------------------------------------------------------------------------
// Call path
// ---------------------------------------------------------------------------

enum Outcome {
    Canceled,
    Completed(Value),
}

fn intercepted_call(
    dispatcher: Arc<EventDispatcher>,
    operation: OperationId,
    original: Operation,
    args: Vec<Value>,
) -> BoxedFuture {
    let span = info_span!(
        "intercept",
        operation = %operation,
        outcome = tracing::field::Empty,
    );

    Box::pin(
        async move {
            let result = dispatch(&dispatcher, operation, &original, args).await;

            let outcome = match &result {
                Ok(Outcome::Canceled) => "canceled",
                Ok(Outcome::Completed(_)) => "completed",
                Err(_) => "error",
            };
            tracing::Span::current().record("outcome", outcome);

            result.map(|outcome| match outcome {
                Outcome::Canceled => Value::Null,
                Outcome::Completed(value) => value,
            })
        }
        .instrument(span),
    )
}

/// before → original → after, strictly in sequence. The after-notification
/// starts only once the original's future has resolved.
async fn dispatch(
    dispatcher: &EventDispatcher,
    operation: OperationId,
    original: &Operation,
    args: Vec<Value>,
) -> Result<Outcome, OperationError> {
    let verdict = dispatcher.emit_before(operation, &args)?;
    if verdict.cancel {
        tracing::debug!(%operation, "a pre-listener canceled the call");
        return Ok(Outcome::Canceled);
    }

    let result = original.call(args).await?;
    dispatcher.emit_after(operation, &result)?;
    Ok(Outcome::Completed(result))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use quest_events_core::{
        CancelableEventArgs, ListenerError, ListenerFailurePolicy, ListenerPhase, ListenerRegistry,
    };

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn factory(policy: ListenerFailurePolicy) -> InterceptorFactory {
        let registry = Arc::new(ListenerRegistry::new());
        InterceptorFactory::new(Arc::new(EventDispatcher::new(registry, policy)), false)
    }

    fn registry(factory: &InterceptorFactory) -> &Arc<ListenerRegistry> {
        factory.dispatcher().registry()
    }

    /// Original that records its invocation and echoes its first argument.
    fn recording_original(log: &Log, calls: &Arc<AtomicUsize>) -> Operation {
        let log = Arc::clone(log);
        let calls = Arc::clone(calls);
        Operation::new(move |args: Vec<Value>| {
            let log = Arc::clone(&log);
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                log.lock().push("original".to_string());
                Ok(args.into_iter().next().unwrap_or(Value::Null))
            }
        })
    }

    #[tokio::test]
    async fn no_listeners_is_transparent() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let wrapped = factory.wrap("accept_quest", recording_original(&log, &calls));
        let result = wrapped.call(vec![Value::from("q1")]).await.unwrap();

        assert_eq!(result, Value::from("q1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(wrapped.is_patched());
    }

    #[tokio::test]
    async fn unresolved_name_bypasses_listeners() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let notified = Arc::new(AtomicUsize::new(0));
        for op in OperationId::ALL {
            let notified = Arc::clone(&notified);
            registry(&factory).on_before(op, move |_event, _args| {
                notified.fetch_add(1, Ordering::SeqCst);
                Ok(CancelableEventArgs::CANCEL)
            });
        }

        let wrapped = factory.wrap("get_quest_log", recording_original(&log, &calls));
        let result = wrapped.call(vec![Value::from(3)]).await.unwrap();

        assert_eq!(result, Value::from(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(wrapped.patch_record().unwrap().operation(), None);
    }

    #[tokio::test]
    async fn before_original_after_in_order() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let pre_log = Arc::clone(&log);
        registry(&factory).on_before(OperationId::AcceptQuest, move |event, args| {
            pre_log.lock().push(format!("pre:{}", args.len()));
            Ok(*event)
        });
        let post_log = Arc::clone(&log);
        registry(&factory).on_after(OperationId::AcceptQuest, move |result| {
            post_log.lock().push(format!("post:{result}"));
            Ok(())
        });

        let wrapped = factory.wrap("accept_quest", recording_original(&log, &calls));
        let result = wrapped.call(vec![Value::from(5)]).await.unwrap();

        assert_eq!(result, Value::from(5));
        assert_eq!(*log.lock(), vec!["pre:1", "original", "post:5"]);
    }

    #[tokio::test]
    async fn canceled_call_skips_original_and_post() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        registry(&factory).on_before(OperationId::FailQuest, |_event, _args| {
            Ok(CancelableEventArgs::CANCEL)
        });
        let post_log = Arc::clone(&log);
        registry(&factory).on_after(OperationId::FailQuest, move |_result| {
            post_log.lock().push("post".to_string());
            Ok(())
        });

        let wrapped = factory.wrap("fail_quest", recording_original(&log, &calls));
        let result = wrapped.call(vec![Value::from(1)]).await.unwrap();

        assert_eq!(result, Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn after_waits_for_slow_original() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let log: Log = Arc::default();

        let post_log = Arc::clone(&log);
        registry(&factory).on_after(OperationId::HandoverQuest, move |_result| {
            post_log.lock().push("post".to_string());
            Ok(())
        });

        let original_log = Arc::clone(&log);
        let slow = Operation::new(move |_args| {
            let log = Arc::clone(&original_log);
            async move {
                log.lock().push("original:start".to_string());
                tokio::time::sleep(Duration::from_secs(5)).await;
                log.lock().push("original:end".to_string());
                Ok(Value::Bool(true))
            }
        });

        let wrapped = factory.wrap("handover_quest", slow);
        wrapped.call(Vec::new()).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["original:start", "original:end", "post"]
        );
    }

    #[tokio::test]
    async fn failing_original_skips_post_listeners() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let posts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&posts);
        registry(&factory).on_after(OperationId::CompleteQuest, move |_result| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let failing = Operation::new(|_args| async {
            Err(OperationError::Internal(anyhow::anyhow!("quest not started")))
        });
        let wrapped = factory.wrap("complete_quest", failing);
        let err = wrapped.call(Vec::new()).await.unwrap_err();

        assert!(matches!(err, OperationError::Internal(_)));
        assert_eq!(posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pre_listener_error_fails_the_call_without_running_original() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        registry(&factory).on_before(OperationId::AcceptQuest, |_event, _args| {
            anyhow::bail!("listener crashed")
        });

        let wrapped = factory.wrap("accept_quest", recording_original(&log, &calls));
        let err = wrapped.call(Vec::new()).await.unwrap_err();

        assert!(matches!(
            err,
            OperationError::Listener(ListenerError::Failed {
                phase: ListenerPhase::Pre,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn isolate_policy_returns_result_despite_post_failure() {
        let factory = factory(ListenerFailurePolicy::Isolate);
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        registry(&factory).on_after(OperationId::AcceptQuest, |_result| {
            anyhow::bail!("post listener crashed")
        });

        let wrapped = factory.wrap("accept_quest", recording_original(&log, &calls));
        let result = wrapped.call(vec![Value::from("kept")]).await.unwrap();

        assert_eq!(result, Value::from("kept"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listeners_registered_after_wrapping_are_notified() {
        let factory = factory(ListenerFailurePolicy::Propagate);
        let log: Log = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let wrapped = factory.wrap("accept_quest", recording_original(&log, &calls));

        registry(&factory).on_before(OperationId::AcceptQuest, |_event, _args| {
            Ok(CancelableEventArgs::CANCEL)
        });
        wrapped.call(Vec::new()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
