//! Callable operation handles and the errors they return.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use quest_events_core::{ListenerError, OperationId, Value};

/// Future returned by every operation.
pub type BoxedFuture = Pin<Box<dyn Future<Output = Result<Value, OperationError>> + Send>>;

/// Type-erased operation body. The receiver is captured by the closure.
pub type OperationFn = Arc<dyn Fn(Vec<Value>) -> BoxedFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A named, callable unit of behavior on a target service.
///
/// Cloning an `Operation` shares the underlying function, so clones are
/// [`ptr_eq`](Self::ptr_eq) to each other. A wrapped operation carries a
/// [`PatchRecord`] pointing back at the function it replaced.
#[derive(Clone)]
pub struct Operation {
    func: OperationFn,
    patch: Option<Arc<PatchRecord>>,
}

impl Operation {
    /// Builds an operation from an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
    {
        let func: OperationFn =
            Arc::new(move |args: Vec<Value>| -> BoxedFuture { Box::pin(f(args)) });
        Self::from_fn(func)
    }

    #[must_use]
    pub fn from_fn(func: OperationFn) -> Self {
        Self { func, patch: None }
    }

    pub(crate) fn patched(func: OperationFn, record: PatchRecord) -> Self {
        Self {
            func,
            patch: Some(Arc::new(record)),
        }
    }

    /// Invokes the operation. The argument list is moved in exactly once.
    #[must_use]
    pub fn call(&self, args: Vec<Value>) -> BoxedFuture {
        (self.func)(args)
    }

    #[must_use]
    pub fn is_patched(&self) -> bool {
        self.patch.is_some()
    }

    #[must_use]
    pub fn patch_record(&self) -> Option<&PatchRecord> {
        self.patch.as_deref()
    }

    /// Identity comparison of the underlying functions.
    #[must_use]
    pub fn ptr_eq(&self, other: &Operation) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("patch", &self.patch)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PatchRecord
// ---------------------------------------------------------------------------

/// Marker attached to an operation wrapped by the interceptor.
///
/// `operation` is `None` when the wrapped name is outside the closed set of
/// interceptable operations; such wrappers pass calls straight through.
pub struct PatchRecord {
    name: String,
    operation: Option<OperationId>,
    original: Operation,
}

impl PatchRecord {
    pub(crate) fn new(name: &str, operation: Option<OperationId>, original: Operation) -> Self {
        Self {
            name: name.to_string(),
            operation,
            original,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn operation(&self) -> Option<OperationId> {
        self.operation
    }

    /// The operation that was in place before wrapping.
    #[must_use]
    pub fn original(&self) -> &Operation {
        &self.original
    }
}

impl fmt::Debug for PatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRecord")
            .field("name", &self.name)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by operations and by intercepted calls.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },
    #[error("invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OperationError {
    #[must_use]
    pub fn invalid_arguments(operation: &str, reason: impl fmt::Display) -> Self {
        OperationError::InvalidArguments {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Operation {
        Operation::new(|args: Vec<Value>| async move { Ok(Value::Array(args)) })
    }

    #[tokio::test]
    async fn call_forwards_arguments() {
        let op = echo();
        let result = op.call(vec![Value::from(1), Value::from("two")]).await.unwrap();
        assert_eq!(result, serde_json::json!([1, "two"]));
    }

    #[test]
    fn clones_share_identity() {
        let op = echo();
        let clone = op.clone();
        assert!(op.ptr_eq(&clone));
        assert!(!op.ptr_eq(&echo()));
        assert!(!op.is_patched());
        assert!(op.patch_record().is_none());
    }

    #[test]
    fn patched_operation_remembers_original() {
        let original = echo();
        let wrapper = Operation::patched(
            Arc::new(|_args: Vec<Value>| -> BoxedFuture { Box::pin(async { Ok(Value::Null) }) }),
            PatchRecord::new("accept_quest", Some(OperationId::AcceptQuest), original.clone()),
        );

        assert!(wrapper.is_patched());
        let record = wrapper.patch_record().unwrap();
        assert_eq!(record.name(), "accept_quest");
        assert_eq!(record.operation(), Some(OperationId::AcceptQuest));
        assert!(record.original().ptr_eq(&original));
    }

    #[test]
    fn error_messages() {
        let err = OperationError::UnknownOperation {
            name: "dance".to_string(),
        };
        assert_eq!(err.to_string(), "unknown operation: dance");

        let err = OperationError::invalid_arguments("accept_quest", "missing request");
        assert_eq!(
            err.to_string(),
            "invalid arguments for accept_quest: missing request"
        );
    }
}
