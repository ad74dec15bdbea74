//! Listener traits, bindings and listener failure types.
//!
//! A binding ties one callback to one [`OperationId`]. Bindings are handed to
//! the registry as `Arc`s and the `Arc` itself is the binding's identity: the
//! same `Arc` must be passed back to remove it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::CancelableEventArgs;
use crate::operation::OperationId;
use crate::types::Value;

// ---------------------------------------------------------------------------
// Listener traits
// ---------------------------------------------------------------------------

/// Observer notified before an operation runs. May veto the call.
///
/// Used as `Arc<dyn PreListener>`.
pub trait PreListener: Send + Sync {
    /// Receives the verdict aggregated so far and the call's arguments, and
    /// returns this listener's vote. Returning `cancel: true` suppresses the
    /// original operation; it never suppresses the remaining listeners.
    ///
    /// # Errors
    ///
    /// Any error is reported as a [`ListenerError::Failed`] for the pre phase.
    fn on(
        &self,
        event: &CancelableEventArgs,
        args: &[Value],
    ) -> anyhow::Result<CancelableEventArgs>;
}

/// Observer notified with the result after an operation has completed.
///
/// Used as `Arc<dyn PostListener>`.
pub trait PostListener: Send + Sync {
    /// # Errors
    ///
    /// Any error is reported as a [`ListenerError::Failed`] for the post phase.
    fn on(&self, result: &Value) -> anyhow::Result<()>;
}

/// Adapts a closure into a [`PreListener`]; built by [`PreBinding::from_fn`].
struct PreFn<F>(F);

impl<F> PreListener for PreFn<F>
where
    F: Fn(&CancelableEventArgs, &[Value]) -> anyhow::Result<CancelableEventArgs> + Send + Sync,
{
    fn on(
        &self,
        event: &CancelableEventArgs,
        args: &[Value],
    ) -> anyhow::Result<CancelableEventArgs> {
        (self.0)(event, args)
    }
}

/// Adapts a closure into a [`PostListener`]; built by [`PostBinding::from_fn`].
struct PostFn<F>(F);

impl<F> PostListener for PostFn<F>
where
    F: Fn(&Value) -> anyhow::Result<()> + Send + Sync,
{
    fn on(&self, result: &Value) -> anyhow::Result<()> {
        (self.0)(result)
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// A pre-listener bound to one operation.
pub struct PreBinding {
    operation: OperationId,
    listener: Arc<dyn PreListener>,
}

impl PreBinding {
    #[must_use]
    pub fn new(operation: OperationId, listener: Arc<dyn PreListener>) -> Arc<Self> {
        Arc::new(Self {
            operation,
            listener,
        })
    }

    /// Binds a closure as a pre-listener.
    #[must_use]
    pub fn from_fn<F>(operation: OperationId, f: F) -> Arc<Self>
    where
        F: Fn(&CancelableEventArgs, &[Value]) -> anyhow::Result<CancelableEventArgs>
            + Send
            + Sync
            + 'static,
    {
        Self::new(operation, Arc::new(PreFn(f)))
    }

    #[must_use]
    pub fn operation(&self) -> OperationId {
        self.operation
    }

    #[must_use]
    pub fn listener(&self) -> &Arc<dyn PreListener> {
        &self.listener
    }
}

impl fmt::Debug for PreBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreBinding")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// A post-listener bound to one operation.
pub struct PostBinding {
    operation: OperationId,
    listener: Arc<dyn PostListener>,
}

impl PostBinding {
    #[must_use]
    pub fn new(operation: OperationId, listener: Arc<dyn PostListener>) -> Arc<Self> {
        Arc::new(Self {
            operation,
            listener,
        })
    }

    /// Binds a closure as a post-listener.
    #[must_use]
    pub fn from_fn<F>(operation: OperationId, f: F) -> Arc<Self>
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(operation, Arc::new(PostFn(f)))
    }

    #[must_use]
    pub fn operation(&self) -> OperationId {
        self.operation
    }

    #[must_use]
    pub fn listener(&self) -> &Arc<dyn PostListener> {
        &self.listener
    }
}

impl fmt::Debug for PostBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostBinding")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Notification phase a listener belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerPhase {
    Pre,
    Post,
}

impl fmt::Display for ListenerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerPhase::Pre => f.write_str("pre"),
            ListenerPhase::Post => f.write_str("post"),
        }
    }
}

/// How the dispatcher reacts to a listener returning an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerFailurePolicy {
    /// The first failure aborts the rest of its phase and fails the call.
    #[default]
    Propagate,
    /// Every listener in the phase runs; failures are logged and collected,
    /// and the call continues as if the failing listeners had not voted.
    Isolate,
}

/// Errors raised while notifying listeners.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("{phase}-listener for {operation} failed: {source}")]
    Failed {
        operation: OperationId,
        phase: ListenerPhase,
        #[source]
        source: anyhow::Error,
    },
    #[error("{} {phase}-listener(s) for {operation} failed", .failures.len())]
    Aggregate {
        operation: OperationId,
        phase: ListenerPhase,
        failures: Vec<ListenerError>,
    },
}

impl ListenerError {
    #[must_use]
    pub fn failed(operation: OperationId, phase: ListenerPhase, source: anyhow::Error) -> Self {
        ListenerError::Failed {
            operation,
            phase,
            source,
        }
    }

    #[must_use]
    pub fn operation(&self) -> OperationId {
        match self {
            ListenerError::Failed { operation, .. }
            | ListenerError::Aggregate { operation, .. } => *operation,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ListenerPhase {
        match self {
            ListenerError::Failed { phase, .. } | ListenerError::Aggregate { phase, .. } => *phase,
        }
    }
}
