//! Listener registry: ordered pre/post bindings keyed by operation.
//!
//! Each operation owns an insertion-ordered list of bindings. Notification
//! copies the list (a vector of `Arc`s) out of its map shard before any
//! callback runs, so listeners may register or remove bindings while being
//! notified. Such changes take effect on the next call.

use std::sync::Arc;

use dashmap::DashMap;

use crate::event::CancelableEventArgs;
use crate::listener::{ListenerError, ListenerPhase, PostBinding, PreBinding};
use crate::operation::OperationId;
use crate::types::Value;

/// Registry of pre- and post-call bindings.
///
/// Bindings are compared by identity (`Arc::ptr_eq`), never by value: two
/// bindings wrapping the same listener for the same operation are distinct
/// registrations.
#[derive(Default)]
pub struct ListenerRegistry {
    pre: DashMap<OperationId, Vec<Arc<PreBinding>>>,
    post: DashMap<OperationId, Vec<Arc<PostBinding>>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Registration ---

    /// Appends a pre-binding after every binding already registered for its
    /// operation.
    pub fn register_pre(&self, binding: Arc<PreBinding>) {
        tracing::debug!(operation = %binding.operation(), "registering pre-listener");
        self.pre.entry(binding.operation()).or_default().push(binding);
    }

    /// Removes `binding` by identity. Returns `false` if it was not registered.
    pub fn remove_pre(&self, binding: &Arc<PreBinding>) -> bool {
        let Some(mut bindings) = self.pre.get_mut(&binding.operation()) else {
            return false;
        };
        let before = bindings.len();
        bindings.retain(|registered| !Arc::ptr_eq(registered, binding));
        before != bindings.len()
    }

    /// Appends a post-binding after every binding already registered for its
    /// operation.
    pub fn register_post(&self, binding: Arc<PostBinding>) {
        tracing::debug!(operation = %binding.operation(), "registering post-listener");
        self.post.entry(binding.operation()).or_default().push(binding);
    }

    /// Removes `binding` by identity. Returns `false` if it was not registered.
    pub fn remove_post(&self, binding: &Arc<PostBinding>) -> bool {
        let Some(mut bindings) = self.post.get_mut(&binding.operation()) else {
            return false;
        };
        let before = bindings.len();
        bindings.retain(|registered| !Arc::ptr_eq(registered, binding));
        before != bindings.len()
    }

    /// Binds `f` as a pre-listener for `operation` and returns the binding
    /// handle needed to remove it.
    pub fn on_before<F>(&self, operation: OperationId, f: F) -> Arc<PreBinding>
    where
        F: Fn(&CancelableEventArgs, &[Value]) -> anyhow::Result<CancelableEventArgs>
            + Send
            + Sync
            + 'static,
    {
        let binding = PreBinding::from_fn(operation, f);
        self.register_pre(Arc::clone(&binding));
        binding
    }

    /// Binds `f` as a post-listener for `operation` and returns the binding
    /// handle needed to remove it.
    pub fn on_after<F>(&self, operation: OperationId, f: F) -> Arc<PostBinding>
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let binding = PostBinding::from_fn(operation, f);
        self.register_post(Arc::clone(&binding));
        binding
    }

    // --- Queries ---

    /// Number of pre-bindings registered for `operation`.
    #[must_use]
    pub fn pre_len(&self, operation: OperationId) -> usize {
        self.pre.get(&operation).map_or(0, |bindings| bindings.len())
    }

    /// Number of post-bindings registered for `operation`.
    #[must_use]
    pub fn post_len(&self, operation: OperationId) -> usize {
        self.post.get(&operation).map_or(0, |bindings| bindings.len())
    }

    /// Pre-bindings for `operation` in registration order.
    #[must_use]
    pub fn pre_bindings(&self, operation: OperationId) -> Vec<Arc<PreBinding>> {
        self.pre
            .get(&operation)
            .map(|bindings| bindings.clone())
            .unwrap_or_default()
    }

    /// Post-bindings for `operation` in registration order.
    #[must_use]
    pub fn post_bindings(&self, operation: OperationId) -> Vec<Arc<PostBinding>> {
        self.post
            .get(&operation)
            .map(|bindings| bindings.clone())
            .unwrap_or_default()
    }

    // --- Notification ---

    /// Notifies every pre-binding of `operation`, in registration order.
    ///
    /// The running verdict starts at `seed`; each listener sees it and its
    /// vote is OR-merged into it. Every listener runs even after one has
    /// voted to cancel.
    ///
    /// # Errors
    ///
    /// The first listener error stops the fold and is returned; listeners
    /// after it are not invoked.
    pub fn notify_pre(
        &self,
        operation: OperationId,
        seed: CancelableEventArgs,
        args: &[Value],
    ) -> Result<CancelableEventArgs, ListenerError> {
        self.pre_bindings(operation)
            .iter()
            .try_fold(seed, |verdict, binding| {
                let vote = binding
                    .listener()
                    .on(&verdict, args)
                    .map_err(|e| ListenerError::failed(operation, ListenerPhase::Pre, e))?;
                Ok(verdict.merge(vote))
            })
    }

    /// Like [`notify_pre`](Self::notify_pre), but a failing listener does not
    /// stop the fold: it contributes no vote and its error is collected.
    #[must_use]
    pub fn notify_pre_isolated(
        &self,
        operation: OperationId,
        seed: CancelableEventArgs,
        args: &[Value],
    ) -> (CancelableEventArgs, Vec<ListenerError>) {
        let mut failures = Vec::new();
        let verdict = self
            .pre_bindings(operation)
            .iter()
            .fold(seed, |verdict, binding| {
                match binding.listener().on(&verdict, args) {
                    Ok(vote) => verdict.merge(vote),
                    Err(e) => {
                        failures.push(ListenerError::failed(operation, ListenerPhase::Pre, e));
                        verdict
                    }
                }
            });
        (verdict, failures)
    }

    /// Notifies every post-binding of `operation` with `result`, in
    /// registration order.
    ///
    /// # Errors
    ///
    /// The first listener error is returned; listeners after it are not
    /// invoked.
    pub fn notify_post(&self, operation: OperationId, result: &Value) -> Result<(), ListenerError> {
        self.post_bindings(operation).iter().try_for_each(|binding| {
            binding
                .listener()
                .on(result)
                .map_err(|e| ListenerError::failed(operation, ListenerPhase::Post, e))
        })
    }

    /// Like [`notify_post`](Self::notify_post), but every listener runs and
    /// failures are collected.
    #[must_use]
    pub fn notify_post_isolated(
        &self,
        operation: OperationId,
        result: &Value,
    ) -> Vec<ListenerError> {
        self.post_bindings(operation)
            .iter()
            .filter_map(|binding| binding.listener().on(result).err())
            .map(|e| ListenerError::failed(operation, ListenerPhase::Post, e))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
