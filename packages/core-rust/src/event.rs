//! Cancelable event arguments threaded through pre-call listeners.

use serde::{Deserialize, Serialize};

/// Verdict carried through the pre-listeners of one call.
///
/// Each listener receives the running aggregate and returns its own vote.
/// Votes are combined with [`merge`](Self::merge), a logical OR, so once any
/// listener asks for cancellation the call stays canceled regardless of what
/// the other listeners return or the order they run in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CancelableEventArgs {
    pub cancel: bool,
}

impl CancelableEventArgs {
    /// Let the call proceed.
    pub const PROCEED: Self = Self { cancel: false };

    /// Suppress the original operation.
    pub const CANCEL: Self = Self { cancel: true };

    /// OR-combines two verdicts.
    #[must_use]
    pub const fn merge(self, vote: Self) -> Self {
        Self {
            cancel: self.cancel || vote.cancel,
        }
    }

    /// Reduces a sequence of votes onto `seed` with [`merge`](Self::merge).
    #[must_use]
    pub fn fold<I>(seed: Self, votes: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        votes.into_iter().fold(seed, Self::merge)
    }
}
