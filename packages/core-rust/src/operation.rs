//! Closed set of interceptable operations.
//!
//! Every operation the framework is willing to instrument has a variant here.
//! Names coming from configuration or from a target service's operation table
//! are resolved through [`OperationId::cast`]; anything that does not resolve
//! is left alone by the interceptor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of one interceptable operation on the quest controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationId {
    AcceptQuest,
    AcceptRepeatableQuest,
    CompleteQuest,
    HandoverQuest,
    FailQuest,
    GetClientQuests,
    GetRepeatableQuests,
    ResetRepeatableQuest,
}

impl OperationId {
    /// All members of the set, in declaration order.
    pub const ALL: [OperationId; 8] = [
        OperationId::AcceptQuest,
        OperationId::AcceptRepeatableQuest,
        OperationId::CompleteQuest,
        OperationId::HandoverQuest,
        OperationId::FailQuest,
        OperationId::GetClientQuests,
        OperationId::GetRepeatableQuests,
        OperationId::ResetRepeatableQuest,
    ];

    /// Wire name of the operation, as it appears in configuration and in
    /// operation tables.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OperationId::AcceptQuest => "accept_quest",
            OperationId::AcceptRepeatableQuest => "accept_repeatable_quest",
            OperationId::CompleteQuest => "complete_quest",
            OperationId::HandoverQuest => "handover_quest",
            OperationId::FailQuest => "fail_quest",
            OperationId::GetClientQuests => "get_client_quests",
            OperationId::GetRepeatableQuests => "get_repeatable_quests",
            OperationId::ResetRepeatableQuest => "reset_repeatable_quest",
        }
    }

    /// Resolves a raw name to an operation. Returns `None` for anything outside
    /// the closed set; never panics.
    #[must_use]
    pub fn cast(raw: &str) -> Option<OperationId> {
        Self::ALL.iter().copied().find(|op| op.name() == raw)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned by [`OperationId::from_str`] when a name is not interceptable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an interceptable operation: {name}")]
pub struct UnknownOperation {
    pub name: String,
}

impl FromStr for OperationId {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::cast(s).ok_or_else(|| UnknownOperation {
            name: s.to_string(),
        })
    }
}
