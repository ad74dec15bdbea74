//! Quest log records and the typed views of controller arguments.
//!
//! Every quest operation takes its arguments as a positional list whose first
//! element is the session id. The views below deserialize that list directly,
//! so listeners and the controller read the same shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use quest_events_core::Value;

use crate::service::OperationError;

// ---------------------------------------------------------------------------
// Quest log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Started,
    Completed,
    Failed,
}

impl QuestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestStatus::Started => "started",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
        }
    }
}

/// One entry in a session's quest log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestRecord {
    pub quest_id: String,
    pub status: QuestStatus,
    pub repeatable: bool,
    /// Item ids handed over towards the quest's conditions.
    #[serde(default)]
    pub handed_over: Vec<String>,
}

impl QuestRecord {
    #[must_use]
    pub fn started(quest_id: &str, repeatable: bool) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            status: QuestStatus::Started,
            repeatable,
            handed_over: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptQuestRequest {
    pub quest_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteQuestRequest {
    pub quest_id: String,
    #[serde(default)]
    pub remove_excess_items: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverQuestRequest {
    pub quest_id: String,
    pub items: Vec<String>,
}

/// Request naming a single quest, used by `fail_quest` and
/// `reset_repeatable_quest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestRequest {
    pub quest_id: String,
}

// ---------------------------------------------------------------------------
// Event views
// ---------------------------------------------------------------------------

/// Arguments of `accept_quest` and `accept_repeatable_quest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestAcceptEvent {
    pub session_id: String,
    pub request: AcceptQuestRequest,
}

impl QuestAcceptEvent {
    /// Reads the event from a call's argument list.
    ///
    /// # Errors
    ///
    /// Fails if the list is not `[session_id, request]`.
    pub fn from_args(args: &[Value]) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Array(args.to_vec()))
    }

    /// The argument list a call with this event carries.
    #[must_use]
    pub fn to_args(&self) -> Vec<Value> {
        vec![
            Value::from(self.session_id.as_str()),
            serde_json::json!({ "questId": self.request.quest_id }),
        ]
    }
}

/// Arguments of `complete_quest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestCompleteEvent {
    pub session_id: String,
    pub request: CompleteQuestRequest,
}

impl QuestCompleteEvent {
    /// # Errors
    ///
    /// Fails if the list is not `[session_id, request]`.
    pub fn from_args(args: &[Value]) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Array(args.to_vec()))
    }

    #[must_use]
    pub fn completed_quest_id(&self) -> &str {
        &self.request.quest_id
    }

    #[must_use]
    pub fn to_args(&self) -> Vec<Value> {
        vec![
            Value::from(self.session_id.as_str()),
            serde_json::json!({
                "questId": self.request.quest_id,
                "removeExcessItems": self.request.remove_excess_items,
            }),
        ]
    }
}

/// Deserializes a positional argument list into `T` for `operation`.
pub(crate) fn parse_args<T: DeserializeOwned>(
    operation: &str,
    args: Vec<Value>,
) -> Result<T, OperationError> {
    serde_json::from_value(Value::Array(args))
        .map_err(|e| OperationError::invalid_arguments(operation, e))
}
