//! In-memory quest controller used as the interception target.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use quest_events_core::{OperationId, Value};

use super::model::{
    parse_args, HandoverQuestRequest, QuestAcceptEvent, QuestCompleteEvent, QuestRecord,
    QuestRequest, QuestStatus,
};
use crate::service::{Operation, OperationError, TargetService};

/// Name the controller registers under in the service locator.
pub const SERVICE_NAME: &str = "quest_controller";

/// Quest-state failures.
#[derive(Debug, thiserror::Error)]
pub enum QuestError {
    #[error("quest {quest_id} is not in the session's log")]
    NotInLog { quest_id: String },
    #[error("quest {quest_id} is already active")]
    AlreadyActive { quest_id: String },
    #[error("quest {quest_id} cannot go from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        quest_id: String,
        from: QuestStatus,
        to: QuestStatus,
    },
    #[error("quest {quest_id} is not repeatable")]
    NotRepeatable { quest_id: String },
}

impl From<QuestError> for OperationError {
    fn from(err: QuestError) -> Self {
        OperationError::Internal(anyhow::Error::new(err))
    }
}

type SessionLog = BTreeMap<String, QuestRecord>;

/// Keeps one quest log per session.
#[derive(Default)]
pub struct QuestController {
    sessions: RwLock<HashMap<String, SessionLog>>,
}

impl QuestController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `quest_id`. Repeatable quests may be restarted once they have
    /// completed or failed; other quests only start once.
    ///
    /// # Errors
    ///
    /// [`QuestError::AlreadyActive`] if the quest is started,
    /// [`QuestError::InvalidTransition`] if a non-repeatable quest already
    /// finished.
    pub fn accept(
        &self,
        session_id: &str,
        quest_id: &str,
        repeatable: bool,
    ) -> Result<QuestRecord, QuestError> {
        let mut sessions = self.sessions.write();
        let log = sessions.entry(session_id.to_string()).or_default();

        if let Some(existing) = log.get(quest_id) {
            if existing.status == QuestStatus::Started {
                return Err(QuestError::AlreadyActive {
                    quest_id: quest_id.to_string(),
                });
            }
            if !existing.repeatable {
                return Err(QuestError::InvalidTransition {
                    quest_id: quest_id.to_string(),
                    from: existing.status,
                    to: QuestStatus::Started,
                });
            }
        }

        let record = QuestRecord::started(quest_id, repeatable);
        log.insert(quest_id.to_string(), record.clone());
        tracing::debug!(session_id, quest_id, repeatable, "quest accepted");
        Ok(record)
    }

    /// # Errors
    ///
    /// Fails unless the quest is started.
    pub fn complete(
        &self,
        session_id: &str,
        quest_id: &str,
        remove_excess_items: bool,
    ) -> Result<QuestRecord, QuestError> {
        self.update_started(session_id, quest_id, QuestStatus::Completed, |record| {
            if remove_excess_items {
                record.handed_over.clear();
            }
        })
    }

    /// # Errors
    ///
    /// Fails unless the quest is started.
    pub fn fail(&self, session_id: &str, quest_id: &str) -> Result<QuestRecord, QuestError> {
        self.update_started(session_id, quest_id, QuestStatus::Failed, |_record| {})
    }

    /// Records `items` as handed over towards a started quest.
    ///
    /// # Errors
    ///
    /// Fails unless the quest is started.
    pub fn handover(
        &self,
        session_id: &str,
        quest_id: &str,
        items: Vec<String>,
    ) -> Result<QuestRecord, QuestError> {
        self.update_started(session_id, quest_id, QuestStatus::Started, |record| {
            record.handed_over.extend(items);
        })
    }

    /// Drops a repeatable quest from the log so it can be offered again.
    ///
    /// # Errors
    ///
    /// [`QuestError::NotInLog`] or [`QuestError::NotRepeatable`].
    pub fn reset_repeatable(
        &self,
        session_id: &str,
        quest_id: &str,
    ) -> Result<QuestRecord, QuestError> {
        let mut sessions = self.sessions.write();
        let log = sessions
            .get_mut(session_id)
            .ok_or_else(|| not_in_log(quest_id))?;
        match log.get(quest_id) {
            None => Err(not_in_log(quest_id)),
            Some(record) if !record.repeatable => Err(QuestError::NotRepeatable {
                quest_id: quest_id.to_string(),
            }),
            Some(_) => {
                tracing::debug!(session_id, quest_id, "repeatable quest reset");
                log.remove(quest_id).ok_or_else(|| not_in_log(quest_id))
            }
        }
    }

    /// Every quest in the session's log, ordered by id.
    #[must_use]
    pub fn quests(&self, session_id: &str) -> Vec<QuestRecord> {
        self.sessions
            .read()
            .get(session_id)
            .map(|log| log.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn repeatable_quests(&self, session_id: &str) -> Vec<QuestRecord> {
        self.quests(session_id)
            .into_iter()
            .filter(|record| record.repeatable)
            .collect()
    }

    /// Moves a started quest to `to` and applies `apply` to its record.
    fn update_started<F>(
        &self,
        session_id: &str,
        quest_id: &str,
        to: QuestStatus,
        apply: F,
    ) -> Result<QuestRecord, QuestError>
    where
        F: FnOnce(&mut QuestRecord),
    {
        let mut sessions = self.sessions.write();
        let record = sessions
            .get_mut(session_id)
            .and_then(|log| log.get_mut(quest_id))
            .ok_or_else(|| not_in_log(quest_id))?;

        if record.status != QuestStatus::Started {
            return Err(QuestError::InvalidTransition {
                quest_id: quest_id.to_string(),
                from: record.status,
                to,
            });
        }

        record.status = to;
        apply(record);
        tracing::debug!(session_id, quest_id, status = record.status.as_str(), "quest updated");
        Ok(record.clone())
    }

    /// Wraps a synchronous handler as an [`Operation`] bound to this
    /// controller.
    fn bind<F>(self: &Arc<Self>, handler: F) -> Operation
    where
        F: Fn(&QuestController, Vec<Value>) -> Result<Value, OperationError>
            + Send
            + Sync
            + 'static,
    {
        let this = Arc::clone(self);
        let handler = Arc::new(handler);
        Operation::new(move |args| {
            let this = Arc::clone(&this);
            let handler = Arc::clone(&handler);
            async move { handler(&this, args) }
        })
    }
}

fn not_in_log(quest_id: &str) -> QuestError {
    QuestError::NotInLog {
        quest_id: quest_id.to_string(),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, OperationError> {
    serde_json::to_value(value).map_err(|e| OperationError::Internal(e.into()))
}

// ---------------------------------------------------------------------------
// Operation table
// ---------------------------------------------------------------------------

impl TargetService for QuestController {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn describe(self: Arc<Self>) -> Vec<(&'static str, Operation)> {
        vec![
            (
                OperationId::AcceptQuest.name(),
                self.bind(|this, args| {
                    let event: QuestAcceptEvent =
                        parse_args(OperationId::AcceptQuest.name(), args)?;
                    to_value(&this.accept(&event.session_id, &event.request.quest_id, false)?)
                }),
            ),
            (
                OperationId::AcceptRepeatableQuest.name(),
                self.bind(|this, args| {
                    let event: QuestAcceptEvent =
                        parse_args(OperationId::AcceptRepeatableQuest.name(), args)?;
                    to_value(&this.accept(&event.session_id, &event.request.quest_id, true)?)
                }),
            ),
            (
                OperationId::CompleteQuest.name(),
                self.bind(|this, args| {
                    let event: QuestCompleteEvent =
                        parse_args(OperationId::CompleteQuest.name(), args)?;
                    to_value(&this.complete(
                        &event.session_id,
                        event.completed_quest_id(),
                        event.request.remove_excess_items,
                    )?)
                }),
            ),
            (
                OperationId::HandoverQuest.name(),
                self.bind(|this, args| {
                    let (session_id, request): (String, HandoverQuestRequest) =
                        parse_args(OperationId::HandoverQuest.name(), args)?;
                    to_value(&this.handover(&session_id, &request.quest_id, request.items)?)
                }),
            ),
            (
                OperationId::FailQuest.name(),
                self.bind(|this, args| {
                    let (session_id, request): (String, QuestRequest) =
                        parse_args(OperationId::FailQuest.name(), args)?;
                    to_value(&this.fail(&session_id, &request.quest_id)?)
                }),
            ),
            (
                OperationId::GetClientQuests.name(),
                self.bind(|this, args| {
                    let (session_id,): (String,) =
                        parse_args(OperationId::GetClientQuests.name(), args)?;
                    to_value(&this.quests(&session_id))
                }),
            ),
            (
                OperationId::GetRepeatableQuests.name(),
                self.bind(|this, args| {
                    let (session_id,): (String,) =
                        parse_args(OperationId::GetRepeatableQuests.name(), args)?;
                    to_value(&this.repeatable_quests(&session_id))
                }),
            ),
            (
                OperationId::ResetRepeatableQuest.name(),
                self.bind(|this, args| {
                    let (session_id, request): (String, QuestRequest) =
                        parse_args(OperationId::ResetRepeatableQuest.name(), args)?;
                    to_value(&this.reset_repeatable(&session_id, &request.quest_id)?)
                }),
            ),
            // Not interceptable: status summary keyed by quest id.
            (
                "get_quest_log",
                self.bind(|this, args| {
                    let (session_id,): (String,) = parse_args("get_quest_log", args)?;
                    let summary: BTreeMap<String, &'static str> = this
                        .quests(&session_id)
                        .into_iter()
                        .map(|record| (record.quest_id, record.status.as_str()))
                        .collect();
                    to_value(&summary)
                }),
            ),
            (
                "init",
                self.bind(|_this, _args| {
                    tracing::info!("quest controller ready");
                    Ok(Value::Null)
                }),
            ),
        ]
    }
}
