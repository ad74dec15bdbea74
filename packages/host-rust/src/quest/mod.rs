//! Demonstration host: an in-memory quest controller exposing the
//! interceptable quest operations.

pub mod controller;
pub mod model;

pub use controller::{QuestController, QuestError, SERVICE_NAME};
pub use model::{
    AcceptQuestRequest, CompleteQuestRequest, HandoverQuestRequest, QuestAcceptEvent,
    QuestCompleteEvent, QuestRecord, QuestRequest, QuestStatus,
};
