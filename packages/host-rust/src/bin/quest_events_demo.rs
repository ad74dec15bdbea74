//! Quest events demo: installs interception on an in-memory quest controller
//! and runs a short accept/complete sequence through it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quest_events::logging::{self, LogFormat};
use quest_events::quest::{
    AcceptQuestRequest, CompleteQuestRequest, QuestAcceptEvent, QuestCompleteEvent,
    QuestController, SERVICE_NAME,
};
use quest_events::{install, InterceptConfig, ServiceInstance, ServiceLocator};
use quest_events_core::{CancelableEventArgs, OperationId};
use serde_json::json;
use tracing::Instrument;

/// Runs quest controller calls through registered event listeners.
#[derive(Debug, Parser)]
#[command(name = "quest-events-demo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, value_name = "FILE", env = "QUEST_EVENTS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging (overrides the config file).
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Session id used for the demo calls.
    #[arg(long, default_value = "demo-session")]
    session: String,
}

/// Quest ids with this prefix are vetoed by the demo's pre-listener.
const LOCKED_PREFIX: &str = "locked-";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => InterceptConfig::load(path)?,
        None => InterceptConfig::default(),
    };
    config.debug |= cli.debug;

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logging::init(&config, format)?;

    let span = logging::root_span(&config);
    demo(&config, &cli.session).instrument(span).await
}

async fn demo(config: &InterceptConfig, session: &str) -> anyhow::Result<()> {
    let locator = ServiceLocator::new();
    locator.register(Arc::new(ServiceInstance::from_target(Arc::new(
        QuestController::new(),
    ))));

    let Some(api) = install(config, &locator, SERVICE_NAME)? else {
        tracing::warn!("interception disabled; calls run without listeners");
        return run_sequence(&locator, session).await;
    };

    api.on_before(OperationId::AcceptQuest, |event, args| {
        let accept = QuestAcceptEvent::from_args(args)?;
        tracing::info!(
            session = %accept.session_id,
            quest = %accept.request.quest_id,
            "about to accept quest"
        );
        if accept.request.quest_id.starts_with(LOCKED_PREFIX) {
            return Ok(event.merge(CancelableEventArgs::CANCEL));
        }
        Ok(*event)
    });
    api.on_after(OperationId::CompleteQuest, |result| {
        tracing::info!(status = "success", quest = %result["questId"], "quest completed");
        Ok(())
    });

    run_sequence(&locator, session).await
}

async fn run_sequence(locator: &ServiceLocator, session: &str) -> anyhow::Result<()> {
    let quests = locator
        .resolve(SERVICE_NAME)
        .context("quest controller is not registered")?;

    quests.call("init", Vec::new()).await?;

    let accept = |quest_id: &str| QuestAcceptEvent {
        session_id: session.to_string(),
        request: AcceptQuestRequest {
            quest_id: quest_id.to_string(),
        },
    };

    let accepted = quests
        .call(OperationId::AcceptQuest.name(), accept("q-welcome").to_args())
        .await?;
    tracing::info!(result = %accepted, "accept_quest returned");

    let vetoed = quests
        .call(
            OperationId::AcceptQuest.name(),
            accept(&format!("{LOCKED_PREFIX}vault")).to_args(),
        )
        .await?;
    tracing::info!(result = %vetoed, "accept_quest returned");

    let complete = QuestCompleteEvent {
        session_id: session.to_string(),
        request: CompleteQuestRequest {
            quest_id: "q-welcome".to_string(),
            remove_excess_items: false,
        },
    };
    quests
        .call(OperationId::CompleteQuest.name(), complete.to_args())
        .await?;

    let log = quests.call("get_quest_log", vec![json!(session)]).await?;
    println!("{}", serde_json::to_string_pretty(&log)?);
    Ok(())
}
