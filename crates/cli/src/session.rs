//! Run orchestration: which conversation to continue, run-scoped settings,
//! and assembling agents and hooks for the driver.

use chrono::{DateTime, Utc};
use parley_agent::{AgentOptions, ConversationAgent, ConversationDriver, RunOutcome, TurnHook};
use parley_config::{AgentConfig, AppConfig};
use parley_core::agent::ChatAgent;
use parley_core::error::{AgentError, ProviderError, StoreError};
use parley_core::message::ConversationId;
use parley_core::provider::Provider;
use parley_core::state::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::hooks::{CodeExtractor, MarkdownExporter};
use crate::report::RunReport;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(
        "saved states belong to several conversations ({}); pass --conversation-id <id> or --new",
        .0.join(", ")
    )]
    Ambiguous(Vec<String>),

    #[error("{agent}: {source}")]
    Provider {
        agent: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub turns: Option<usize>,
    pub conversation_id: Option<String>,
    pub topic: Option<String>,
    pub new: bool,
    pub no_export: bool,
}

/// One persisted agent state, as listed by `parley history`.
#[derive(Debug, Clone)]
pub struct SavedAgent {
    pub slug: String,
    pub conversation_id: ConversationId,
    pub message_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Every readable saved state. Unreadable files are skipped with a warning.
pub async fn saved_agents(store: &dyn StateStore) -> Result<Vec<SavedAgent>, StoreError> {
    let mut saved = Vec::new();
    for slug in store.list().await? {
        match store.load(&slug).await {
            Ok(Some(state)) => saved.push(SavedAgent {
                message_count: state.message_count(),
                conversation_id: state.conversation_id,
                last_updated: state.last_updated,
                slug,
            }),
            Ok(None) => {}
            Err(e) => warn!(agent = %slug, error = %e, "Skipping unreadable state"),
        }
    }
    Ok(saved)
}

/// Which conversation a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    New(ConversationId),
    Resume(ConversationId),
}

impl Resolution {
    pub fn conversation_id(&self) -> &ConversationId {
        match self {
            Self::New(id) | Self::Resume(id) => id,
        }
    }

    pub fn is_resume(&self) -> bool {
        matches!(self, Self::Resume(_))
    }
}

/// Pick the conversation for this run.
///
/// An explicit id wins; otherwise a single id shared by every saved state
/// is continued, several ids are an error, and no state means a new run.
pub async fn resolve_conversation(
    store: &dyn StateStore,
    explicit: Option<&str>,
    force_new: bool,
) -> Result<Resolution, SessionError> {
    if force_new && explicit.is_none() {
        return Ok(Resolution::New(ConversationId::new()));
    }

    let saved = saved_agents(store).await?;

    if let Some(id) = explicit {
        let id = ConversationId::from(id);
        let known = saved.iter().any(|s| s.conversation_id == id);
        return Ok(if known && !force_new {
            Resolution::Resume(id)
        } else {
            Resolution::New(id)
        });
    }

    let mut ids: Vec<String> = saved
        .iter()
        .map(|s| s.conversation_id.to_string())
        .collect();
    ids.sort();
    ids.dedup();

    if ids.len() > 1 {
        return Err(SessionError::Ambiguous(ids));
    }
    Ok(match ids.pop() {
        Some(only) => Resolution::Resume(ConversationId(only)),
        None => Resolution::New(ConversationId::new()),
    })
}

/// Settings that hold for this run only. The loaded `AppConfig` is never
/// modified; command-line overrides land here.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub conversation_id: ConversationId,
    pub resumed: bool,
    pub opening: String,
    pub max_turns: usize,
    pub delay: Duration,
    pub export_enabled: bool,
    pub code_extraction_enabled: bool,
}

impl RunContext {
    pub fn new(config: &AppConfig, resolution: Resolution, overrides: &RunOverrides) -> Self {
        let resumed = resolution.is_resume();
        let default_opening = if resumed {
            &config.continuation_prompt
        } else {
            &config.initial_topic
        };
        Self {
            conversation_id: resolution.conversation_id().clone(),
            resumed,
            opening: overrides
                .topic
                .clone()
                .unwrap_or_else(|| default_opening.clone()),
            max_turns: overrides.turns.unwrap_or(config.max_turns as usize),
            delay: Duration::from_millis(config.delay_between_messages_ms),
            export_enabled: config.export.enabled && !overrides.no_export,
            code_extraction_enabled: config.code_extraction.enabled,
        }
    }
}

/// Open every configured agent, in config order, against `store`.
pub async fn open_agents<F>(
    config: &AppConfig,
    ctx: &RunContext,
    store: Arc<dyn StateStore>,
    provider_for: F,
) -> Result<Vec<Box<dyn ChatAgent>>, SessionError>
where
    F: Fn(&AgentConfig) -> Result<Arc<dyn Provider>, ProviderError>,
{
    let options = AgentOptions::from_config(config);
    let mut agents: Vec<Box<dyn ChatAgent>> = Vec::with_capacity(config.agents.len());

    for spec in &config.agents {
        let provider = provider_for(spec).map_err(|source| SessionError::Provider {
            agent: spec.name.clone(),
            source,
        })?;
        let agent = ConversationAgent::open(
            spec,
            provider,
            store.clone(),
            ctx.conversation_id.clone(),
            options.clone(),
        )
        .await?;
        info!(
            agent = %spec.name,
            provider = spec.provider.as_str(),
            model = %spec.model,
            messages = agent.message_count(),
            "Agent ready"
        );
        agents.push(Box::new(agent));
    }
    Ok(agents)
}

/// The hooks enabled for this run.
pub fn hooks(config: &AppConfig, ctx: &RunContext) -> Vec<Box<dyn TurnHook>> {
    let mut hooks: Vec<Box<dyn TurnHook>> = Vec::new();
    if ctx.code_extraction_enabled {
        hooks.push(Box::new(CodeExtractor::new(
            &config.storage.code_dir,
            ctx.conversation_id.clone(),
        )));
    }
    if ctx.export_enabled {
        let mut exporter = MarkdownExporter::new(
            &config.storage.export_dir,
            ctx.conversation_id.clone(),
            config.export.every_turns as usize,
        )
        .with_topic(&config.initial_topic);
        if ctx.code_extraction_enabled {
            exporter = exporter.with_code_dir(&config.storage.code_dir);
        }
        hooks.push(Box::new(exporter));
    }
    hooks
}

/// Drive the conversation to completion and summarize it.
pub async fn run_session(
    config: &AppConfig,
    ctx: &RunContext,
    agents: Vec<Box<dyn ChatAgent>>,
) -> (RunOutcome, RunReport) {
    let mut driver = ConversationDriver::new(agents, ctx.max_turns).with_delay(ctx.delay);
    for hook in hooks(config, ctx) {
        driver = driver.with_hook(hook);
    }

    info!(
        conversation = %ctx.conversation_id,
        resumed = ctx.resumed,
        max_turns = ctx.max_turns,
        "Starting conversation"
    );
    let outcome = driver.run(ctx.opening.clone()).await;
    let report = RunReport::new(&ctx.conversation_id, driver.agents(), &outcome);
    (outcome, report)
}
