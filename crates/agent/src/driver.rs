//! Conversation driver: round-robin turns across agents.
//!
//! The driver carries each reply forward as the next agent's prompt. After
//! every turn it hands the reply to the registered hooks (export, code
//! extraction, ...); a hook may contribute a note that is appended to the
//! carried message, but hook failures never stop the loop.

use async_trait::async_trait;
use parley_core::agent::ChatAgent;
use parley_core::error::AgentError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// A failure inside a turn hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("{0}")]
    Other(String),
}

/// One completed turn, as seen by hooks.
pub struct TurnRecord<'a> {
    /// 1-based turn number within this run.
    pub turn: usize,
    pub agent: &'a str,
    pub reply: &'a str,
    /// Every participant, in round-robin order.
    pub agents: &'a [&'a dyn ChatAgent],
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum StopReason {
    TurnLimit,
    Failed(AgentError),
}

/// Result of a driver run.
#[derive(Debug)]
pub struct RunOutcome {
    pub turns_completed: usize,
    pub stop: StopReason,
    /// The message that would have been sent next.
    pub last_message: String,
}

impl RunOutcome {
    pub fn failure(&self) -> Option<&AgentError> {
        match &self.stop {
            StopReason::Failed(e) => Some(e),
            StopReason::TurnLimit => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.stop, StopReason::TurnLimit)
    }
}

/// External collaborator invoked between turns.
#[async_trait]
pub trait TurnHook: Send + Sync {
    fn name(&self) -> &str;

    /// Called after every successful turn. `Ok(Some(note))` appends the
    /// note to the message carried to the next agent.
    async fn after_turn(&self, turn: &TurnRecord<'_>) -> Result<Option<String>, HookError>;

    /// Called once when the loop ends, successfully or not.
    async fn on_finish(
        &self,
        _agents: &[&dyn ChatAgent],
        _outcome: &RunOutcome,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

pub struct ConversationDriver {
    agents: Vec<Box<dyn ChatAgent>>,
    hooks: Vec<Box<dyn TurnHook>>,
    max_turns: usize,
    delay: Duration,
}

impl ConversationDriver {
    pub fn new(agents: Vec<Box<dyn ChatAgent>>, max_turns: usize) -> Self {
        Self {
            agents,
            hooks: Vec::new(),
            max_turns,
            delay: Duration::ZERO,
        }
    }

    /// Pause between turns.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn TurnHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn agents(&self) -> &[Box<dyn ChatAgent>] {
        &self.agents
    }

    /// Run up to `max_turns` turns starting with `opening`.
    ///
    /// Stops at the first failed turn; every earlier turn is already
    /// persisted by its agent.
    pub async fn run(&mut self, opening: impl Into<String>) -> RunOutcome {
        let mut message = opening.into();
        let mut completed = 0;
        let mut stop = StopReason::TurnLimit;

        if self.agents.is_empty() {
            warn!("No agents configured; nothing to do");
        } else {
            for turn in 0..self.max_turns {
                let index = turn % self.agents.len();
                let agent = &mut self.agents[index];
                let name = agent.name().to_string();

                info!(turn = turn + 1, max_turns = self.max_turns, agent = %name, "Turn started");

                let reply = match agent.send(&message).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!(turn = turn + 1, agent = %name, error = %e, "Turn failed; stopping");
                        stop = StopReason::Failed(e);
                        break;
                    }
                };
                completed += 1;

                let notes = self.notify_turn(turn + 1, &name, &reply).await;
                message = if notes.is_empty() {
                    reply
                } else {
                    format!("{reply}\n\n{}", notes.join("\n\n"))
                };

                if turn + 1 < self.max_turns && !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }

        let outcome = RunOutcome {
            turns_completed: completed,
            stop,
            last_message: message,
        };
        self.notify_finish(&outcome).await;
        outcome
    }

    async fn notify_turn(&self, turn: usize, agent: &str, reply: &str) -> Vec<String> {
        let agents: Vec<&dyn ChatAgent> = self.agents.iter().map(|a| a.as_ref()).collect();
        let record = TurnRecord {
            turn,
            agent,
            reply,
            agents: &agents,
        };

        let mut notes = Vec::new();
        for hook in &self.hooks {
            match hook.after_turn(&record).await {
                Ok(Some(note)) => notes.push(note),
                Ok(None) => {}
                Err(e) => warn!(hook = hook.name(), turn, error = %e, "Turn hook failed"),
            }
        }
        notes
    }

    async fn notify_finish(&self, outcome: &RunOutcome) {
        let agents: Vec<&dyn ChatAgent> = self.agents.iter().map(|a| a.as_ref()).collect();
        for hook in &self.hooks {
            if let Err(e) = hook.on_finish(&agents, outcome).await {
                warn!(hook = hook.name(), error = %e, "Finish hook failed");
            }
        }
    }
}
