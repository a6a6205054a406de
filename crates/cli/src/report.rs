//! End-of-run summary.

use parley_agent::{RunOutcome, StopReason};
use parley_core::agent::ChatAgent;
use parley_core::error::{AgentError, ProviderError};
use parley_core::message::ConversationId;

/// Suggestions printed when a run stopped on rate limits or quota.
pub const RATE_LIMIT_HINTS: &[&str] = &[
    "Reduce context.max_messages to send fewer messages per request",
    "Increase delay_between_messages_ms to space out requests",
    "Increase retry.default_delay_secs to wait longer between retries",
    "Check your API quota and billing status with the provider",
    "Wait a while before resuming the conversation",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSummary {
    pub name: String,
    /// Non-system messages in the agent's history.
    pub messages: usize,
    /// Assistant replies.
    pub replies: usize,
}

impl AgentSummary {
    pub fn of(agent: &dyn ChatAgent) -> Self {
        Self {
            name: agent.name().to_string(),
            messages: agent.message_count(),
            replies: agent.turn_count(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub conversation_id: ConversationId,
    pub agents: Vec<AgentSummary>,
    pub turns_completed: usize,
    /// Display text of the failure that ended the run, if any.
    pub failure: Option<String>,
    pub rate_limited: bool,
}

impl RunReport {
    pub fn new(
        conversation_id: &ConversationId,
        agents: &[Box<dyn ChatAgent>],
        outcome: &RunOutcome,
    ) -> Self {
        let failure = match &outcome.stop {
            StopReason::TurnLimit => None,
            StopReason::Failed(e) => Some(e),
        };
        Self {
            conversation_id: conversation_id.clone(),
            agents: agents.iter().map(|a| AgentSummary::of(a.as_ref())).collect(),
            turns_completed: outcome.turns_completed,
            failure: failure.map(ToString::to_string),
            rate_limited: failure.is_some_and(is_rate_related),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Print the summary to stdout.
    pub fn print(&self) {
        println!();
        println!("📊 Conversation {}", self.conversation_id);
        println!("==================");
        println!("  Turns completed: {}", self.turns_completed);
        for agent in &self.agents {
            println!("  {:<16} {} messages", agent.name, agent.messages);
        }

        match &self.failure {
            None => println!("\n  ✅ Run complete"),
            Some(reason) => {
                println!("\n  ❌ Stopped early: {reason}");
                if self.rate_limited {
                    println!("\n  Rate limit or quota trouble. Try:");
                    for hint in RATE_LIMIT_HINTS {
                        println!("    - {hint}");
                    }
                }
            }
        }
    }
}

/// Whether a terminal failure came from rate limiting or exhausted quota.
pub fn is_rate_related(error: &AgentError) -> bool {
    match error {
        AgentError::Provider {
            source: ProviderError::RateLimited { .. },
            ..
        } => true,
        AgentError::Provider { source, .. } => {
            let text = source.to_string().to_lowercase();
            text.contains("429") || text.contains("rate") || text.contains("quota")
        }
        AgentError::Store { .. } => false,
    }
}
