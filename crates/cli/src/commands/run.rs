//! `parley run`: hold one conversation run.

use parley_config::AppConfig;
use parley_history::FileStateStore;
use parley_providers::build_provider;
use std::path::Path;
use std::sync::Arc;

use crate::session::{self, RunContext, RunOverrides};

pub async fn run(config_path: &Path, overrides: RunOverrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let missing = config.missing_api_keys();
    if !missing.is_empty() {
        println!("⚠️  Missing API keys:");
        for agent in &missing {
            println!("    {} needs {}", agent.name, agent.provider.api_key_env());
        }
        return Err("set the variables above (or api_key in the config) and try again".into());
    }

    let store = Arc::new(FileStateStore::new(&config.storage.history_dir));
    let resolution = session::resolve_conversation(
        store.as_ref(),
        overrides.conversation_id.as_deref(),
        overrides.new,
    )
    .await?;
    let ctx = RunContext::new(&config, resolution, &overrides);

    println!("🗣️  Parley");
    println!("==================");
    println!(
        "  Conversation: {} ({})",
        ctx.conversation_id,
        if ctx.resumed { "resumed" } else { "new" }
    );
    println!(
        "  Agents:       {}",
        config
            .agents
            .iter()
            .map(|a| format!("{} ({})", a.name, a.model))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Turns:        {}", ctx.max_turns);
    println!();

    let agents = session::open_agents(&config, &ctx, store, build_provider).await?;
    let (outcome, report) = session::run_session(&config, &ctx, agents).await;
    report.print();

    match outcome.failure() {
        Some(e) => Err(format!("conversation stopped after {} turns: {e}", outcome.turns_completed).into()),
        None => Ok(()),
    }
}
