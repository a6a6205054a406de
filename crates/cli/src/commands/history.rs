//! `parley history`: list saved agent states.

use parley_config::AppConfig;
use parley_history::FileStateStore;
use std::path::Path;

use crate::session::saved_agents;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_from(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let store = FileStateStore::new(&config.storage.history_dir);
    let saved = saved_agents(&store).await?;

    println!("🗂️  Saved conversations in {}", store.dir().display());
    println!("==================");
    if saved.is_empty() {
        println!("  (none) run `parley run` to start one");
        return Ok(());
    }

    for agent in &saved {
        println!(
            "  {:<16} {:<28} {:>4} messages  {}",
            agent.slug,
            agent.conversation_id,
            agent.message_count,
            agent.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    let mut ids: Vec<String> = saved.iter().map(|s| s.conversation_id.to_string()).collect();
    ids.sort();
    ids.dedup();
    if ids.len() > 1 {
        println!("\n  ⚠️  Several conversations are saved; pick one with --conversation-id or start over with --new");
    }
    Ok(())
}
