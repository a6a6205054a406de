//! `parley init`: write a starter config file.

use parley_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() {
        println!("  Config file exists: {}", config_path.display());
        return Err(format!("refusing to overwrite {}", config_path.display()).into());
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("✅ Created {}", config_path.display());

    println!("\nSet an API key for each agent before running:");
    for agent in &AppConfig::default().agents {
        println!("    {:<10} {}", agent.name, agent.provider.api_key_env());
    }
    println!("\nThen start a conversation with `parley run`.");
    Ok(())
}
