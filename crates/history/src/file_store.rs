//! File-based state store: one pretty-printed JSON document per agent.
//!
//! Each agent's `ConversationState` lives at `<dir>/<slug>.json`, where the
//! slug comes from `parley_core::agent_slug`. Files are human-inspectable and
//! can be deleted or rotated by hand; a missing file means "start fresh".
//!
//! Storage location defaults to `./conversation_history/`.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::message::ConversationState;
use parley_core::state::{StateStore, agent_slug};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A directory of JSON state files.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file for `agent`.
    pub fn path_for(&self, agent: &str) -> PathBuf {
        self.dir.join(format!("{}.json", agent_slug(agent)))
    }

    fn io_error(path: &Path, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, agent: &str) -> Result<Option<ConversationState>, StoreError> {
        let path = self.path_for(agent);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(agent, path = %path.display(), "No saved state");
                return Ok(None);
            }
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        let state: ConversationState = serde_json::from_str(&content).map_err(|e| {
            StoreError::Serialization(format!("{}: {e}", path.display()))
        })?;

        debug!(
            agent,
            conversation_id = %state.conversation_id,
            messages = state.messages.len(),
            "Loaded saved state"
        );
        Ok(Some(state))
    }

    async fn save(&self, agent: &str, state: &ConversationState) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let path = self.path_for(agent);
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write-then-rename so a crash mid-write never truncates the previous state.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| Self::io_error(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Self::io_error(&path, e))?;

        debug!(agent, path = %path.display(), messages = state.messages.len(), "Saved state");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.dir, e)),
        };

        let mut slugs = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable history entry");
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                slugs.push(stem.to_string());
            }
        }
        slugs.sort();
        Ok(slugs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::message::{ConversationId, Message};

    fn sample_state(id: &str) -> ConversationState {
        let mut messages = vec![Message::system("You are a crypto linguist")];
        for i in 0..4 {
            messages.push(Message::user(format!("prompt {i}")));
            messages.push(Message::assistant(format!("reply {i}")));
        }
        ConversationState {
            messages,
            system_prompt: "You are a crypto linguist".into(),
            conversation_id: ConversationId::from(id),
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        let state = sample_state("conv_1");

        store.save("ChatGPT", &state).await.unwrap();
        let loaded = store.load("ChatGPT").await.unwrap().unwrap();

        assert_eq!(loaded.messages, state.messages);
        assert_eq!(loaded.system_prompt, state.system_prompt);
        assert_eq!(loaded.conversation_id, state.conversation_id);
        assert_eq!(loaded.messages.len(), 9);
    }

    #[tokio::test]
    async fn file_is_keyed_by_slug() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save("Chat GPT", &sample_state("conv_1")).await.unwrap();

        assert!(dir.path().join("chat_gpt.json").exists());
        assert!(!dir.path().join("chat_gpt.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("never_created"));
        assert!(store.load("Gemini").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("claude.json"), "{ not json").unwrap();
        let store = FileStateStore::new(dir.path());

        let err = store.load("Claude").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn list_returns_sorted_slugs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save("Gemini", &sample_state("conv_1")).await.unwrap();
        store.save("Claude", &sample_state("conv_1")).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["claude", "gemini"]);
    }

    #[tokio::test]
    async fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save("Grok", &sample_state("conv_old")).await.unwrap();
        store.save("Grok", &sample_state("conv_new")).await.unwrap();

        let loaded = store.load("Grok").await.unwrap().unwrap();
        assert_eq!(loaded.conversation_id.as_str(), "conv_new");
    }
}
