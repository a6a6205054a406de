//! Markdown export of the whole conversation, plus an `ITERATION_SUMMARY.md`
//! that later runs (or other models) can read to pick the work back up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_agent::{HookError, RunOutcome, TurnHook, TurnRecord};
use parley_core::ConversationId;
use parley_core::agent::ChatAgent;
use parley_core::message::Role;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::hooks::code::code_files;
use crate::report::AgentSummary;

const SUMMARY_FILE: &str = "ITERATION_SUMMARY.md";

/// Render every agent's replies as one markdown document.
///
/// Replies are grouped agent by agent, each agent's in history order, and
/// numbered across the whole document.
pub fn render_markdown(
    conversation_id: &ConversationId,
    agents: &[&dyn ChatAgent],
    exported_at: DateTime<Utc>,
) -> String {
    let names: Vec<&str> = agents.iter().map(|a| a.name()).collect();
    let mut md = format!(
        "# AI Conversation - {conversation_id}\n\n**Date:** {}\n**Participants:** {}\n\n---\n\n",
        exported_at.format("%Y-%m-%d %H:%M:%S UTC"),
        names.join(", ")
    );

    let mut turn = 0;
    for agent in agents {
        for message in agent.history().iter().filter(|m| m.role == Role::Assistant) {
            turn += 1;
            md.push_str(&format!(
                "## Turn {turn} - {}\n\n{}\n\n---\n\n",
                agent.name(),
                message.content
            ));
        }
    }

    md.push_str(&format!("## Summary\n\n**Total Turns:** {turn}\n"));
    for agent in agents {
        md.push_str(&format!(
            "**{} Messages:** {}\n",
            agent.name(),
            agent.turn_count()
        ));
    }

    md.push_str(
        "\n---\n\n\
         *This conversation can be referenced by AIs in future iterations.*\n\
         *To continue this work, AIs should review this document and build upon the ideas presented.*\n",
    );
    md
}

/// Render the iteration summary written next to every export.
///
/// `code` lists saved code files; `None` when extraction is off.
pub fn render_summary(
    conversation_id: &ConversationId,
    agents: &[AgentSummary],
    topic: &str,
    export_file: &str,
    code: Option<&[(String, u64)]>,
    updated_at: DateTime<Utc>,
) -> String {
    let names: Vec<&str> = agents.iter().map(|a| a.name.as_str()).collect();
    let mut md = format!(
        "# AI Conversation Iteration Summary\n\n\
         This document summarizes the ongoing AI-to-AI conversation.\n\
         AIs can reference it to understand the current state of work.\n\n---\n\n\
         ## Current Conversation: {conversation_id}\n\n\
         **Last Updated:** {}\n\
         **Participants:** {}\n\
         **Latest Export:** {export_file}\n\n\
         ## Progress Overview\n\n",
        updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        names.join(", ")
    );
    for agent in agents {
        md.push_str(&format!(
            "- **{}:** {} contributions ({} messages)\n",
            agent.name, agent.replies, agent.messages
        ));
    }

    md.push_str(&format!("\n## Key Objectives\n\nThe AIs are working on: {topic}\n\n"));

    if let Some(files) = code {
        md.push_str("## Generated Code\n\n");
        if files.is_empty() {
            md.push_str("*No code files generated yet.*\n");
        }
        for (name, size) in files {
            md.push_str(&format!("- {name} ({size} bytes)\n"));
        }
        md.push('\n');
    }

    md.push_str(
        "## How to Continue This Work\n\n\
         1. Review the latest conversation export in this directory\n\
         2. Identify key insights and proposals from previous iterations\n\
         3. Build upon existing ideas rather than starting over\n\
         4. Reference specific proposals by turn number\n\
         5. Focus on refinement and implementation details\n",
    );
    md
}

/// Turn hook writing `conversation_<id>_<timestamp>.md` and the iteration
/// summary periodically and at the end of the run.
pub struct MarkdownExporter {
    dir: PathBuf,
    conversation_id: ConversationId,
    every_turns: usize,
    topic: String,
    code_dir: Option<PathBuf>,
}

impl MarkdownExporter {
    pub fn new(dir: impl Into<PathBuf>, conversation_id: ConversationId, every_turns: usize) -> Self {
        Self {
            dir: dir.into(),
            conversation_id,
            every_turns: every_turns.max(1),
            topic: String::new(),
            code_dir: None,
        }
    }

    /// What the conversation is about, for the summary's objectives.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// List the files saved here in the summary.
    pub fn with_code_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.code_dir = Some(dir.into());
        self
    }

    /// Write the export and refresh the summary; returns the export's path.
    pub fn export_all(&self, agents: &[&dyn ChatAgent]) -> Result<PathBuf, HookError> {
        let path = self.export(agents)?;
        self.write_summary(agents, &path)?;
        Ok(path)
    }

    /// Rewrite `ITERATION_SUMMARY.md` pointing at `export`.
    pub fn write_summary(&self, agents: &[&dyn ChatAgent], export: &Path) -> Result<PathBuf, HookError> {
        let summaries: Vec<AgentSummary> = agents.iter().map(|a| AgentSummary::of(*a)).collect();
        let export_file = export
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // A missing code directory just means nothing was saved yet.
        let code = self
            .code_dir
            .as_deref()
            .map(|dir| code_files(dir).unwrap_or_default());

        let path = self.dir.join(SUMMARY_FILE);
        let summary = render_summary(
            &self.conversation_id,
            &summaries,
            &self.topic,
            &export_file,
            code.as_deref(),
            Utc::now(),
        );
        std::fs::write(&path, summary).map_err(|e| io_error(&path, e))?;
        debug!(path = %path.display(), "Iteration summary updated");
        Ok(path)
    }

    /// Write an export now; returns its path.
    pub fn export(&self, agents: &[&dyn ChatAgent]) -> Result<PathBuf, HookError> {
        let now = Utc::now();
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error(&self.dir, e))?;

        let path = self.dir.join(format!(
            "conversation_{}_{}.md",
            self.conversation_id,
            now.format("%Y-%m-%dT%H-%M-%S-%3fZ")
        ));
        std::fs::write(&path, render_markdown(&self.conversation_id, agents, now))
            .map_err(|e| io_error(&path, e))?;

        info!(path = %path.display(), "Conversation exported");
        Ok(path)
    }
}

fn io_error(path: &Path, e: std::io::Error) -> HookError {
    HookError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl TurnHook for MarkdownExporter {
    fn name(&self) -> &str {
        "markdown_export"
    }

    async fn after_turn(&self, turn: &TurnRecord<'_>) -> Result<Option<String>, HookError> {
        if turn.turn % self.every_turns == 0 {
            self.export_all(turn.agents)?;
        }
        Ok(None)
    }

    async fn on_finish(
        &self,
        agents: &[&dyn ChatAgent],
        _outcome: &RunOutcome,
    ) -> Result<(), HookError> {
        self.export_all(agents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::error::AgentError;
    use parley_core::message::Message;

    struct Fixed {
        name: &'static str,
        history: Vec<Message>,
    }

    #[async_trait]
    impl ChatAgent for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        async fn send(&mut self, _text: &str) -> Result<String, AgentError> {
            Ok(String::new())
        }
        fn history(&self) -> &[Message] {
            &self.history
        }
        async fn save_state(&self) -> Result<(), AgentError> {
            Ok(())
        }
        async fn load_state(&mut self) -> Result<bool, AgentError> {
            Ok(false)
        }
    }

    fn sample() -> (Fixed, Fixed) {
        let a = Fixed {
            name: "ChatGPT",
            history: vec![
                Message::system("persona"),
                Message::user("topic"),
                Message::assistant("first idea"),
                Message::user("more"),
                Message::assistant("second idea"),
            ],
        };
        let b = Fixed {
            name: "Claude",
            history: vec![],
        };
        (a, b)
    }

    #[test]
    fn renders_turns_and_summary() {
        let (a, b) = sample();
        let agents: Vec<&dyn ChatAgent> = vec![&a, &b];
        let md = render_markdown(&ConversationId::from("conv_1"), &agents, Utc::now());

        assert!(md.starts_with("# AI Conversation - conv_1"));
        assert!(md.contains("**Participants:** ChatGPT, Claude"));
        assert!(md.contains("## Turn 1 - ChatGPT\n\nfirst idea"));
        assert!(md.contains("## Turn 2 - ChatGPT\n\nsecond idea"));
        assert!(md.contains("**Total Turns:** 2"));
        assert!(md.contains("**Claude Messages:** 0"));
        assert!(!md.contains("persona"));
    }

    #[test]
    fn empty_histories_render() {
        let b = Fixed {
            name: "Gemini",
            history: vec![],
        };
        let agents: Vec<&dyn ChatAgent> = vec![&b];
        let md = render_markdown(&ConversationId::from("c"), &agents, Utc::now());
        assert!(md.contains("**Total Turns:** 0"));
    }

    #[test]
    fn export_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = sample();
        let agents: Vec<&dyn ChatAgent> = vec![&a, &b];
        let exporter = MarkdownExporter::new(dir.path().join("exports"), ConversationId::from("conv_9"), 5);

        let path = exporter.export(&agents).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("conversation_conv_9_"));
        assert!(name.ends_with(".md"));
        assert!(std::fs::read_to_string(path).unwrap().contains("second idea"));
    }

    #[test]
    fn export_ends_with_continuation_footer() {
        let (a, _) = sample();
        let agents: Vec<&dyn ChatAgent> = vec![&a];
        let md = render_markdown(&ConversationId::from("c"), &agents, Utc::now());
        assert!(md.ends_with(
            "*To continue this work, AIs should review this document and build upon the ideas presented.*\n"
        ));
        assert!(md.contains("\n---\n\n*This conversation can be referenced by AIs in future iterations.*\n"));
    }

    #[test]
    fn summary_lists_progress_and_objectives() {
        let agents = vec![
            AgentSummary {
                name: "ChatGPT".into(),
                messages: 4,
                replies: 2,
            },
            AgentSummary {
                name: "Claude".into(),
                messages: 0,
                replies: 0,
            },
        ];
        let md = render_summary(
            &ConversationId::from("conv_1"),
            &agents,
            "a new cipher",
            "conversation_conv_1_x.md",
            None,
            Utc::now(),
        );

        assert!(md.starts_with("# AI Conversation Iteration Summary"));
        assert!(md.contains("## Current Conversation: conv_1"));
        assert!(md.contains("**Participants:** ChatGPT, Claude"));
        assert!(md.contains("**Latest Export:** conversation_conv_1_x.md"));
        assert!(md.contains("- **ChatGPT:** 2 contributions (4 messages)"));
        assert!(md.contains("- **Claude:** 0 contributions (0 messages)"));
        assert!(md.contains("The AIs are working on: a new cipher"));
        assert!(!md.contains("## Generated Code"));
        assert!(md.contains("## How to Continue This Work"));
    }

    #[test]
    fn summary_code_section() {
        let id = ConversationId::from("c");
        let none: &[(String, u64)] = &[];
        let md = render_summary(&id, &[], "t", "e.md", Some(none), Utc::now());
        assert!(md.contains("## Generated Code\n\n*No code files generated yet.*"));

        let files = vec![("c_turn1_ChatGPT_1.py".to_string(), 42)];
        let md = render_summary(&id, &[], "t", "e.md", Some(&files), Utc::now());
        assert!(md.contains("- c_turn1_ChatGPT_1.py (42 bytes)"));
        assert!(!md.contains("No code files"));
    }

    #[test]
    fn export_all_writes_export_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let code_dir = dir.path().join("code");
        std::fs::create_dir_all(&code_dir).unwrap();
        std::fs::write(code_dir.join("conv_9_turn1_ChatGPT_1.rs"), "fn main() {}").unwrap();
        std::fs::write(code_dir.join("README.md"), "# index").unwrap();

        let (a, b) = sample();
        let agents: Vec<&dyn ChatAgent> = vec![&a, &b];
        let exporter = MarkdownExporter::new(dir.path().join("exports"), ConversationId::from("conv_9"), 5)
            .with_topic("ciphers")
            .with_code_dir(&code_dir);

        let export = exporter.export_all(&agents).unwrap();
        let export_name = export.file_name().unwrap().to_string_lossy().into_owned();
        assert!(std::fs::read_to_string(&export)
            .unwrap()
            .contains("*This conversation can be referenced by AIs in future iterations.*"));

        let summary = std::fs::read_to_string(dir.path().join("exports").join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("## Current Conversation: conv_9"));
        assert!(summary.contains(&format!("**Latest Export:** {export_name}")));
        assert!(summary.contains("- **ChatGPT:** 2 contributions (4 messages)"));
        assert!(summary.contains("The AIs are working on: ciphers"));
        assert!(summary.contains("- conv_9_turn1_ChatGPT_1.rs (12 bytes)"));
        assert!(!summary.contains("README.md"));
    }
}
