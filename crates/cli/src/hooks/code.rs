//! Saves fenced code blocks from each reply into the code directory.
//!
//! Filenames come from a `// name.ext`-style comment in the first three
//! lines of a block, or are generated as `<agent>_turn<n>_block<i>.<ext>`.
//! Existing files are never overwritten; a `_vN` suffix is added instead.

use async_trait::async_trait;
use parley_agent::{HookError, RunOutcome, TurnHook, TurnRecord};
use parley_core::ConversationId;
use parley_core::agent::ChatAgent;
use parley_core::state::agent_slug;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MIN_BLOCK_CHARS: usize = 10;
const MAX_VERSION: u32 = 99;
const INDEX_FILE: &str = "README.md";

/// A code block found in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
    /// Name taken from a leading comment, if any.
    pub filename: Option<String>,
}

/// Pull every fenced block of at least 10 characters out of `text`.
pub fn extract_blocks(text: &str) -> Vec<CodeBlock> {
    let Ok(fence) = Regex::new(r"(?s)```([\w+#-]*)[ \t]*\r?\n(.*?)```") else {
        return Vec::new();
    };

    fence
        .captures_iter(text)
        .filter_map(|caps| {
            let content = caps.get(2)?.as_str().trim();
            if content.chars().count() < MIN_BLOCK_CHARS {
                return None;
            }
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|l| !l.is_empty())
                .unwrap_or("txt")
                .to_string();
            Some(CodeBlock {
                filename: filename_hint(content),
                language,
                content: content.to_string(),
            })
        })
        .collect()
}

/// A filename named in a comment on one of the first three lines.
fn filename_hint(content: &str) -> Option<String> {
    let re = Regex::new(r"^(?://|#|/\*|<!--|;)\s*([\w\-\.]+\.\w+)").ok()?;
    content
        .lines()
        .take(3)
        .find_map(|line| re.captures(line.trim()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// File extension for a fence language tag.
pub fn extension_for(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "python" | "py" => "py",
        "java" => "java",
        "c" => "c",
        "cpp" | "c++" => "cpp",
        "csharp" | "cs" | "c#" => "cs",
        "go" => "go",
        "rust" | "rs" => "rs",
        "ruby" | "rb" => "rb",
        "php" => "php",
        "swift" => "swift",
        "kotlin" | "kt" => "kt",
        "scala" => "scala",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "sql" => "sql",
        "shell" | "sh" | "bash" => "sh",
        "powershell" => "ps1",
        "markdown" | "md" => "md",
        _ => "txt",
    }
}

/// First name in `name`, `name_v1`, ... `name_v99` that is not taken.
fn free_name(dir: &Path, filename: &str) -> Option<String> {
    if !dir.join(filename).exists() {
        return Some(filename.to_string());
    }
    let (base, ext) = match filename.rsplit_once('.') {
        Some((base, ext)) => (base, Some(ext)),
        None => (filename, None),
    };
    (1..=MAX_VERSION)
        .map(|v| match ext {
            Some(ext) => format!("{base}_v{v}.{ext}"),
            None => format!("{base}_v{v}"),
        })
        .find(|candidate| !dir.join(candidate).exists())
}

/// Saved code files in `dir` with their sizes, sorted by name. The index
/// file is not listed.
pub fn code_files(dir: &Path) -> std::io::Result<Vec<(String, u64)>> {
    let mut files: Vec<(String, u64)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let size = entry.metadata().ok()?.len();
            (name != INDEX_FILE).then_some((name, size))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Turn hook writing extracted code to disk.
pub struct CodeExtractor {
    dir: PathBuf,
    conversation_id: ConversationId,
}

impl CodeExtractor {
    pub fn new(dir: impl Into<PathBuf>, conversation_id: ConversationId) -> Self {
        Self {
            dir: dir.into(),
            conversation_id,
        }
    }

    fn io_error(path: &Path, e: std::io::Error) -> HookError {
        HookError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }

    /// Save the blocks in `reply`; returns the names written.
    pub fn save_blocks(&self, agent: &str, turn: usize, reply: &str) -> Result<Vec<String>, HookError> {
        let blocks = extract_blocks(reply);
        if blocks.is_empty() {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let mut saved = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            let wanted = block.filename.clone().unwrap_or_else(|| {
                format!(
                    "{}_turn{turn}_block{index}.{}",
                    agent_slug(agent),
                    extension_for(&block.language)
                )
            });
            let Some(name) = free_name(&self.dir, &wanted) else {
                warn!(file = %wanted, "Every version slot is taken; skipping block");
                continue;
            };
            let path = self.dir.join(&name);
            std::fs::write(&path, &block.content).map_err(|e| Self::io_error(&path, e))?;
            info!(
                file = %name,
                language = %block.language,
                chars = block.content.len(),
                "Saved code block"
            );
            saved.push(name);
        }
        Ok(saved)
    }

    /// Rewrite `README.md` listing every saved file.
    pub fn write_index(&self) -> Result<(), HookError> {
        let files = code_files(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let mut index = format!(
            "# Generated Code - Conversation {}\n\n**Last Updated:** {}\n\n\
             Code blocks extracted from the conversation, one file per block.\n\n---\n\n\
             ## Available Code Files\n\n",
            self.conversation_id,
            chrono::Utc::now().to_rfc3339()
        );
        if files.is_empty() {
            index.push_str("*No code files generated yet.*\n");
        } else {
            for (name, size) in &files {
                index.push_str(&format!("- **{name}** ({size} bytes)\n"));
            }
        }

        let path = self.dir.join(INDEX_FILE);
        std::fs::write(&path, index).map_err(|e| Self::io_error(&path, e))?;
        debug!(path = %path.display(), "Code index updated");
        Ok(())
    }

    fn note(&self, saved: &[String]) -> String {
        format!(
            "[Note: {} code file(s) have been saved to {}: {}. You can reference these files in your responses.]",
            saved.len(),
            self.dir.display(),
            saved.join(", ")
        )
    }
}

#[async_trait]
impl TurnHook for CodeExtractor {
    fn name(&self) -> &str {
        "code_extraction"
    }

    async fn after_turn(&self, turn: &TurnRecord<'_>) -> Result<Option<String>, HookError> {
        let saved = self.save_blocks(turn.agent, turn.turn, turn.reply)?;
        if saved.is_empty() {
            return Ok(None);
        }
        self.write_index()?;
        Ok(Some(self.note(&saved)))
    }

    async fn on_finish(
        &self,
        _agents: &[&dyn ChatAgent],
        _outcome: &RunOutcome,
    ) -> Result<(), HookError> {
        if self.dir.exists() {
            self.write_index()?;
        }
        Ok(())
    }
}
