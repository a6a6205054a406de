//! Google Gemini provider (`generateContent`).
//!
//! The backend expects a chat session of strictly alternating `user`/`model`
//! turns. The session is rebuilt from the agent's windowed history on every
//! send, so it never drifts from the agent's own message store. The persona
//! prompt is held outside the history and is folded into the outgoing prompt
//! when nothing precedes it.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::message::{Message, Role};
use parley_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Normalize a windowed history into the strict alternation Gemini accepts.
///
/// Leading non-`user` entries are dropped, a dangling final `user` entry is
/// dropped, and each run of same-role entries collapses to its first member.
/// System messages never reach the session.
pub fn normalize_turns(messages: &[Message]) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());

    for msg in messages.iter().filter(|m| !m.is_system()) {
        if out.is_empty() && msg.role != Role::User {
            continue;
        }
        if out.last().is_some_and(|prev| prev.role == msg.role) {
            continue;
        }
        out.push(msg.clone());
    }

    if out.last().is_some_and(|m| m.role == Role::User) {
        out.pop();
    }

    out
}

/// Accept either `gemma-3-4b-it` or `models/gemma-3-4b-it`.
pub fn normalize_model_id(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: http::client(Duration::from_secs(120)),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_content(msg: &Message) -> Content {
        let role = match msg.role {
            Role::Assistant => "model",
            _ => "user",
        };
        Content {
            role: role.into(),
            parts: vec![Part {
                text: msg.content.clone(),
            }],
        }
    }

    /// Split the request into the rebuilt session and the outgoing prompt.
    fn rebuild(request: &ProviderRequest) -> Result<(Vec<Content>, String), ProviderError> {
        let (prompt, earlier) = match request.messages.split_last() {
            Some((last, earlier)) if last.role == Role::User => (last, earlier),
            _ => {
                return Err(ProviderError::InvalidResponse(
                    "Gemini request must end with a user prompt".into(),
                ));
            }
        };

        let session: Vec<Content> = normalize_turns(earlier).iter().map(Self::to_content).collect();

        // Only the opening message of a conversation carries the persona.
        let text = if earlier.is_empty() && !request.system_prompt.trim().is_empty() {
            format!("{}\n\n{}", request.system_prompt, prompt.content)
        } else {
            prompt.content.clone()
        };

        Ok((session, text))
    }

    fn build_body(request: &ProviderRequest, session: &[Content], prompt: &str) -> GenerateRequest {
        let mut contents = session.to_vec();
        contents.push(Content {
            role: "user".into(),
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        });

        GenerateRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn extract_text(resp: GenerateResponse) -> String {
        resp.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn system_prompt_placement(&self) -> SystemPromptPlacement {
        SystemPromptPlacement::Detached
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let (session, prompt) = Self::rebuild(&request)?;
        let model = normalize_model_id(&request.model);

        let body = Self::build_body(&request, &session, &prompt);
        let url = format!("{}/v1beta/{}:generateContent", self.base_url, model);

        debug!(
            provider = "gemini",
            model = %model,
            session_turns = session.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status(&self.name, response).await?;
        let api_resp: GenerateResponse = http::parse_json(&self.name, response).await?;

        let usage = api_resp.usage_metadata.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });
        let content = Self::extract_text(api_resp);

        Ok(ProviderResponse {
            content,
            model,
            usage,
        })
    }
}

// --- Gemini API types ---

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
