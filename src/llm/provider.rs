// file: src/llm/provider.rs
// description: llm provider selection from environment and request dispatch
// reference: https://platform.openai.com/docs/api-reference/chat, https://ai.google.dev/api

use crate::config::env_lookup;
use crate::error::{HarvestError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub name: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeminiAuth {
    /// Passed as the `key` query parameter.
    ApiKey(String),
    /// Vertex AI bearer token obtained by the caller.
    Bearer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiSettings {
    pub endpoint: String,
    pub auth: GeminiAuth,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini(GeminiSettings),
    OpenAi(ChatSettings),
    OpenRouter {
        chat: ChatSettings,
        referer: String,
        title: String,
    },
    Generic(ChatSettings),
}

impl LlmProvider {
    pub fn from_env() -> Result<Self> {
        Self::detect(env_lookup)
    }

    /// Explicit `LLM_PROVIDER` wins; otherwise the first provider whose
    /// credential variable is present.
    pub fn detect<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup: Lookup<'_> = &lookup;

        if let Some(explicit) = lookup("LLM_PROVIDER") {
            return Self::named(&explicit.trim().to_uppercase(), lookup);
        }

        if lookup("GEMINI_API_KEY").is_some() || lookup("GEMINI_PROJECT_ID").is_some() {
            Self::gemini(lookup)
        } else if lookup("OPENROUTER_API_KEY").is_some() {
            Self::openrouter(lookup)
        } else if lookup("OPENAI_API_KEY").is_some() {
            Self::openai(lookup)
        } else if lookup("LLM_API_BASE_URL").is_some() {
            Ok(Self::generic(lookup))
        } else {
            Err(HarvestError::Configuration(
                "No LLM provider configured. Set one of: GEMINI_API_KEY, GEMINI_PROJECT_ID, \
                 OPENROUTER_API_KEY, OPENAI_API_KEY, or LLM_API_BASE_URL"
                    .to_string(),
            ))
        }
    }

    fn named(name: &str, lookup: Lookup<'_>) -> Result<Self> {
        match name {
            "GEMINI" => Self::gemini(lookup),
            "OPENROUTER" => Self::openrouter(lookup),
            "OPENAI" => Self::openai(lookup),
            "GENERIC" => Ok(Self::generic(lookup)),
            custom => Self::custom(custom, lookup),
        }
    }

    fn gemini(lookup: Lookup<'_>) -> Result<Self> {
        let model =
            lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-pro-exp-03-25".to_string());

        let (endpoint, auth) = if let Some(project) = lookup("GEMINI_PROJECT_ID") {
            let location = lookup("GEMINI_LOCATION").unwrap_or_else(|| "us-central1".to_string());
            let token = lookup("GEMINI_ACCESS_TOKEN").ok_or_else(|| {
                HarvestError::Configuration(
                    "GEMINI_PROJECT_ID requires GEMINI_ACCESS_TOKEN for Vertex AI".to_string(),
                )
            })?;
            (
                format!(
                    "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
                    loc = location
                ),
                GeminiAuth::Bearer(token),
            )
        } else if let Some(key) = lookup("GEMINI_API_KEY") {
            (
                format!("{}/models/{}:generateContent", GEMINI_API_BASE, model),
                GeminiAuth::ApiKey(key),
            )
        } else {
            return Err(HarvestError::Configuration(
                "Either GEMINI_PROJECT_ID or GEMINI_API_KEY must be set".to_string(),
            ));
        };

        Ok(Self::Gemini(GeminiSettings {
            endpoint,
            auth,
            model,
        }))
    }

    fn openai(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self::OpenAi(ChatSettings {
            name: "OpenAI".to_string(),
            endpoint: OPENAI_ENDPOINT.to_string(),
            api_key: Some(require(lookup, "OPENAI_API_KEY")?),
            model: lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
        }))
    }

    fn openrouter(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self::OpenRouter {
            chat: ChatSettings {
                name: "OpenRouter".to_string(),
                endpoint: OPENROUTER_ENDPOINT.to_string(),
                api_key: Some(require(lookup, "OPENROUTER_API_KEY")?),
                model: lookup("OPENROUTER_MODEL")
                    .unwrap_or_else(|| "openai/gpt-3.5-turbo".to_string()),
            },
            referer: lookup("OPENROUTER_REFERER")
                .unwrap_or_else(|| "https://github.com".to_string()),
            title: lookup("OPENROUTER_TITLE")
                .unwrap_or_else(|| "PocketFlow Tutorial Generator".to_string()),
        })
    }

    fn generic(lookup: Lookup<'_>) -> Self {
        let base =
            lookup("LLM_API_BASE_URL").unwrap_or_else(|| "http://localhost:11434".to_string());
        Self::Generic(ChatSettings {
            name: "Generic".to_string(),
            endpoint: chat_endpoint(&base),
            api_key: lookup("LLM_API_KEY"),
            model: lookup("LLM_MODEL").unwrap_or_else(|| "llama2".to_string()),
        })
    }

    /// `X_BASE_URL` and `X_MODEL` are required, `X_API_KEY` is optional.
    fn custom(name: &str, lookup: Lookup<'_>) -> Result<Self> {
        let base = require(lookup, &format!("{}_BASE_URL", name))?;
        Ok(Self::Generic(ChatSettings {
            name: name.to_string(),
            endpoint: chat_endpoint(&base),
            api_key: lookup(&format!("{}_API_KEY", name)),
            model: require(lookup, &format!("{}_MODEL", name))?,
        }))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Gemini(_) => "Gemini",
            Self::OpenAi(chat) | Self::Generic(chat) | Self::OpenRouter { chat, .. } => &chat.name,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini(settings) => &settings.model,
            Self::OpenAi(chat) | Self::Generic(chat) | Self::OpenRouter { chat, .. } => &chat.model,
        }
    }

    pub async fn invoke(&self, client: &Client, prompt: &str, temperature: f32) -> Result<String> {
        debug!("Invoking {} ({}) for {} chars", self.name(), self.model(), prompt.len());

        match self {
            Self::Gemini(settings) => invoke_gemini(client, settings, prompt, temperature).await,
            Self::OpenAi(chat) | Self::Generic(chat) => {
                invoke_chat(client, chat, &[], prompt, temperature).await
            }
            Self::OpenRouter {
                chat,
                referer,
                title,
            } => {
                let extra = [("HTTP-Referer", referer.as_str()), ("X-Title", title.as_str())];
                invoke_chat(client, chat, &extra, prompt, temperature).await
            }
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.model())
    }
}

fn require(lookup: Lookup<'_>, name: &str) -> Result<String> {
    lookup(name).ok_or_else(|| {
        HarvestError::Configuration(format!("{} environment variable is required", name))
    })
}

fn chat_endpoint(base: &str) -> String {
    format!("{}/v1/chat/completions", base.trim_end_matches('/'))
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

async fn invoke_chat(
    client: &Client,
    chat: &ChatSettings,
    extra_headers: &[(&str, &str)],
    prompt: &str,
    temperature: f32,
) -> Result<String> {
    let request = ChatRequest {
        model: &chat.model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature,
    };

    let mut builder = client
        .post(&chat.endpoint)
        .header("Content-Type", "application/json")
        .json(&request);
    if let Some(key) = &chat.api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }

    let response = builder.send().await.map_err(|e| {
        HarvestError::Transport(format!("Error calling LLM API at {}: {}", chat.endpoint, e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(HarvestError::Transport(format!(
            "{} request failed with status {}: {}",
            chat.name, status, error_text
        )));
    }

    let parsed: ChatResponse = response.json().await.map_err(|e| {
        HarvestError::Transport(format!("Failed to parse {} response: {}", chat.name, e))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| HarvestError::Transport(format!("{} returned no choices", chat.name)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

async fn invoke_gemini(
    client: &Client,
    settings: &GeminiSettings,
    prompt: &str,
    temperature: f32,
) -> Result<String> {
    let request = GeminiRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts: vec![GeminiPart { text: prompt }],
        }],
        generation_config: GeminiGenerationConfig { temperature },
    };

    let mut builder = client.post(&settings.endpoint).json(&request);
    builder = match &settings.auth {
        GeminiAuth::ApiKey(key) => builder.query(&[("key", key.as_str())]),
        GeminiAuth::Bearer(token) => builder.header("Authorization", format!("Bearer {}", token)),
    };

    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(HarvestError::Transport(format!(
            "Gemini request failed with status {}: {}",
            status, error_text
        )));
    }

    let parsed: GeminiResponse = response
        .json()
        .await
        .map_err(|e| HarvestError::Transport(format!("Failed to parse Gemini response: {}", e)))?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(HarvestError::Transport(
            "Gemini returned no candidates".to_string(),
        ));
    }
    Ok(text)
}
