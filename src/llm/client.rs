// file: src/llm/client.rs
// description: cached llm invocation routed to the configured provider
// reference: prompt and response are logged for every call

use crate::config::LlmConfig;
use crate::error::Result;
use crate::llm::cache::ResponseCache;
use crate::llm::provider::LlmProvider;
use reqwest::Client;
use tracing::info;

pub struct LlmClient {
    http: Client,
    provider: Option<LlmProvider>,
    cache: ResponseCache,
    use_cache: bool,
    temperature: f32,
}

impl LlmClient {
    /// The provider is read from the environment on every uncached call.
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: Client::new(),
            provider: None,
            cache: ResponseCache::new(&config.cache_path),
            use_cache: config.use_cache,
            temperature: config.temperature,
        }
    }

    pub fn with_provider(mut self, provider: LlmProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn call(&self, prompt: &str) -> Result<String> {
        self.call_with_cache(prompt, self.use_cache).await
    }

    pub async fn call_with_cache(&self, prompt: &str, use_cache: bool) -> Result<String> {
        info!("PROMPT: {}", prompt);

        if use_cache && let Some(cached) = self.cache.get(prompt).await {
            info!("CACHE HIT: Using cached response");
            return Ok(cached);
        }

        let provider = match &self.provider {
            Some(provider) => provider.clone(),
            None => LlmProvider::from_env()?,
        };

        let response = provider.invoke(&self.http, prompt, self.temperature).await?;
        info!("RESPONSE: {}", response);

        if use_cache {
            self.cache.insert(prompt, &response).await;
        }

        Ok(response)
    }
}
