//! Completion providers used by deep knowledge extraction.
//!
//! Unlike a chat surface, callers here only care whether a usable reply came
//! back.  Every failure (transport, non-success status, missing credentials,
//! reply without text) is surfaced as an `Err` so the extractor can treat
//! them all the same way.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use paravault_config::LlmConfig;

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Short label for log lines.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenRouter,
}

impl Provider {
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("openrouter") {
            Self::OpenRouter
        } else {
            Self::Ollama
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "ollama completion request");
        let response = self.client.post(endpoint).json(&payload).send().await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("Ollama error ({status}): {body}");
        }

        body.get("response")
            .and_then(|value| value.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("Ollama response missing text: {body}"))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl OpenRouterClient {
    /// Reads the credential from `OPENROUTER_API_KEY`.
    pub fn new(model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::with_api_key(api_key, model, timeout)
    }

    pub fn with_api_key(
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OpenRouter key missing. Set OPENROUTER_API_KEY or switch provider to ollama.");
        };

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "openrouter completion request");
        let response = self
            .client
            .post("https://openrouter.ai/api/v1/chat/completions")
            .bearer_auth(api_key)
            .header("HTTP-Referer", "https://paravault.local")
            .header("X-Title", "Paravault")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            bail!("OpenRouter error ({status}): {body}");
        }

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("OpenRouter response missing text: {body}"))
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

/// Build the provider selected by `[llm] provider`.
pub fn provider_from_config(config: &LlmConfig) -> Result<Box<dyn CompletionProvider>> {
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
    let provider: Box<dyn CompletionProvider> = match Provider::from_label(&config.provider) {
        Provider::Ollama => Box::new(OllamaClient::new(
            &config.ollama_base_url,
            &config.ollama_model,
            timeout,
        )?),
        Provider::OpenRouter => Box::new(OpenRouterClient::new(&config.openrouter_model, timeout)?),
    };
    Ok(provider)
}

// ── Reply cleanup ─────────────────────────────────────────────────────────────

/// Remove one leading code-fence line (```` ``` ```` or ```` ```json ````) and
/// one trailing fence line, if present.  Everything between is returned
/// trimmed; text without fences is returned trimmed and otherwise untouched.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut body = raw.trim();

    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(newline) => &body[newline + 1..],
            None => "",
        };
    }

    let trimmed_end = body.trim_end();
    if let Some(last_newline) = trimmed_end.rfind('\n') {
        if trimmed_end[last_newline + 1..].trim() == "```" {
            body = &trimmed_end[..last_newline];
        }
    } else if trimmed_end.trim() == "```" {
        body = "";
    }

    body.trim()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_fenced_json_block() {
        let raw = "```json\n{\"summary\":\"ok\"}\n```";
        assert_eq!(strip_code_fence(raw), "{\"summary\":\"ok\"}");
    }

    #[test]
    fn strip_bare_fence_with_surrounding_whitespace() {
        let raw = "\n  ```\n{\"a\":1}\n```  \n";
        assert_eq!(strip_code_fence(raw), "{\"a\":1}");
    }

    #[test]
    fn strip_leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("plain prose"), "plain prose");
    }

    #[test]
    fn strip_removes_at_most_one_fence_each_side() {
        let raw = "```\n```\n{}\n```\n```";
        assert_eq!(strip_code_fence(raw), "```\n{}\n```");
    }

    #[test]
    fn strip_handles_lone_fence() {
        assert_eq!(strip_code_fence("```"), "");
        assert_eq!(strip_code_fence(""), "");
    }

    #[test]
    fn provider_from_label_defaults_to_ollama() {
        assert_eq!(Provider::from_label("openrouter"), Provider::OpenRouter);
        assert_eq!(Provider::from_label(" OpenRouter "), Provider::OpenRouter);
        assert_eq!(Provider::from_label("ollama"), Provider::Ollama);
        assert_eq!(Provider::from_label("something-else"), Provider::Ollama);
    }

    #[test]
    fn provider_serde_roundtrip() {
        for provider in [Provider::Ollama, Provider::OpenRouter] {
            let json = serde_json::to_string(&provider).unwrap();
            let back: Provider = serde_json::from_str(&json).unwrap();
            assert_eq!(back, provider);
        }
    }

    #[tokio::test]
    async fn openrouter_without_key_is_an_error() {
        let client =
            OpenRouterClient::with_api_key(None, "openai/gpt-4o-mini", Duration::from_secs(1)).unwrap();
        let result = client.complete("hello").await;
        assert!(result.is_err());
    }

    #[test]
    fn provider_from_config_picks_configured_client() {
        let mut config = LlmConfig::default();
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.name(), "ollama");

        config.provider = "openrouter".to_string();
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openrouter");
    }
}
