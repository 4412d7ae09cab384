//! Language model abstraction and implementations.
//!
//! Defines the [`LanguageModel`] trait and concrete implementations:
//! - **[`DisabledModel`]**: always fails; chat then answers from the
//!   fallback templates.
//! - **[`ReplicateModel`]**: Replicate predictions API (Llama 2 chat).
//! - **[`OpenAiModel`]**: OpenAI chat completions.
//!
//! Use [`create_model`] to build the one named by `[llm] provider`. API keys
//! are read from the environment on each call, so a missing key surfaces as
//! a failed generation rather than a startup error.
//!
//! None of the clients retry. The caller owns the overall deadline.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::prompt;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provenance label shown to users, e.g. `"Llama PPR Expert"`.
    fn label(&self) -> &str;

    /// Complete `prompt`. `season` is passed to providers that take a
    /// separate system instruction.
    async fn generate(&self, prompt: &str, season: &str) -> Result<String>;
}

pub fn create_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledModel)),
        "replicate" => Ok(Box::new(ReplicateModel::new(config)?)),
        "openai" => Ok(Box::new(OpenAiModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to build LLM HTTP client")
}

fn required_model(config: &LlmConfig) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("llm.model required"))
}

fn env_key(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} not set", name),
    }
}

// ============ Disabled ============

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn label(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _season: &str) -> Result<String> {
        bail!("Language model is disabled")
    }
}

// ============ Replicate ============

pub struct ReplicateModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

impl ReplicateModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.replicate.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: required_model(config)?,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// `owner/name:version` goes through `/v1/predictions`; a bare
    /// `owner/name` uses the model's own predictions endpoint.
    fn request(&self, prompt: &str, season: &str) -> (String, Value) {
        let input = json!({
            "prompt": prompt,
            "max_new_tokens": self.max_tokens,
            "temperature": self.temperature,
            "top_p": 0.9,
            "repetition_penalty": 1.15,
            "system_prompt": prompt::model_system_prompt(season),
        });
        match self.model.split_once(':') {
            Some((_, version)) => (
                format!("{}/v1/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/v1/models/{}/predictions", self.base_url, self.model),
                json!({ "input": input }),
            ),
        }
    }

    async fn poll(&self, url: &str, token: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Replicate API error {}: {}", status, body);
        }
        Ok(response.json().await?)
    }
}

/// Llama models stream tokens, so `output` is usually an array of strings.
fn join_output(output: &Value) -> String {
    match output {
        Value::Array(parts) => parts.iter().filter_map(Value::as_str).collect(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

#[async_trait]
impl LanguageModel for ReplicateModel {
    fn label(&self) -> &str {
        "Llama PPR Expert"
    }

    async fn generate(&self, prompt: &str, season: &str) -> Result<String> {
        let token = env_key("REPLICATE_API_TOKEN")?;
        let (url, body) = self.request(prompt, season);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Replicate API error {}: {}", status, body);
        }
        let mut prediction: Prediction = response.json().await?;

        loop {
            match prediction.status.as_str() {
                "succeeded" => return Ok(join_output(&prediction.output)),
                "failed" | "canceled" => bail!(
                    "Replicate prediction {}: {}",
                    prediction.status,
                    prediction
                        .error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_default()
                ),
                _ => {
                    let Some(urls) = prediction.urls.as_ref() else {
                        bail!("Replicate prediction {} without a poll url", prediction.status);
                    };
                    debug!(status = %prediction.status, "waiting on replicate prediction");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    let next = self.poll(&urls.get, &token).await?;
                    prediction = next;
                }
            }
        }
    }
}

// ============ OpenAI ============

pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: required_model(config)?,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn label(&self) -> &str {
        "OpenAI PPR Expert"
    }

    async fn generate(&self, prompt: &str, season: &str) -> Result<String> {
        let api_key = env_key("OPENAI_API_KEY")?;
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": prompt::model_system_prompt(season) },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, text);
        }

        let json: Value = response.json().await?;
        parse_chat_completion(&json)
    }
}

fn parse_chat_completion(json: &Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replicate(model: &str) -> ReplicateModel {
        ReplicateModel::new(&LlmConfig {
            provider: "replicate".into(),
            model: Some(model.into()),
            ..LlmConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_create_model_by_provider() {
        let disabled = create_model(&LlmConfig::default()).unwrap();
        assert_eq!(disabled.label(), "disabled");

        let cfg = LlmConfig {
            provider: "openai".into(),
            model: Some("gpt-4".into()),
            ..LlmConfig::default()
        };
        assert_eq!(create_model(&cfg).unwrap().label(), "OpenAI PPR Expert");
    }

    #[tokio::test]
    async fn test_disabled_model_fails() {
        assert!(DisabledModel.generate("hi", "2024").await.is_err());
    }

    #[test]
    fn test_versioned_replicate_request() {
        let m = replicate("meta/llama-2-70b-chat:02e509c7");
        let (url, body) = m.request("prompt text", "2024");
        assert_eq!(url, "https://api.replicate.com/v1/predictions");
        assert_eq!(body["version"], "02e509c7");
        assert_eq!(body["input"]["max_new_tokens"], 800);
        assert_eq!(body["input"]["top_p"], 0.9);
        assert!(body["input"]["system_prompt"]
            .as_str()
            .unwrap()
            .contains("current 2024 season"));
    }

    #[test]
    fn test_unversioned_replicate_request() {
        let m = replicate("meta/meta-llama-3-70b-instruct");
        let (url, body) = m.request("p", "2024");
        assert_eq!(
            url,
            "https://api.replicate.com/v1/models/meta/meta-llama-3-70b-instruct/predictions"
        );
        assert!(body.get("version").is_none());
    }

    #[test]
    fn test_join_output_shapes() {
        assert_eq!(join_output(&json!(["Start ", "him."])), "Start him.");
        assert_eq!(join_output(&json!("whole")), "whole");
        assert_eq!(join_output(&Value::Null), "");
    }

    #[test]
    fn test_parse_chat_completion() {
        let ok = json!({"choices":[{"message":{"role":"assistant","content":"Sit him."}}]});
        assert_eq!(parse_chat_completion(&ok).unwrap(), "Sit him.");
        assert!(parse_chat_completion(&json!({"choices":[]})).is_err());
    }
}
