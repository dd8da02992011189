//! Language-model digest of the report payload
//!
//! The summarizer is optional. Any failure collapses to an HTML comment so
//! the rest of the report still renders.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SummarizerConfig;
use crate::error::{Error, Result};
use crate::report::DigestPayload;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Used when no prompt file is configured
pub const DEFAULT_PROMPT: &str = "You are preparing a short briefing for a busy manager. \
Using the data below, write a few HTML paragraphs covering who they interacted with most, \
anything waiting on their reply, the meetings coming up, and the recurring themes. \
Use only <p>, <ul>, <li> and <strong> tags.";

/// Produces free-text prose from the aggregate payload
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, payload: &DigestPayload) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini `generateContent` client
pub struct GeminiSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    prompt: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: String, model: String, prompt: String, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Summarizer(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model,
            prompt,
        })
    }

    /// Build from config, reading the key from the environment and the
    /// prompt from `prompt_file` when one is set
    pub fn from_config(config: &SummarizerConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Summarizer(format!("{} is not set", config.api_key_env))
            })?;

        let prompt = match &config.prompt_file {
            Some(path) => load_prompt(path)?,
            None => DEFAULT_PROMPT.to_string(),
        };

        info!("Created Gemini summarizer using model {}", config.model);
        let summarizer = Self::new(api_key, config.model.clone(), prompt, config.timeout_ms)?;
        Ok(match &config.base_url {
            Some(url) => summarizer.with_base_url(url),
            None => summarizer,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn full_prompt(&self, payload: &DigestPayload) -> Result<String> {
        let data = serde_json::to_string_pretty(payload)?;
        Ok(format!("{}\n\nHere is the data:\n{}", self.prompt, data))
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, payload: &DigestPayload) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: self.full_prompt(payload)?,
                }],
            }],
        };

        debug!("Sending digest request to Gemini ({})", self.model);
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Summarizer(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Summarizer(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Summarizer(format!("Failed to parse Gemini response: {}", e)))?;

        first_candidate_text(body)
    }
}

fn first_candidate_text(response: GenerateResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Summarizer("Gemini response had no candidates".to_string()))
}

fn load_prompt(path: &Path) -> Result<String> {
    let prompt = std::fs::read_to_string(path).map_err(|e| {
        Error::Summarizer(format!("Could not read prompt file {}: {}", path.display(), e))
    })?;
    if prompt.trim().is_empty() {
        return Err(Error::Summarizer(format!(
            "Prompt file {} is empty",
            path.display()
        )));
    }
    Ok(prompt)
}

/// HTML comment standing in for the digest
pub fn placeholder(err: &Error) -> String {
    // "--" would end the comment early
    format!(
        "<!-- digest unavailable: {} -->",
        err.to_string().replace("--", "- -")
    )
}

/// Run the summarizer if there is one, never failing the caller
pub async fn digest_or_placeholder(
    summarizer: Option<&dyn Summarizer>,
    payload: &DigestPayload,
) -> String {
    let Some(summarizer) = summarizer else {
        return placeholder(&Error::Summarizer("summarizer disabled".to_string()));
    };
    match summarizer.summarize(payload).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Digest generation failed: {}", e);
            placeholder(&e)
        }
    }
}
