//! Server settings read from `DOCQA_*` environment variables.

use std::time::Duration;

use anyhow::Context;
use docqa_rag::{CapabilityTimeouts, RagConfig, StaleChunkPolicy};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ollama_url: String,
    pub embed_model: String,
    /// Short model name used in the collection name.
    pub embed_tag: String,
    pub llm_model: String,
    pub temperature: f32,
    /// Chroma server to persist chunks in; in-memory when unset.
    pub chroma_url: Option<String>,
    pub prune_stale: bool,
    pub timeouts: CapabilityTimeouts,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            ollama_url: "http://localhost:11434".to_string(),
            embed_model: "mxbai-embed-large".to_string(),
            embed_tag: "mxbai".to_string(),
            llm_model: "llama3".to_string(),
            temperature: 0.7,
            chroma_url: None,
            prune_stale: false,
            timeouts: CapabilityTimeouts::default(),
        }
    }
}

impl ServerConfig {
    /// Read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("DOCQA_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("DOCQA_PORT") {
            config.port = port.parse().with_context(|| format!("invalid DOCQA_PORT '{port}'"))?;
        }
        if let Some(url) = lookup("DOCQA_OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Some(model) = lookup("DOCQA_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Some(tag) = lookup("DOCQA_EMBED_TAG") {
            config.embed_tag = tag;
        }
        if let Some(model) = lookup("DOCQA_LLM_MODEL") {
            config.llm_model = model;
        }
        if let Some(temperature) = lookup("DOCQA_TEMPERATURE") {
            config.temperature = temperature
                .parse()
                .with_context(|| format!("invalid DOCQA_TEMPERATURE '{temperature}'"))?;
        }
        config.chroma_url = lookup("DOCQA_CHROMA_URL").filter(|url| !url.trim().is_empty());
        if let Some(flag) = lookup("DOCQA_PRUNE_STALE") {
            config.prune_stale = parse_flag(&flag)
                .with_context(|| format!("invalid DOCQA_PRUNE_STALE '{flag}'"))?;
        }
        if let Some(secs) = lookup("DOCQA_EMBED_TIMEOUT_SECS") {
            config.timeouts.embedding = parse_secs("DOCQA_EMBED_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("DOCQA_LLM_TIMEOUT_SECS") {
            config.timeouts.generation = parse_secs("DOCQA_LLM_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("DOCQA_STORE_TIMEOUT_SECS") {
            config.timeouts.store = parse_secs("DOCQA_STORE_TIMEOUT_SECS", &secs)?;
        }

        Ok(config)
    }

    /// The pipeline settings this server runs with.
    pub fn rag_config(&self) -> anyhow::Result<RagConfig> {
        let stale_chunks =
            if self.prune_stale { StaleChunkPolicy::Prune } else { StaleChunkPolicy::Retain };
        RagConfig::builder()
            .stale_chunks(stale_chunks)
            .timeouts(self.timeouts)
            .build()
            .context("invalid pipeline configuration")
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs(key: &str, value: &str) -> anyhow::Result<Duration> {
    let secs: u64 = value.parse().with_context(|| format!("invalid {key} '{value}'"))?;
    Ok(Duration::from_secs(secs))
}
