//! Provider detection from the model host URL.
//!
//! Used to pick a protocol when `LlmProtocol::Auto` is configured and to
//! build the Chat Completions URL.

use super::LlmProtocol;

/// Known model hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Ollama (default port 11434, or an `ollama` host name)
    Ollama,
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let provider = Provider::detect_from_url("http://ollama:11434");
    /// assert_eq!(provider, Provider::Ollama);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains(":11434") || lower.contains("ollama") {
            Self::Ollama
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Protocol used when none is configured explicitly.
    #[must_use]
    pub fn default_protocol(&self) -> LlmProtocol {
        match self {
            Self::Ollama => LlmProtocol::Ollama,
            Self::OpenAI | Self::OpenRouter | Self::Groq | Self::Generic => LlmProtocol::Chat,
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// Ollama and Groq serve the `OpenAI` surface under `/v1` and
    /// `/openai/v1` respectively; a base URL that already ends in `/v1` is
    /// used as is.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        if base.ends_with("/v1") {
            return format!("{base}/chat/completions");
        }
        match self {
            Self::Groq => format!("{base}/openai/v1/chat/completions"),
            Self::OpenRouter => format!("{base}/api/v1/chat/completions"),
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}
