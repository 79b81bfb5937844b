//! Language model drivers.
//!
//! The bridge treats the model as an opaque call-and-response capability: a
//! list of messages goes in, one string of assistant text comes out. The
//! [`LlmDriver`] trait is that seam; two HTTP drivers implement it.
//!
//! # Drivers
//!
//! - [`OllamaDriver`]: Ollama native chat API (`/api/chat`)
//! - [`ChatCompletionsDriver`]: `OpenAI`-compatible Chat Completions (`/v1/chat/completions`)
//!
//! # Example
//!
//! ```rust,ignore
//! use toolbridge::llm::{LlmProtocol, LlmSettings, driver_for};
//!
//! let settings = LlmSettings {
//!     base_url: "http://ollama:11434".to_string(),
//!     model: "qwen2.5:3b-instruct".to_string(),
//!     protocol: LlmProtocol::Auto,
//!     ..LlmSettings::default()
//! };
//! let driver = driver_for(&settings);
//! ```

pub mod chat_completions;
pub mod ollama;
pub mod provider;

pub use chat_completions::ChatCompletionsDriver;
pub use ollama::OllamaDriver;
pub use provider::Provider;

use std::{sync::Arc, time::Duration};

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the model host (e.g., `http://ollama:11434`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `qwen2.5:3b-instruct`).
    pub model: String,
    /// Protocol to use for communication.
    pub protocol: LlmProtocol,
    /// Upper bound for one model call.
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://ollama:11434".to_string(),
            api_key: None,
            model: "qwen2.5:3b-instruct".to_string(),
            protocol: LlmProtocol::Auto,
            timeout: Duration::from_secs(60),
        }
    }
}

/// LLM protocol variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProtocol {
    /// Pick from the provider detected in the base URL.
    #[default]
    Auto,
    /// Ollama native chat API.
    Ollama,
    /// `OpenAI` Chat Completions API.
    Chat,
}

impl std::str::FromStr for LlmProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "ollama" => Ok(Self::Ollama),
            "chat" | "openai" => Ok(Self::Chat),
            other => Err(format!("unknown LLM protocol '{other}' (expected auto, ollama or chat)")),
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages, oldest first.
    pub messages: Vec<Message>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Ask the host to constrain output to a JSON object.
    pub json_output: bool,
}

/// Trait for LLM drivers.
///
/// Implementations return the assistant text of a single, non-streamed
/// completion.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the host answers with a
    /// non-success status, or the response has no assistant text.
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<String>;
}

/// Build the driver for the configured protocol.
pub fn driver_for(settings: &LlmSettings) -> Arc<dyn LlmDriver> {
    let provider = Provider::detect_from_url(&settings.base_url);
    let protocol = match settings.protocol {
        LlmProtocol::Auto => provider.default_protocol(),
        explicit => explicit,
    };

    match protocol {
        LlmProtocol::Chat => Arc::new(ChatCompletionsDriver::new(settings.clone(), provider)),
        LlmProtocol::Ollama | LlmProtocol::Auto => Arc::new(OllamaDriver::new(settings.clone())),
    }
}

/// Shared HTTP client construction for the drivers.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse() {
        assert_eq!("ollama".parse::<LlmProtocol>(), Ok(LlmProtocol::Ollama));
        assert_eq!("Chat".parse::<LlmProtocol>(), Ok(LlmProtocol::Chat));
        assert_eq!("auto".parse::<LlmProtocol>(), Ok(LlmProtocol::Auto));
        assert!("grpc".parse::<LlmProtocol>().is_err());
    }

    #[test]
    fn test_message_wire_shape() {
        let v = serde_json::to_value(Message::system("hi")).unwrap();
        assert_eq!(v, serde_json::json!({"role": "system", "content": "hi"}));
    }
}
