//! Ollama native chat API driver.

use anyhow::{Context, anyhow};
use serde::Deserialize;

use super::{LlmDriver, LlmRequest, LlmSettings, http_client};

/// Driver for Ollama's `/api/chat` endpoint, non-streamed.
#[derive(Clone)]
pub struct OllamaDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for OllamaDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaDriver")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .finish()
    }
}

impl OllamaDriver {
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: http_client(settings.timeout),
            settings,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.settings.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Request body for `/api/chat`.
fn request_body(model: &str, req: &LlmRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": req.messages,
        "stream": false,
        "options": { "temperature": req.temperature }
    });
    if req.json_output {
        body["format"] = serde_json::Value::String("json".to_string());
    }
    body
}

#[async_trait::async_trait]
impl LlmDriver for OllamaDriver {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<String> {
        let url = self.chat_url();
        let body = request_body(&self.settings.model, &req);

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp: ChatResponse = rb
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?
            .json()
            .await
            .context("invalid Ollama chat response")?;

        resp.message
            .map(|m| m.content.trim().to_string())
            .ok_or_else(|| anyhow!("Ollama response has no message"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[test]
    fn test_request_body_asks_for_json() {
        let req = LlmRequest {
            messages: vec![Message::system("s"), Message::user("u")],
            temperature: 0.0,
            json_output: true,
        };
        let body = request_body("qwen2.5:3b-instruct", &req);
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.0);
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_request_body_without_json_mode() {
        let req = LlmRequest {
            messages: vec![],
            temperature: 0.1,
            json_output: false,
        };
        assert!(request_body("m", &req).get("format").is_none());
    }

    #[test]
    fn test_chat_url_trims_slash() {
        let driver = OllamaDriver::new(LlmSettings {
            base_url: "http://ollama:11434/".to_string(),
            ..LlmSettings::default()
        });
        assert_eq!(driver.chat_url(), "http://ollama:11434/api/chat");
    }
}
