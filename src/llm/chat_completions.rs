//! `OpenAI` Chat Completions API driver.
//!
//! This module implements the [`LlmDriver`] trait for any host exposing the
//! `OpenAI` Chat Completions surface (`/v1/chat/completions`), non-streamed,
//! with JSON-object output when requested.

use anyhow::{Context, anyhow};

use super::{LlmDriver, LlmRequest, LlmSettings, Provider, http_client};

/// Driver for the `OpenAI` Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
    url: String,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("url", &self.url)
            .field("model", &self.settings.model)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings, provider: Provider) -> Self {
        let url = provider.build_chat_url(&settings.base_url);
        Self {
            http: http_client(settings.timeout),
            settings,
            url,
        }
    }
}

fn request_body(model: &str, req: &LlmRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "stream": false,
        "messages": req.messages,
        "temperature": req.temperature
    });
    if req.json_output {
        body["response_format"] = serde_json::json!({ "type": "json_object" });
    }
    body
}

/// First choice's assistant text.
fn first_choice_content(v: &serde_json::Value) -> Option<String> {
    v["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<String> {
        let body = request_body(&self.settings.model, &req);

        let mut rb = self.http.post(&self.url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let v: serde_json::Value = rb
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()?
            .json()
            .await
            .context("invalid chat completions response")?;

        first_choice_content(&v).ok_or_else(|| anyhow!("chat completions response has no content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use serde_json::json;

    #[test]
    fn test_request_body_json_object_format() {
        let req = LlmRequest {
            messages: vec![Message::user("List all hosts")],
            temperature: 0.0,
            json_output: true,
        };
        let body = request_body("gpt-4o-mini", &req);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"], "List all hosts");
    }

    #[test]
    fn test_first_choice_content() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": " {\"tool\": null} "}}]});
        assert_eq!(first_choice_content(&v).as_deref(), Some("{\"tool\": null}"));
        assert_eq!(first_choice_content(&json!({"choices": []})), None);
    }
}
