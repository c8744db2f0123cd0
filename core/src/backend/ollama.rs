//! Ollama Backend Implementation
//!
//! Backend for Ollama (local LLM server), using the chat endpoint so the
//! conversation history travels as structured messages rather than a
//! flattened prompt.
//!
//! # Ollama API
//!
//! - `POST /api/chat` - chat completion over a message history
//! - `GET /api/tags` - list models (used as the health probe)
//!
//! The reply-length cap is passed as `options.num_predict`; on a device
//! whose panel fits a short paragraph there is no point generating more.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{BackendError, LanguageModel};
use crate::config::ModelSettings;
use crate::conversation::{ChatMessage, Conversation};

/// Ollama backend client.
#[derive(Clone)]
pub struct OllamaBackend {
    host: String,
    port: u16,
    model: String,
    num_predict: u32,
    http_client: reqwest::blocking::Client,
}

/// Wire request for `POST /api/chat`.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

/// Generation options subset this device uses.
#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
}

/// Wire reply for `POST /api/chat`.
#[derive(Deserialize)]
struct ChatReply {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend.
    pub fn new(host: impl Into<String>, port: u16, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            model: model.into(),
            num_predict: 0,
            http_client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create from resolved model settings.
    #[must_use]
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self::new(settings.host.clone(), settings.port, settings.model.clone())
            .with_num_predict(settings.num_predict)
    }

    /// Cap the reply length (`num_predict`; 0 = backend default).
    #[must_use]
    pub fn with_num_predict(mut self, num_predict: u32) -> Self {
        self.num_predict = num_predict;
        self
    }

    /// Get the base URL.
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the chat endpoint URL.
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }

    /// Get the tags endpoint URL.
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }

    fn options(&self) -> Option<ChatOptions> {
        (self.num_predict > 0).then_some(ChatOptions {
            num_predict: self.num_predict,
        })
    }
}

impl LanguageModel for OllamaBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .is_ok()
    }

    fn complete(&self, conversation: &Conversation) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: conversation.messages(),
            stream: false,
            options: self.options(),
        };

        tracing::debug!(
            model = %self.model,
            messages = conversation.len(),
            "sending chat completion"
        );

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&request)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }

        let reply: ChatReply = response.json()?;
        match reply.message {
            Some(message) if !message.content.is_empty() => Ok(message.content),
            Some(_) => Err(BackendError::Malformed("empty reply content".to_string())),
            None => Err(BackendError::Malformed(
                "reply carried no message".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_backend_urls() {
        let backend = OllamaBackend::new("localhost", 11434, "llama3.2:1b");
        assert_eq!(backend.base_url(), "http://localhost:11434");
        assert_eq!(backend.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(backend.tags_url(), "http://localhost:11434/api/tags");
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let backend =
            OllamaBackend::new("localhost", 11434, "llama3.2:1b").with_num_predict(135);
        let mut conversation = Conversation::new("persona");
        conversation.push_user("hello");

        let request = ChatRequest {
            model: &backend.model,
            messages: conversation.messages(),
            stream: false,
            options: backend.options(),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "llama3.2:1b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 135);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_num_predict_zero_omits_options() {
        let backend = OllamaBackend::new("localhost", 11434, "m");
        let conversation = Conversation::new("persona");

        let request = ChatRequest {
            model: &backend.model,
            messages: conversation.messages(),
            stream: false,
            options: backend.options(),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_reply_parsing() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"greetings"}}"#)
                .unwrap();
        assert_eq!(reply.message.unwrap().content, "greetings");
    }

    #[test]
    fn test_from_settings() {
        let settings = ModelSettings {
            model: "llama3.2:1b".to_string(),
            host: "example.com".to_string(),
            port: 8080,
            num_predict: 135,
            system_prompt: String::new(),
        };
        let backend = OllamaBackend::from_settings(&settings);
        assert_eq!(backend.base_url(), "http://example.com:8080");
        assert_eq!(backend.num_predict, 135);
    }
}
