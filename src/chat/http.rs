use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{ChatBackend, ChatError, ChatReply, ChatRequest};

/// Response envelope of `POST {base_url}/ai/chat`
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    data: Option<ChatReply>,
    error: Option<String>,
    message: Option<String>,
}

/// Study assistant reached over HTTP
pub struct HttpChatBackend {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpChatBackend {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Request(e.to_string()))?;
        Ok(Self {
            endpoint: format!("{}/ai/chat", base_url.trim().trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ChatBackend for HttpChatBackend {
    fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("X-API-Key", key);
        }

        tracing::debug!(endpoint = %self.endpoint, history = request.conversation_history.len(), "sending chat request");
        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        let envelope: Envelope = response.json()?;
        match envelope {
            Envelope { success: true, data: Some(reply), .. } if !reply.message.trim().is_empty() => Ok(reply),
            Envelope { success: true, .. } => Err(ChatError::Decode("reply has no message".to_string())),
            Envelope { error, message, .. } => Err(ChatError::Rejected(
                error.or(message).unwrap_or_else(|| "success was false".to_string()),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
