//! Study chat assistant.
//!
//! [`ChatAssistant`] keeps a short conversation history and hands each message
//! to a [`ChatBackend`]: the HTTP study API when one is configured, otherwise
//! the built-in [`OfflineBackend`]. Backend failures never reach the caller of
//! [`ChatAssistant::get_response`]; they turn into an apology string.

mod http;
mod offline;

pub use http::HttpChatBackend;
pub use offline::OfflineBackend;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use thiserror::Error;

use crate::config::ChatConfig;
use crate::utils;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Request timed out")]
    Timeout,
    #[error("Could not connect to the assistant: {0}")]
    Connection(String),
    #[error("Assistant returned HTTP {0}")]
    Status(u16),
    #[error("Assistant rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid response from assistant: {0}")]
    Decode(String),
    #[error("Request failed: {0}")]
    Request(String),
}

impl ChatError {
    /// Apology shown to the user instead of the error
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::EmptyMessage => "Please type a message first.",
            ChatError::Timeout => {
                "Sorry, the study assistant took too long to answer. Please try again in a moment."
            }
            ChatError::Connection(_) => {
                "Sorry, I couldn't reach the study assistant. Check your connection and try again."
            }
            ChatError::Status(401) | ChatError::Status(403) => {
                "Sorry, the study assistant rejected my credentials. Check your API key in the settings."
            }
            _ => "Sorry, I encountered an error processing your message. Please try again.",
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Timeout
        } else if e.is_connect() {
            ChatError::Connection(e.to_string())
        } else if e.is_decode() {
            ChatError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ChatError::Status(status.as_u16())
        } else {
            ChatError::Request(e.to_string())
        }
    }
}

/// One past exchange as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub human: String,
    pub assistant: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub context: Value,
    pub conversation_history: Vec<HistoryItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItem {
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, rename = "actionItems")]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ChatReply {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Markdown rendering: message, then suggestions and action items as lists
    pub fn to_markdown(&self) -> String {
        let mut out = self.message.trim().to_string();

        if !self.suggestions.is_empty() {
            out.push_str("\n\n**Suggestions:**\n");
            for suggestion in &self.suggestions {
                out.push_str(&format!("* {}\n", suggestion.trim()));
            }
        }

        let actions: Vec<&ActionItem> = self
            .action_items
            .iter()
            .filter(|a| !a.title.trim().is_empty())
            .collect();
        if !actions.is_empty() {
            out.push_str("\n**Next steps:**\n");
            for action in actions {
                match action.description.as_deref().map(str::trim) {
                    Some(desc) if !desc.is_empty() && desc != action.title.trim() => {
                        out.push_str(&format!("* **{}**: {}\n", action.title.trim(), desc));
                    }
                    _ => out.push_str(&format!("* {}\n", action.title.trim())),
                }
            }
        }

        out
    }
}

/// Some backends wrap a whole JSON reply inside the message, often in a
/// ```json fence. Pull the inner message (and lists) out when that happens.
pub fn unwrap_structured(mut reply: ChatReply) -> ChatReply {
    let trimmed = reply.message.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    if !inner.starts_with('{') {
        return reply;
    }
    match serde_json::from_str::<ChatReply>(inner) {
        Ok(nested) if !nested.message.trim().is_empty() => {
            reply.message = nested.message;
            if reply.suggestions.is_empty() {
                reply.suggestions = nested.suggestions;
            }
            if reply.action_items.is_empty() {
                reply.action_items = nested.action_items;
            }
            reply.confidence = reply.confidence.or(nested.confidence);
            reply
        }
        _ => reply,
    }
}

pub trait ChatBackend: Send {
    fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError>;

    /// Short label for status lines and logs
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub human: String,
    pub assistant: String,
    pub timestamp: NaiveDateTime,
}

pub struct ChatAssistant {
    backend: Box<dyn ChatBackend>,
    history: VecDeque<Exchange>,
    history_limit: usize,
}

impl ChatAssistant {
    pub fn new(backend: Box<dyn ChatBackend>, history_limit: usize) -> Self {
        Self {
            backend,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    /// HTTP backend when a base URL is configured, offline answers otherwise
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        let backend: Box<dyn ChatBackend> = if config.base_url.trim().is_empty() {
            Box::new(OfflineBackend)
        } else {
            Box::new(HttpChatBackend::new(
                &config.base_url,
                config.api_key.clone(),
                std::time::Duration::from_secs(config.timeout_secs),
            )?)
        };
        tracing::info!(backend = backend.name(), "chat assistant initialized");
        Ok(Self::new(backend, config.history_limit))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Reply text for `text`; failures become a user-facing apology
    pub fn get_response(&mut self, text: &str, context: Value) -> String {
        match self.get_detailed_response(text, context) {
            Ok(reply) => reply.message,
            Err(e) => e.user_message().to_string(),
        }
    }

    pub fn get_detailed_response(&mut self, text: &str, context: Value) -> Result<ChatReply, ChatError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let request = ChatRequest {
            message: message.to_string(),
            context,
            conversation_history: self
                .history
                .iter()
                .map(|e| HistoryItem {
                    human: e.human.clone(),
                    assistant: e.assistant.clone(),
                })
                .collect(),
        };

        let reply = match self.backend.send(&request) {
            Ok(reply) => unwrap_structured(reply),
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), "chat request failed: {e}");
                return Err(e);
            }
        };

        self.history.push_back(Exchange {
            human: request.message,
            assistant: reply.message.clone(),
            timestamp: utils::now(),
        });
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
        Ok(reply)
    }

    pub fn history(&self) -> impl Iterator<Item = &Exchange> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        tracing::info!("chat history cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Echoes the message and records how much history each request carried
    struct Echo {
        seen: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl ChatBackend for Echo {
        fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
            self.seen.lock().unwrap().push(request.conversation_history.len());
            if self.fail {
                return Err(ChatError::Timeout);
            }
            Ok(ChatReply::text(format!("echo: {}", request.message)))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    fn echo(fail: bool) -> (ChatAssistant, Arc<Mutex<Vec<usize>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let assistant = ChatAssistant::new(Box::new(Echo { seen: seen.clone(), fail }), 3);
        (assistant, seen)
    }

    #[test]
    fn history_is_bounded() {
        let (mut assistant, seen) = echo(false);
        for i in 0..5 {
            assistant.get_response(&format!("q{}", i), json!({}));
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 3]);
        let humans: Vec<&str> = assistant.history().map(|e| e.human.as_str()).collect();
        assert_eq!(humans, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn failures_become_apologies_and_skip_history() {
        let (mut assistant, _) = echo(true);
        let text = assistant.get_response("hello", json!({}));
        assert_eq!(text, ChatError::Timeout.user_message());
        assert_eq!(assistant.history().count(), 0);
    }

    #[test]
    fn empty_message_never_reaches_backend() {
        let (mut assistant, seen) = echo(false);
        let err = assistant.get_detailed_response("   ", json!({})).unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn fenced_json_message_is_unwrapped() {
        let reply = ChatReply::text(
            "```json\n{\"message\": \"Try spaced repetition.\", \"suggestions\": [\"Use flashcards\"]}\n```",
        );
        let reply = unwrap_structured(reply);
        assert_eq!(reply.message, "Try spaced repetition.");
        assert_eq!(reply.suggestions, vec!["Use flashcards"]);
    }

    #[test]
    fn plain_message_is_left_alone() {
        let reply = unwrap_structured(ChatReply::text("{not json"));
        assert_eq!(reply.message, "{not json");
    }

    #[test]
    fn markdown_lists_suggestions_and_actions() {
        let reply = ChatReply {
            message: "Plan your week.".to_string(),
            suggestions: vec!["Start early".to_string()],
            action_items: vec![
                ActionItem {
                    title: "Review notes".to_string(),
                    description: Some("30 minutes on chapter 2".to_string()),
                    ..Default::default()
                },
                ActionItem { title: " ".to_string(), ..Default::default() },
            ],
            confidence: Some(0.9),
        };
        let md = reply.to_markdown();
        assert!(md.starts_with("Plan your week."));
        assert!(md.contains("* Start early"));
        assert!(md.contains("* **Review notes**: 30 minutes on chapter 2"));
        assert_eq!(md.matches("\n* ").count(), 2);
    }
}
