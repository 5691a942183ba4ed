//! HubCommander: a chat-ops bot that manages GitHub organizations from Slack.

pub mod auth;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod github;
pub mod messaging;
pub mod repeat;
pub mod setup;
pub mod table;
pub mod travis;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};

/// Colour used for informational attachments.
pub const WORKING_COLOR: &str = "#439FE0";

/// A message received from the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message ID (the Slack `ts`).
    pub id: String,
    pub channel_id: String,
    /// Parent thread, when the message was posted inside one.
    pub thread_ts: Option<String>,
    pub user_id: String,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// How a reply is decorated when posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStyle {
    Info,
    Success,
    Error,
    /// Plain message text with no attachment.
    Raw,
}

impl ReplyStyle {
    /// Attachment colour, or `None` for raw text.
    pub fn color(self) -> Option<&'static str> {
        match self {
            ReplyStyle::Info => Some(WORKING_COLOR),
            ReplyStyle::Success => Some("good"),
            ReplyStyle::Error => Some("danger"),
            ReplyStyle::Raw => None,
        }
    }
}

/// A reply sent back to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundResponse {
    pub text: String,
    pub style: ReplyStyle,
    /// Render markdown inside the attachment text.
    pub markdown: bool,
    /// When set, only this user sees the reply.
    pub ephemeral_user: Option<String>,
    /// Thread to reply into.
    pub thread_ts: Option<String>,
}

impl OutboundResponse {
    fn styled(style: ReplyStyle, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style,
            markdown: false,
            ephemeral_user: None,
            thread_ts: None,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::styled(ReplyStyle::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::styled(ReplyStyle::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::styled(ReplyStyle::Error, text)
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::styled(ReplyStyle::Raw, text)
    }

    pub fn with_markdown(mut self) -> Self {
        self.markdown = true;
        self
    }

    pub fn ephemeral_to(mut self, user_id: impl Into<String>) -> Self {
        self.ephemeral_user = Some(user_id.into());
        self
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }
}

/// The chat user who sent a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    /// Handle used in `@name` mentions.
    pub name: String,
    pub email: Option<String>,
}

impl ChatUser {
    /// Domain part of the user's email address.
    pub fn email_domain(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|email| email.split_once('@'))
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }
}
