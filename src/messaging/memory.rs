//! In-memory messaging adapter that records every reply.

use crate::error::MessagingError;
use crate::messaging::traits::{InboundStream, Messaging};
use crate::{ChatUser, InboundMessage, OutboundResponse};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryMessaging {
    users: Mutex<HashMap<String, ChatUser>>,
    sent: Mutex<Vec<OutboundResponse>>,
}

impl MemoryMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: &str, name: &str, email: &str) -> Self {
        self.users.lock().insert(
            id.to_string(),
            ChatUser {
                id: id.to_string(),
                name: name.to_string(),
                email: Some(email.to_string()),
            },
        );
        self
    }

    /// Every reply sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutboundResponse> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|r| r.text.clone()).collect()
    }

    pub fn last(&self) -> Option<OutboundResponse> {
        self.sent.lock().last().cloned()
    }
}

impl Messaging for MemoryMessaging {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) -> crate::Result<InboundStream> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn respond(
        &self,
        _message: &InboundMessage,
        response: OutboundResponse,
    ) -> crate::Result<()> {
        self.sent.lock().push(response);
        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> crate::Result<ChatUser> {
        self.users.lock().get(user_id).cloned().ok_or_else(|| {
            MessagingError::UserLookup {
                user_id: user_id.to_string(),
                reason: "user_not_found".into(),
            }
            .into()
        })
    }

    async fn health_check(&self) -> crate::Result<()> {
        Ok(())
    }
}

/// Build an inbound message as Slack would deliver it.
pub fn inbound(channel_id: &str, user_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        id: "1700000000.000100".into(),
        channel_id: channel_id.into(),
        thread_ts: None,
        user_id: user_id.into(),
        text: text.into(),
        timestamp: chrono::Utc::now(),
    }
}
