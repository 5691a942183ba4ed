//! Command plugins and the argument pipeline they share.

pub mod help;
pub mod parser;
pub mod registry;
pub mod spec;
pub mod validate;

pub use help::format_help_text;
pub use parser::{ParseOutcome, parse, split_command_text};
pub use registry::{CommandDefinition, CommandRegistry, RegisteredCommand};
pub use spec::{ArgSpec, ArgValue, CommandSettings, CommandSpec, ParsedArgs, Validator};
pub use validate::normalize_and_validate;

use crate::error::Result;
use crate::messaging::MessagingDyn;
use crate::{ChatUser, InboundMessage, OutboundResponse};
use std::sync::Arc;

/// Everything a command handler needs to reply to the user who invoked it.
#[derive(Clone)]
pub struct CommandContext {
    pub message: InboundMessage,
    pub user: ChatUser,
    pub messaging: Arc<dyn MessagingDyn>,
}

impl CommandContext {
    /// Post a reply. Delivery failures are logged, not returned.
    pub async fn send(&self, response: OutboundResponse) {
        if let Err(error) = self.messaging.respond(&self.message, response).await {
            tracing::warn!(
                %error,
                channel_id = %self.message.channel_id,
                "failed to deliver reply"
            );
        }
    }

    /// Post a reply into the thread of the triggering message.
    pub async fn send_threaded(&self, response: OutboundResponse) {
        let thread_ts = self
            .message
            .thread_ts
            .clone()
            .unwrap_or_else(|| self.message.id.clone());
        self.send(response.in_thread(thread_ts)).await;
    }

    /// Post an error addressed to the invoking user.
    pub async fn error(&self, text: impl std::fmt::Display) {
        self.send(OutboundResponse::error(format!("@{}: {text}", self.user.name)))
            .await;
    }

    /// Post the standard "working" notice.
    pub async fn working(&self) {
        self.send(OutboundResponse::info(format!(
            "@{}: Working, Please wait...",
            self.user.name
        )))
        .await;
    }
}

/// A group of related chat commands.
#[async_trait::async_trait]
pub trait CommandPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Commands this plugin provides, before config overrides.
    fn commands(&self) -> Vec<CommandDefinition>;

    /// Run `command` (its display name) with validated arguments.
    async fn execute(&self, ctx: &CommandContext, command: &str, args: ParsedArgs) -> Result<()>;
}
