//! Routes inbound chat messages to registered commands.
//!
//! Each message runs through the same pipeline: room filter, command lookup,
//! user lookup, argument parsing, validation, the optional auth gate and
//! finally the plugin handler. Every failure along the way is reported back
//! into the channel; nothing here returns an error to the caller.

use crate::command::{
    CommandContext, CommandRegistry, ParseOutcome, format_help_text, normalize_and_validate, parse,
};
use crate::config::SlackConfig;
use crate::error::{Error, MessagingError, ValidationError};
use crate::messaging::MessagingDyn;
use crate::{InboundMessage, OutboundResponse};

use std::sync::Arc;

const HELP_COMMAND: &str = "!help";

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    slack: SlackConfig,
    messaging: Arc<dyn MessagingDyn>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        slack: SlackConfig,
        messaging: Arc<dyn MessagingDyn>,
    ) -> Self {
        Self {
            registry,
            slack,
            messaging,
        }
    }

    async fn reply(&self, message: &InboundMessage, response: OutboundResponse) {
        if let Err(error) = self.messaging.respond(message, response).await {
            tracing::warn!(%error, channel_id = %message.channel_id, "failed to deliver reply");
        }
    }

    pub async fn process_message(&self, message: InboundMessage) {
        if !self.slack.accepts(&message.channel_id) {
            tracing::trace!(channel_id = %message.channel_id, "ignoring message from filtered room");
            return;
        }

        let command_name = message
            .text
            .split(' ')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if command_name == HELP_COMMAND {
            let help = self.registry.help_text();
            self.reply(&message, OutboundResponse::info(help).with_markdown())
                .await;
            return;
        }

        let Some(command) = self.registry.get(&command_name) else {
            return;
        };

        tracing::info!(
            command = %command.definition.name,
            user_id = %message.user_id,
            channel_id = %message.channel_id,
            "processing command"
        );

        let user = match self.messaging.user_info(&message.user_id).await {
            Ok(user) => user,
            Err(error) => {
                let reason = match &error {
                    Error::Messaging(MessagingError::UserLookup { reason, .. }) => reason.clone(),
                    other => other.to_string(),
                };
                tracing::error!(%error, user_id = %message.user_id, "user lookup failed");
                self.reply(
                    &message,
                    OutboundResponse::error(format!(
                        "ERROR: Unable to communicate with the Slack API. Error:\n{reason}"
                    )),
                )
                .await;
                return;
            }
        };

        let ctx = CommandContext {
            message,
            user,
            messaging: self.messaging.clone(),
        };
        let definition = &command.definition;

        let args = match &definition.spec {
            None => Default::default(),
            Some(spec) => {
                let parsed = match parse(spec, &definition.settings, &ctx.message.text) {
                    ParseOutcome::Parsed(args) => args,
                    ParseOutcome::Help => {
                        ctx.send(
                            OutboundResponse::info(format_help_text(
                                &ctx.user.name,
                                spec,
                                &definition.settings,
                            ))
                            .with_markdown()
                            .ephemeral_to(&ctx.user.id),
                        )
                        .await;
                        return;
                    }
                };

                match normalize_and_validate(spec, parsed) {
                    Ok(args) => args,
                    Err(ValidationError::Usage(usage)) => {
                        ctx.send(
                            OutboundResponse::error(usage.format_proper_usage(&ctx.user.name))
                                .with_markdown()
                                .ephemeral_to(&ctx.user.id),
                        )
                        .await;
                        return;
                    }
                    Err(ValidationError::Other(error)) => {
                        tracing::warn!(%error, command = %definition.name, "argument validation failed");
                        ctx.send(
                            OutboundResponse::error(format!(
                                "An exception was encountered while running validation for the \
                                 input. The exception details are: `{error}`"
                            ))
                            .with_markdown(),
                        )
                        .await;
                        return;
                    }
                }
            }
        };

        if let Some(gate) = &command.auth {
            if !gate
                .authenticator
                .authenticate(&ctx, args.auth_token(), &gate.options)
                .await
            {
                tracing::info!(
                    command = %definition.name,
                    user_id = %ctx.user.id,
                    auth = gate.authenticator.name(),
                    "authentication denied"
                );
                return;
            }
        }

        if let Err(error) = command.plugin.execute(&ctx, &definition.name, args).await {
            tracing::error!(%error, command = %definition.name, "command failed");
            ctx.error(format!("I encountered a problem:\n\n{error}")).await;
        }
    }
}
