//! `!Repeat`, an echo command for testing the bot end to end.

use crate::command::{CommandContext, CommandDefinition, CommandPlugin, ParsedArgs};
use crate::error::Result;
use crate::OutboundResponse;

pub struct RepeatPlugin;

#[async_trait::async_trait]
impl CommandPlugin for RepeatPlugin {
    fn name(&self) -> &str {
        "repeat"
    }

    fn commands(&self) -> Vec<CommandDefinition> {
        vec![CommandDefinition::new(
            "!Repeat",
            "Just repeats text passed in (for testing and debugging purposes)",
        )]
    }

    async fn execute(&self, ctx: &CommandContext, _command: &str, _args: ParsedArgs) -> Result<()> {
        match ctx.message.text.split_once(' ') {
            Some((_, text)) => {
                ctx.send(OutboundResponse::info(text).with_markdown()).await;
            }
            None => tracing::debug!("nothing to repeat"),
        }
        Ok(())
    }
}
